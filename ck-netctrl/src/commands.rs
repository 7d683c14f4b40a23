//! Subcommand implementations

use std::path::Path;

use anyhow::{bail, Context};
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info, warn};
use tuner_protocol::TuningState;
use tuner_session::{
    CatRig, DeviceEndpoint, DummyRig, FrequencyProfile, FrequencyTracker, ProfileIndex,
    ProfileStore, RigHandle, SessionEvent, TrackerConfig, TrackerMode, TuningSession,
};
use tuner_sim::{VirtualCatServer, VirtualTunerHandle};

use crate::settings::Settings;
use crate::{ProfilesAction, TunerArgs};

/// Tuner endpoint from the command line, falling back to settings
fn endpoint(settings: &Settings, tuner: &TunerArgs) -> anyhow::Result<DeviceEndpoint> {
    let host = tuner.host.clone().unwrap_or_else(|| settings.sbc_ip.clone());
    let port = tuner.port.unwrap_or(settings.sbc_port);
    DeviceEndpoint::new(host, port).context("invalid tuner address")
}

pub async fn send(
    settings: &Settings,
    tuner: &TunerArgs,
    l: u8,
    c: u8,
    highpass: bool,
) -> anyhow::Result<()> {
    let state = TuningState::new(l, c, highpass);
    if !state.is_valid() {
        bail!("L={} is out of range (0-{})", l, tuner_protocol::L_MAX);
    }

    let endpoint = endpoint(settings, tuner)?;
    let session = TuningSession::with_defaults(endpoint.clone());

    if !session.check_reachability().await {
        bail!("{}", session.status());
    }

    if !session.request_tuning(state).await {
        bail!("failed to send {} to {}", state, endpoint);
    }
    println!("Sent {} ({}) to {}", state, state.filter_name(), endpoint);
    Ok(())
}

pub async fn probe(settings: &Settings, tuner: &TunerArgs) -> anyhow::Result<()> {
    let endpoint = endpoint(settings, tuner)?;
    let session = TuningSession::with_defaults(endpoint);

    let reachable = session.check_reachability().await;
    println!("{}", session.status());
    if !reachable {
        bail!("tuner did not answer");
    }
    Ok(())
}

pub async fn run(
    settings: &Settings,
    tuner: &TunerArgs,
    cat: Option<String>,
    dummy: Option<u64>,
    setup: bool,
) -> anyhow::Result<()> {
    let endpoint = endpoint(settings, tuner)?;
    let session = TuningSession::with_defaults(endpoint.clone());
    let monitor = tokio::spawn(report_events(session.subscribe()));

    let connected = session.connect(endpoint.host.clone(), endpoint.port).await?;
    println!("{}", session.status());
    if !connected {
        // keep probing so the tuner is picked up once it comes online
        session.start_heartbeat().await;
    }

    let mode = if setup {
        TrackerMode::Setup
    } else {
        TrackerMode::Operate
    };
    let profiles = settings.index();
    if profiles.is_empty() && mode == TrackerMode::Operate {
        warn!("No frequency profiles stored; the tuner will not be changed");
    }

    let result = match dummy {
        Some(freq) => {
            let rig = DummyRig::new();
            rig.set_frequency(freq);
            rig.connect();
            track(rig, session.clone(), profiles, mode).await
        }
        None => {
            let addr = cat.unwrap_or_else(|| settings.trx_port.clone());
            let mut rig = CatRig::new(addr);
            if let Err(e) = rig.reconnect().await {
                warn!("Transceiver at {} not available yet: {}", rig.addr(), e);
            }
            track(rig, session.clone(), profiles, mode).await
        }
    };

    session.shutdown().await;
    monitor.abort();
    result
}

/// Run the frequency tracker until Ctrl-C
async fn track<R>(
    rig: R,
    session: TuningSession<tuner_net::PingProbe, tuner_net::UdpSender>,
    profiles: ProfileIndex,
    mode: TrackerMode,
) -> anyhow::Result<()>
where
    R: RigHandle + 'static,
{
    let mut tracker = FrequencyTracker::new(rig, session, profiles, TrackerConfig::default());
    tracker.set_mode(mode);

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let task = tokio::spawn(async move { tracker.run(shutdown_rx).await });

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("Shutting down");

    let _ = shutdown_tx.send(());
    task.await.context("frequency tracker task failed")?;
    Ok(())
}

async fn report_events(mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => match describe(&event) {
                Some(line) => println!("{line}"),
                None if event.is_traffic() => debug!("{:?}", event),
                None => {}
            },
            Err(broadcast::error::RecvError::Lagged(n)) => debug!("Skipped {} session events", n),
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// One-line operator text for an event, if it deserves one
fn describe(event: &SessionEvent) -> Option<String> {
    match event {
        SessionEvent::ReachabilityChanged { status, .. } => Some(status.to_string()),
        SessionEvent::ProfileChanged { frequency, entry } => {
            Some(format!("{frequency} Hz -> {entry}"))
        }
        SessionEvent::TuningSent {
            state,
            endpoint,
            ok: true,
            ..
        } => Some(format!("Tuned {state} at {endpoint}")),
        SessionEvent::TuningSent {
            state,
            endpoint,
            ok: false,
            ..
        } => Some(format!("Sending {state} to {endpoint} failed")),
        SessionEvent::Error { source, message } => Some(format!("{source} error: {message}")),
        _ => None,
    }
}

pub fn profiles(settings: &mut Settings, action: ProfilesAction) -> anyhow::Result<()> {
    match action {
        ProfilesAction::List => {
            if settings.all_entries().is_empty() {
                println!("No profiles in {}", settings.path().display());
            }
            for (i, entry) in settings.all_entries().iter().enumerate() {
                println!("{i:>3}: {entry}");
            }
        }
        ProfilesAction::Add {
            min,
            max,
            l,
            c,
            highpass,
        } => {
            let entry = FrequencyProfile::new(min, max, l, c, highpass)?;
            settings.append(entry.clone())?;
            settings.persist()?;
            println!("Added {entry}");
        }
        ProfilesAction::Remove { index } => {
            let entry = settings.remove(index)?;
            settings.persist()?;
            println!("Removed {entry}");
        }
        ProfilesAction::Lookup { frequency } => match settings.index().lookup(frequency) {
            Some(entry) => println!("{entry}"),
            None => println!("No profile covers {frequency} Hz"),
        },
    }
    Ok(())
}

pub async fn sim(bind: &str, cat: Option<&str>, frequency: u64) -> anyhow::Result<()> {
    let device = VirtualTunerHandle::spawn("sim", bind)
        .await
        .with_context(|| format!("failed to bind virtual tuner on {bind}"))?;
    println!("Virtual tuner listening on {}", device.local_addr());

    let cat_server = match cat {
        Some(addr) => {
            let server = VirtualCatServer::spawn(addr, frequency)
                .await
                .with_context(|| format!("failed to bind virtual transceiver on {addr}"))?;
            println!(
                "Virtual transceiver on {} at {} Hz",
                server.local_addr(),
                server.frequency()
            );
            Some(server)
        }
        None => None,
    };

    let mut states = device.subscribe();
    loop {
        tokio::select! {
            received = states.recv() => match received {
                Ok(event) => println!(
                    "{} ({}) from {} [{} datagrams]",
                    event.state,
                    event.state.filter_name(),
                    event.from,
                    event.datagrams
                ),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            },
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for Ctrl-C")?;
                break;
            }
        }
    }

    if let Some(server) = cat_server {
        server.shutdown().await;
    }
    let tuner = device.shutdown().await.context("virtual tuner failed")?;
    info!(
        "Virtual tuner received {} datagrams ({} rejected)",
        tuner.received(),
        tuner.rejected()
    );
    Ok(())
}

pub fn import(settings: &mut Settings, path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        bail!("{} does not exist", path.display());
    }
    settings
        .load(path)
        .with_context(|| format!("failed to import {}", path.display()))?;
    settings.persist()?;
    println!(
        "Imported {} profiles from {} into {}",
        settings.all_entries().len(),
        path.display(),
        settings.path().display()
    );
    Ok(())
}
