//! Periodic reachability heartbeat
//!
//! The heartbeat task probes the session endpoint once per period and
//! publishes the result. Ticks that come due while a probe is in flight are
//! skipped rather than queued. A result for an endpoint that was replaced
//! mid-probe is discarded. The task holds only a weak reference to the
//! session, so it exits once every session handle is gone.

use std::sync::Weak;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, trace};
use tuner_net::{ConnectivityProbe, DatagramSender};

use crate::session::Shared;

/// Running heartbeat task
pub(crate) struct HeartbeatHandle {
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl HeartbeatHandle {
    pub(crate) fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal the task and wait for it to exit
    pub(crate) async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            debug!("Heartbeat task ended abnormally: {}", e);
        }
    }
}

pub(crate) fn spawn_heartbeat<P, S>(shared: Weak<Shared<P, S>>, period: Duration) -> HeartbeatHandle
where
    P: ConnectivityProbe + 'static,
    S: DatagramSender + 'static,
{
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let task = tokio::spawn(run_heartbeat(shared, period, shutdown_rx));
    HeartbeatHandle { shutdown_tx, task }
}

async fn run_heartbeat<P, S>(
    shared: Weak<Shared<P, S>>,
    period: Duration,
    mut shutdown_rx: oneshot::Receiver<()>,
) where
    P: ConnectivityProbe + 'static,
    S: DatagramSender + 'static,
{
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!("Heartbeat started ({:?} period)", period);

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => break,
            _ = ticker.tick() => {}
        }

        let Some(session) = shared.upgrade() else {
            break;
        };
        let endpoint = session.endpoint.borrow().clone();
        trace!("Heartbeat probing {}", endpoint);

        let reachable = tokio::select! {
            _ = &mut shutdown_rx => break,
            reachable = session.probe.probe(&endpoint.host, &session.config.heartbeat_probe) => reachable,
        };
        if !session.record_probe(reachable, &endpoint, false) {
            trace!("Endpoint changed during heartbeat probe of {}", endpoint);
        }
    }

    info!("Heartbeat stopped");
}
