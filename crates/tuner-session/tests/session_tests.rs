//! Integration tests for the tuning session
//!
//! These exercise the session against scripted network doubles, with paused
//! time where heartbeat timing matters, and end to end against the virtual
//! tuner and virtual CAT server over loopback sockets.

use std::time::Duration;

use tokio::time::{timeout, Instant};
use tuner_net::UdpSender;
use tuner_protocol::{decode, TuningState};
use tuner_session::{
    CatRig, DeviceEndpoint, FrequencyProfile, FrequencyTracker, ProfileIndex, SendPolicy,
    SessionConfig, SessionEvent, SuppressReason, TrackerConfig, TrackerMode, TrackerUpdate,
    TunerStatus, TuningSession,
};
use tuner_sim::{RecordingSender, ScriptedProbe, VirtualCatServer, VirtualTunerHandle};

mod helpers {
    use super::*;

    pub type TestSession = TuningSession<ScriptedProbe, RecordingSender>;

    pub fn session_with(
        probe: &ScriptedProbe,
        sender: &RecordingSender,
        config: SessionConfig,
    ) -> TestSession {
        TuningSession::new(DeviceEndpoint::default(), probe.clone(), sender.clone(), config)
    }

    /// Session that has already been found reachable
    pub async fn reachable_session(sender: &RecordingSender) -> TestSession {
        let probe = ScriptedProbe::always(true);
        let session = session_with(&probe, sender, SessionConfig::default());
        assert!(session.check_reachability().await);
        session
    }

    // C bit 4 has no relay, so fixtures keep it clear to decode back unchanged
    pub const S1: TuningState = TuningState::new(12, 0b1010_0000, false);
    pub const S2: TuningState = TuningState::new(13, 0b1010_0000, false);
}

use helpers::*;

// ============================================================================
// request_tuning
// ============================================================================

#[tokio::test]
async fn identical_requests_transmit_once() {
    let sender = RecordingSender::new();
    let session = reachable_session(&sender).await;

    assert!(session.request_tuning(S1).await);
    assert!(!session.request_tuning(S1).await);
    assert_eq!(sender.count(), 1);

    let sent = sender.sent();
    assert_eq!(sent[0].host, "10.1.0.1");
    assert_eq!(sent[0].port, 54123);
    assert_eq!(decode(&sent[0].payload).unwrap(), S1);
}

#[tokio::test]
async fn unwired_c_bit_still_counts_as_a_change() {
    let sender = RecordingSender::new();
    let session = reachable_session(&sender).await;
    let with_bit4 = TuningState::new(S1.l, S1.c | 0b1_0000, S1.highpass);

    assert!(session.request_tuning(S1).await);
    assert!(session.request_tuning(with_bit4).await);

    let sent = sender.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].payload, sent[1].payload);
    assert_eq!(decode(&sent[1].payload).unwrap(), S1);
}

#[tokio::test]
async fn unreachable_tuner_gets_nothing() {
    let probe = ScriptedProbe::always(false);
    let sender = RecordingSender::new();
    let session = session_with(&probe, &sender, SessionConfig::default());

    assert!(!session.request_tuning(S1).await);
    assert!(!session.check_reachability().await);
    assert!(!session.request_tuning(S2).await);
    assert_eq!(sender.count(), 0);
    assert_eq!(session.last_sent().await, None);
}

#[tokio::test]
async fn returning_to_a_state_retransmits() {
    let sender = RecordingSender::new();
    let session = reachable_session(&sender).await;

    assert!(session.request_tuning(S1).await);
    assert!(session.request_tuning(S2).await);
    assert!(session.request_tuning(S1).await);
    assert_eq!(sender.count(), 3);
}

#[tokio::test]
async fn failed_send_keeps_last_sent_by_default() {
    let sender = RecordingSender::new();
    let session = reachable_session(&sender).await;

    sender.set_succeed(false);
    assert!(!session.request_tuning(S1).await);
    assert_eq!(session.last_sent().await, Some(S1));

    sender.set_succeed(true);
    assert!(!session.request_tuning(S1).await);
    assert_eq!(sender.count(), 1);
}

#[tokio::test]
async fn rollback_policy_allows_retry() {
    let probe = ScriptedProbe::always(true);
    let sender = RecordingSender::new();
    let config = SessionConfig {
        send_policy: SendPolicy::RollbackOnFailure,
        ..SessionConfig::default()
    };
    let session = session_with(&probe, &sender, config);
    session.check_reachability().await;

    assert!(session.request_tuning(S1).await);
    sender.set_succeed(false);
    assert!(!session.request_tuning(S2).await);
    assert_eq!(session.last_sent().await, Some(S1));

    sender.set_succeed(true);
    assert!(session.request_tuning(S2).await);
    assert_eq!(sender.count(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_identical_requests_transmit_once() {
    let sender = RecordingSender::new();
    let session = reachable_session(&sender).await;

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let session = session.clone();
            tokio::spawn(async move { session.request_tuning(S1).await })
        })
        .collect();

    let mut sent = 0;
    for task in tasks {
        if task.await.unwrap() {
            sent += 1;
        }
    }
    assert_eq!(sent, 1);
    assert_eq!(sender.count(), 1);
}

#[tokio::test]
async fn requests_are_reported_as_events() {
    let probe = ScriptedProbe::always(true);
    let sender = RecordingSender::new();
    let session = session_with(&probe, &sender, SessionConfig::default());
    let mut events = session.subscribe();

    session.request_tuning(S1).await;
    match events.recv().await.unwrap() {
        SessionEvent::TuningSuppressed { state, reason } => {
            assert_eq!(state, S1);
            assert_eq!(reason, SuppressReason::Unreachable);
        }
        other => panic!("unexpected event {other:?}"),
    }

    session.check_reachability().await;
    match events.recv().await.unwrap() {
        SessionEvent::ReachabilityChanged { reachable, status } => {
            assert!(reachable);
            assert!(status.is_reachable());
        }
        other => panic!("unexpected event {other:?}"),
    }

    session.request_tuning(S1).await;
    match events.recv().await.unwrap() {
        SessionEvent::TuningSent { state, data, ok, .. } => {
            assert_eq!(state, S1);
            assert_eq!(data.len(), tuner_protocol::DATAGRAM_LEN);
            assert!(ok);
        }
        other => panic!("unexpected event {other:?}"),
    }

    session.request_tuning(S1).await;
    assert!(matches!(
        events.recv().await.unwrap(),
        SessionEvent::TuningSuppressed {
            reason: SuppressReason::Unchanged,
            ..
        }
    ));
}

// ============================================================================
// Heartbeat
// ============================================================================

#[tokio::test(start_paused = true)]
async fn heartbeat_detects_loss_within_one_period() {
    let probe = ScriptedProbe::always(true);
    let sender = RecordingSender::new();
    let session = session_with(&probe, &sender, SessionConfig::default());
    let mut reachable = session.subscribe_reachability();

    assert!(session.connect("10.1.0.1", 54123).await.unwrap());
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(session.is_reachable());
    assert!(probe.calls() >= 3);

    probe.set_fallback(false);
    let lost_at = Instant::now();
    timeout(Duration::from_secs(5), reachable.wait_for(|r| !*r))
        .await
        .unwrap()
        .unwrap();
    assert!(lost_at.elapsed() <= Duration::from_secs(1));
    assert_eq!(
        session.status(),
        TunerStatus::Lost(DeviceEndpoint::default())
    );

    // and back
    probe.set_fallback(true);
    timeout(Duration::from_secs(5), reachable.wait_for(|r| *r))
        .await
        .unwrap()
        .unwrap();

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn slow_probes_never_overlap() {
    let probe = ScriptedProbe::always(true).with_delay(Duration::from_millis(2500));
    let sender = RecordingSender::new();
    let session = session_with(&probe, &sender, SessionConfig::default());

    assert!(session.start_heartbeat().await);
    tokio::time::sleep(Duration::from_millis(10_100)).await;

    // one probe at a time: at most four 2.5 s probes fit in 10.1 s
    let calls = probe.calls();
    assert!((3..=4).contains(&calls), "{calls} probes completed");
    assert!(session.is_reachable());
    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_abandons_probe_in_flight() {
    let probe = ScriptedProbe::always(true).with_delay(Duration::from_secs(30));
    let sender = RecordingSender::new();
    let session = session_with(&probe, &sender, SessionConfig::default());

    session.start_heartbeat().await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let stopping = Instant::now();
    session.stop_heartbeat().await;
    assert!(stopping.elapsed() < Duration::from_secs(1));
    assert_eq!(probe.calls(), 0);
    assert!(!session.heartbeat_running().await);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_session_ends_the_heartbeat() {
    let probe = ScriptedProbe::always(true);
    let sender = RecordingSender::new();
    let session = session_with(&probe, &sender, SessionConfig::default());

    session.start_heartbeat().await;
    tokio::time::sleep(Duration::from_millis(1500)).await;
    drop(session);

    tokio::task::yield_now().await;
    let calls = probe.calls();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(probe.calls(), calls);
}

#[tokio::test(start_paused = true)]
async fn losing_the_tuner_gates_requests_after_a_send() {
    let probe = ScriptedProbe::always(true);
    let sender = RecordingSender::new();
    let session = session_with(&probe, &sender, SessionConfig::default());
    let mut reachable = session.subscribe_reachability();

    assert!(session.connect("10.1.0.1", 54123).await.unwrap());
    assert!(session.request_tuning(S1).await);

    probe.set_fallback(false);
    timeout(Duration::from_secs(5), reachable.wait_for(|r| !*r))
        .await
        .unwrap()
        .unwrap();

    assert!(!session.request_tuning(S2).await);
    assert!(!session.request_tuning(S1).await);
    assert_eq!(sender.count(), 1);
    assert_eq!(session.last_sent().await, Some(S1));
    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn heartbeat_result_for_replaced_endpoint_is_discarded() {
    let probe = ScriptedProbe::always(true);
    probe.answer_host("10.1.0.1", true, Duration::from_millis(800));
    probe.answer_host("10.1.0.2", false, Duration::ZERO);
    let sender = RecordingSender::new();
    let session = session_with(&probe, &sender, SessionConfig::default());

    // first tick probes 10.1.0.1 until t=800ms
    assert!(session.start_heartbeat().await);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!session.connect("10.1.0.2", 2).await.unwrap());

    tokio::time::sleep(Duration::from_millis(750)).await;
    assert_eq!(probe.calls(), 2);
    assert!(!session.is_reachable());
    assert_eq!(
        session.status(),
        TunerStatus::Failed(DeviceEndpoint::new("10.1.0.2", 2).unwrap())
    );
    assert!(!session.request_tuning(S1).await);
    assert_eq!(sender.count(), 0);

    session.shutdown().await;
}

#[tokio::test]
async fn failed_first_connect_reports_failure() {
    let probe = ScriptedProbe::always(false);
    let sender = RecordingSender::new();
    let session = session_with(&probe, &sender, SessionConfig::default());

    assert!(!session.connect("192.168.7.7", 54123).await.unwrap());
    assert_eq!(
        session.status().to_string(),
        "Tuner: connection to 192.168.7.7:54123 failed"
    );
    assert!(session.connect("", 54123).await.is_err());
}

// ============================================================================
// End to end over loopback
// ============================================================================

#[tokio::test]
async fn session_drives_virtual_tuner() {
    let device = VirtualTunerHandle::spawn("bench", "127.0.0.1:0").await.unwrap();
    let mut device_events = device.subscribe();
    let addr = device.local_addr();

    let session = TuningSession::new(
        DeviceEndpoint::new(addr.ip().to_string(), addr.port()).unwrap(),
        ScriptedProbe::always(true),
        UdpSender::new(),
        SessionConfig::default(),
    );
    session.check_reachability().await;

    assert!(session.request_tuning(S1).await);
    let event = timeout(Duration::from_secs(2), device_events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.state, S1);

    let tuner = device.shutdown().await.unwrap();
    assert_eq!(tuner.received(), 1);
    assert_eq!(tuner.recent().next().map(<[u8]>::len), Some(tuner_protocol::DATAGRAM_LEN));
}

#[tokio::test]
async fn tracker_follows_virtual_transceiver() {
    let device = VirtualTunerHandle::spawn("bench", "127.0.0.1:0").await.unwrap();
    let mut device_events = device.subscribe();
    let addr = device.local_addr();
    let cat = VirtualCatServer::spawn("127.0.0.1:0", 3_600_000).await.unwrap();

    let session = TuningSession::new(
        DeviceEndpoint::new(addr.ip().to_string(), addr.port()).unwrap(),
        ScriptedProbe::always(true),
        UdpSender::new(),
        SessionConfig::default(),
    );
    session.check_reachability().await;

    let profiles = ProfileIndex::from_entries(vec![
        FrequencyProfile::new(3_500_000, 3_800_000, 10, 0b0100_1000, false).unwrap(),
        FrequencyProfile::new(14_000_000, 14_350_000, 2, 3, true).unwrap(),
    ]);
    let rig = CatRig::connect(cat.local_addr().to_string()).await.unwrap();
    let mut tracker = FrequencyTracker::new(rig, session.clone(), profiles, TrackerConfig::default());
    tracker.set_mode(TrackerMode::Operate);

    assert!(matches!(
        tracker.poll().await.unwrap(),
        TrackerUpdate::Matched { index: 0, sent: true, .. }
    ));
    let event = timeout(Duration::from_secs(2), device_events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.state, TuningState::new(10, 0b0100_1000, false));

    cat.set_frequency(14_250_000);
    assert!(matches!(
        tracker.poll().await.unwrap(),
        TrackerUpdate::Matched { index: 1, sent: true, .. }
    ));
    let event = timeout(Duration::from_secs(2), device_events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.state, TuningState::new(2, 3, true));

    cat.shutdown().await;
    device.shutdown().await.unwrap();
}
