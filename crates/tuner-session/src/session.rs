//! Reachability-gated tuning session
//!
//! A [`TuningSession`] owns the tuner endpoint, the reachability flag and the
//! last state sent. Tuning requests are dropped while the tuner is
//! unreachable or when they would repeat the last transmission.

use std::sync::Arc;

use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, info, warn};
use tuner_net::{ConnectivityProbe, DatagramSender, PingProbe, UdpSender};
use tuner_protocol::{EncodeCommand, TuningState};

use crate::error::SessionError;
use crate::events::{SessionEvent, SuppressReason};
use crate::heartbeat::{spawn_heartbeat, HeartbeatHandle};
use crate::state::{DeviceEndpoint, SendPolicy, SessionConfig, StatusTracker, TunerStatus};

/// Capacity of the session event channel
const EVENT_CAPACITY: usize = 256;

/// State shared between session handles and the heartbeat task
pub(crate) struct Shared<P, S> {
    pub(crate) config: SessionConfig,
    pub(crate) probe: P,
    sender: S,
    pub(crate) endpoint: watch::Sender<DeviceEndpoint>,
    reachable: watch::Sender<bool>,
    status: watch::Sender<StatusTracker>,
    last_sent: Mutex<Option<TuningState>>,
    pub(crate) events: broadcast::Sender<SessionEvent>,
    heartbeat: Mutex<Option<HeartbeatHandle>>,
}

impl<P, S> Shared<P, S> {
    /// Publish a probe result for `endpoint`
    ///
    /// A result for an endpoint that is no longer configured is dropped and
    /// false is returned. The endpoint cannot change while a result is being
    /// published.
    pub(crate) fn record_probe(&self, reachable: bool, endpoint: &DeviceEndpoint, initial_try: bool) -> bool {
        let current = self.endpoint.borrow();
        if *current != *endpoint {
            debug!("Dropping stale probe result for {} (now {})", endpoint, *current);
            return false;
        }

        let mut status = TunerStatus::NotReachable;
        self.status.send_modify(|tracker| {
            status = tracker.record(reachable, endpoint, initial_try);
        });

        let previous = self.reachable.send_replace(reachable);
        if previous != reachable {
            if reachable {
                info!("Tuner at {} is reachable", endpoint);
            } else {
                warn!("Tuner at {} is not reachable", endpoint);
            }
            let _ = self.events.send(SessionEvent::ReachabilityChanged { reachable, status });
        }
        true
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}

/// Handle to a tuning session
///
/// Cloning yields another handle to the same session. The heartbeat task
/// ends when the last handle is dropped.
pub struct TuningSession<P, S> {
    shared: Arc<Shared<P, S>>,
}

impl<P, S> Clone for TuningSession<P, S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl TuningSession<PingProbe, UdpSender> {
    /// Create a session using the system ping tool and UDP
    pub fn with_defaults(endpoint: DeviceEndpoint) -> Self {
        Self::new(endpoint, PingProbe::new(), UdpSender::new(), SessionConfig::default())
    }
}

impl<P, S> TuningSession<P, S>
where
    P: ConnectivityProbe + 'static,
    S: DatagramSender + 'static,
{
    /// Create a session for `endpoint`
    ///
    /// The session starts unreachable with nothing sent. Call
    /// [`TuningSession::connect`] or [`TuningSession::check_reachability`]
    /// before tuning requests can go out.
    pub fn new(endpoint: DeviceEndpoint, probe: P, sender: S, config: SessionConfig) -> Self {
        if config.heartbeat_overruns() {
            warn!(
                "Heartbeat probe budget {:?} is not shorter than the period {:?}; ticks will be skipped",
                config.heartbeat_probe.worst_case(),
                config.heartbeat_interval
            );
        }

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                config,
                probe,
                sender,
                endpoint: watch::Sender::new(endpoint),
                reachable: watch::Sender::new(false),
                status: watch::Sender::new(StatusTracker::default()),
                last_sent: Mutex::new(None),
                events,
                heartbeat: Mutex::new(None),
            }),
        }
    }

    /// Send `desired` to the tuner unless it is unreachable or unchanged
    ///
    /// Returns true only if a datagram was handed to the transport and the
    /// transport reported success.
    pub async fn request_tuning(&self, desired: TuningState) -> bool {
        let shared = &self.shared;
        let mut last_sent = shared.last_sent.lock().await;

        let reachable = *shared.reachable.borrow();
        if !reachable {
            debug!("Tuner not reachable, dropping {}", desired);
            shared.emit(SessionEvent::TuningSuppressed {
                state: desired,
                reason: SuppressReason::Unreachable,
            });
            return false;
        }

        if *last_sent == Some(desired) {
            debug!("{} already sent, not repeating", desired);
            shared.emit(SessionEvent::TuningSuppressed {
                state: desired,
                reason: SuppressReason::Unchanged,
            });
            return false;
        }

        let previous = last_sent.replace(desired);
        let endpoint = shared.endpoint.borrow().clone();
        let data = desired.encode();

        let ok = shared
            .sender
            .send(&endpoint.host, endpoint.port, &data, shared.config.send_timeout)
            .await;

        if ok {
            info!("Sent {} to {}", desired, endpoint);
        } else if shared.config.send_policy == SendPolicy::RollbackOnFailure {
            debug!("Send failed, restoring last sent state {:?}", previous);
            *last_sent = previous;
        }

        shared.emit(SessionEvent::TuningSent {
            state: desired,
            endpoint,
            data,
            ok,
        });
        ok
    }

    /// Current value of the reachability flag
    pub fn is_reachable(&self) -> bool {
        *self.shared.reachable.borrow()
    }

    /// Subscribe to reachability changes
    pub fn subscribe_reachability(&self) -> watch::Receiver<bool> {
        self.shared.reachable.subscribe()
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    /// Currently configured endpoint
    pub fn endpoint(&self) -> DeviceEndpoint {
        self.shared.endpoint.borrow().clone()
    }

    /// Operator-facing status derived from the probe history
    pub fn status(&self) -> TunerStatus {
        self.shared.status.borrow().current()
    }

    /// Last state handed to the transport, if any
    pub async fn last_sent(&self) -> Option<TuningState> {
        *self.shared.last_sent.lock().await
    }

    /// Point the session at a different tuner
    ///
    /// Neither the reachability flag nor the last-sent state change; the
    /// caller is expected to re-probe.
    pub fn set_endpoint(&self, host: impl Into<String>, port: u16) -> Result<(), SessionError> {
        let endpoint = DeviceEndpoint::new(host, port)?;
        let previous = self.shared.endpoint.send_replace(endpoint.clone());
        if previous != endpoint {
            info!("Tuner endpoint changed from {} to {}", previous, endpoint);
            self.shared.emit(SessionEvent::EndpointChanged { endpoint });
        }
        Ok(())
    }

    /// Probe the current endpoint with the interactive budget and publish
    /// the result
    pub async fn check_reachability(&self) -> bool {
        let endpoint = self.endpoint();
        let reachable = self
            .shared
            .probe
            .probe(&endpoint.host, &self.shared.config.connect_probe)
            .await;
        if !self.shared.record_probe(reachable, &endpoint, true) {
            // endpoint changed while probing
            return false;
        }
        reachable
    }

    /// Set the endpoint, probe it, and start the heartbeat if it answered
    pub async fn connect(&self, host: impl Into<String>, port: u16) -> Result<bool, SessionError> {
        self.set_endpoint(host, port)?;
        let reachable = self.check_reachability().await;
        if reachable {
            self.start_heartbeat().await;
        }
        info!("{}", self.status());
        Ok(reachable)
    }

    /// Start the heartbeat task; returns false if it is already running
    pub async fn start_heartbeat(&self) -> bool {
        let mut slot = self.shared.heartbeat.lock().await;
        if slot.as_ref().is_some_and(|h| !h.is_finished()) {
            return false;
        }

        *slot = Some(spawn_heartbeat(Arc::downgrade(&self.shared), self.shared.config.heartbeat_interval));
        self.shared.emit(SessionEvent::HeartbeatStarted);
        true
    }

    /// Stop the heartbeat task and wait for it to exit
    ///
    /// A probe in flight is abandoned. The reachability flag keeps its last
    /// value.
    pub async fn stop_heartbeat(&self) {
        let handle = self.shared.heartbeat.lock().await.take();
        if let Some(handle) = handle {
            handle.stop().await;
            self.shared.emit(SessionEvent::HeartbeatStopped);
        }
    }

    /// Returns true while the heartbeat task runs
    pub async fn heartbeat_running(&self) -> bool {
        self.shared
            .heartbeat
            .lock()
            .await
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        self.shared.emit(event);
    }

    /// Stop background work
    pub async fn shutdown(&self) {
        self.stop_heartbeat().await;
        debug!("Tuning session for {} shut down", self.endpoint());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use tuner_net::ProbeConfig;

    /// Probe with a fixed answer
    struct FixedProbe(AtomicBool);

    impl ConnectivityProbe for FixedProbe {
        async fn probe(&self, _host: &str, _config: &ProbeConfig) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    /// Sender that counts calls
    #[derive(Default)]
    struct CountingSender(AtomicUsize);

    impl DatagramSender for CountingSender {
        async fn send(&self, _host: &str, _port: u16, _payload: &[u8], _timeout: Duration) -> bool {
            self.0.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    fn session(reachable: bool) -> TuningSession<FixedProbe, CountingSender> {
        TuningSession::new(
            DeviceEndpoint::default(),
            FixedProbe(AtomicBool::new(reachable)),
            CountingSender::default(),
            SessionConfig::default(),
        )
    }

    fn sends(session: &TuningSession<FixedProbe, CountingSender>) -> usize {
        session.shared.sender.0.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn test_new_session_is_unreachable() {
        let session = session(true);
        assert!(!session.is_reachable());
        assert_eq!(session.last_sent().await, None);
        assert_eq!(session.status(), TunerStatus::NotReachable);
        assert!(!session.request_tuning(TuningState::new(1, 1, false)).await);
        assert_eq!(sends(&session), 0);
    }

    #[tokio::test]
    async fn test_check_then_send() {
        let session = session(true);
        assert!(session.check_reachability().await);
        assert!(session.request_tuning(TuningState::new(1, 1, false)).await);
        assert!(!session.request_tuning(TuningState::new(1, 1, false)).await);
        assert_eq!(sends(&session), 1);
        assert_eq!(session.last_sent().await, Some(TuningState::new(1, 1, false)));
    }

    #[tokio::test]
    async fn test_set_endpoint_keeps_state() {
        let session = session(true);
        session.check_reachability().await;
        session.request_tuning(TuningState::new(2, 3, true)).await;

        let mut events = session.subscribe();
        session.set_endpoint("192.168.1.50", 4000).unwrap();
        assert_eq!(session.endpoint().to_string(), "192.168.1.50:4000");
        assert!(session.is_reachable());
        assert_eq!(session.last_sent().await, Some(TuningState::new(2, 3, true)));
        assert!(matches!(
            events.recv().await.unwrap(),
            SessionEvent::EndpointChanged { .. }
        ));

        assert!(session.set_endpoint("", 4000).is_err());
        assert!(session.set_endpoint("10.1.0.1", 0).is_err());
        assert_eq!(session.endpoint().to_string(), "192.168.1.50:4000");
    }

    #[tokio::test]
    async fn test_failed_connect_status() {
        let session = session(false);
        assert!(!session.connect("10.1.0.2", 54123).await.unwrap());
        assert_eq!(
            session.status().to_string(),
            "Tuner: connection to 10.1.0.2:54123 failed"
        );
        assert!(!session.heartbeat_running().await);
    }

    #[tokio::test]
    async fn test_connect_starts_heartbeat_once() {
        let session = session(true);
        assert!(session.connect("10.1.0.1", 54123).await.unwrap());
        assert!(session.heartbeat_running().await);
        assert!(!session.start_heartbeat().await);

        session.shutdown().await;
        assert!(!session.heartbeat_running().await);
        assert!(session.start_heartbeat().await);
        session.shutdown().await;
    }
}
