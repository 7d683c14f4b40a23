//! Automatic tuning from the transceiver frequency
//!
//! In operate mode the tracker polls the transceiver, looks the frequency up
//! in the profile index and requests the stored tuning state whenever the
//! matched entry changes. A frequency with no entry leaves the tuner where
//! it is. In setup mode the tracker does nothing, leaving the tuner to
//! manual control.

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use tuner_net::{ConnectivityProbe, DatagramSender};
use tuner_protocol::Hertz;

use crate::error::SessionError;
use crate::events::SessionEvent;
use crate::profiles::{FrequencyProfile, ProfileIndex};
use crate::rig::RigHandle;
use crate::session::TuningSession;

/// Whether profile tracking drives the tuner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackerMode {
    /// Manual tuning; the tracker is idle
    #[default]
    Setup,
    /// Profiles drive the tuner
    Operate,
}

/// Tracker timing
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// How often the transceiver frequency is read
    pub poll_interval: Duration,
    /// How often a lost transceiver connection is retried
    pub reconnect_interval: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            reconnect_interval: Duration::from_secs(2),
        }
    }
}

/// Outcome of one poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerUpdate {
    /// Setup mode or no transceiver connection
    Idle,
    /// No entry covers the frequency
    NoMatch { frequency: Hertz },
    /// Same entry as before and its state is already on the tuner
    Unchanged { frequency: Hertz, index: usize },
    /// The entry's state was requested
    Matched {
        frequency: Hertz,
        index: usize,
        /// Result of the tuning request
        sent: bool,
    },
}

/// Drives a tuning session from transceiver frequency
pub struct FrequencyTracker<R, P, S> {
    rig: R,
    session: TuningSession<P, S>,
    profiles: ProfileIndex,
    mode: TrackerMode,
    config: TrackerConfig,
    active: Option<FrequencyProfile>,
}

impl<R, P, S> FrequencyTracker<R, P, S>
where
    R: RigHandle,
    P: ConnectivityProbe + 'static,
    S: DatagramSender + 'static,
{
    /// Create a tracker in setup mode
    pub fn new(rig: R, session: TuningSession<P, S>, profiles: ProfileIndex, config: TrackerConfig) -> Self {
        Self {
            rig,
            session,
            profiles,
            mode: TrackerMode::Setup,
            config,
            active: None,
        }
    }

    /// Switch between setup and operate mode
    pub fn set_mode(&mut self, mode: TrackerMode) {
        if mode != self.mode {
            info!("Tracker mode {:?} -> {:?}", self.mode, mode);
            self.mode = mode;
            self.active = None;
        }
    }

    /// Entry matched by the last poll
    pub fn active_entry(&self) -> Option<&FrequencyProfile> {
        self.active.as_ref()
    }

    /// Read the frequency once and request tuning if the match changed
    ///
    /// The entry's state is also requested again if the tuner does not hold
    /// it yet, e.g. because it was unreachable when the entry first matched.
    pub async fn poll(&mut self) -> Result<TrackerUpdate, SessionError> {
        if self.mode == TrackerMode::Setup || !self.rig.is_connected() {
            return Ok(TrackerUpdate::Idle);
        }

        let frequency = self.rig.current_frequency().await?;

        let Some((index, entry)) = self.profiles.lookup_index(frequency) else {
            if self.active.take().is_some() {
                debug!("{} Hz is outside all profiles, holding tuner state", frequency);
            }
            return Ok(TrackerUpdate::NoMatch { frequency });
        };
        let entry = entry.clone();
        let state = entry.state();

        let changed = self.active.as_ref() != Some(&entry);
        if !changed && self.session.last_sent().await == Some(state) {
            return Ok(TrackerUpdate::Unchanged { frequency, index });
        }

        if changed {
            info!("{} Hz matches profile {}: {}", frequency, index, entry);
            self.session.emit(SessionEvent::ProfileChanged {
                frequency,
                entry: entry.clone(),
            });
            self.active = Some(entry);
        }

        let sent = self.session.request_tuning(state).await;
        Ok(TrackerUpdate::Matched {
            frequency,
            index,
            sent,
        })
    }

    /// Poll until `shutdown_rx` fires or its sender is dropped
    pub async fn run(&mut self, mut shutdown_rx: oneshot::Receiver<()>) {
        let mut poll_timer = interval(self.config.poll_interval);
        poll_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut reconnect_timer = interval(self.config.reconnect_interval);
        reconnect_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Frequency tracker started ({:?})", self.mode);

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => break,
                _ = poll_timer.tick() => {
                    if let Err(e) = self.poll().await {
                        warn!("Frequency poll failed: {}", e);
                        self.session.emit(SessionEvent::Error {
                            source: "Transceiver".to_string(),
                            message: e.to_string(),
                        });
                    }
                }
                _ = reconnect_timer.tick() => {
                    if self.mode == TrackerMode::Operate && !self.rig.is_connected() {
                        if let Err(e) = self.rig.reconnect().await {
                            debug!("Transceiver reconnect failed: {}", e);
                        }
                    }
                }
            }
        }

        info!("Frequency tracker stopped");
    }
}
