//! Virtual tuner controller
//!
//! Tracks the relay state an SBC65EC would hold after receiving the
//! datagrams fed to it. Used by the virtual tuner task and directly in tests.

use std::collections::VecDeque;

use tracing::{debug, warn};
use tuner_protocol::{decode, ParseError, TuningState};

/// Number of recent datagrams kept for inspection
pub const RECENT_DATAGRAMS: usize = 32;

/// Virtual SBC65EC relay controller
#[derive(Debug)]
pub struct VirtualTuner {
    /// Identifier for logging
    id: String,
    state: Option<TuningState>,
    received: usize,
    /// Most recent datagrams, oldest first
    recent: VecDeque<Vec<u8>>,
    rejected: usize,
}

impl VirtualTuner {
    /// Create a virtual tuner that has not received anything yet
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: None,
            received: 0,
            recent: VecDeque::with_capacity(RECENT_DATAGRAMS),
            rejected: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Relay state after the last valid datagram
    pub fn state(&self) -> Option<TuningState> {
        self.state
    }

    /// Number of datagrams received, valid or not
    pub fn received(&self) -> usize {
        self.received
    }

    /// Up to [`RECENT_DATAGRAMS`] of the latest datagrams, oldest first
    pub fn recent(&self) -> impl Iterator<Item = &[u8]> {
        self.recent.iter().map(Vec::as_slice)
    }

    /// Number of datagrams that failed to decode
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    /// Apply one datagram
    ///
    /// Returns true if the relay state changed. A datagram that does not
    /// decode leaves the state untouched.
    pub fn process_datagram(&mut self, data: &[u8]) -> Result<bool, ParseError> {
        self.received += 1;
        if self.recent.len() == RECENT_DATAGRAMS {
            self.recent.pop_front();
        }
        self.recent.push_back(data.to_vec());

        match decode(data) {
            Ok(state) => {
                debug!("Virtual tuner {} set to {}", self.id, state);
                let changed = self.state != Some(state);
                self.state = Some(state);
                Ok(changed)
            }
            Err(e) => {
                warn!("Virtual tuner {} rejected datagram: {}", self.id, e);
                self.rejected += 1;
                Err(e)
            }
        }
    }
}
