//! Unified event stream for the tuning session
//!
//! Reachability changes, datagrams sent, suppressed requests and profile
//! matches are all published on one broadcast channel. Observers that fall
//! behind lose old events rather than stalling the heartbeat.

use tuner_protocol::{Hertz, TuningState};

use crate::profiles::FrequencyProfile;
use crate::state::{DeviceEndpoint, TunerStatus};

/// Why a tuning request did not produce a datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    /// The tuner was not reachable at request time
    Unreachable,
    /// The requested state equals the last state sent
    Unchanged,
}

/// Session event
#[derive(Debug, Clone)]
pub enum SessionEvent {
    // -------------------------------------------------------------------------
    // Reachability
    // -------------------------------------------------------------------------
    /// The reachability flag changed value
    ReachabilityChanged {
        /// New value of the flag
        reachable: bool,
        /// Operator-facing status after the change
        status: TunerStatus,
    },

    /// The configured endpoint changed
    EndpointChanged {
        /// New endpoint
        endpoint: DeviceEndpoint,
    },

    /// The heartbeat task started
    HeartbeatStarted,

    /// The heartbeat task stopped
    HeartbeatStopped,

    // -------------------------------------------------------------------------
    // Traffic
    // -------------------------------------------------------------------------
    /// A tuning datagram was handed to the transport
    TuningSent {
        /// Requested state
        state: TuningState,
        /// Destination
        endpoint: DeviceEndpoint,
        /// Datagram bytes
        data: Vec<u8>,
        /// Result reported by the transport
        ok: bool,
    },

    /// A tuning request produced no datagram
    TuningSuppressed {
        /// Requested state
        state: TuningState,
        /// Why nothing was sent
        reason: SuppressReason,
    },

    // -------------------------------------------------------------------------
    // Profiles
    // -------------------------------------------------------------------------
    /// The transceiver frequency moved into a different profile entry
    ProfileChanged {
        /// Transceiver frequency in Hz
        frequency: Hertz,
        /// Matched entry
        entry: FrequencyProfile,
    },

    /// An error occurred in a background task
    Error {
        /// Source of the error
        source: String,
        /// Error message
        message: String,
    },
}

impl SessionEvent {
    /// Check if this is a traffic event
    pub fn is_traffic(&self) -> bool {
        matches!(
            self,
            SessionEvent::TuningSent { .. } | SessionEvent::TuningSuppressed { .. }
        )
    }
}
