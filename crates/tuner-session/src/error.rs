//! Error types for the tuning session

use thiserror::Error;

/// Errors that can occur in the session layer
///
/// Network failures towards the tuner are not errors here: they show up as
/// `false` from [`crate::TuningSession::request_tuning`] and as the
/// reachability flag.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Endpoint host is empty or port is zero
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Profile entry violates its range or value constraints
    #[error("invalid profile: {0}")]
    InvalidProfile(String),

    /// Profile index out of range
    #[error("no profile at index {index} (have {len})")]
    ProfileNotFound { index: usize, len: usize },

    /// Transceiver is not connected
    #[error("transceiver not connected")]
    RigNotConnected,

    /// Transceiver returned something that could not be understood
    #[error("transceiver error: {0}")]
    Rig(String),

    /// Profile store failed to load or persist
    #[error("profile store error: {0}")]
    Store(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
