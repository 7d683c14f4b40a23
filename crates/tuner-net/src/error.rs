//! Error types for probing and transport

use thiserror::Error;

/// Errors that can occur while probing a host or sending a datagram
///
/// These never cross the public probe/send API, which reports a boolean;
/// they exist so the failure reason can be logged in one place.
#[derive(Debug, Error)]
pub enum NetError {
    /// The probe tool could not be started
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// No response within the configured bound
    #[error("timeout after {0}ms")]
    Timeout(u64),

    /// Host name did not resolve to any address
    #[error("could not resolve {0}")]
    Resolve(String),

    /// Socket error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
