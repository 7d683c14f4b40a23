//! Error types for tuner datagram parsing

use thiserror::Error;

/// Errors that can occur while parsing a control datagram
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Payload is not a whole number of records
    #[error("invalid length: {0} bytes is not a multiple of the record size")]
    InvalidLength(usize),

    /// A record does not have the `xN=V&` shape
    #[error("malformed record at offset {offset}: {reason}")]
    InvalidRecord { offset: usize, reason: String },

    /// A well-formed record names a channel that carries no relay
    #[error("unknown channel: {0}")]
    UnknownChannel(String),

    /// A relay channel is absent from the datagram
    #[error("missing channel: {0}")]
    MissingChannel(String),

    /// A relay channel appears more than once
    #[error("duplicate channel: {0}")]
    DuplicateChannel(String),
}
