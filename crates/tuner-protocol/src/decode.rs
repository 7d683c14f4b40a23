//! Datagram decoder
//!
//! Parses a control datagram back into a [`TuningState`]. The controller
//! itself is the only real consumer of the format; this side is used by the
//! virtual device and for readable traffic logs.

use crate::encode::RECORD_LEN;
use crate::error::ParseError;
use crate::state::TuningState;

/// A single parsed `xN=V&` record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayRecord {
    /// Port letter (`a`, `b` or `c`)
    pub port: u8,
    /// Pin number on the port
    pub pin: u8,
    /// Relay state
    pub on: bool,
}

impl RelayRecord {
    /// Channel name as used on the wire, e.g. `b3`
    pub fn channel(&self) -> String {
        format!("{}{}", self.port as char, self.pin)
    }
}

/// Where a channel's bit lives in a [`TuningState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    L(u8),
    C(u8),
    Highpass,
}

/// Relay channels in transmission order, with the state bit they carry
const CHANNELS: [(u8, u8, Source); 15] = [
    (b'a', 0, Source::L(0)),
    (b'a', 1, Source::L(1)),
    (b'a', 2, Source::L(2)),
    (b'a', 3, Source::L(3)),
    (b'a', 4, Source::L(4)),
    (b'a', 5, Source::L(5)),
    (b'b', 0, Source::L(6)),
    (b'b', 1, Source::C(0)),
    (b'b', 2, Source::C(1)),
    (b'b', 3, Source::C(2)),
    (b'b', 4, Source::C(3)),
    (b'c', 0, Source::C(5)),
    (b'c', 1, Source::C(6)),
    (b'c', 2, Source::C(7)),
    (b'c', 5, Source::Highpass),
];

fn channel_index(port: u8, pin: u8) -> Option<usize> {
    CHANNELS
        .iter()
        .position(|&(p, n, _)| p == port && n == pin)
}

/// Split a payload into records, checking the shape of each one
pub fn parse_records(payload: &[u8]) -> Result<Vec<RelayRecord>, ParseError> {
    if payload.len() % RECORD_LEN != 0 {
        return Err(ParseError::InvalidLength(payload.len()));
    }

    payload
        .chunks_exact(RECORD_LEN)
        .enumerate()
        .map(|(i, rec)| {
            let offset = i * RECORD_LEN;
            let invalid = |reason: &str| ParseError::InvalidRecord {
                offset,
                reason: reason.to_string(),
            };

            if !rec[0].is_ascii_lowercase() {
                return Err(invalid("port is not a letter"));
            }
            if !rec[1].is_ascii_digit() {
                return Err(invalid("pin is not a digit"));
            }
            if rec[2] != b'=' {
                return Err(invalid("expected '='"));
            }
            if rec[4] != b'&' {
                return Err(invalid("expected '&'"));
            }
            let on = match rec[3] {
                b'1' => true,
                b'0' => false,
                _ => return Err(invalid("value is not 0 or 1")),
            };

            Ok(RelayRecord {
                port: rec[0],
                pin: rec[1] - b'0',
                on,
            })
        })
        .collect()
}

/// Decode a complete datagram into the tuning state it sets
///
/// Every relay channel must appear exactly once; record order is not
/// significant.
pub fn decode(payload: &[u8]) -> Result<TuningState, ParseError> {
    let records = parse_records(payload)?;
    let mut seen = [false; CHANNELS.len()];
    let mut state = TuningState::default();

    for rec in &records {
        let idx = channel_index(rec.port, rec.pin)
            .ok_or_else(|| ParseError::UnknownChannel(rec.channel()))?;
        if seen[idx] {
            return Err(ParseError::DuplicateChannel(rec.channel()));
        }
        seen[idx] = true;

        if rec.on {
            match CHANNELS[idx].2 {
                Source::L(n) => state.l |= 1 << n,
                Source::C(n) => state.c |= 1 << n,
                Source::Highpass => state.highpass = true,
            }
        }
    }

    if let Some(missing) = seen.iter().position(|s| !s) {
        let (port, pin, _) = CHANNELS[missing];
        return Err(ParseError::MissingChannel(format!("{}{}", port as char, pin)));
    }

    Ok(state)
}
