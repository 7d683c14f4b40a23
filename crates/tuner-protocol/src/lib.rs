//! Tuner Protocol Library
//!
//! This crate provides encoding and decoding for the control datagram
//! understood by the SBC65EC relay controller that drives the antenna
//! matching network (an L bank, a C bank, and a high-pass/low-pass relay).
//!
//! # Wire format
//!
//! The datagram is a sequence of fixed 5-byte ASCII records, one per relay
//! output of the controller:
//!
//! ```text
//! a0=1&          port 'a', pin 0, relay energized
//! ^^ ^^
//! || |+-- record terminator
//! || +--- '1' or '0'
//! |+----- pin digit
//! +------ port letter
//! ```
//!
//! Records are grouped into four blocks (see [`MessageBlocks`]) which are
//! concatenated A, B, C1, C2 for transmission:
//!
//! | block | channels      | source                 |
//! |-------|---------------|------------------------|
//! | A     | `a0`..`a5`    | L bits 0..5            |
//! | B     | `b0`          | L bit 6                |
//! |       | `b1`..`b4`    | C bits 0..3            |
//! | C1    | `c0`..`c2`    | C bits 5..7            |
//! | C2    | `c5`          | high-pass flag         |
//!
//! # Example
//!
//! ```rust
//! use tuner_protocol::{encode, decode, TuningState, EncodeCommand};
//!
//! let state = TuningState::new(1, 32, true);
//! let datagram = state.encode();
//! assert!(datagram.starts_with(b"a0=1&a1=0&"));
//!
//! let blocks = encode(1, 32, true);
//! assert_eq!(blocks.c1(), b"c0=1&c1=0&c2=0&");
//!
//! assert_eq!(decode(&datagram).unwrap(), state);
//! ```

pub mod decode;
pub mod encode;
pub mod error;
pub mod state;

pub use decode::{decode, parse_records, RelayRecord};
pub use encode::{encode, MessageBlocks, DATAGRAM_LEN, RECORD_LEN};
pub use error::ParseError;
pub use state::{Hertz, TuningState, C_MAX, L_MAX};

/// Trait for values that can be encoded to the controller's wire format
pub trait EncodeCommand {
    /// Encode this value to its wire format
    fn encode(&self) -> Vec<u8>;
}

impl EncodeCommand for TuningState {
    fn encode(&self) -> Vec<u8> {
        encode(self.l, self.c, self.highpass).to_datagram()
    }
}
