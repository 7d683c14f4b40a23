//! Tuner Simulation Library
//!
//! This crate lets the tuner software run without hardware. It includes:
//!
//! - **VirtualTuner**: decodes control datagrams and tracks relay state,
//!   optionally behind a real UDP socket ([`VirtualTunerHandle`])
//! - **VirtualCatServer**: a Kenwood-style CAT endpoint reporting a settable
//!   VFO frequency
//! - **ScriptedProbe** / **RecordingSender**: doubles for the network traits
//!
//! # Example
//!
//! ```rust
//! use tuner_protocol::{EncodeCommand, TuningState};
//! use tuner_sim::VirtualTuner;
//!
//! let mut tuner = VirtualTuner::new("bench");
//! let state = TuningState::new(5, 9, false);
//! assert!(tuner.process_datagram(&state.encode()).unwrap());
//! assert_eq!(tuner.state(), Some(state));
//! ```

pub mod cat_server;
pub mod fakes;
pub mod tuner;
pub mod tuner_task;

pub use cat_server::VirtualCatServer;
pub use fakes::{RecordingSender, ScriptedProbe, SentDatagram};
pub use tuner::{VirtualTuner, RECENT_DATAGRAMS};
pub use tuner_task::{run_virtual_tuner_task, TunerStateEvent, VirtualTunerCommand, VirtualTunerHandle};
