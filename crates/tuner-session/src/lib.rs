//! Tuner Session Library
//!
//! This crate holds the control logic between an operator (or the frequency
//! tracker) and the SBC65EC tuner controller:
//!
//! - **TuningSession**: reachability-gated, change-suppressed tuning requests
//! - **Heartbeat**: background task keeping the reachability flag current
//! - **Profiles**: ordered frequency ranges mapped to tuning states
//! - **Rigs**: transceiver frequency sources (dummy and Kenwood-style CAT)
//! - **FrequencyTracker**: follows the transceiver and retunes per profile
//!
//! Reachability is published through a `watch` channel; everything else the
//! session does is reported as [`SessionEvent`]s on a broadcast channel.
//!
//! # Example
//!
//! ```rust,no_run
//! use tuner_protocol::TuningState;
//! use tuner_session::{DeviceEndpoint, TuningSession};
//!
//! # async fn demo() -> Result<(), tuner_session::SessionError> {
//! let session = TuningSession::with_defaults(DeviceEndpoint::default());
//! if session.connect("10.1.0.1", 54123).await? {
//!     session.request_tuning(TuningState::new(12, 80, false)).await;
//! }
//! session.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod events;
mod heartbeat;
pub mod profiles;
pub mod rig;
pub mod session;
pub mod state;
pub mod tracker;

pub use error::SessionError;
pub use events::{SessionEvent, SuppressReason};
pub use profiles::{FrequencyProfile, ProfileIndex, ProfileStore};
pub use rig::{parse_frequency_report, CatRig, DummyRig, RigHandle, DEFAULT_CAT_ADDR, DUMMY_START_FREQ};
pub use session::TuningSession;
pub use state::{DeviceEndpoint, SendPolicy, SessionConfig, TunerStatus, DEFAULT_HOST, DEFAULT_PORT};
pub use tracker::{FrequencyTracker, TrackerConfig, TrackerMode, TrackerUpdate};
