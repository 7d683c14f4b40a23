//! Tuner Network Library
//!
//! This crate wraps the two OS facilities the tuner control path depends on:
//!
//! - **Reachability probing**: bounded, retried ICMP echo through the system
//!   `ping` tool ([`PingProbe`])
//! - **Datagram transport**: single-shot, fire-and-forget UDP ([`UdpSender`])
//!
//! Both are exposed through narrow traits ([`ConnectivityProbe`] and
//! [`DatagramSender`]) whose results are plain booleans. Failures are logged
//! here and never surface as errors to the caller.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use tuner_net::{ConnectivityProbe, DatagramSender, PingProbe, ProbeConfig, UdpSender};
//!
//! # async fn demo() {
//! let probe = PingProbe::new();
//! if probe.probe("10.1.0.1", &ProbeConfig::interactive()).await {
//!     let sent = UdpSender::new()
//!         .send("10.1.0.1", 54123, b"c5=1&", Duration::from_secs(1))
//!         .await;
//!     println!("sent: {sent}");
//! }
//! # }
//! ```

pub mod error;
pub mod probe;
pub mod transport;

pub use error::NetError;
pub use probe::{ConnectivityProbe, PingProbe, ProbeConfig};
pub use transport::{send_datagram, DatagramSender, UdpSender};
