//! Session configuration and status tracking

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tuner_net::ProbeConfig;

use crate::error::SessionError;

/// Factory address of the SBC65EC
pub const DEFAULT_HOST: &str = "10.1.0.1";

/// Factory UDP port of the SBC65EC
pub const DEFAULT_PORT: u16 = 54123;

/// Network address of the tuner controller
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceEndpoint {
    /// Host name or IP address
    pub host: String,
    /// UDP port, 1..=65535
    pub port: u16,
}

impl DeviceEndpoint {
    /// Create an endpoint, rejecting an empty host or port 0
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, SessionError> {
        let host = host.into().trim().to_string();
        if host.is_empty() {
            return Err(SessionError::InvalidEndpoint("host is empty".to_string()));
        }
        if port == 0 {
            return Err(SessionError::InvalidEndpoint(format!(
                "port must be 1-65535 (host {host})"
            )));
        }
        Ok(Self { host, port })
    }
}

impl Default for DeviceEndpoint {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl fmt::Display for DeviceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// What to do with the last-sent state when the transport reports failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SendPolicy {
    /// Keep the new state as last-sent; an identical retry is suppressed
    #[default]
    Optimistic,
    /// Restore the previous last-sent state so an identical retry transmits
    RollbackOnFailure,
}

/// Session timing and behaviour configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Period of the reachability heartbeat
    pub heartbeat_interval: Duration,
    /// Probe budget for each heartbeat tick
    pub heartbeat_probe: ProbeConfig,
    /// Probe budget for an explicit connect
    pub connect_probe: ProbeConfig,
    /// Bound on a single datagram send
    pub send_timeout: Duration,
    /// Handling of last-sent on transport failure
    pub send_policy: SendPolicy,
}

impl SessionConfig {
    /// Returns true if a worst-case heartbeat probe outlasts the period
    ///
    /// Ticks that come due during a probe are skipped, so this only reduces
    /// the effective heartbeat rate.
    pub fn heartbeat_overruns(&self) -> bool {
        self.heartbeat_probe.worst_case() >= self.heartbeat_interval
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(1),
            heartbeat_probe: ProbeConfig {
                timeout: Duration::from_millis(200),
                attempts: 2,
                ..ProbeConfig::periodic()
            },
            connect_probe: ProbeConfig::interactive(),
            send_timeout: Duration::from_secs(1),
            send_policy: SendPolicy::Optimistic,
        }
    }
}

/// Operator-facing tuner status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TunerStatus {
    /// Never reached, no connect attempted yet
    NotReachable,
    /// Last probe succeeded
    Reachable(DeviceEndpoint),
    /// Explicit connect failed and the tuner was never reached
    Failed(DeviceEndpoint),
    /// The tuner was reachable earlier but the last probe failed
    Lost(DeviceEndpoint),
}

impl TunerStatus {
    /// Returns true for [`TunerStatus::Reachable`]
    pub fn is_reachable(&self) -> bool {
        matches!(self, Self::Reachable(_))
    }
}

impl fmt::Display for TunerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotReachable => write!(f, "Tuner: not reachable"),
            Self::Reachable(ep) => write!(f, "Tuner: reachable at {ep}"),
            Self::Failed(ep) => write!(f, "Tuner: connection to {ep} failed"),
            Self::Lost(ep) => write!(f, "Tuner: connection to {ep} lost"),
        }
    }
}

/// Derives [`TunerStatus`] from the sequence of probe results
#[derive(Debug, Default)]
pub(crate) struct StatusTracker {
    connected_once: bool,
    current: Option<TunerStatus>,
}

impl StatusTracker {
    /// Record a probe result; `initial_try` marks an explicit connect
    pub(crate) fn record(
        &mut self,
        reachable: bool,
        endpoint: &DeviceEndpoint,
        initial_try: bool,
    ) -> TunerStatus {
        let status = if reachable {
            self.connected_once = true;
            TunerStatus::Reachable(endpoint.clone())
        } else if self.connected_once {
            TunerStatus::Lost(endpoint.clone())
        } else if initial_try {
            TunerStatus::Failed(endpoint.clone())
        } else {
            TunerStatus::NotReachable
        };
        self.current = Some(status.clone());
        status
    }

    pub(crate) fn current(&self) -> TunerStatus {
        self.current.clone().unwrap_or(TunerStatus::NotReachable)
    }
}
