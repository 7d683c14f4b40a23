//! Reachability probing
//!
//! The SBC65EC answers ICMP echo but offers no application-level health
//! check, so reachability is decided by pinging it. Raw ICMP sockets need
//! privileges on most systems, so the probe runs the system `ping` tool.

use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::error::NetError;

/// Extra time granted to the ping process on top of its own reply timeout,
/// covering process start-up and exit
const PROCESS_GRACE: Duration = Duration::from_millis(250);

/// Configuration for one probe run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    /// Reply timeout for each attempt
    pub timeout: Duration,
    /// Maximum number of sequential attempts
    pub attempts: u32,
    /// ICMP payload size in bytes
    pub packet_size: u16,
}

impl ProbeConfig {
    /// Budget used by the periodic heartbeat
    pub fn periodic() -> Self {
        Self {
            timeout: Duration::from_secs(1),
            attempts: 3,
            packet_size: 32,
        }
    }

    /// Budget used when the operator explicitly connects
    pub fn interactive() -> Self {
        Self {
            timeout: Duration::from_millis(500),
            ..Self::periodic()
        }
    }

    /// Worst-case wall time of a probe run with this configuration
    pub fn worst_case(&self) -> Duration {
        (self.timeout + PROCESS_GRACE) * self.attempts
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self::periodic()
    }
}

/// Capability to decide whether a host is reachable
///
/// Implementations must be bounded in time and must not fail: any error is
/// reported as `false`.
pub trait ConnectivityProbe: Send + Sync {
    /// Returns true if `host` answered within one of `config.attempts` tries
    fn probe(&self, host: &str, config: &ProbeConfig) -> impl Future<Output = bool> + Send;
}

/// Probe backed by the system `ping` tool
#[derive(Debug, Clone)]
pub struct PingProbe {
    program: PathBuf,
}

impl PingProbe {
    /// Create a probe that runs `ping` from `PATH`
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("ping"),
        }
    }

    /// Create a probe that runs a specific ping executable
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run a single echo request
    async fn attempt(&self, host: &str, config: &ProbeConfig) -> Result<bool, NetError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(ping_args(host, config))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| NetError::Spawn {
            program: self.program.display().to_string(),
            source,
        })?;

        let bound = config.timeout + PROCESS_GRACE;
        match timeout(bound, child.wait()).await {
            Ok(status) => Ok(status?.success()),
            Err(_) => Err(NetError::Timeout(bound.as_millis() as u64)),
        }
    }
}

impl Default for PingProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectivityProbe for PingProbe {
    async fn probe(&self, host: &str, config: &ProbeConfig) -> bool {
        for n in 1..=config.attempts {
            match self.attempt(host, config).await {
                Ok(true) => {
                    trace!("{} answered ping (attempt {}/{})", host, n, config.attempts);
                    return true;
                }
                Ok(false) => trace!("{} did not answer (attempt {}/{})", host, n, config.attempts),
                Err(e) => debug!("Ping {} failed (attempt {}/{}): {}", host, n, config.attempts, e),
            }
        }

        debug!("{} unreachable after {} attempts", host, config.attempts);
        false
    }
}

/// Build the platform-specific ping arguments for a single echo request
fn ping_args(host: &str, config: &ProbeConfig) -> Vec<String> {
    let size = config.packet_size.to_string();

    if cfg!(windows) {
        // Windows: -w takes milliseconds, -l sets the payload size
        vec![
            "-n".into(),
            "1".into(),
            "-w".into(),
            config.timeout.as_millis().to_string(),
            "-l".into(),
            size,
            host.into(),
        ]
    } else if cfg!(target_os = "macos") {
        // BSD ping: -W takes milliseconds
        vec![
            "-c".into(),
            "1".into(),
            "-W".into(),
            config.timeout.as_millis().to_string(),
            "-s".into(),
            size,
            host.into(),
        ]
    } else {
        // iputils ping: -W takes (fractional) seconds
        vec![
            "-c".into(),
            "1".into(),
            "-W".into(),
            format!("{:.1}", config.timeout.as_secs_f64().max(0.1)),
            "-s".into(),
            size,
            host.into(),
        ]
    }
}
