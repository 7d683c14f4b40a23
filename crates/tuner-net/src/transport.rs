//! Datagram transport
//!
//! Fire-and-forget UDP. The controller never answers, so success only means
//! the local send call completed.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{lookup_host, UdpSocket};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::NetError;

/// Capability to send one datagram to a host
///
/// Implementations must be bounded by `timeout` and must not fail: any local
/// error is reported as `false`.
pub trait DatagramSender: Send + Sync {
    /// Send `payload` once to `host:port`; true if the local send succeeded
    fn send(
        &self,
        host: &str,
        port: u16,
        payload: &[u8],
        timeout: Duration,
    ) -> impl Future<Output = bool> + Send;
}

/// UDP sender using an ephemeral socket per datagram
#[derive(Debug, Clone, Copy, Default)]
pub struct UdpSender;

impl UdpSender {
    /// Create a new UDP sender
    pub fn new() -> Self {
        Self
    }

    async fn try_send(host: &str, port: u16, payload: &[u8]) -> Result<usize, NetError> {
        let addr = lookup_host((host, port))
            .await?
            .next()
            .ok_or_else(|| NetError::Resolve(host.to_string()))?;

        let bind: SocketAddr = match addr {
            SocketAddr::V4(_) => ([0, 0, 0, 0], 0).into(),
            SocketAddr::V6(_) => ([0u16; 8], 0).into(),
        };
        let socket = UdpSocket::bind(bind).await?;
        Ok(socket.send_to(payload, addr).await?)
    }
}

impl DatagramSender for UdpSender {
    async fn send(&self, host: &str, port: u16, payload: &[u8], limit: Duration) -> bool {
        let result = match timeout(limit, Self::try_send(host, port, payload)).await {
            Ok(result) => result,
            Err(_) => Err(NetError::Timeout(limit.as_millis() as u64)),
        };

        match result {
            Ok(n) => {
                debug!("Sent {} bytes to {}:{}", n, host, port);
                true
            }
            Err(e) => {
                warn!("Send to {}:{} failed: {}", host, port, e);
                false
            }
        }
    }
}

/// Send a single datagram with the default UDP sender
pub async fn send_datagram(host: &str, port: u16, payload: &[u8], limit: Duration) -> bool {
    UdpSender::new().send(host, port, payload, limit).await
}
