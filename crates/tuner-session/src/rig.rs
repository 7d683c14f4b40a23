//! Transceiver frequency sources
//!
//! - `DummyRig`: settable frequency for use without a transceiver
//! - `CatRig`: Kenwood-style ASCII CAT over TCP (SmartSDR CAT, rigctl bridges)

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use tuner_protocol::Hertz;

use crate::error::SessionError;

/// Frequency the dummy transceiver starts on (60 m band)
pub const DUMMY_START_FREQ: Hertz = 5_351_000;

/// Default CAT address (SmartSDR CAT TCP port)
pub const DEFAULT_CAT_ADDR: &str = "localhost:19090";

/// Bound on one CAT round trip
const CAT_TIMEOUT: Duration = Duration::from_millis(500);

/// Source of the current transceiver frequency
pub trait RigHandle: Send {
    /// Returns true if frequency reads can be attempted
    fn is_connected(&self) -> bool;

    /// Read the current VFO frequency
    fn current_frequency(&mut self) -> impl Future<Output = Result<Hertz, SessionError>> + Send;

    /// Try to re-establish a lost connection
    fn reconnect(&mut self) -> impl Future<Output = Result<(), SessionError>> + Send {
        async { Ok(()) }
    }
}

/// Transceiver stand-in with a settable frequency
///
/// Clones share the frequency and connection flag.
#[derive(Debug, Clone)]
pub struct DummyRig {
    frequency: Arc<AtomicU64>,
    connected: Arc<AtomicBool>,
}

impl DummyRig {
    /// Create a disconnected dummy at [`DUMMY_START_FREQ`]
    pub fn new() -> Self {
        Self {
            frequency: Arc::new(AtomicU64::new(DUMMY_START_FREQ)),
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Mark the dummy as connected
    pub fn connect(&self) {
        self.connected.store(true, Ordering::SeqCst);
        info!("Dummy transceiver connected");
    }

    /// Mark the dummy as disconnected
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Tune the dummy to `freq`
    pub fn set_frequency(&self, freq: Hertz) {
        self.frequency.store(freq, Ordering::SeqCst);
    }

    pub fn frequency(&self) -> Hertz {
        self.frequency.load(Ordering::SeqCst)
    }
}

impl Default for DummyRig {
    fn default() -> Self {
        Self::new()
    }
}

impl RigHandle for DummyRig {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn current_frequency(&mut self) -> Result<Hertz, SessionError> {
        if !self.is_connected() {
            return Err(SessionError::RigNotConnected);
        }
        Ok(self.frequency())
    }
}

/// Kenwood-style CAT client over TCP
///
/// Sends `FA;` and expects `FA<digits>;` back.
#[derive(Debug)]
pub struct CatRig {
    addr: String,
    stream: Option<BufStream<TcpStream>>,
}

impl CatRig {
    /// Create a client for `addr` without connecting
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            stream: None,
        }
    }

    /// Create a client and connect immediately
    pub async fn connect(addr: impl Into<String>) -> Result<Self, SessionError> {
        let mut rig = Self::new(addr);
        rig.open().await?;
        Ok(rig)
    }

    /// Address this client connects to
    pub fn addr(&self) -> &str {
        &self.addr
    }

    async fn open(&mut self) -> Result<(), SessionError> {
        let stream = timeout(CAT_TIMEOUT, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| SessionError::Rig(format!("connect to {} timed out", self.addr)))??;
        stream.set_nodelay(true)?;
        info!("Transceiver connected: {}", self.addr);
        self.stream = Some(BufStream::new(stream));
        Ok(())
    }

    async fn query(stream: &mut BufStream<TcpStream>, command: &[u8]) -> Result<String, SessionError> {
        stream.write_all(command).await?;
        stream.flush().await?;

        let mut reply = Vec::new();
        let n = timeout(CAT_TIMEOUT, stream.read_until(b';', &mut reply))
            .await
            .map_err(|_| SessionError::Rig("no reply to frequency query".to_string()))??;
        if n == 0 {
            return Err(SessionError::Rig("connection closed".to_string()));
        }
        Ok(String::from_utf8_lossy(&reply).into_owned())
    }
}

impl RigHandle for CatRig {
    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn current_frequency(&mut self) -> Result<Hertz, SessionError> {
        let stream = self.stream.as_mut().ok_or(SessionError::RigNotConnected)?;

        match Self::query(stream, b"FA;").await {
            Ok(reply) => {
                debug!("CAT reply: {}", reply.trim());
                parse_frequency_report(&reply)
            }
            Err(e) => {
                warn!("Lost transceiver at {}: {}", self.addr, e);
                self.stream = None;
                Err(e)
            }
        }
    }

    async fn reconnect(&mut self) -> Result<(), SessionError> {
        if self.stream.is_none() {
            self.open().await?;
        }
        Ok(())
    }
}

/// Parse a Kenwood `FA` frequency report such as `FA00014250000;`
pub fn parse_frequency_report(reply: &str) -> Result<Hertz, SessionError> {
    let body = reply.trim().trim_end_matches(';');
    let digits = body
        .strip_prefix("FA")
        .ok_or_else(|| SessionError::Rig(format!("unexpected reply {:?}", reply.trim())))?;

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SessionError::Rig(format!("invalid frequency {:?}", digits)));
    }
    digits
        .parse::<Hertz>()
        .map_err(|_| SessionError::Rig(format!("invalid frequency {:?}", digits)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[test]
    fn test_parse_frequency_report() {
        assert_eq!(parse_frequency_report("FA00014250000;").unwrap(), 14_250_000);
        assert_eq!(parse_frequency_report("FA00005351000;\r\n").unwrap(), 5_351_000);
        assert!(parse_frequency_report("FB00014250000;").is_err());
        assert!(parse_frequency_report("FA;").is_err());
        assert!(parse_frequency_report("FA0001425x000;").is_err());
    }

    #[tokio::test]
    async fn test_dummy_rig() {
        let mut rig = DummyRig::new();
        assert!(!rig.is_connected());
        assert!(matches!(
            rig.current_frequency().await,
            Err(SessionError::RigNotConnected)
        ));

        rig.connect();
        assert_eq!(rig.current_frequency().await.unwrap(), DUMMY_START_FREQ);

        let shared = rig.clone();
        shared.set_frequency(7_100_000);
        assert_eq!(rig.current_frequency().await.unwrap(), 7_100_000);
    }

    #[tokio::test]
    async fn test_cat_rig_reads_frequency() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 16];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                assert_eq!(&buf[..n], b"FA;");
                socket.write_all(b"FA00014250000;").await.unwrap();
            }
        });

        let mut rig = CatRig::connect(addr.to_string()).await.unwrap();
        assert!(rig.is_connected());
        assert_eq!(rig.current_frequency().await.unwrap(), 14_250_000);
        assert_eq!(rig.current_frequency().await.unwrap(), 14_250_000);
    }

    #[tokio::test]
    async fn test_cat_rig_detects_closed_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });

        let mut rig = CatRig::connect(addr.to_string()).await.unwrap();
        assert!(rig.current_frequency().await.is_err());
        assert!(!rig.is_connected());
        assert!(matches!(
            rig.current_frequency().await,
            Err(SessionError::RigNotConnected)
        ));
    }

    #[tokio::test]
    async fn test_cat_rig_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        assert!(CatRig::connect(addr.to_string()).await.is_err());
    }
}
