//! Virtual transceiver CAT server
//!
//! Speaks the small Kenwood subset the frequency tracker uses: `FA;` reports
//! the VFO A frequency as `FA<11 digits>;` and `FA<digits>;` sets it. Any
//! other command is answered with `?;`.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use tuner_protocol::Hertz;

/// Handle to a running virtual CAT server
pub struct VirtualCatServer {
    local_addr: SocketAddr,
    frequency: Arc<AtomicU64>,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl VirtualCatServer {
    /// Bind `addr` and serve CAT clients with VFO A at `frequency`
    pub async fn spawn(addr: &str, frequency: Hertz) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let frequency = Arc::new(AtomicU64::new(frequency));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(accept_loop(listener, Arc::clone(&frequency), shutdown_rx));
        info!("Virtual CAT server listening on {}", local_addr);

        Ok(Self {
            local_addr,
            frequency,
            shutdown_tx,
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Tune VFO A
    pub fn set_frequency(&self, freq: Hertz) {
        self.frequency.store(freq, Ordering::SeqCst);
    }

    pub fn frequency(&self) -> Hertz {
        self.frequency.load(Ordering::SeqCst)
    }

    /// Stop accepting clients; open client connections are closed
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.task.await;
    }
}

async fn accept_loop(listener: TcpListener, frequency: Arc<AtomicU64>, mut shutdown_rx: oneshot::Receiver<()>) {
    let mut clients = Vec::new();

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!("CAT client connected from {}", peer);
                    track_client(&mut clients, tokio::spawn(serve_client(stream, Arc::clone(&frequency))));
                }
                Err(e) => warn!("CAT accept failed: {}", e),
            },
        }
    }

    for client in clients {
        client.abort();
    }
    info!("Virtual CAT server stopped");
}

/// Remember a client task, forgetting clients that have disconnected
fn track_client(clients: &mut Vec<JoinHandle<()>>, client: JoinHandle<()>) {
    clients.retain(|h| !h.is_finished());
    clients.push(client);
}

async fn serve_client(stream: TcpStream, frequency: Arc<AtomicU64>) {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut command = Vec::new();

    loop {
        command.clear();
        match reader.read_until(b';', &mut command).await {
            Ok(0) => break,
            Ok(_) => {
                let reply = respond(&command, &frequency);
                if let Some(reply) = reply {
                    if writer.write_all(reply.as_bytes()).await.is_err() {
                        break;
                    }
                }
            }
            Err(e) => {
                debug!("CAT client error: {}", e);
                break;
            }
        }
    }
}

/// Reply to one `;`-terminated command, or `None` for a set command
fn respond(command: &[u8], frequency: &AtomicU64) -> Option<String> {
    let text = String::from_utf8_lossy(command);
    let body = text.trim().trim_end_matches(';');

    match body.strip_prefix("FA") {
        Some("") => Some(format!("FA{:011};", frequency.load(Ordering::SeqCst))),
        Some(digits) => match digits.parse::<Hertz>() {
            Ok(freq) => {
                frequency.store(freq, Ordering::SeqCst);
                None
            }
            Err(_) => Some("?;".to_string()),
        },
        None => Some("?;".to_string()),
    }
}
