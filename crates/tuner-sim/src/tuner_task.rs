//! Virtual tuner actor task
//!
//! Owns a [`VirtualTuner`] and a bound UDP socket. The task uses a select!
//! loop to:
//! - Receive datagrams and apply them to the virtual tuner
//! - Handle commands from a channel
//! - Emit state change events via a broadcast channel

use std::io;
use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use tuner_protocol::TuningState;

use crate::VirtualTuner;

/// Commands that can be sent to a virtual tuner task
#[derive(Debug, Clone)]
pub enum VirtualTunerCommand {
    /// Shutdown the virtual tuner task
    Shutdown,
}

/// State event emitted when the virtual tuner's relays change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunerStateEvent {
    /// New relay state
    pub state: TuningState,
    /// Sender of the datagram
    pub from: SocketAddr,
    /// Datagrams received so far, including this one
    pub datagrams: usize,
}

/// Largest datagram the task accepts
const MAX_DATAGRAM: usize = 512;

/// Run the virtual tuner task until shutdown
///
/// Returns the virtual tuner so callers can inspect what it received.
pub async fn run_virtual_tuner_task(
    socket: UdpSocket,
    mut tuner: VirtualTuner,
    mut cmd_rx: mpsc::Receiver<VirtualTunerCommand>,
    state_tx: broadcast::Sender<TunerStateEvent>,
) -> io::Result<VirtualTuner> {
    let mut buf = [0u8; MAX_DATAGRAM];

    info!(
        "Starting virtual tuner {} on {}",
        tuner.id(),
        socket.local_addr()?
    );

    loop {
        tokio::select! {
            result = socket.recv_from(&mut buf) => {
                let (n, from) = result?;
                debug!("Virtual tuner {} received {} bytes from {}", tuner.id(), n, from);

                if let Ok(true) = tuner.process_datagram(&buf[..n]) {
                    if let Some(state) = tuner.state() {
                        let _ = state_tx.send(TunerStateEvent {
                            state,
                            from,
                            datagrams: tuner.received(),
                        });
                    }
                }
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(VirtualTunerCommand::Shutdown) => {
                        info!("Shutdown requested for virtual tuner {}", tuner.id());
                        break;
                    }
                    None => {
                        debug!("Command channel closed for virtual tuner {}", tuner.id());
                        break;
                    }
                }
            }
        }
    }

    info!("Virtual tuner task ended for {}", tuner.id());
    Ok(tuner)
}

/// Handle to a spawned virtual tuner
pub struct VirtualTunerHandle {
    local_addr: SocketAddr,
    cmd_tx: mpsc::Sender<VirtualTunerCommand>,
    state_tx: broadcast::Sender<TunerStateEvent>,
    task: JoinHandle<io::Result<VirtualTuner>>,
}

impl VirtualTunerHandle {
    /// Bind `addr` and spawn the virtual tuner task
    pub async fn spawn(id: impl Into<String>, addr: &str) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        let local_addr = socket.local_addr()?;
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (state_tx, _) = broadcast::channel(64);

        let task = tokio::spawn(run_virtual_tuner_task(
            socket,
            VirtualTuner::new(id),
            cmd_rx,
            state_tx.clone(),
        ));

        Ok(Self {
            local_addr,
            cmd_tx,
            state_tx,
            task,
        })
    }

    /// Address the virtual tuner listens on
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Subscribe to relay state changes
    pub fn subscribe(&self) -> broadcast::Receiver<TunerStateEvent> {
        self.state_tx.subscribe()
    }

    /// Stop the task and return the virtual tuner
    pub async fn shutdown(self) -> io::Result<VirtualTuner> {
        let _ = self.cmd_tx.send(VirtualTunerCommand::Shutdown).await;
        self.task.await.map_err(io::Error::other)?
    }
}
