use beam_core::{ClientId, SignalMessage};
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::debug;

/// Outbound half of one client's control connection.
/// The socket task drains the receiving side into the WebSocket.
#[derive(Clone, Debug)]
pub struct ClientConnection {
    tx: mpsc::UnboundedSender<SignalMessage>,
}

impl ClientConnection {
    pub fn new(tx: mpsc::UnboundedSender<SignalMessage>) -> Self {
        Self { tx }
    }

    /// Connection plus the receiver that observes everything sent on it.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SignalMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Queues `msg` for the client. Returns `false` when the socket is gone.
    pub fn send(&self, msg: SignalMessage) -> bool {
        match self.tx.send(msg) {
            Ok(()) => true,
            Err(e) => {
                debug!("Dropping {} for closed connection", e.0.kind());
                false
            }
        }
    }
}

/// A registered room member.
#[derive(Clone, Debug)]
pub struct ClientHandle {
    pub id: ClientId,
    pub connection: ClientConnection,
    pub joined_at: Instant,
}

impl ClientHandle {
    pub fn new(id: ClientId, connection: ClientConnection) -> Self {
        Self {
            id,
            connection,
            joined_at: Instant::now(),
        }
    }
}
