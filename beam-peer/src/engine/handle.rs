use crate::transfer::OutgoingFile;
use beam_core::{BeamError, ClientId, Result, Role, SessionState, TransferId};
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    pub peer_id: ClientId,
    pub role: Role,
    pub state: SessionState,
    pub sending: bool,
}

pub(crate) enum EngineCommand {
    SendFile {
        peer_id: ClientId,
        file: OutgoingFile,
        reply: oneshot::Sender<Result<TransferId>>,
    },
    Peers {
        reply: oneshot::Sender<Vec<PeerInfo>>,
    },
    ClosePeer {
        peer_id: ClientId,
        reply: oneshot::Sender<bool>,
    },
    Shutdown,
}

/// Cloneable front door to a running `PeerEngine`.
#[derive(Clone)]
pub struct PeerEngineHandle {
    tx: mpsc::Sender<EngineCommand>,
}

impl PeerEngineHandle {
    pub(crate) fn new(tx: mpsc::Sender<EngineCommand>) -> Self {
        Self { tx }
    }

    /// Starts sending `file` to `peer_id`. Resolves once the transfer is
    /// accepted; progress arrives as `PeerEvent::Transfer`.
    pub async fn send_file(&self, peer_id: &ClientId, file: OutgoingFile) -> Result<TransferId> {
        let (reply, rx) = oneshot::channel();
        self.request(EngineCommand::SendFile {
            peer_id: peer_id.clone(),
            file,
            reply,
        })
        .await?;
        rx.await.map_err(|_| engine_stopped())?
    }

    pub async fn peers(&self) -> Result<Vec<PeerInfo>> {
        let (reply, rx) = oneshot::channel();
        self.request(EngineCommand::Peers { reply }).await?;
        rx.await.map_err(|_| engine_stopped())
    }

    /// Closes the session with `peer_id`, failing its in-flight transfers.
    /// Returns `false` if there was no such session.
    pub async fn close_peer(&self, peer_id: &ClientId) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.request(EngineCommand::ClosePeer {
            peer_id: peer_id.clone(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| engine_stopped())
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(EngineCommand::Shutdown).await;
    }

    async fn request(&self, cmd: EngineCommand) -> Result<()> {
        self.tx.send(cmd).await.map_err(|_| engine_stopped())
    }
}

fn engine_stopped() -> BeamError {
    BeamError::Transport("peer engine stopped".into())
}
