use crate::model::{ClientId, SessionState};
use thiserror::Error;

/// Failure taxonomy shared by the coordinator, peer sessions and transfers.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BeamError {
    /// A client-originated control message lacks a required field.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Room or target peer is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// The underlying channel or connection failed.
    #[error("transport failure: {0}")]
    Transport(String),

    /// Malformed payload, unexpected negotiation step, or unknown chunk.
    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("peer {peer} is not ready for transfers (state: {state})")]
    NotReady { peer: ClientId, state: SessionState },

    #[error("a transfer to {0} is already in flight")]
    Busy(ClientId),
}

pub type Result<T> = std::result::Result<T, BeamError>;
