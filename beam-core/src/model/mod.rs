mod packet;
mod peer;
mod room;
mod signaling;
mod transfer;

pub use packet::{DataMessage, FileChunk};
pub use peer::{ClientId, Role, SessionState};
pub use room::RoomId;
pub use signaling::{IceServerConfig, SignalMessage};
pub use transfer::{
    CHUNK_SIZE, FileMetadata, Transfer, TransferDirection, TransferId, TransferStatus, chunk_count,
};
