use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use uuid::Uuid;

/// Fixed payload size of one chunk. Stays under the message-size and
/// buffering ceilings of common data channel implementations.
pub const CHUNK_SIZE: usize = 16384;

/// Number of chunks a file of `total_size` bytes is split into. An empty file
/// still travels as one (empty) chunk so the receiver sees its metadata.
pub fn chunk_count(total_size: u64) -> u32 {
    let chunks = total_size.div_ceil(CHUNK_SIZE as u64).max(1);
    u32::try_from(chunks).unwrap_or(u32::MAX)
}

/// Random token; never derived from wall-clock time or file name.
#[derive(Debug, Clone, Serialize, Deserialize, Hash, Eq, PartialEq)]
#[serde(transparent)]
pub struct TransferId(pub String);

impl TransferId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }
}

impl Default for TransferId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for TransferId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Metadata travelling with chunk 0.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileMetadata {
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub mime_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Pending,
    Transferring,
    Completed,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    Outgoing,
    Incoming,
}

/// One file's movement over a peer channel, as seen by one side.
#[derive(Debug, Clone)]
pub struct Transfer {
    pub id: TransferId,
    pub direction: TransferDirection,
    pub file_name: String,
    pub total_size: u64,
    pub mime_type: String,
    pub chunk_size: usize,
    pub total_chunks: u32,
    pub status: TransferStatus,
    pub chunks_moved: u32,
    pub bytes_moved: u64,
    /// Percent of chunks moved. Never decreases; reaches 100 only with the
    /// last chunk.
    pub progress: f64,
    /// Bytes per second, averaged since `started_at`.
    pub speed: f64,
    pub started_at: Instant,
    pub error: Option<String>,
}

impl Transfer {
    pub fn new(id: TransferId, direction: TransferDirection, metadata: &FileMetadata) -> Self {
        Self {
            id,
            direction,
            file_name: metadata.name.clone(),
            total_size: metadata.size,
            mime_type: metadata.mime_type.clone(),
            chunk_size: CHUNK_SIZE,
            total_chunks: chunk_count(metadata.size),
            status: TransferStatus::Pending,
            chunks_moved: 0,
            bytes_moved: 0,
            progress: 0.0,
            speed: 0.0,
            started_at: Instant::now(),
            error: None,
        }
    }

    pub fn metadata(&self) -> FileMetadata {
        FileMetadata {
            name: self.file_name.clone(),
            size: self.total_size,
            mime_type: self.mime_type.clone(),
        }
    }

    /// Accounts for one more chunk of `payload_len` bytes.
    pub fn record_chunk(&mut self, payload_len: usize) {
        self.chunks_moved = self.chunks_moved.saturating_add(1).min(self.total_chunks);
        self.bytes_moved += payload_len as u64;
        self.status = TransferStatus::Transferring;

        let progress = f64::from(self.chunks_moved) / f64::from(self.total_chunks) * 100.0;
        self.progress = self.progress.max(progress);

        let elapsed = self.started_at.elapsed().as_secs_f64();
        self.speed = if elapsed > 0.0 {
            self.bytes_moved as f64 / elapsed
        } else {
            0.0
        };
    }

    pub fn complete(&mut self) {
        self.status = TransferStatus::Completed;
        self.progress = 100.0;
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        self.status = TransferStatus::Error;
        self.error = Some(reason.into());
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            TransferStatus::Completed | TransferStatus::Error
        )
    }
}
