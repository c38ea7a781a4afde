use crate::config::PacingConfig;
use crate::session::PeerSession;
use crate::transport::DataChannel;
use anyhow::Context;
use beam_core::{
    BeamError, CHUNK_SIZE, DataMessage, FileChunk, FileMetadata, Result, SessionState, Transfer,
    TransferDirection, TransferId,
};
use bytes::Bytes;
use std::path::Path;
use tracing::{debug, info, warn};

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// A file held in memory, ready to be chunked.
#[derive(Debug, Clone)]
pub struct OutgoingFile {
    pub name: String,
    pub mime_type: String,
    pub data: Bytes,
}

impl OutgoingFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data,
        }
    }

    pub async fn from_path(path: &Path) -> anyhow::Result<Self> {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .context("Path has no file name")?;

        Ok(Self::new(name, DEFAULT_MIME_TYPE, Bytes::from(data)))
    }

    pub fn metadata(&self) -> FileMetadata {
        FileMetadata {
            name: self.name.clone(),
            size: self.data.len() as u64,
            mime_type: self.mime_type.clone(),
        }
    }
}

/// Creates the outgoing transfer record. Refuses unless the session is open.
pub fn initiate(session: &PeerSession, file: &OutgoingFile) -> Result<Transfer> {
    if session.state() != SessionState::Open {
        return Err(BeamError::NotReady {
            peer: session.peer_id().clone(),
            state: session.state(),
        });
    }

    let transfer = Transfer::new(
        TransferId::new(),
        TransferDirection::Outgoing,
        &file.metadata(),
    );
    info!(
        "Starting transfer {} of '{}' ({} bytes, {} chunks) to {}",
        transfer.id,
        transfer.file_name,
        transfer.total_size,
        transfer.total_chunks,
        session.peer_id()
    );
    Ok(transfer)
}

/// Streams `file` over `channel`, calling `report` after every chunk and once
/// more on the terminal status. A failed send is not retried.
pub async fn run_sender<F>(
    transfer: &mut Transfer,
    file: &OutgoingFile,
    channel: &dyn DataChannel,
    pacing: &PacingConfig,
    mut report: F,
) -> Result<()>
where
    F: FnMut(&Transfer) + Send,
{
    let outcome = send_chunks(transfer, file, channel, pacing, &mut report).await;

    match &outcome {
        Ok(()) => {
            transfer.complete();
            info!("Transfer {} completed", transfer.id);
        }
        Err(e) => {
            warn!("Transfer {} failed: {}", transfer.id, e);
            transfer.fail(e.to_string());
        }
    }
    report(transfer);

    outcome
}

async fn send_chunks<F>(
    transfer: &mut Transfer,
    file: &OutgoingFile,
    channel: &dyn DataChannel,
    pacing: &PacingConfig,
    report: &mut F,
) -> Result<()>
where
    F: FnMut(&Transfer) + Send,
{
    let total = transfer.total_chunks;

    for index in 0..total {
        let start = (index as usize * CHUNK_SIZE).min(file.data.len());
        let end = (start + CHUNK_SIZE).min(file.data.len());
        let data = file.data.slice(start..end);
        let payload_len = data.len();

        let message = DataMessage::FileChunk {
            chunk: FileChunk {
                id: transfer.id.clone(),
                index,
                data,
                is_last: index + 1 == total,
            },
            metadata: (index == 0).then(|| file.metadata()),
        };
        let frame = message
            .encode()
            .map_err(|e| BeamError::Protocol(format!("encode chunk {}: {}", index, e)))?;

        wait_for_drain(channel, pacing).await?;
        channel
            .send(frame)
            .await
            .map_err(|e| BeamError::Transport(format!("send chunk {}: {:#}", index, e)))?;

        transfer.record_chunk(payload_len);
        report(transfer);

        tokio::task::yield_now().await;
    }

    Ok(())
}

/// Blocks while the channel holds more than the high-water mark, until it
/// drains to the low-water mark.
async fn wait_for_drain(channel: &dyn DataChannel, pacing: &PacingConfig) -> Result<()> {
    ensure_open(channel)?;

    let buffered = channel.buffered_amount().await;
    if buffered <= pacing.high_water_mark {
        return Ok(());
    }

    debug!(
        "Applying backpressure on '{}': {} bytes buffered",
        channel.label(),
        buffered
    );

    loop {
        tokio::time::sleep(pacing.poll_interval).await;
        ensure_open(channel)?;

        if channel.buffered_amount().await <= pacing.low_water_mark {
            return Ok(());
        }
    }
}

fn ensure_open(channel: &dyn DataChannel) -> Result<()> {
    if channel.is_open() {
        Ok(())
    } else {
        Err(BeamError::Transport(format!(
            "channel '{}' closed",
            channel.label()
        )))
    }
}
