use beam_core::{DataMessage, FileChunk, FileMetadata, Transfer, TransferDirection, TransferId};
use bytes::{Bytes, BytesMut};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;
use tracing::{debug, info, warn};

/// Upper bound on memory reserved up front for one assembly. Larger files
/// grow the buffer as chunks arrive.
const MAX_PREALLOCATION: usize = 64 * 1024 * 1024;

/// How many finished transfer ids are remembered for dropping late chunks.
const FINISHED_MEMORY: usize = 64;

/// A fully reassembled file.
#[derive(Debug, Clone)]
pub struct ReceivedFile {
    pub transfer_id: TransferId,
    pub metadata: FileMetadata,
    pub data: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The frame did not decode as a channel message.
    Malformed,
    /// First chunk seen for a transfer id was not chunk 0.
    NotStarted,
    /// Chunk 0 arrived without metadata.
    MissingMetadata,
    /// The index was already received, or the transfer already finished.
    Duplicate,
    /// Index or payload beyond what the metadata declared.
    OutOfRange,
    /// The `isLast` flag contradicts the chunks seen so far.
    BadTermination,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            IgnoreReason::Malformed => "malformed frame",
            IgnoreReason::NotStarted => "unknown transfer",
            IgnoreReason::MissingMetadata => "first chunk without metadata",
            IgnoreReason::Duplicate => "duplicate chunk",
            IgnoreReason::OutOfRange => "chunk out of range",
            IgnoreReason::BadTermination => "inconsistent last-chunk flag",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone)]
pub enum ReceiveOutcome {
    Started(Transfer),
    Progress(Transfer),
    Completed(Transfer, ReceivedFile),
    /// The sender ended the stream early, or the byte count disagrees with
    /// the metadata.
    Failed(Transfer),
    Ignored(IgnoreReason),
}

struct Assembly {
    transfer: Transfer,
    buffer: BytesMut,
    next_index: u32,
    /// Chunks that arrived ahead of `next_index`.
    parked: BTreeMap<u32, Bytes>,
    received_bytes: u64,
    /// Index of the chunk flagged `isLast`, once seen.
    last_index: Option<u32>,
}

impl Assembly {
    fn new(transfer: Transfer) -> Self {
        let capacity = usize::try_from(transfer.total_size)
            .unwrap_or(usize::MAX)
            .min(MAX_PREALLOCATION);
        Self {
            transfer,
            buffer: BytesMut::with_capacity(capacity),
            next_index: 0,
            parked: BTreeMap::new(),
            received_bytes: 0,
            last_index: None,
        }
    }

    fn accept(&mut self, chunk: FileChunk) -> Result<(), IgnoreReason> {
        let final_index = self.transfer.total_chunks - 1;
        if chunk.index > final_index || self.last_index.is_some_and(|last| chunk.index > last) {
            return Err(IgnoreReason::OutOfRange);
        }
        if chunk.index < self.next_index || self.parked.contains_key(&chunk.index) {
            return Err(IgnoreReason::Duplicate);
        }
        if chunk.is_last {
            let beyond = self.parked.range(chunk.index + 1..).next().is_some();
            if self.last_index.is_some() || beyond {
                return Err(IgnoreReason::BadTermination);
            }
        } else if chunk.index == final_index {
            return Err(IgnoreReason::BadTermination);
        }
        if self.received_bytes + chunk.data.len() as u64 > self.transfer.total_size {
            return Err(IgnoreReason::OutOfRange);
        }

        self.received_bytes += chunk.data.len() as u64;
        if chunk.is_last {
            self.last_index = Some(chunk.index);
        }

        if chunk.index == self.next_index {
            self.append(&chunk.data);
            while let Some(data) = self.parked.remove(&self.next_index) {
                self.append(&data);
            }
        } else {
            debug!(
                "Transfer {}: parking chunk {} (expecting {})",
                self.transfer.id, chunk.index, self.next_index
            );
            self.parked.insert(chunk.index, chunk.data);
        }
        Ok(())
    }

    /// Progress only counts the contiguous prefix.
    fn append(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
        self.next_index += 1;
        self.transfer.record_chunk(data.len());
    }

    fn is_complete(&self) -> bool {
        self.last_index.is_some_and(|last| self.next_index > last)
    }
}

/// Reassembles incoming transfers from one peer.
#[derive(Default)]
pub struct TransferReceiver {
    assemblies: HashMap<TransferId, Assembly>,
    finished: HashSet<TransferId>,
    finished_order: VecDeque<TransferId>,
}

impl TransferReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open assembly buffers.
    pub fn active_count(&self) -> usize {
        self.assemblies.len()
    }

    /// Decodes one channel frame. Undecodable frames are dropped.
    pub fn handle_frame(&mut self, frame: &[u8]) -> ReceiveOutcome {
        match DataMessage::decode(frame) {
            Ok(message) => self.handle_message(message),
            Err(e) => {
                warn!("Dropping malformed channel frame: {}", e);
                ReceiveOutcome::Ignored(IgnoreReason::Malformed)
            }
        }
    }

    pub fn handle_message(&mut self, message: DataMessage) -> ReceiveOutcome {
        match message {
            DataMessage::FileChunk { chunk, metadata } => self.handle_chunk(chunk, metadata),
        }
    }

    /// Fails every open assembly and frees its buffer.
    pub fn abort_all(&mut self, reason: &str) -> Vec<Transfer> {
        let aborted: Vec<Transfer> = self
            .assemblies
            .drain()
            .map(|(_, assembly)| {
                let mut transfer = assembly.transfer;
                transfer.fail(reason);
                transfer
            })
            .collect();
        for transfer in &aborted {
            self.remember_finished(transfer.id.clone());
        }
        aborted
    }

    fn remember_finished(&mut self, id: TransferId) {
        if !self.finished.insert(id.clone()) {
            return;
        }
        self.finished_order.push_back(id);
        while self.finished_order.len() > FINISHED_MEMORY {
            if let Some(oldest) = self.finished_order.pop_front() {
                self.finished.remove(&oldest);
            }
        }
    }

    fn handle_chunk(
        &mut self,
        chunk: FileChunk,
        metadata: Option<FileMetadata>,
    ) -> ReceiveOutcome {
        let id = chunk.id.clone();

        if self.finished.contains(&id) {
            debug!("Ignoring chunk {} of finished transfer {}", chunk.index, id);
            return ReceiveOutcome::Ignored(IgnoreReason::Duplicate);
        }

        let started = !self.assemblies.contains_key(&id);
        if started {
            if chunk.index != 0 {
                warn!("Ignoring chunk {} of unknown transfer {}", chunk.index, id);
                return ReceiveOutcome::Ignored(IgnoreReason::NotStarted);
            }
            let Some(metadata) = metadata else {
                warn!("Ignoring first chunk of {} without metadata", id);
                return ReceiveOutcome::Ignored(IgnoreReason::MissingMetadata);
            };

            info!(
                "Receiving '{}' ({} bytes) as transfer {}",
                metadata.name, metadata.size, id
            );
            let transfer = Transfer::new(id.clone(), TransferDirection::Incoming, &metadata);
            self.assemblies.insert(id.clone(), Assembly::new(transfer));
        }

        let Some(assembly) = self.assemblies.get_mut(&id) else {
            return ReceiveOutcome::Ignored(IgnoreReason::NotStarted);
        };

        let index = chunk.index;
        if let Err(reason) = assembly.accept(chunk) {
            warn!("Transfer {}: ignoring chunk {}: {}", id, index, reason);
            if started {
                self.assemblies.remove(&id);
            }
            return ReceiveOutcome::Ignored(reason);
        }

        if assembly.is_complete() {
            return self.finalize(&id);
        }

        let snapshot = assembly.transfer.clone();
        if started {
            ReceiveOutcome::Started(snapshot)
        } else {
            ReceiveOutcome::Progress(snapshot)
        }
    }

    fn finalize(&mut self, id: &TransferId) -> ReceiveOutcome {
        let Some(assembly) = self.assemblies.remove(id) else {
            return ReceiveOutcome::Ignored(IgnoreReason::NotStarted);
        };
        self.remember_finished(id.clone());

        let mut transfer = assembly.transfer;
        let final_index = transfer.total_chunks - 1;
        let data = assembly.buffer.freeze();

        if assembly.last_index != Some(final_index) {
            transfer.fail(format!(
                "stream ended after {} of {} chunks",
                assembly.next_index, transfer.total_chunks
            ));
            warn!("Transfer {} failed: truncated stream", id);
            return ReceiveOutcome::Failed(transfer);
        }
        if data.len() as u64 != transfer.total_size {
            transfer.fail(format!(
                "received {} bytes, expected {}",
                data.len(),
                transfer.total_size
            ));
            warn!("Transfer {} failed: size mismatch", id);
            return ReceiveOutcome::Failed(transfer);
        }

        transfer.complete();
        info!("Transfer {} completed ({} bytes)", id, data.len());

        let file = ReceivedFile {
            transfer_id: id.clone(),
            metadata: transfer.metadata(),
            data,
        };
        ReceiveOutcome::Completed(transfer, file)
    }
}
