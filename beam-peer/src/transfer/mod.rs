//! Chunked file transfer over an open peer channel.

mod receiver;
mod sender;

pub use receiver::{IgnoreReason, ReceiveOutcome, ReceivedFile, TransferReceiver};
pub use sender::{OutgoingFile, initiate, run_sender};
