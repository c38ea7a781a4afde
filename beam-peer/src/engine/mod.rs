mod event;
mod handle;
mod peer_engine;

pub use event::PeerEvent;
pub use handle::{PeerEngineHandle, PeerInfo};
pub use peer_engine::PeerEngine;
