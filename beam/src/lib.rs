pub use beam_core::format;
pub use beam_core::{BeamError, ClientId, RoomId};

pub mod model {
    pub use beam_core::model::*;
}

#[cfg(feature = "server")]
pub mod server {
    pub use beam_server::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use beam_peer::*;
}
