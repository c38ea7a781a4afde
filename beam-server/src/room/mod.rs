mod client_handle;
mod room;
mod room_command;
mod room_registry;

pub use client_handle::*;
pub use room::*;
pub use room_command::*;
pub use room_registry::*;
