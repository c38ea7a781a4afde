mod coordinator;
mod outcome;
pub mod ws_handler;

pub use coordinator::*;
pub use outcome::*;
