mod error;
pub mod format;
pub mod model;

pub use error::{BeamError, Result};
pub use model::*;
