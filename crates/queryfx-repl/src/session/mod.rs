//! Dataset session state.

pub mod error;
pub mod manager;

pub use error::{ReplError, ReplResult};
pub use manager::DatasetSession;
