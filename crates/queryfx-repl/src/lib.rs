//! Interactive QueryFx evaluator over JSON datasets.

pub mod config;
pub mod repl;
pub mod session;

pub use config::{resolve_data_path, resolve_engine_config};
pub use session::{DatasetSession, ReplError, ReplResult};
