//! Configuration loading and resolution.

use std::collections::BTreeSet;
use std::path::PathBuf;

use queryfx::{EngineConfig, Import};

use crate::session::{ReplError, ReplResult};

/// Resolve the dataset file path.
pub fn resolve_data_path(explicit: Option<&str>) -> String {
    if let Some(path) = explicit {
        return path.to_string();
    }

    if let Ok(env_path) = std::env::var("QUERYFX_DATA") {
        return env_path;
    }

    let cwd_data = PathBuf::from(".queryfx/data.json");
    if cwd_data.exists() {
        return cwd_data.display().to_string();
    }

    resolve_default_data_path()
}

fn resolve_default_data_path() -> String {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());

    format!("{home}/.queryfx/data.json")
}

/// Resolve the engine configuration from `--imports`, then `QUERYFX_IMPORTS`.
pub fn resolve_engine_config(explicit_imports: Option<&str>) -> ReplResult<EngineConfig> {
    let list = match explicit_imports {
        Some(list) => Some(list.to_string()),
        None => std::env::var("QUERYFX_IMPORTS").ok(),
    };

    match list {
        Some(list) => Ok(EngineConfig::default().with_imports(parse_imports(&list)?)),
        None => Ok(EngineConfig::default()),
    }
}

/// Parse a comma-separated import list such as `core,sequences`.
pub fn parse_imports(list: &str) -> ReplResult<BTreeSet<Import>> {
    list.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| Import::parse(name).ok_or_else(|| ReplError::UnknownImport(name.to_string())))
        .collect()
}
