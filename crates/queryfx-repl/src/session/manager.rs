//! Dataset lifecycle: loading rows and running operators over them.

use std::path::{Path, PathBuf};

use serde_json::Value as Json;

use queryfx::{
    run_with, Direction, Engine, EngineConfig, KeyType, Operators, OrderByRegistry, QueryError,
    Value,
};

use super::error::{ReplError, ReplResult};

/// A loaded JSON dataset plus the working set the pipeline commands narrow.
pub struct DatasetSession {
    engine: Engine,
    orders: OrderByRegistry,
    file_path: Option<PathBuf>,
    rows: Vec<Json>,
    working: Vec<Json>,
}

impl DatasetSession {
    /// Load a dataset file holding a JSON array.
    pub fn open(path: &str, config: EngineConfig) -> ReplResult<Self> {
        let file_path = PathBuf::from(path);
        if !file_path.exists() {
            return Err(ReplError::DatasetNotFound(file_path.display().to_string()));
        }

        tracing::info!("Opening dataset: {}", file_path.display());
        let text = std::fs::read_to_string(&file_path)?;
        let rows = match serde_json::from_str::<Json>(&text)? {
            Json::Array(rows) => rows,
            other => {
                return Err(ReplError::InvalidDataset(format!(
                    "expected a JSON array, found {}",
                    json_kind(&other)
                )))
            }
        };

        tracing::info!("Loaded {} rows", rows.len());
        let mut session = Self::from_rows(rows, config);
        session.file_path = Some(file_path);
        Ok(session)
    }

    /// A session over rows that did not come from a file.
    pub fn from_rows(rows: Vec<Json>, config: EngineConfig) -> Self {
        Self {
            engine: Engine::new(config),
            orders: OrderByRegistry::default(),
            file_path: None,
            working: rows.clone(),
            rows,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Rows the next operator runs against.
    pub fn rows(&self) -> &[Json] {
        &self.working
    }

    pub fn count(&self) -> usize {
        self.working.len()
    }

    pub fn loaded_count(&self) -> usize {
        self.rows.len()
    }

    /// Restore the working set to the loaded rows.
    pub fn reset(&mut self) {
        self.working = self.rows.clone();
    }

    fn operators(&self) -> Operators<'_> {
        Operators::new(&self.engine, &self.orders)
    }

    /// Narrow the working set to rows matching `predicate`. Returns the new count.
    pub fn filter(&mut self, predicate: &str) -> ReplResult<usize> {
        let kept: Vec<Json> = self
            .operators()
            .where_fx(&self.working, predicate)?
            .into_iter()
            .cloned()
            .collect();
        tracing::debug!(before = self.working.len(), after = kept.len(), "filtered");
        self.working = kept;
        Ok(self.working.len())
    }

    /// Reorder the working set by a key of type `key`.
    pub fn order(&mut self, key_selector: &str, key: KeyType, direction: Direction) -> ReplResult<()> {
        let ordered: Vec<Json> = self
            .operators()
            .order_by_fx(&self.working, key_selector, key, direction)?
            .into_iter()
            .cloned()
            .collect();
        self.working = ordered;
        Ok(())
    }

    /// Project the working set without changing it.
    pub fn select(&self, selector: &str) -> ReplResult<Vec<Value>> {
        Ok(self.operators().select_fx(&self.working, selector)?)
    }

    pub fn first(&self, predicate: Option<&str>) -> ReplResult<Json> {
        let ops = self.operators();
        let row = match predicate {
            Some(predicate) => ops.first_fx_where(&self.working, predicate)?,
            None => ops.first_fx(&self.working)?,
        };
        Ok(row.clone())
    }

    pub fn single(&self, predicate: Option<&str>) -> ReplResult<Json> {
        let ops = self.operators();
        let row = match predicate {
            Some(predicate) => ops.single_fx_where(&self.working, predicate)?,
            None => ops.single_fx(&self.working)?,
        };
        Ok(row.clone())
    }

    /// Run freestanding code with this session's engine.
    pub fn eval(&self, code: &str) -> ReplResult<Option<Value>> {
        run_with(&self.engine, code).map_err(|e| {
            if e.is_internal() {
                tracing::warn!("internal error while evaluating: {e}");
            }
            ReplError::Query(e)
        })
    }
}

/// Parse a key type name as accepted by `/orderby`.
pub fn parse_key_type(name: &str) -> ReplResult<KeyType> {
    KeyType::parse(name).ok_or_else(|| ReplError::UnknownKeyType(name.to_string()))
}

/// Whether `err` is a user mistake in an expression rather than a data or IO problem.
pub fn is_expression_error(err: &ReplError) -> bool {
    matches!(
        err,
        ReplError::Query(
            QueryError::InvalidArgument { .. }
                | QueryError::Resolution { .. }
                | QueryError::Evaluation(_)
                | QueryError::Compilation { .. }
        )
    )
}

fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "an array",
        Json::Object(_) => "an object",
    }
}
