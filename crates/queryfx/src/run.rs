//! Freestanding evaluation of code that is not an operator argument.

use crate::compiler::{Engine, ExpressionCompiler};
use crate::error::{require_text, QueryError, QueryResult};
use crate::preprocess::preprocess;
use crate::types::Value;

/// Run `code` with the default [`Engine`].
///
/// Returns the value of a trailing expression, or `None` when the code ends
/// in a statement or a `void` call.
pub fn run(code: &str) -> QueryResult<Option<Value>> {
    run_with(&Engine::default(), code)
}

pub fn run_with(compiler: &dyn ExpressionCompiler, code: &str) -> QueryResult<Option<Value>> {
    require_text("code", code)?;
    let text = preprocess(code);
    let mut context = compiler.create_context();
    context.execute(&text).map_err(|diagnostic| {
        tracing::debug!(%diagnostic, "freestanding code failed");
        QueryError::Compilation {
            code: code.to_string(),
            diagnostic,
        }
    })
}
