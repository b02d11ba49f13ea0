//! Error types for expression compilation and query operators.

use std::fmt;

/// Phase of the expression engine that rejected the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    Syntax,
    Type,
    Runtime,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::Syntax => write!(f, "syntax"),
            DiagnosticKind::Type => write!(f, "type"),
            DiagnosticKind::Runtime => write!(f, "runtime"),
        }
    }
}

/// A single compiler or evaluator diagnostic.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("{kind} error at {position}: {message}")]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Character offset into the (preprocessed) source text.
    pub position: usize,
    pub message: String,
}

impl Diagnostic {
    pub fn syntax(position: usize, message: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::Syntax,
            position,
            message: message.into(),
        }
    }

    pub fn type_error(position: usize, message: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::Type,
            position,
            message: message.into(),
        }
    }

    pub fn runtime(position: usize, message: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::Runtime,
            position,
            message: message.into(),
        }
    }
}

/// Errors surfaced by the query operators and the freestanding evaluator.
#[derive(thiserror::Error, Debug)]
pub enum QueryError {
    /// Rejected before any compilation was attempted.
    #[error("Invalid argument '{param}': {reason}")]
    InvalidArgument { param: &'static str, reason: String },

    /// No candidate shape accepted the expression.
    #[error(
        "Couldn't parse {role} expression ('{expression}') as {expected}. Source: '{source_type}'{}",
        key_suffix(.key_type)
    )]
    Resolution {
        role: &'static str,
        expression: String,
        expected: String,
        source_type: String,
        key_type: Option<String>,
        #[source]
        diagnostic: Diagnostic,
    },

    #[error("Sequence contains no elements")]
    Empty,

    #[error("Sequence contains more than one element")]
    MoreThanOne,

    /// A compiled expression failed while being applied to an element.
    #[error("Evaluation error: {0}")]
    Evaluation(#[source] Diagnostic),

    /// Freestanding code failed to compile or run.
    #[error("Couldn't run code ('{code}'): {diagnostic}")]
    Compilation {
        code: String,
        #[source]
        diagnostic: Diagnostic,
    },

    /// The host environment broke an assumption the operators rely on.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn key_suffix(key_type: &Option<String>) -> String {
    match key_type {
        Some(key) => format!(". Key: '{key}'."),
        None => ".".to_string(),
    }
}

impl QueryError {
    pub(crate) fn invalid_argument(param: &'static str, reason: impl Into<String>) -> Self {
        QueryError::InvalidArgument {
            param,
            reason: reason.into(),
        }
    }

    /// Defects are not caused by user input and should not be handled as such.
    pub fn is_internal(&self) -> bool {
        matches!(self, QueryError::Internal(_))
    }

    /// Whether the error is a terminal-selection violation.
    pub fn is_selection_violation(&self) -> bool {
        matches!(self, QueryError::Empty | QueryError::MoreThanOne)
    }
}

/// Reject null-like expression text before compiling anything.
pub(crate) fn require_text(param: &'static str, text: &str) -> QueryResult<()> {
    if text.trim().is_empty() {
        return Err(QueryError::invalid_argument(
            param,
            "Argument can't be null nor empty.",
        ));
    }
    Ok(())
}

/// Convenience result type.
pub type QueryResult<T> = Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_message_without_key() {
        let err = QueryError::Resolution {
            role: "predicate",
            expression: "(x, i) => 'qwe'".into(),
            expected: "fn(int) -> bool nor fn(int, int) -> bool".into(),
            source_type: "int".into(),
            key_type: None,
            diagnostic: Diagnostic::type_error(10, "cannot convert"),
        };
        assert_eq!(
            err.to_string(),
            "Couldn't parse predicate expression ('(x, i) => 'qwe'') as fn(int) -> bool nor fn(int, int) -> bool. Source: 'int'."
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_resolution_message_with_key() {
        let err = QueryError::Resolution {
            role: "key selector",
            expression: "x => x.Length".into(),
            expected: "fn(string) -> char".into(),
            source_type: "string".into(),
            key_type: Some("char".into()),
            diagnostic: Diagnostic::type_error(5, "cannot convert"),
        };
        assert!(err.to_string().ends_with("Source: 'string'. Key: 'char'."));
    }

    #[test]
    fn test_require_text() {
        assert!(require_text("code", "1").is_ok());
        assert!(require_text("code", " x ").is_ok());
        for blank in ["", "   ", "\t\n"] {
            assert!(matches!(
                require_text("code", blank),
                Err(QueryError::InvalidArgument { param: "code", .. })
            ));
        }
    }

    #[test]
    fn test_error_classes() {
        assert!(QueryError::Internal("x".into()).is_internal());
        assert!(QueryError::Empty.is_selection_violation());
        assert!(QueryError::MoreThanOne.is_selection_violation());
        assert!(!QueryError::Empty.is_internal());
    }

    #[test]
    fn test_diagnostic_display() {
        let d = Diagnostic::syntax(3, "unexpected ')'");
        assert_eq!(d.to_string(), "syntax error at 3: unexpected ')'");
    }
}
