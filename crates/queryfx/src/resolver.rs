//! Candidate resolution: compile an expression against an ordered list of
//! shapes and keep the first one that works.

use std::fmt;

use crate::compiler::{CompiledCallable, ExpressionCompiler, Shape};
use crate::dispatch::KeyType;
use crate::error::{require_text, Diagnostic, QueryError, QueryResult};
use crate::preprocess::preprocess;
use crate::types::Type;

/// What an expression is used for; names the argument in errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Predicate,
    Selector,
    KeySelector,
}

impl Role {
    /// Parameter name reported for invalid arguments.
    pub fn param(&self) -> &'static str {
        match self {
            Role::Predicate => "predicate_expression",
            Role::Selector => "selector_expression",
            Role::KeySelector => "key_selector_expression",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Role::Predicate => "predicate",
            Role::Selector => "selector",
            Role::KeySelector => "key selector",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Filter predicates: element-only first, then element plus index.
pub fn predicate_shapes(source: &Type) -> [Shape; 2] {
    [
        Shape::unary(source.clone(), Type::Bool),
        Shape::new(vec![source.clone(), Type::Int], Type::Bool),
    ]
}

/// Describe the accepted shapes the way failures report them.
fn expected(shapes: &[Shape]) -> String {
    match shapes {
        [single] => single.to_string(),
        many => format!(
            "neither {}",
            many.iter()
                .map(Shape::to_string)
                .collect::<Vec<_>>()
                .join(" nor ")
        ),
    }
}

/// Compile `expression` against each shape in order; the first success wins.
///
/// The text is preprocessed once. Each attempt gets its own compilation
/// context. When every shape fails, the error carries the original text and
/// the last diagnostic.
pub fn resolve(
    compiler: &dyn ExpressionCompiler,
    role: Role,
    expression: &str,
    source_type: &Type,
    key_type: Option<KeyType>,
    shapes: &[Shape],
) -> QueryResult<CompiledCallable> {
    require_text(role.param(), expression)?;
    if shapes.is_empty() {
        return Err(QueryError::Internal(format!(
            "no candidate shapes supplied for {role} expression"
        )));
    }

    let code = preprocess(expression);
    let mut last: Option<Diagnostic> = None;

    for shape in shapes {
        let mut context = compiler.create_context();
        match context.compile(&code, shape) {
            Ok(callable) => {
                tracing::debug!(%role, %shape, "resolved expression");
                return Ok(callable);
            }
            Err(diagnostic) => {
                tracing::debug!(%role, %shape, %diagnostic, "candidate shape rejected");
                last = Some(diagnostic);
            }
        }
    }

    let diagnostic = last.ok_or_else(|| QueryError::Internal("no diagnostic recorded".into()))?;
    tracing::debug!(%role, expression, "no candidate shape accepted the expression");
    Err(QueryError::Resolution {
        role: role.name(),
        expression: expression.to_string(),
        expected: expected(shapes),
        source_type: source_type.to_string(),
        key_type: key_type.map(|k| k.to_string()),
        diagnostic,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{CompilationContext, Engine};
    use crate::types::Value;
    use std::cell::RefCell;

    /// Records the shapes it was asked for and accepts only one arity.
    struct Recording {
        accept_arity: usize,
        contexts: RefCell<usize>,
        attempts: RefCell<Vec<(String, String)>>,
    }

    struct RecordingContext<'r>(&'r Recording);

    impl ExpressionCompiler for Recording {
        fn create_context(&self) -> Box<dyn CompilationContext + '_> {
            *self.contexts.borrow_mut() += 1;
            Box::new(RecordingContext(self))
        }
    }

    impl CompilationContext for RecordingContext<'_> {
        fn compile(&mut self, code: &str, shape: &Shape) -> Result<CompiledCallable, Diagnostic> {
            self.0
                .attempts
                .borrow_mut()
                .push((code.to_string(), shape.to_string()));
            if shape.params.len() == self.0.accept_arity {
                Ok(CompiledCallable::new(shape.clone(), |_| Ok(Value::Bool(true))))
            } else {
                Err(Diagnostic::type_error(0, format!("arity {}", shape.params.len())))
            }
        }

        fn execute(&mut self, _code: &str) -> Result<Option<Value>, Diagnostic> {
            Ok(None)
        }
    }

    fn recording(accept_arity: usize) -> Recording {
        Recording {
            accept_arity,
            contexts: RefCell::new(0),
            attempts: RefCell::new(Vec::new()),
        }
    }

    #[test]
    fn test_first_success_stops_the_trial() {
        let compiler = recording(1);
        let callable = resolve(
            &compiler,
            Role::Predicate,
            "x => true",
            &Type::Int,
            None,
            &predicate_shapes(&Type::Int),
        )
        .unwrap();
        assert_eq!(callable.arity(), 1);
        assert_eq!(compiler.attempts.borrow().len(), 1);
    }

    #[test]
    fn test_falls_back_to_later_shape_with_fresh_context() {
        let compiler = recording(2);
        let callable = resolve(
            &compiler,
            Role::Predicate,
            "(x, i) => true",
            &Type::Int,
            None,
            &predicate_shapes(&Type::Int),
        )
        .unwrap();
        assert_eq!(callable.arity(), 2);
        assert_eq!(*compiler.contexts.borrow(), 2);
    }

    #[test]
    fn test_text_is_preprocessed_before_compiling() {
        let compiler = recording(1);
        resolve(
            &compiler,
            Role::Predicate,
            "x => x == 'a'",
            &Type::Str,
            None,
            &predicate_shapes(&Type::Str),
        )
        .unwrap();
        assert_eq!(compiler.attempts.borrow()[0].0, "x => x == \"a\"");
    }

    #[test]
    fn test_failure_reports_last_diagnostic_and_original_text() {
        let compiler = recording(3);
        let err = resolve(
            &compiler,
            Role::Predicate,
            "x => 'q'",
            &Type::Int,
            None,
            &predicate_shapes(&Type::Int),
        )
        .unwrap_err();
        match &err {
            QueryError::Resolution {
                expression,
                diagnostic,
                key_type,
                ..
            } => {
                assert_eq!(expression, "x => 'q'");
                assert_eq!(diagnostic.message, "arity 2");
                assert!(key_type.is_none());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(
            err.to_string(),
            "Couldn't parse predicate expression ('x => 'q'') as neither \
             fn(int) -> bool nor fn(int, int) -> bool. Source: 'int'."
        );
    }

    #[test]
    fn test_empty_text_is_rejected_before_compiling() {
        let compiler = recording(1);
        let err = resolve(&compiler, Role::Selector, "  ", &Type::Int, None, &[]).unwrap_err();
        assert!(matches!(
            err,
            QueryError::InvalidArgument {
                param: "selector_expression",
                ..
            }
        ));
        assert_eq!(*compiler.contexts.borrow(), 0);
    }

    #[test]
    fn test_no_shapes_is_internal() {
        let err = resolve(&Engine::default(), Role::Selector, "x => x", &Type::Int, None, &[])
            .unwrap_err();
        assert!(err.is_internal());
    }

    #[test]
    fn test_key_type_in_message() {
        let err = resolve(
            &Engine::default(),
            Role::KeySelector,
            "x => x",
            &Type::Int,
            Some(KeyType::Char),
            &[Shape::unary(Type::Int, Type::Char)],
        )
        .unwrap_err();
        assert!(err.to_string().ends_with("Source: 'int'. Key: 'char'."));
    }
}
