//! Expression compilation.
//!
//! [`ExpressionCompiler`] and [`CompilationContext`] are the seam the query
//! operators compile through. [`Engine`] is the built-in implementation: a
//! small C#-flavoured language, tokenized, parsed, type-checked (with
//! implicit conversions made explicit) and evaluated by walking the tree.

mod ast;
mod builtins;
mod eval;
mod lexer;
mod parser;
mod typeck;

use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use serde::Deserialize;

use crate::error::Diagnostic;
use crate::types::{Type, Value};

pub use builtins::{Console, Import};

use ast::ExprKind;
use eval::Interpreter;
use typeck::Checker;

/// An expected callable signature.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub params: Vec<Type>,
    pub ret: Type,
}

impl Shape {
    pub fn new(params: Vec<Type>, ret: Type) -> Self {
        Self { params, ret }
    }

    /// `fn(param) -> ret`
    pub fn unary(param: Type, ret: Type) -> Self {
        Self::new(vec![param], ret)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn(")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{param}")?;
        }
        write!(f, ") -> {}", self.ret)
    }
}

type CallableFn = dyn Fn(&[Value]) -> Result<Value, Diagnostic>;

/// A callable bound to the shape it was compiled against.
#[derive(Clone)]
pub struct CompiledCallable {
    shape: Shape,
    func: Rc<CallableFn>,
}

impl CompiledCallable {
    pub fn new(
        shape: Shape,
        func: impl Fn(&[Value]) -> Result<Value, Diagnostic> + 'static,
    ) -> Self {
        Self {
            shape,
            func: Rc::new(func),
        }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn arity(&self) -> usize {
        self.shape.params.len()
    }

    /// Call with exactly as many arguments as the shape has parameters.
    pub fn invoke(&self, args: &[Value]) -> Result<Value, Diagnostic> {
        if args.len() != self.arity() {
            return Err(Diagnostic::runtime(
                0,
                format!(
                    "callable of shape '{}' invoked with {} arguments",
                    self.shape,
                    args.len()
                ),
            ));
        }
        (self.func)(args)
    }
}

impl fmt::Debug for CompiledCallable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledCallable")
            .field("shape", &self.shape.to_string())
            .finish()
    }
}

/// Produces isolated compilation contexts.
pub trait ExpressionCompiler {
    fn create_context(&self) -> Box<dyn CompilationContext + '_>;
}

/// One isolated unit of compilation; discarded after use.
pub trait CompilationContext {
    /// Compile `code` into a callable of exactly `shape`.
    fn compile(&mut self, code: &str, shape: &Shape) -> Result<CompiledCallable, Diagnostic>;

    /// Compile and run `code` as a freestanding script.
    fn execute(&mut self, code: &str) -> Result<Option<Value>, Diagnostic>;
}

/// What expressions compiled by an [`Engine`] may reference.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub imports: BTreeSet<Import>,
    #[serde(skip)]
    pub console: Console,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            imports: Import::ALL.into_iter().collect(),
            console: Console::Stdout,
        }
    }
}

impl EngineConfig {
    pub fn with_imports(mut self, imports: impl IntoIterator<Item = Import>) -> Self {
        self.imports = imports.into_iter().collect();
        self
    }

    pub fn with_console(mut self, console: Console) -> Self {
        self.console = console;
        self
    }
}

/// The built-in expression compiler.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl ExpressionCompiler for Engine {
    fn create_context(&self) -> Box<dyn CompilationContext + '_> {
        Box::new(EngineContext {
            imports: self.config.imports.clone(),
            console: self.config.console.clone(),
        })
    }
}

struct EngineContext {
    imports: BTreeSet<Import>,
    console: Console,
}

impl CompilationContext for EngineContext {
    fn compile(&mut self, code: &str, shape: &Shape) -> Result<CompiledCallable, Diagnostic> {
        let expr = parser::parse_expression(code)?;
        let pos = expr.pos;
        let ExprKind::Lambda { params, mut body } = expr.kind else {
            return Err(Diagnostic::type_error(
                pos,
                format!("Cannot convert expression to '{shape}' because it is not a lambda expression"),
            ));
        };
        if params.len() != shape.params.len() {
            return Err(Diagnostic::type_error(
                pos,
                format!("Delegate '{shape}' does not take {} arguments", params.len()),
            ));
        }

        let mut checker = Checker::new(&self.imports);
        let body_ty = checker.check_lambda(&params, &mut body, &shape.params, pos)?;
        checker.coerce(&mut body, &body_ty, &shape.ret)?;

        let console = self.console.clone();
        Ok(CompiledCallable::new(shape.clone(), move |args| {
            let mut interpreter = Interpreter::new(&console);
            for (name, value) in params.iter().zip(args) {
                interpreter.bind(name, value.clone());
            }
            interpreter.eval(&body)
        }))
    }

    fn execute(&mut self, code: &str) -> Result<Option<Value>, Diagnostic> {
        let mut script = parser::parse_script(code)?;
        let result_type = Checker::new(&self.imports).check_script(&mut script)?;
        let value = Interpreter::new(&self.console).run(&script)?;
        Ok(value.filter(|_| result_type.is_some()))
    }
}
