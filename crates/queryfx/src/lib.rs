//! QueryFx: sequence query operators driven by textual expressions.

pub mod compiler;
pub mod dispatch;
pub mod error;
pub mod lazy;
pub mod ops;
pub mod preprocess;
pub mod resolver;
pub mod run;
pub mod types;

pub use compiler::{
    CompilationContext, CompiledCallable, Console, Engine, EngineConfig, ExpressionCompiler,
    Import, Shape,
};
pub use dispatch::{
    Direction, KeyType, KeyTypeSelector, OrderByFn, OrderByRegistry, OrderProvider, SortKey,
};
pub use error::{Diagnostic, DiagnosticKind, QueryError, QueryResult};
pub use lazy::{FilterView, OrderView, ProjectView};
pub use ops::{FxExt, Operators};
pub use preprocess::preprocess;
pub use resolver::{resolve, Role};
pub use run::{run, run_with};
pub use types::*;
