//! Syntax tree for expressions and scripts.

use crate::types::{Type, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Coalesce,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Coalesce => "??",
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

/// A type written in source (`int`, `List<string>`, `var`).
#[derive(Debug, Clone, PartialEq)]
pub enum TypeName {
    Var,
    Named(Type),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub pos: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Value),
    Ident(String),
    Member {
        target: Box<Expr>,
        name: String,
    },
    /// `target.method(args)`; static classes appear as an `Ident` target.
    Call {
        target: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Conditional {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Lambda {
        params: Vec<String>,
        body: Box<Expr>,
    },
    NewRecord(Vec<(String, Expr)>),
    NewArray(Vec<Expr>),
    NewList {
        elem: Type,
        source: Option<Box<Expr>>,
        items: Vec<Expr>,
    },
    /// `from var in source where … select …`
    Query {
        var: String,
        source: Box<Expr>,
        filters: Vec<Expr>,
        select: Box<Expr>,
    },
    Assign {
        name: String,
        op: Option<BinaryOp>,
        value: Box<Expr>,
    },
    /// `x++` / `--x`; yields the old value when postfix.
    Step {
        name: String,
        delta: i64,
        postfix: bool,
    },
    /// Implicit conversion inserted by the type checker.
    Convert(Box<Expr>, Type),
}

impl Expr {
    pub fn new(kind: ExprKind, pos: usize) -> Self {
        Self { kind, pos }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Decl {
        ty: TypeName,
        name: String,
        init: Option<Expr>,
        pos: usize,
    },
    Expr(Expr),
    Block(Vec<Stmt>),
    If {
        cond: Expr,
        then: Box<Stmt>,
        otherwise: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        step: Vec<Expr>,
        body: Box<Stmt>,
    },
    Foreach {
        ty: TypeName,
        var: String,
        source: Expr,
        body: Box<Stmt>,
    },
    Break(usize),
    Continue(usize),
    Empty,
}

/// A freestanding unit: statements plus an optional trailing value.
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    pub stmts: Vec<Stmt>,
    pub result: Option<Expr>,
}
