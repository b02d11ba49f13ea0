//! Recursive descent parser for the expression language.
//!
//! Grammar (precedence low → high):
//! ```text
//! expr        := lambda | assignment
//! lambda      := params '=>' expr
//! params      := IDENT | '(' [IDENT (',' IDENT)*] ')'
//! assignment  := IDENT ('=' | '+=' | '-=' | '*=' | '/=') expr | conditional
//! conditional := coalesce ['?' expr ':' expr]
//! coalesce    := or ['??' coalesce]
//! or          := and ('||' and)*
//! and         := equality ('&&' equality)*
//! equality    := relational (('==' | '!=') relational)*
//! relational  := additive (('<' | '<=' | '>' | '>=') additive)*
//! additive    := term (('+' | '-') term)*
//! term        := unary (('*' | '/' | '%') unary)*
//! unary       := ('!' | '-' | '++' | '--') unary | postfix
//! postfix     := primary ('.' IDENT [args] | '[' expr ']' | '++' | '--')*
//! primary     := literal | IDENT | '(' expr ')' | new | query
//! new         := 'new' ( '{' members '}' | '[' ']' '{' exprs '}' | type ['(' [expr] ')'] ['{' exprs '}'] )
//! query       := 'from' IDENT 'in' expr ('where' expr)* 'select' expr
//! ```
//! Scripts are statement lists; a trailing expression without `;` is the
//! script's value.

use super::ast::*;
use super::lexer::{tokenize, Spanned, Token};
use crate::error::Diagnostic;
use crate::types::{Type, Value};

/// Parse a single expression spanning the whole input.
pub fn parse_expression(source: &str) -> Result<Expr, Diagnostic> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(&tokens);
    let expr = parser.parse_expr()?;
    parser.expect_eof()?;
    Ok(expr)
}

/// Parse a freestanding script.
pub fn parse_script(source: &str) -> Result<Script, Diagnostic> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(&tokens);
    let mut stmts = Vec::new();

    while !parser.at_eof() {
        if parser.starts_statement() {
            stmts.push(parser.parse_stmt()?);
            continue;
        }

        let expr = parser.parse_expr()?;
        if parser.eat_punct(";") {
            stmts.push(Stmt::Expr(expr));
        } else if parser.at_eof() {
            return Ok(Script {
                stmts,
                result: Some(expr),
            });
        } else {
            return Err(parser.unexpected("';'"));
        }
    }

    Ok(Script {
        stmts,
        result: None,
    })
}

const TYPE_KEYWORDS: &[&str] = &[
    "var", "int", "long", "double", "float", "string", "char", "bool", "object",
];

struct Parser<'t> {
    tokens: &'t [Spanned],
    pos: usize,
}

impl<'t> Parser<'t> {
    fn new(tokens: &'t [Spanned]) -> Self {
        Self { tokens, pos: 0 }
    }

    // ── Token helpers ──

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        self.tokens
            .get(self.pos + offset)
            .map(|t| &t.token)
            .unwrap_or(&Token::Eof)
    }

    fn here(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.pos)
            .unwrap_or(0)
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), Token::Eof)
    }

    fn is_punct(&self, p: &str) -> bool {
        matches!(self.peek(), Token::Punct(q) if *q == p)
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        self.is_keyword_at(0, keyword)
    }

    fn is_keyword_at(&self, offset: usize, keyword: &str) -> bool {
        matches!(self.peek_at(offset), Token::Ident(w) if w == keyword)
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        if self.is_punct(p) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.is_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, p: &str) -> Result<(), Diagnostic> {
        if self.eat_punct(p) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{p}'")))
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), Diagnostic> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{keyword}'")))
        }
    }

    fn expect_ident(&mut self) -> Result<String, Diagnostic> {
        match self.peek().clone() {
            Token::Ident(name) => {
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn expect_eof(&self) -> Result<(), Diagnostic> {
        if self.at_eof() {
            Ok(())
        } else {
            Err(self.unexpected("end of expression"))
        }
    }

    fn unexpected(&self, expected: &str) -> Diagnostic {
        let found = match self.peek() {
            Token::Ident(w) => format!("'{w}'"),
            Token::Int(i) => format!("'{i}'"),
            Token::Float(f) => format!("'{f}'"),
            Token::Str(s) => format!("\"{s}\""),
            Token::Char(c) => format!("'{c}'"),
            Token::Punct(p) => format!("'{p}'"),
            Token::Eof => "end of input".to_string(),
        };
        Diagnostic::syntax(self.here(), format!("{expected} expected, found {found}"))
    }

    // ── Expressions ──

    fn parse_expr(&mut self) -> Result<Expr, Diagnostic> {
        if let Some((params, consumed)) = self.lambda_params() {
            let pos = self.here();
            self.pos += consumed;
            let body = self.parse_expr()?;
            return Ok(Expr::new(
                ExprKind::Lambda {
                    params,
                    body: Box::new(body),
                },
                pos,
            ));
        }

        if let Token::Ident(name) = self.peek().clone() {
            let op = match self.peek_at(1) {
                Token::Punct("=") => Some(None),
                Token::Punct("+=") => Some(Some(BinaryOp::Add)),
                Token::Punct("-=") => Some(Some(BinaryOp::Sub)),
                Token::Punct("*=") => Some(Some(BinaryOp::Mul)),
                Token::Punct("/=") => Some(Some(BinaryOp::Div)),
                _ => None,
            };
            if let Some(op) = op {
                let pos = self.here();
                self.pos += 2;
                let value = self.parse_expr()?;
                return Ok(Expr::new(
                    ExprKind::Assign {
                        name,
                        op,
                        value: Box::new(value),
                    },
                    pos,
                ));
            }
        }

        self.parse_conditional()
    }

    /// Recognize `x =>`, `() =>` and `(x, i) =>` without consuming.
    fn lambda_params(&self) -> Option<(Vec<String>, usize)> {
        if let Token::Ident(name) = self.peek() {
            if matches!(self.peek_at(1), Token::Punct("=>")) {
                return Some((vec![name.clone()], 2));
            }
            return None;
        }

        if !self.is_punct("(") {
            return None;
        }
        let mut params = Vec::new();
        let mut offset = 1;
        loop {
            match self.peek_at(offset) {
                Token::Punct(")") if params.is_empty() => break,
                Token::Ident(name) => {
                    params.push(name.clone());
                    offset += 1;
                }
                _ => return None,
            }
            match self.peek_at(offset) {
                Token::Punct(",") => offset += 1,
                Token::Punct(")") => break,
                _ => return None,
            }
        }
        if matches!(self.peek_at(offset + 1), Token::Punct("=>")) {
            Some((params, offset + 2))
        } else {
            None
        }
    }

    fn parse_conditional(&mut self) -> Result<Expr, Diagnostic> {
        let cond = self.parse_coalesce()?;
        if !self.is_punct("?") {
            return Ok(cond);
        }
        let pos = self.here();
        self.pos += 1;
        let then = self.parse_expr()?;
        self.expect_punct(":")?;
        let otherwise = self.parse_expr()?;
        Ok(Expr::new(
            ExprKind::Conditional {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            },
            pos,
        ))
    }

    fn parse_coalesce(&mut self) -> Result<Expr, Diagnostic> {
        let lhs = self.parse_binary(0)?;
        if !self.is_punct("??") {
            return Ok(lhs);
        }
        let pos = self.here();
        self.pos += 1;
        let rhs = self.parse_coalesce()?;
        Ok(binary(BinaryOp::Coalesce, lhs, rhs, pos))
    }

    /// Left-associative binary levels, loosest first.
    fn parse_binary(&mut self, level: usize) -> Result<Expr, Diagnostic> {
        const LEVELS: &[&[(&str, BinaryOp)]] = &[
            &[("||", BinaryOp::Or)],
            &[("&&", BinaryOp::And)],
            &[("==", BinaryOp::Eq), ("!=", BinaryOp::Ne)],
            &[
                ("<", BinaryOp::Lt),
                ("<=", BinaryOp::Le),
                (">", BinaryOp::Gt),
                (">=", BinaryOp::Ge),
            ],
            &[("+", BinaryOp::Add), ("-", BinaryOp::Sub)],
            &[("*", BinaryOp::Mul), ("/", BinaryOp::Div), ("%", BinaryOp::Rem)],
        ];

        if level == LEVELS.len() {
            return self.parse_unary();
        }

        let mut lhs = self.parse_binary(level + 1)?;
        loop {
            let op = LEVELS[level]
                .iter()
                .find(|(symbol, _)| self.is_punct(symbol))
                .map(|(_, op)| *op);
            let Some(op) = op else {
                return Ok(lhs);
            };
            let pos = self.here();
            self.pos += 1;
            let rhs = self.parse_binary(level + 1)?;
            lhs = binary(op, lhs, rhs, pos);
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, Diagnostic> {
        let pos = self.here();
        if self.eat_punct("!") {
            let operand = self.parse_unary()?;
            return Ok(unary(UnaryOp::Not, operand, pos));
        }
        if self.eat_punct("-") {
            // Fold negative literals so that i64::MIN stays representable.
            let operand = self.parse_unary()?;
            return Ok(match operand.kind {
                ExprKind::Literal(Value::Int(i)) => Expr::new(ExprKind::Literal(Value::Int(-i)), pos),
                ExprKind::Literal(Value::Float(f)) => {
                    Expr::new(ExprKind::Literal(Value::Float(-f)), pos)
                }
                _ => unary(UnaryOp::Neg, operand, pos),
            });
        }
        for (symbol, delta) in [("++", 1), ("--", -1)] {
            if self.eat_punct(symbol) {
                let name = self.expect_ident()?;
                return Ok(Expr::new(
                    ExprKind::Step {
                        name,
                        delta,
                        postfix: false,
                    },
                    pos,
                ));
            }
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_primary()?;
        loop {
            let pos = self.here();
            if self.eat_punct(".") {
                let name = self.expect_ident()?;
                if self.is_punct("(") {
                    let args = self.parse_args()?;
                    expr = Expr::new(
                        ExprKind::Call {
                            target: Box::new(expr),
                            method: name,
                            args,
                        },
                        pos,
                    );
                } else {
                    expr = Expr::new(
                        ExprKind::Member {
                            target: Box::new(expr),
                            name,
                        },
                        pos,
                    );
                }
            } else if self.eat_punct("[") {
                let index = self.parse_expr()?;
                self.expect_punct("]")?;
                expr = Expr::new(
                    ExprKind::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                    },
                    pos,
                );
            } else if self.is_punct("++") || self.is_punct("--") {
                let ExprKind::Ident(name) = &expr.kind else {
                    return Err(Diagnostic::syntax(
                        pos,
                        "the operand of an increment or decrement operator must be a variable",
                    ));
                };
                let delta = if self.is_punct("++") { 1 } else { -1 };
                self.pos += 1;
                expr = Expr::new(
                    ExprKind::Step {
                        name: name.clone(),
                        delta,
                        postfix: true,
                    },
                    expr.pos,
                );
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, Diagnostic> {
        self.expect_punct("(")?;
        let mut args = Vec::new();
        if self.eat_punct(")") {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            if self.eat_punct(")") {
                return Ok(args);
            }
            self.expect_punct(",")?;
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, Diagnostic> {
        let pos = self.here();
        match self.peek().clone() {
            Token::Int(i) => {
                self.pos += 1;
                Ok(Expr::new(ExprKind::Literal(Value::Int(i)), pos))
            }
            Token::Float(f) => {
                self.pos += 1;
                Ok(Expr::new(ExprKind::Literal(Value::Float(f)), pos))
            }
            Token::Str(s) => {
                self.pos += 1;
                Ok(Expr::new(ExprKind::Literal(Value::Str(s)), pos))
            }
            Token::Char(c) => {
                self.pos += 1;
                Ok(Expr::new(ExprKind::Literal(Value::Char(c)), pos))
            }
            Token::Punct("(") => {
                self.pos += 1;
                let inner = self.parse_expr()?;
                self.expect_punct(")")?;
                Ok(inner)
            }
            Token::Ident(word) => match word.as_str() {
                "true" | "false" => {
                    self.pos += 1;
                    Ok(Expr::new(ExprKind::Literal(Value::Bool(word == "true")), pos))
                }
                "null" => {
                    self.pos += 1;
                    Ok(Expr::new(ExprKind::Literal(Value::Null), pos))
                }
                "new" => {
                    self.pos += 1;
                    self.parse_new(pos)
                }
                "from" if matches!(self.peek_at(1), Token::Ident(_))
                    && self.is_keyword_at(2, "in") =>
                {
                    self.pos += 1;
                    self.parse_query(pos)
                }
                _ => {
                    self.pos += 1;
                    Ok(Expr::new(ExprKind::Ident(word), pos))
                }
            },
            _ => Err(self.unexpected("expression")),
        }
    }

    fn parse_new(&mut self, pos: usize) -> Result<Expr, Diagnostic> {
        if self.eat_punct("{") {
            let mut fields: Vec<(String, Expr)> = Vec::new();
            while !self.eat_punct("}") {
                let member_pos = self.here();
                let field = if matches!(self.peek(), Token::Ident(_))
                    && matches!(self.peek_at(1), Token::Punct("="))
                {
                    let name = self.expect_ident()?;
                    self.pos += 1;
                    (name, self.parse_expr()?)
                } else {
                    let value = self.parse_expr()?;
                    let name = match &value.kind {
                        ExprKind::Ident(name) | ExprKind::Member { name, .. } => name.clone(),
                        _ => {
                            return Err(Diagnostic::syntax(
                                member_pos,
                                "invalid anonymous type member declarator",
                            ))
                        }
                    };
                    (name, value)
                };
                if fields.iter().any(|(n, _)| *n == field.0) {
                    return Err(Diagnostic::syntax(
                        member_pos,
                        format!("anonymous type cannot have multiple properties named '{}'", field.0),
                    ));
                }
                fields.push(field);
                if !self.is_punct("}") {
                    self.expect_punct(",")?;
                }
            }
            return Ok(Expr::new(ExprKind::NewRecord(fields), pos));
        }

        if self.eat_punct("[") {
            self.expect_punct("]")?;
            let items = self.parse_initializer()?;
            return Ok(Expr::new(ExprKind::NewArray(items), pos));
        }

        let ty = self.parse_type()?;
        let elem = match ty {
            TypeName::Named(Type::List(elem)) => *elem,
            _ => {
                return Err(Diagnostic::syntax(
                    pos,
                    "only anonymous records, arrays and lists can be constructed",
                ))
            }
        };
        let mut source = None;
        if self.is_punct("(") {
            let mut args = self.parse_args()?;
            if args.len() > 1 {
                return Err(Diagnostic::syntax(pos, "list constructor takes at most 1 argument"));
            }
            source = args.pop().map(Box::new);
        }
        let items = if self.is_punct("{") {
            self.parse_initializer()?
        } else {
            Vec::new()
        };
        Ok(Expr::new(ExprKind::NewList { elem, source, items }, pos))
    }

    fn parse_initializer(&mut self) -> Result<Vec<Expr>, Diagnostic> {
        self.expect_punct("{")?;
        let mut items = Vec::new();
        while !self.eat_punct("}") {
            items.push(self.parse_expr()?);
            if !self.is_punct("}") {
                self.expect_punct(",")?;
            }
        }
        Ok(items)
    }

    fn parse_query(&mut self, pos: usize) -> Result<Expr, Diagnostic> {
        let var = self.expect_ident()?;
        self.expect_keyword("in")?;
        let source = self.parse_conditional()?;
        let mut filters = Vec::new();
        while self.eat_keyword("where") {
            filters.push(self.parse_conditional()?);
        }
        self.expect_keyword("select")?;
        let select = self.parse_conditional()?;
        Ok(Expr::new(
            ExprKind::Query {
                var,
                source: Box::new(source),
                filters,
                select: Box::new(select),
            },
            pos,
        ))
    }

    /// `int`, `List<string>`, `double[]`, `var`.
    fn parse_type(&mut self) -> Result<TypeName, Diagnostic> {
        let pos = self.here();
        let word = self.expect_ident()?;
        let mut ty = match word.as_str() {
            "var" => return Ok(TypeName::Var),
            "int" | "long" => Type::Int,
            "double" | "float" => Type::Float,
            "string" => Type::Str,
            "char" => Type::Char,
            "bool" => Type::Bool,
            "object" => Type::Object,
            "List" | "IEnumerable" => {
                self.expect_punct("<")?;
                let elem = match self.parse_type()? {
                    TypeName::Named(t) => t,
                    TypeName::Var => {
                        return Err(Diagnostic::syntax(pos, "'var' is not a valid type argument"))
                    }
                };
                self.expect_punct(">")?;
                Type::list(elem)
            }
            other => return Err(Diagnostic::syntax(pos, format!("unknown type '{other}'"))),
        };
        while self.is_punct("[") && matches!(self.peek_at(1), Token::Punct("]")) {
            self.pos += 2;
            ty = Type::list(ty);
        }
        Ok(TypeName::Named(ty))
    }

    // ── Statements ──

    fn starts_statement(&self) -> bool {
        match self.peek() {
            Token::Punct("{") | Token::Punct(";") => true,
            Token::Ident(word) => match word.as_str() {
                "if" | "while" | "for" | "foreach" | "break" | "continue" => true,
                _ => self.starts_declaration(),
            },
            _ => false,
        }
    }

    fn starts_declaration(&self) -> bool {
        match self.peek() {
            Token::Ident(word) if TYPE_KEYWORDS.contains(&word.as_str()) => {
                // `int x`, `int[] xs`
                matches!(self.peek_at(1), Token::Ident(_))
                    || (matches!(self.peek_at(1), Token::Punct("["))
                        && matches!(self.peek_at(2), Token::Punct("]")))
            }
            Token::Ident(word) if word == "List" || word == "IEnumerable" => {
                matches!(self.peek_at(1), Token::Punct("<"))
            }
            _ => false,
        }
    }

    fn parse_stmt(&mut self) -> Result<Stmt, Diagnostic> {
        let pos = self.here();

        if self.eat_punct(";") {
            return Ok(Stmt::Empty);
        }
        if self.eat_punct("{") {
            let mut stmts = Vec::new();
            while !self.eat_punct("}") {
                if self.at_eof() {
                    return Err(self.unexpected("'}'"));
                }
                stmts.push(self.parse_stmt()?);
            }
            return Ok(Stmt::Block(stmts));
        }
        if self.eat_keyword("if") {
            self.expect_punct("(")?;
            let cond = self.parse_expr()?;
            self.expect_punct(")")?;
            let then = Box::new(self.parse_stmt()?);
            let otherwise = if self.eat_keyword("else") {
                Some(Box::new(self.parse_stmt()?))
            } else {
                None
            };
            return Ok(Stmt::If {
                cond,
                then,
                otherwise,
            });
        }
        if self.eat_keyword("while") {
            self.expect_punct("(")?;
            let cond = self.parse_expr()?;
            self.expect_punct(")")?;
            let body = Box::new(self.parse_stmt()?);
            return Ok(Stmt::While { cond, body });
        }
        if self.eat_keyword("for") {
            return self.parse_for();
        }
        if self.eat_keyword("foreach") {
            self.expect_punct("(")?;
            let ty = self.parse_type()?;
            let var = self.expect_ident()?;
            self.expect_keyword("in")?;
            let source = self.parse_expr()?;
            self.expect_punct(")")?;
            let body = Box::new(self.parse_stmt()?);
            return Ok(Stmt::Foreach {
                ty,
                var,
                source,
                body,
            });
        }
        if self.eat_keyword("break") {
            self.expect_punct(";")?;
            return Ok(Stmt::Break(pos));
        }
        if self.eat_keyword("continue") {
            self.expect_punct(";")?;
            return Ok(Stmt::Continue(pos));
        }
        if self.starts_declaration() {
            let decl = self.parse_declaration()?;
            self.expect_punct(";")?;
            return Ok(decl);
        }

        let expr = self.parse_expr()?;
        self.expect_punct(";")?;
        Ok(Stmt::Expr(expr))
    }

    fn parse_declaration(&mut self) -> Result<Stmt, Diagnostic> {
        let pos = self.here();
        let ty = self.parse_type()?;
        let name = self.expect_ident()?;
        let init = if self.eat_punct("=") {
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(Stmt::Decl {
            ty,
            name,
            init,
            pos,
        })
    }

    fn parse_for(&mut self) -> Result<Stmt, Diagnostic> {
        self.expect_punct("(")?;

        let init = if self.is_punct(";") {
            None
        } else if self.starts_declaration() {
            Some(Box::new(self.parse_declaration()?))
        } else {
            Some(Box::new(Stmt::Expr(self.parse_expr()?)))
        };
        self.expect_punct(";")?;

        let cond = if self.is_punct(";") {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect_punct(";")?;

        let mut step = Vec::new();
        while !self.eat_punct(")") {
            step.push(self.parse_expr()?);
            if !self.is_punct(")") {
                self.expect_punct(",")?;
            }
        }

        let body = Box::new(self.parse_stmt()?);
        Ok(Stmt::For {
            init,
            cond,
            step,
            body,
        })
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr, pos: usize) -> Expr {
    Expr::new(
        ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        pos,
    )
}

fn unary(op: UnaryOp, operand: Expr, pos: usize) -> Expr {
    Expr::new(
        ExprKind::Unary {
            op,
            operand: Box::new(operand),
        },
        pos,
    )
}
