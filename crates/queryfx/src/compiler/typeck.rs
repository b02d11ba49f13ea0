//! Static checking. Walks the tree, assigns a type to every expression and
//! rewrites it where an implicit conversion is needed.

use std::collections::{BTreeSet, HashMap};

use super::ast::{BinaryOp, Expr, ExprKind, Script, Stmt, TypeName, UnaryOp};
use super::builtins::{self, Import, LAMBDA_METHODS, SEQUENCE_METHODS};
use crate::error::Diagnostic;
use crate::types::{RecordType, Type, Value};

/// Whether a value of `from` may be used where `to` is expected.
pub fn convertible(from: &Type, to: &Type) -> bool {
    if from == to {
        return true;
    }
    match (from, to) {
        (Type::Void, _) | (_, Type::Void) => false,
        (_, Type::Any | Type::Object) | (Type::Any, _) => true,
        (Type::Null, to) => to.is_nullable(),
        (Type::Int, Type::Float) | (Type::Char, Type::Int | Type::Float) => true,
        (Type::List(a), Type::List(b)) => matches!(**b, Type::Any | Type::Object) && **a != Type::Void,
        _ => false,
    }
}

/// Whether a conversion from `from` to `to` changes the runtime value or
/// needs a runtime check.
fn needs_conversion(from: &Type, to: &Type) -> bool {
    match (from, to) {
        (_, Type::Any | Type::Object) => false,
        (Type::Any, _) => true,
        (Type::Int, Type::Float) | (Type::Char, Type::Int | Type::Float) => true,
        _ => false,
    }
}

/// The type both branches of a conditional (or all array items) share.
pub fn common_type(a: &Type, b: &Type) -> Option<Type> {
    if a == b {
        return Some(a.clone());
    }
    if convertible(a, b) && !matches!(b, Type::Any | Type::Object) {
        return Some(b.clone());
    }
    if convertible(b, a) && !matches!(a, Type::Any | Type::Object) {
        return Some(a.clone());
    }
    match (a, b) {
        (Type::Any, _) | (_, Type::Any) => Some(Type::Any),
        (Type::Object, t) | (t, Type::Object) if *t != Type::Void => Some(Type::Object),
        _ => None,
    }
}

/// Zero value of a declared type.
fn default_value(ty: &Type) -> Value {
    match ty {
        Type::Bool => Value::Bool(false),
        Type::Int => Value::Int(0),
        Type::Float => Value::Float(0.0),
        Type::Char => Value::Char('\0'),
        _ => Value::Null,
    }
}

pub struct Checker<'c> {
    imports: &'c BTreeSet<Import>,
    scopes: Vec<HashMap<String, Type>>,
    loop_depth: usize,
}

impl<'c> Checker<'c> {
    pub fn new(imports: &'c BTreeSet<Import>) -> Self {
        Self {
            imports,
            scopes: vec![HashMap::new()],
            loop_depth: 0,
        }
    }

    /// Check a lambda against parameter types; returns the body type.
    pub fn check_lambda(
        &mut self,
        params: &[String],
        body: &mut Expr,
        param_types: &[Type],
        pos: usize,
    ) -> Result<Type, Diagnostic> {
        self.scoped(|this| {
            for (name, ty) in params.iter().zip(param_types) {
                this.declare(name, ty.clone(), pos)?;
            }
            this.check(body)
        })
    }

    /// Check a script; returns the type of its trailing value, if any.
    pub fn check_script(&mut self, script: &mut Script) -> Result<Option<Type>, Diagnostic> {
        for stmt in &mut script.stmts {
            self.check_stmt(stmt)?;
        }
        match &mut script.result {
            Some(expr) => {
                let ty = self.check(expr)?;
                Ok((ty != Type::Void).then_some(ty))
            }
            None => Ok(None),
        }
    }

    /// Coerce `expr` (already checked as `from`) to `to`.
    pub fn coerce(&self, expr: &mut Expr, from: &Type, to: &Type) -> Result<(), Diagnostic> {
        if !convertible(from, to) {
            return Err(Diagnostic::type_error(
                expr.pos,
                format!("Cannot implicitly convert type '{from}' to '{to}'"),
            ));
        }
        if needs_conversion(from, to) {
            let pos = expr.pos;
            let inner = std::mem::replace(expr, Expr::new(ExprKind::Literal(Value::Null), pos));
            *expr = Expr::new(ExprKind::Convert(Box::new(inner), to.clone()), pos);
        }
        Ok(())
    }

    fn check_as(&mut self, expr: &mut Expr, to: &Type) -> Result<(), Diagnostic> {
        let from = self.check(expr)?;
        self.coerce(expr, &from, to)
    }

    fn lookup(&self, name: &str) -> Option<&Type> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    fn declare(&mut self, name: &str, ty: Type, pos: usize) -> Result<(), Diagnostic> {
        if self.lookup(name).is_some() {
            return Err(Diagnostic::type_error(
                pos,
                format!("A local variable named '{name}' is already defined in this scope"),
            ));
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), ty);
        }
        Ok(())
    }

    fn require(&self, import: Import, pos: usize, what: &str) -> Result<(), Diagnostic> {
        if self.imports.contains(&import) {
            Ok(())
        } else {
            Err(Diagnostic::type_error(
                pos,
                format!("{what} is not available without the '{}' import", import.name()),
            ))
        }
    }

    /// A bare identifier naming a static class rather than a local.
    fn static_target(&self, target: &Expr) -> Option<(String, Import)> {
        match &target.kind {
            ExprKind::Ident(name) if self.lookup(name).is_none() => {
                builtins::static_class(name).map(|import| (name.clone(), import))
            }
            _ => None,
        }
    }

    fn enumerable(&self, ty: &Type, pos: usize) -> Result<Type, Diagnostic> {
        ty.element().ok_or_else(|| {
            Diagnostic::type_error(pos, format!("Type '{ty}' is not enumerable"))
        })
    }

    pub fn check(&mut self, expr: &mut Expr) -> Result<Type, Diagnostic> {
        let pos = expr.pos;
        match &mut expr.kind {
            ExprKind::Literal(value) => Ok(match value {
                Value::Null => Type::Null,
                Value::Bool(_) => Type::Bool,
                Value::Int(_) => Type::Int,
                Value::Float(_) => Type::Float,
                Value::Char(_) => Type::Char,
                Value::Str(_) => Type::Str,
                Value::List(_) | Value::Record(_) => Type::Any,
            }),

            ExprKind::Ident(name) => match self.lookup(name) {
                Some(ty) => Ok(ty.clone()),
                None if builtins::static_class(name).is_some() => Err(Diagnostic::type_error(
                    pos,
                    format!("'{name}' is a type, which is not valid in the given context"),
                )),
                None => Err(Diagnostic::type_error(
                    pos,
                    format!("The name '{name}' does not exist in the current context"),
                )),
            },

            ExprKind::Member { target, name } => {
                if let Some((class, import)) = self.static_target(target) {
                    self.require(import, pos, &format!("'{class}'"))?;
                    return match builtins::static_property(&class, name) {
                        Some((ty, value)) => {
                            expr.kind = ExprKind::Literal(value);
                            Ok(ty)
                        }
                        None => Err(Diagnostic::type_error(
                            pos,
                            format!("'{class}' does not contain a definition for '{name}'"),
                        )),
                    };
                }
                let ty = self.check(target)?;
                member_type(&ty, name).ok_or_else(|| {
                    Diagnostic::type_error(
                        pos,
                        format!("'{ty}' does not contain a definition for '{name}'"),
                    )
                })
            }

            ExprKind::Call {
                target,
                method,
                args,
            } => {
                if let Some((class, import)) = self.static_target(target) {
                    self.require(import, pos, &format!("'{class}'"))?;
                    let mut arg_types = Vec::with_capacity(args.len());
                    for arg in args.iter_mut() {
                        arg_types.push(self.check(arg)?);
                    }
                    let sig = builtins::static_signature(&class, method, &arg_types)
                        .map_err(|msg| Diagnostic::type_error(pos, msg))?;
                    for ((arg, from), to) in args.iter_mut().zip(&arg_types).zip(&sig.params) {
                        self.coerce(arg, from, to)?;
                    }
                    return Ok(sig.ret);
                }

                let target_ty = self.check(target)?;
                let is_sequence = matches!(target_ty, Type::List(_) | Type::Any)
                    && SEQUENCE_METHODS.contains(&method.as_str());
                if is_sequence && !self.imports.contains(&Import::Sequences) {
                    return Err(Diagnostic::type_error(
                        pos,
                        format!(
                            "'{target_ty}' does not contain a definition for '{method}' \
                             (missing the 'sequences' import)"
                        ),
                    ));
                }

                if let [Expr {
                    kind: ExprKind::Lambda { params, body },
                    pos: arg_pos,
                }] = args.as_mut_slice()
                {
                    if !is_sequence || !LAMBDA_METHODS.contains(&method.as_str()) {
                        return Err(Diagnostic::type_error(
                            *arg_pos,
                            format!("'{target_ty}' has no method '{method}' that takes a lambda"),
                        ));
                    }
                    let arg_pos = *arg_pos;
                    let elem = self.enumerable(&target_ty, pos)?;
                    if params.len() != 1 {
                        return Err(Diagnostic::type_error(
                            arg_pos,
                            format!(
                                "Delegate for '{method}' does not take {} arguments",
                                params.len()
                            ),
                        ));
                    }
                    let body_ty = self.check_lambda(params, body, &[elem.clone()], arg_pos)?;
                    return builtins::lambda_method_result(method, &elem, &body_ty)
                        .map_err(|msg| Diagnostic::type_error(arg_pos, msg));
                }

                let mut arg_types = Vec::with_capacity(args.len());
                for arg in args.iter_mut() {
                    arg_types.push(self.check(arg)?);
                }
                let sig = builtins::instance_signature(&target_ty, method, &arg_types)
                    .map_err(|msg| Diagnostic::type_error(pos, msg))?;
                for ((arg, from), to) in args.iter_mut().zip(&arg_types).zip(&sig.params) {
                    self.coerce(arg, from, to)?;
                }
                Ok(sig.ret)
            }

            ExprKind::Index { target, index } => {
                let ty = self.check(target)?;
                self.check_as(index, &Type::Int)?;
                match ty {
                    Type::Str => Ok(Type::Char),
                    Type::List(elem) => Ok(*elem),
                    Type::Any => Ok(Type::Any),
                    other => Err(Diagnostic::type_error(
                        pos,
                        format!("Cannot apply indexing with [] to an expression of type '{other}'"),
                    )),
                }
            }

            ExprKind::Unary { op, operand } => {
                let ty = self.check(operand)?;
                match op {
                    UnaryOp::Not => {
                        self.coerce(operand, &ty, &Type::Bool)?;
                        Ok(Type::Bool)
                    }
                    UnaryOp::Neg => match ty {
                        Type::Int | Type::Char => Ok(Type::Int),
                        Type::Float => Ok(Type::Float),
                        Type::Any => Ok(Type::Any),
                        other => Err(Diagnostic::type_error(
                            pos,
                            format!("Operator '-' cannot be applied to operand of type '{other}'"),
                        )),
                    },
                }
            }

            ExprKind::Binary { op, lhs, rhs } => {
                let op = *op;
                let l = self.check(lhs)?;
                let r = self.check(rhs)?;
                if matches!(op, BinaryOp::And | BinaryOp::Or) {
                    self.coerce(lhs, &l, &Type::Bool)?;
                    self.coerce(rhs, &r, &Type::Bool)?;
                    return Ok(Type::Bool);
                }
                if op == BinaryOp::Coalesce {
                    if !l.is_nullable() {
                        return Err(Diagnostic::type_error(
                            pos,
                            format!("Operator '??' cannot be applied to operands of type '{l}' and '{r}'"),
                        ));
                    }
                    let ty = match l {
                        Type::Null => r.clone(),
                        _ => common_type(&l, &r).ok_or_else(|| {
                            Diagnostic::type_error(
                                pos,
                                format!("Operator '??' cannot be applied to operands of type '{l}' and '{r}'"),
                            )
                        })?,
                    };
                    self.coerce(lhs, &l, &ty)?;
                    self.coerce(rhs, &r, &ty)?;
                    return Ok(ty);
                }
                binary_type(op, &l, &r).ok_or_else(|| {
                    Diagnostic::type_error(
                        pos,
                        format!(
                            "Operator '{}' cannot be applied to operands of type '{l}' and '{r}'",
                            op.symbol()
                        ),
                    )
                })
            }

            ExprKind::Conditional {
                cond,
                then,
                otherwise,
            } => {
                self.check_as(cond, &Type::Bool)?;
                let a = self.check(then)?;
                let b = self.check(otherwise)?;
                let ty = common_type(&a, &b).ok_or_else(|| {
                    Diagnostic::type_error(
                        pos,
                        format!(
                            "Type of conditional expression cannot be determined because there is no implicit conversion between '{a}' and '{b}'"
                        ),
                    )
                })?;
                self.coerce(then, &a, &ty)?;
                self.coerce(otherwise, &b, &ty)?;
                Ok(ty)
            }

            ExprKind::Lambda { .. } => Err(Diagnostic::type_error(
                pos,
                "A lambda expression is only valid as the argument of a sequence method",
            )),

            ExprKind::NewRecord(fields) => {
                let mut layout = Vec::with_capacity(fields.len());
                for (name, value) in fields.iter_mut() {
                    let ty = self.check(value)?;
                    if matches!(ty, Type::Void | Type::Null) {
                        return Err(Diagnostic::type_error(
                            value.pos,
                            format!("Cannot assign '{ty}' to anonymous type property"),
                        ));
                    }
                    layout.push((name.clone(), ty));
                }
                Ok(Type::Record(RecordType {
                    name: None,
                    fields: layout,
                }))
            }

            ExprKind::NewArray(items) => {
                let mut types = Vec::with_capacity(items.len());
                for item in items.iter_mut() {
                    types.push(self.check(item)?);
                }
                let no_best = || {
                    Diagnostic::type_error(pos, "No best type found for implicitly-typed array")
                };
                let mut best = types.first().cloned().ok_or_else(no_best)?;
                for ty in &types[1..] {
                    best = common_type(&best, ty).ok_or_else(no_best)?;
                }
                if matches!(best, Type::Void | Type::Null) {
                    return Err(no_best());
                }
                for (item, ty) in items.iter_mut().zip(&types) {
                    self.coerce(item, ty, &best)?;
                }
                Ok(Type::list(best))
            }

            ExprKind::NewList {
                elem,
                source,
                items,
            } => {
                self.require(Import::Collections, pos, "'List<T>'")?;
                let elem = elem.clone();
                if let Some(source) = source {
                    let source_ty = self.check(source)?;
                    let source_elem = self.enumerable(&source_ty, source.pos)?;
                    if source_elem != elem && !convertible(&source_ty, &Type::list(elem.clone())) {
                        return Err(Diagnostic::type_error(
                            source.pos,
                            format!("Cannot convert from '{source_ty}' to 'IEnumerable<{elem}>'"),
                        ));
                    }
                }
                for item in items.iter_mut() {
                    self.check_as(item, &elem)?;
                }
                Ok(Type::list(elem))
            }

            ExprKind::Query {
                var,
                source,
                filters,
                select,
            } => {
                self.require(Import::Sequences, pos, "A query expression")?;
                let source_ty = self.check(source)?;
                let elem = self.enumerable(&source_ty, source.pos)?;
                self.scoped(|this| {
                    this.declare(var, elem, pos)?;
                    for filter in filters.iter_mut() {
                        this.check_as(filter, &Type::Bool)?;
                    }
                    let ty = this.check(select)?;
                    if matches!(ty, Type::Void | Type::Null) {
                        return Err(Diagnostic::type_error(
                            select.pos,
                            format!("Cannot select a value of type '{ty}'"),
                        ));
                    }
                    Ok(Type::list(ty))
                })
            }

            ExprKind::Assign { name, op, value } => {
                let var_ty = self.lookup(name).cloned().ok_or_else(|| {
                    Diagnostic::type_error(
                        pos,
                        format!("The name '{name}' does not exist in the current context"),
                    )
                })?;
                match op.take() {
                    None => self.check_as(value, &var_ty)?,
                    Some(op) => {
                        // Compound assignment is checked as `name = name op value`.
                        let rhs_ty = self.check(value)?;
                        let result = binary_type(op, &var_ty, &rhs_ty).ok_or_else(|| {
                            Diagnostic::type_error(
                                pos,
                                format!(
                                    "Operator '{}=' cannot be applied to operands of type '{var_ty}' and '{rhs_ty}'",
                                    op.symbol()
                                ),
                            )
                        })?;
                        let rhs = std::mem::replace(
                            value.as_mut(),
                            Expr::new(ExprKind::Literal(Value::Null), pos),
                        );
                        let mut combined = Expr::new(
                            ExprKind::Binary {
                                op,
                                lhs: Box::new(Expr::new(ExprKind::Ident(name.clone()), pos)),
                                rhs: Box::new(rhs),
                            },
                            pos,
                        );
                        self.coerce(&mut combined, &result, &var_ty)?;
                        **value = combined;
                    }
                }
                Ok(var_ty)
            }

            ExprKind::Step { name, .. } => {
                let ty = self.lookup(name).cloned().ok_or_else(|| {
                    Diagnostic::type_error(
                        pos,
                        format!("The name '{name}' does not exist in the current context"),
                    )
                })?;
                match ty {
                    Type::Int | Type::Float | Type::Char | Type::Any => Ok(ty),
                    other => Err(Diagnostic::type_error(
                        pos,
                        format!("Operator '++'/'--' cannot be applied to operand of type '{other}'"),
                    )),
                }
            }

            ExprKind::Convert(_, ty) => Ok(ty.clone()),
        }
    }

    fn check_stmt(&mut self, stmt: &mut Stmt) -> Result<(), Diagnostic> {
        match stmt {
            Stmt::Decl {
                ty,
                name,
                init,
                pos,
            } => {
                let declared = match ty {
                    TypeName::Var => {
                        let init = init.as_mut().ok_or_else(|| {
                            Diagnostic::type_error(*pos, "Implicitly-typed variables must be initialized")
                        })?;
                        let ty = self.check(init)?;
                        if matches!(ty, Type::Void | Type::Null) {
                            return Err(Diagnostic::type_error(
                                init.pos,
                                format!("Cannot assign '{ty}' to an implicitly-typed variable"),
                            ));
                        }
                        ty
                    }
                    TypeName::Named(declared) => {
                        if init.is_none() {
                            *init = Some(Expr::new(
                                ExprKind::Literal(default_value(declared)),
                                *pos,
                            ));
                        }
                        if let Some(init) = init {
                            self.check_as(init, declared)?;
                        }
                        declared.clone()
                    }
                };
                self.declare(name, declared, *pos)
            }

            Stmt::Expr(expr) => {
                let allowed = matches!(
                    expr.kind,
                    ExprKind::Call { .. }
                        | ExprKind::Assign { .. }
                        | ExprKind::Step { .. }
                        | ExprKind::NewRecord(_)
                        | ExprKind::NewList { .. }
                );
                if !allowed {
                    return Err(Diagnostic::type_error(
                        expr.pos,
                        "Only assignment, call, increment, decrement, and new object expressions can be used as a statement",
                    ));
                }
                self.check(expr).map(|_| ())
            }

            Stmt::Block(stmts) => self.scoped(|this| {
                for stmt in stmts.iter_mut() {
                    this.check_stmt(stmt)?;
                }
                Ok(())
            }),

            Stmt::If {
                cond,
                then,
                otherwise,
            } => {
                self.check_as(cond, &Type::Bool)?;
                self.scoped(|this| this.check_stmt(then))?;
                match otherwise {
                    Some(otherwise) => self.scoped(|this| this.check_stmt(otherwise)),
                    None => Ok(()),
                }
            }

            Stmt::While { cond, body } => {
                self.check_as(cond, &Type::Bool)?;
                self.in_loop(|this| this.check_stmt(body))
            }

            Stmt::For {
                init,
                cond,
                step,
                body,
            } => self.scoped(|this| {
                if let Some(init) = init {
                    this.check_stmt(init)?;
                }
                if let Some(cond) = cond {
                    this.check_as(cond, &Type::Bool)?;
                }
                for expr in step.iter_mut() {
                    this.check(expr)?;
                }
                this.in_loop(|this| this.check_stmt(body))
            }),

            Stmt::Foreach {
                ty,
                var,
                source,
                body,
            } => {
                let source_ty = self.check(source)?;
                let elem = self.enumerable(&source_ty, source.pos)?;
                let var_ty = match ty {
                    TypeName::Var => elem,
                    TypeName::Named(declared) => {
                        if !convertible(&elem, declared) {
                            return Err(Diagnostic::type_error(
                                source.pos,
                                format!("Cannot convert type '{elem}' to '{declared}'"),
                            ));
                        }
                        declared.clone()
                    }
                };
                let pos = source.pos;
                self.scoped(|this| {
                    this.declare(var, var_ty, pos)?;
                    this.in_loop(|this| this.check_stmt(body))
                })
            }

            Stmt::Break(pos) | Stmt::Continue(pos) => {
                if self.loop_depth == 0 {
                    Err(Diagnostic::type_error(
                        *pos,
                        "No enclosing loop out of which to break or continue",
                    ))
                } else {
                    Ok(())
                }
            }

            Stmt::Empty => Ok(()),
        }
    }

    fn scoped<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, Diagnostic>,
    ) -> Result<T, Diagnostic> {
        self.scopes.push(HashMap::new());
        let result = f(self);
        self.scopes.pop();
        result
    }

    fn in_loop<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, Diagnostic>,
    ) -> Result<T, Diagnostic> {
        self.loop_depth += 1;
        let result = self.scoped(f);
        self.loop_depth -= 1;
        result
    }
}

fn member_type(ty: &Type, name: &str) -> Option<Type> {
    match (ty, name) {
        (Type::Any, _) => Some(Type::Any),
        (Type::Str, "Length") => Some(Type::Int),
        (Type::List(_), "Count" | "Length") => Some(Type::Int),
        (Type::Record(record), _) => record.field(name).cloned(),
        _ => None,
    }
}

/// Result type of a binary operator other than `&&`, `||` and `??`.
fn binary_type(op: BinaryOp, l: &Type, r: &Type) -> Option<Type> {
    match op {
        BinaryOp::Add => {
            let is_str = |t: &Type| matches!(t, Type::Str);
            if (is_str(l) || is_str(r)) && *l != Type::Void && *r != Type::Void {
                Some(Type::Str)
            } else {
                builtins::numeric_result(l, r)
            }
        }
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            builtins::numeric_result(l, r)
        }
        BinaryOp::Eq | BinaryOp::Ne => comparable_for_equality(l, r).then_some(Type::Bool),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            builtins::numeric_result(l, r).map(|_| Type::Bool)
        }
        BinaryOp::And | BinaryOp::Or => (matches!(l, Type::Bool | Type::Any)
            && matches!(r, Type::Bool | Type::Any))
        .then_some(Type::Bool),
        BinaryOp::Coalesce => common_type(l, r),
    }
}

fn comparable_for_equality(l: &Type, r: &Type) -> bool {
    if l == r {
        return *l != Type::Void;
    }
    match (l, r) {
        (Type::Void, _) | (_, Type::Void) => false,
        (Type::Any, _) | (_, Type::Any) => true,
        (a, b) if a.is_numeric() && b.is_numeric() => true,
        (Type::Null, t) | (t, Type::Null) => t.is_nullable(),
        (Type::Object, t) | (t, Type::Object) => t.is_nullable(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::parser::{parse_expression, parse_script};

    fn all_imports() -> BTreeSet<Import> {
        Import::ALL.into_iter().collect()
    }

    fn check_lambda(code: &str, params: &[Type]) -> Result<Type, Diagnostic> {
        let imports = all_imports();
        let mut expr = parse_expression(code)?;
        let ExprKind::Lambda { params: names, body } = &mut expr.kind else {
            panic!("not a lambda: {code}");
        };
        Checker::new(&imports).check_lambda(names, body, params, 0)
    }

    #[test]
    fn test_convertible() {
        assert!(convertible(&Type::Int, &Type::Float));
        assert!(convertible(&Type::Char, &Type::Int));
        assert!(!convertible(&Type::Float, &Type::Int));
        assert!(convertible(&Type::Null, &Type::Str));
        assert!(!convertible(&Type::Null, &Type::Int));
        assert!(convertible(&Type::Str, &Type::Object));
        assert!(!convertible(&Type::Void, &Type::Object));
        assert!(convertible(&Type::list(Type::Str), &Type::list(Type::Object)));
    }

    #[test]
    fn test_common_type() {
        assert_eq!(common_type(&Type::Int, &Type::Float), Some(Type::Float));
        assert_eq!(common_type(&Type::Null, &Type::Str), Some(Type::Str));
        assert_eq!(common_type(&Type::Str, &Type::Int), None);
    }

    #[test]
    fn test_predicate_types() {
        assert_eq!(check_lambda("x => x % 2 == 0", &[Type::Int]), Ok(Type::Bool));
        assert_eq!(
            check_lambda("x => int.Parse(x) % 2 == 0", &[Type::Str]),
            Ok(Type::Bool)
        );
        assert_eq!(check_lambda("x => x == 'b'", &[Type::Char]), Ok(Type::Bool));
    }

    #[test]
    fn test_char_compared_to_string_is_rejected() {
        let err = check_lambda("x => x == \"2\"", &[Type::Char]).unwrap_err();
        assert!(err.message.contains("'=='"));
    }

    #[test]
    fn test_record_members() {
        let test_class = Type::record("TestClass", vec![("Prop", Type::Int)]);
        assert_eq!(check_lambda("x => x.Prop", &[test_class.clone()]), Ok(Type::Int));
        let err = check_lambda("x => x.Missing", &[test_class]).unwrap_err();
        assert!(err.message.contains("does not contain a definition for 'Missing'"));
    }

    #[test]
    fn test_anonymous_record_type() {
        let ty = check_lambda("x => new { Element = x, x.Length }", &[Type::Str]).unwrap();
        assert_eq!(ty.to_string(), "{ Element: string, Length: int }");
    }

    #[test]
    fn test_sequence_methods_need_import() {
        let imports: BTreeSet<Import> = [Import::Core].into_iter().collect();
        let mut expr = parse_expression("xs.Where(x => x > 1)").unwrap();
        let mut checker = Checker::new(&imports);
        checker
            .declare("xs", Type::list(Type::Int), 0)
            .unwrap();
        assert!(checker.check(&mut expr).is_err());
    }

    #[test]
    fn test_sequence_lambda_types() {
        assert_eq!(
            check_lambda("xs => xs.Where(x => x > 1).Select(x => x * 0.5)", &[Type::list(Type::Int)]),
            Ok(Type::list(Type::Float))
        );
        assert_eq!(
            check_lambda("xs => xs.Sum(x => x.Length)", &[Type::list(Type::Str)]),
            Ok(Type::Int)
        );
    }

    #[test]
    fn test_shadowing_is_rejected() {
        let err = check_lambda("x => new [] { 1 }.Any(x => x > 0)", &[Type::Int]).unwrap_err();
        assert!(err.message.contains("already defined"));
    }

    #[test]
    fn test_implicit_widening_inserts_conversion() {
        let imports = all_imports();
        let mut script = parse_script("double d = 1; d").unwrap();
        let ty = Checker::new(&imports).check_script(&mut script).unwrap();
        assert_eq!(ty, Some(Type::Float));
        let Stmt::Decl { init: Some(init), .. } = &script.stmts[0] else {
            panic!("expected declaration");
        };
        assert!(matches!(init.kind, ExprKind::Convert(_, Type::Float)));
    }

    #[test]
    fn test_narrowing_is_rejected() {
        let imports = all_imports();
        let mut script = parse_script("int i = 1.5;").unwrap();
        assert!(Checker::new(&imports).check_script(&mut script).is_err());
    }

    #[test]
    fn test_loop_script_has_no_value() {
        let imports = all_imports();
        let mut script = parse_script("for (var i = 0; i < 3; i++) { Console.WriteLine(i); }").unwrap();
        assert_eq!(Checker::new(&imports).check_script(&mut script), Ok(None));
    }

    #[test]
    fn test_break_outside_loop() {
        let imports = all_imports();
        let mut script = parse_script("break;").unwrap();
        assert!(Checker::new(&imports).check_script(&mut script).is_err());
    }

    #[test]
    fn test_bare_expression_statement_is_rejected() {
        let imports = all_imports();
        let mut script = parse_script("var x = 1; x; x").unwrap();
        assert!(Checker::new(&imports).check_script(&mut script).is_err());
    }
}
