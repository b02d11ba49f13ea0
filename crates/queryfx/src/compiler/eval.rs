//! Tree-walking evaluation of checked expressions and scripts.

use std::collections::HashMap;

use super::ast::{BinaryOp, Expr, ExprKind, Script, Stmt, TypeName, UnaryOp};
use super::builtins::{self, Console};
use crate::error::Diagnostic;
use crate::types::{Record, Type, Value};

enum Flow {
    Normal,
    Break,
    Continue,
}

pub(crate) struct Interpreter<'r> {
    scopes: Vec<HashMap<String, Value>>,
    console: &'r Console,
}

impl<'r> Interpreter<'r> {
    pub fn new(console: &'r Console) -> Self {
        Self {
            scopes: vec![HashMap::new()],
            console,
        }
    }

    /// Bind a name in the innermost scope.
    pub fn bind(&mut self, name: &str, value: Value) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), value);
        }
    }

    /// Run a script; yields the trailing value when there is one.
    pub fn run(&mut self, script: &Script) -> Result<Option<Value>, Diagnostic> {
        for stmt in &script.stmts {
            // Checked scripts cannot break out of the top level.
            self.exec(stmt)?;
        }
        script.result.as_ref().map(|expr| self.eval(expr)).transpose()
    }

    fn lookup(&self, name: &str) -> Option<&Value> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    fn assign(&mut self, name: &str, value: Value, pos: usize) -> Result<(), Diagnostic> {
        match self
            .scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.get_mut(name))
        {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(Diagnostic::runtime(pos, format!("unbound variable '{name}'"))),
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

    fn apply(&mut self, param: &str, body: &Expr, arg: Value) -> Result<Value, Diagnostic> {
        self.scoped(|this| {
            this.bind(param, arg);
            this.eval(body)
        })
    }

    fn truthy(&self, value: Value, pos: usize) -> Result<bool, Diagnostic> {
        value.as_bool().ok_or_else(|| {
            Diagnostic::runtime(
                pos,
                format!("Cannot convert a value of type '{}' to 'bool'", value.type_name()),
            )
        })
    }

    pub fn eval(&mut self, expr: &Expr) -> Result<Value, Diagnostic> {
        let pos = expr.pos;
        let runtime = |msg: String| Diagnostic::runtime(pos, msg);
        match &expr.kind {
            ExprKind::Literal(value) => Ok(value.clone()),

            ExprKind::Ident(name) => self
                .lookup(name)
                .cloned()
                .ok_or_else(|| runtime(format!("unbound variable '{name}'"))),

            ExprKind::Member { target, name } => {
                let value = self.eval(target)?;
                builtins::member(&value, name).map_err(runtime)
            }

            ExprKind::Call {
                target,
                method,
                args,
            } => {
                if let ExprKind::Ident(class) = &target.kind {
                    if self.lookup(class).is_none() && builtins::static_class(class).is_some() {
                        let values = self.eval_all(args)?;
                        return builtins::call_static(class, method, values, self.console)
                            .map_err(runtime);
                    }
                }
                let target = self.eval(target)?;
                if let [Expr {
                    kind: ExprKind::Lambda { params, body },
                    ..
                }] = args.as_slice()
                {
                    let param = params.first().map(String::as_str).unwrap_or("_");
                    let items = enumerate(target).map_err(runtime)?;
                    return self.sequence_lambda(method, items, param, body, pos);
                }
                let values = self.eval_all(args)?;
                builtins::call_instance(target, method, values).map_err(runtime)
            }

            ExprKind::Index { target, index } => {
                let target = self.eval(target)?;
                let index = self.eval(index)?;
                builtins::index(&target, &index).map_err(runtime)
            }

            ExprKind::Unary { op, operand } => {
                let value = self.eval(operand)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!self.truthy(value, pos)?)),
                    UnaryOp::Neg => match value {
                        Value::Int(i) => Ok(Value::Int(i.wrapping_neg())),
                        Value::Char(c) => Ok(Value::Int(-(c as i64))),
                        Value::Float(f) => Ok(Value::Float(-f)),
                        other => Err(runtime(format!(
                            "Operator '-' cannot be applied to operand of type '{}'",
                            other.type_name()
                        ))),
                    },
                }
            }

            ExprKind::Binary { op, lhs, rhs } => match op {
                BinaryOp::And => {
                    let l = self.eval(lhs)?;
                    if !self.truthy(l, lhs.pos)? {
                        return Ok(Value::Bool(false));
                    }
                    let r = self.eval(rhs)?;
                    Ok(Value::Bool(self.truthy(r, rhs.pos)?))
                }
                BinaryOp::Or => {
                    let l = self.eval(lhs)?;
                    if self.truthy(l, lhs.pos)? {
                        return Ok(Value::Bool(true));
                    }
                    let r = self.eval(rhs)?;
                    Ok(Value::Bool(self.truthy(r, rhs.pos)?))
                }
                BinaryOp::Coalesce => match self.eval(lhs)? {
                    Value::Null => self.eval(rhs),
                    value => Ok(value),
                },
                op => {
                    let l = self.eval(lhs)?;
                    let r = self.eval(rhs)?;
                    binary(*op, l, r).map_err(runtime)
                }
            },

            ExprKind::Conditional {
                cond,
                then,
                otherwise,
            } => {
                let c = self.eval(cond)?;
                if self.truthy(c, cond.pos)? {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }

            ExprKind::Lambda { .. } => Err(runtime(
                "a lambda expression cannot be evaluated on its own".to_string(),
            )),

            ExprKind::NewRecord(fields) => {
                let mut values = Vec::with_capacity(fields.len());
                for (name, value) in fields {
                    values.push((name.clone(), self.eval(value)?));
                }
                Ok(Value::Record(Record::new(values)))
            }

            ExprKind::NewArray(items) => Ok(Value::List(self.eval_all(items)?)),

            ExprKind::NewList { source, items, .. } => {
                let mut values = match source {
                    Some(source) => {
                        let source = self.eval(source)?;
                        enumerate(source).map_err(runtime)?
                    }
                    None => Vec::new(),
                };
                values.extend(self.eval_all(items)?);
                Ok(Value::List(values))
            }

            ExprKind::Query {
                var,
                source,
                filters,
                select,
            } => {
                let source = self.eval(source)?;
                let items = enumerate(source).map_err(runtime)?;
                let mut out = Vec::new();
                for item in items {
                    let selected = self.scoped(|this| {
                        this.bind(var, item);
                        for filter in filters {
                            let keep = this.eval(filter)?;
                            if !this.truthy(keep, filter.pos)? {
                                return Ok(None);
                            }
                        }
                        this.eval(select).map(Some)
                    })?;
                    out.extend(selected);
                }
                Ok(Value::List(out))
            }

            ExprKind::Assign { name, value, .. } => {
                let value = self.eval(value)?;
                self.assign(name, value.clone(), pos)?;
                Ok(value)
            }

            ExprKind::Step {
                name,
                delta,
                postfix,
            } => {
                let old = self
                    .lookup(name)
                    .cloned()
                    .ok_or_else(|| runtime(format!("unbound variable '{name}'")))?;
                let new = step(&old, *delta).map_err(runtime)?;
                self.assign(name, new.clone(), pos)?;
                Ok(if *postfix { old } else { new })
            }

            ExprKind::Convert(inner, ty) => {
                let value = self.eval(inner)?;
                convert(value, ty).map_err(runtime)
            }
        }
    }

    fn eval_all(&mut self, exprs: &[Expr]) -> Result<Vec<Value>, Diagnostic> {
        exprs.iter().map(|e| self.eval(e)).collect()
    }

    fn sequence_lambda(
        &mut self,
        method: &str,
        items: Vec<Value>,
        param: &str,
        body: &Expr,
        pos: usize,
    ) -> Result<Value, Diagnostic> {
        let runtime = |msg: String| Diagnostic::runtime(pos, msg);

        match method {
            "Select" | "Sum" | "Average" | "Min" | "Max" => {
                let mut mapped = Vec::with_capacity(items.len());
                for item in items {
                    mapped.push(self.apply(param, body, item)?);
                }
                match method {
                    "Select" => Ok(Value::List(mapped)),
                    "Sum" => builtins::sum(&mapped).map_err(runtime),
                    "Average" => builtins::average(&mapped).map_err(runtime),
                    "Min" => builtins::extreme(mapped, std::cmp::Ordering::Less).map_err(runtime),
                    _ => builtins::extreme(mapped, std::cmp::Ordering::Greater).map_err(runtime),
                }
            }
            "OrderBy" | "OrderByDescending" => {
                let mut keyed = Vec::with_capacity(items.len());
                for item in items {
                    let key = self.apply(param, body, item.clone())?;
                    keyed.push((key, item));
                }
                if method == "OrderBy" {
                    keyed.sort_by(|(a, _), (b, _)| a.compare(b));
                } else {
                    keyed.sort_by(|(a, _), (b, _)| b.compare(a));
                }
                Ok(Value::List(keyed.into_iter().map(|(_, item)| item).collect()))
            }
            "All" => {
                for item in items {
                    let matched = self.apply(param, body, item)?;
                    if !self.truthy(matched, body.pos)? {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }
            "Any" => {
                for item in items {
                    let matched = self.apply(param, body, item)?;
                    if self.truthy(matched, body.pos)? {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }
            _ => {
                let mut matching = Vec::new();
                for item in items {
                    let matched = self.apply(param, body, item.clone())?;
                    if self.truthy(matched, body.pos)? {
                        matching.push(item);
                    }
                }
                match method {
                    "Where" => Ok(Value::List(matching)),
                    "Count" => Ok(Value::Int(matching.len() as i64)),
                    "First" | "Last" | "Single" if matching.is_empty() => {
                        Err(runtime("Sequence contains no matching element".into()))
                    }
                    "Single" | "SingleOrDefault" if matching.len() > 1 => Err(runtime(
                        "Sequence contains more than one matching element".into(),
                    )),
                    "Last" | "LastOrDefault" => Ok(matching.pop().unwrap_or(Value::Null)),
                    "First" | "FirstOrDefault" | "Single" | "SingleOrDefault" => {
                        Ok(matching.into_iter().next().unwrap_or(Value::Null))
                    }
                    other => Err(runtime(format!(
                        "'{other}' does not take a lambda argument"
                    ))),
                }
            }
        }
    }

    fn exec(&mut self, stmt: &Stmt) -> Result<Flow, Diagnostic> {
        match stmt {
            Stmt::Decl { name, init, .. } => {
                let value = match init {
                    Some(init) => self.eval(init)?,
                    None => Value::Null,
                };
                self.bind(name, value);
                Ok(Flow::Normal)
            }
            Stmt::Expr(expr) => {
                self.eval(expr)?;
                Ok(Flow::Normal)
            }
            Stmt::Block(stmts) => self.scoped(|this| {
                for stmt in stmts {
                    match this.exec(stmt)? {
                        Flow::Normal => {}
                        flow => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }),
            Stmt::If {
                cond,
                then,
                otherwise,
            } => {
                let c = self.eval(cond)?;
                if self.truthy(c, cond.pos)? {
                    self.scoped(|this| this.exec(then))
                } else if let Some(otherwise) = otherwise {
                    self.scoped(|this| this.exec(otherwise))
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::While { cond, body } => {
                loop {
                    let c = self.eval(cond)?;
                    if !self.truthy(c, cond.pos)? {
                        break;
                    }
                    if let Flow::Break = self.scoped(|this| this.exec(body))? {
                        break;
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::For {
                init,
                cond,
                step,
                body,
            } => self.scoped(|this| {
                if let Some(init) = init {
                    this.exec(init)?;
                }
                loop {
                    if let Some(cond) = cond {
                        let c = this.eval(cond)?;
                        if !this.truthy(c, cond.pos)? {
                            break;
                        }
                    }
                    if let Flow::Break = this.scoped(|this| this.exec(body))? {
                        break;
                    }
                    for expr in step {
                        this.eval(expr)?;
                    }
                }
                Ok(Flow::Normal)
            }),
            Stmt::Foreach {
                ty,
                var,
                source,
                body,
            } => {
                let source_value = self.eval(source)?;
                let items = enumerate(source_value)
                    .map_err(|msg| Diagnostic::runtime(source.pos, msg))?;
                for item in items {
                    let item = match ty {
                        TypeName::Named(ty) => {
                            convert(item, ty).map_err(|msg| Diagnostic::runtime(source.pos, msg))?
                        }
                        TypeName::Var => item,
                    };
                    let flow = self.scoped(|this| {
                        this.bind(var, item);
                        this.scoped(|this| this.exec(body))
                    })?;
                    if let Flow::Break = flow {
                        break;
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Break(_) => Ok(Flow::Break),
            Stmt::Continue(_) => Ok(Flow::Continue),
            Stmt::Empty => Ok(Flow::Normal),
        }
    }
}

/// Elements of an enumerable runtime value.
fn enumerate(value: Value) -> Result<Vec<Value>, String> {
    match value {
        Value::List(items) => Ok(items),
        Value::Str(s) => Ok(s.chars().map(Value::Char).collect()),
        Value::Null => Err("Value cannot be null (source)".to_string()),
        other => Err(format!("Type '{}' is not enumerable", other.type_name())),
    }
}

fn binary(op: BinaryOp, l: Value, r: Value) -> Result<Value, String> {
    let mismatch = |l: &Value, r: &Value| {
        format!(
            "Operator '{}' cannot be applied to operands of type '{}' and '{}'",
            op.symbol(),
            l.type_name(),
            r.type_name()
        )
    };

    match op {
        BinaryOp::Eq => return Ok(Value::Bool(l.loose_eq(&r))),
        BinaryOp::Ne => return Ok(Value::Bool(!l.loose_eq(&r))),
        BinaryOp::Add if matches!(l, Value::Str(_)) || matches!(r, Value::Str(_)) => {
            return Ok(Value::Str(format!("{l}{r}")));
        }
        _ => {}
    }

    if op.is_comparison() {
        if l.is_null() || r.is_null() {
            return Ok(Value::Bool(false));
        }
        if l.as_f64().is_none() || r.as_f64().is_none() {
            return Err(mismatch(&l, &r));
        }
        let ord = l.compare(&r);
        return Ok(Value::Bool(match op {
            BinaryOp::Lt => ord.is_lt(),
            BinaryOp::Le => ord.is_le(),
            BinaryOp::Gt => ord.is_gt(),
            _ => ord.is_ge(),
        }));
    }

    let integral = |v: &Value| matches!(v, Value::Int(_) | Value::Char(_));
    if integral(&l) && integral(&r) {
        let (a, b) = (l.as_i64().unwrap_or(0), r.as_i64().unwrap_or(0));
        let divide_by_zero = || "Attempted to divide by zero".to_string();
        return Ok(Value::Int(match op {
            BinaryOp::Add => a.wrapping_add(b),
            BinaryOp::Sub => a.wrapping_sub(b),
            BinaryOp::Mul => a.wrapping_mul(b),
            BinaryOp::Div if b == 0 => return Err(divide_by_zero()),
            BinaryOp::Div => a.wrapping_div(b),
            BinaryOp::Rem if b == 0 => return Err(divide_by_zero()),
            BinaryOp::Rem => a.wrapping_rem(b),
            _ => return Err(mismatch(&l, &r)),
        }));
    }

    match (l.as_f64(), r.as_f64()) {
        (Some(a), Some(b)) => Ok(Value::Float(match op {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            BinaryOp::Rem => a % b,
            _ => return Err(mismatch(&l, &r)),
        })),
        _ => Err(mismatch(&l, &r)),
    }
}

fn step(value: &Value, delta: i64) -> Result<Value, String> {
    match value {
        Value::Int(i) => Ok(Value::Int(i.wrapping_add(delta))),
        Value::Float(f) => Ok(Value::Float(f + delta as f64)),
        Value::Char(c) => (*c as i64)
            .checked_add(delta)
            .and_then(|code| u32::try_from(code).ok())
            .and_then(char::from_u32)
            .map(Value::Char)
            .ok_or_else(|| "char increment out of range".to_string()),
        other => Err(format!(
            "Operator '++'/'--' cannot be applied to operand of type '{}'",
            other.type_name()
        )),
    }
}

/// Runtime side of an implicit conversion.
pub(crate) fn convert(value: Value, ty: &Type) -> Result<Value, String> {
    let fail = |value: &Value| {
        format!(
            "Cannot convert a value of type '{}' to '{ty}'",
            value.type_name()
        )
    };
    match (ty, value) {
        (Type::Any | Type::Object, value) => Ok(value),
        (Type::Float, value @ (Value::Int(_) | Value::Char(_) | Value::Float(_))) => {
            Ok(Value::Float(value.as_f64().unwrap_or_default()))
        }
        (Type::Int, Value::Int(i)) => Ok(Value::Int(i)),
        (Type::Int, Value::Char(c)) => Ok(Value::Int(c as i64)),
        (Type::Char, value @ Value::Char(_)) | (Type::Bool, value @ Value::Bool(_)) => Ok(value),
        (Type::Str | Type::List(_) | Type::Record(_) | Type::Null, Value::Null) => Ok(Value::Null),
        (Type::Str, value @ Value::Str(_)) | (Type::Record(_), value @ Value::Record(_)) => {
            Ok(value)
        }
        (Type::List(elem), Value::List(items)) => items
            .into_iter()
            .map(|item| convert(item, elem))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        (_, value) => Err(fail(&value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::builtins::Import;
    use crate::compiler::parser::parse_script;
    use crate::compiler::typeck::Checker;
    use std::collections::BTreeSet;

    fn run(code: &str) -> Result<Option<Value>, Diagnostic> {
        let imports: BTreeSet<Import> = Import::ALL.into_iter().collect();
        let mut script = parse_script(code)?;
        Checker::new(&imports).check_script(&mut script)?;
        let console = Console::default();
        Interpreter::new(&console).run(&script)
    }

    #[test]
    fn test_integers_are_64_bit() {
        assert_eq!(run("int.MaxValue + 1").unwrap(), Some(Value::Int(2_147_483_648)));
        assert_eq!(run("long.MaxValue + 1").unwrap(), Some(Value::Int(i64::MIN)));
    }

    #[test]
    fn test_oversized_sequence_arguments_fail_cleanly() {
        let err = run("Enumerable.Range(9223372036854775807, 2).Count()").unwrap_err();
        assert_eq!(err.kind, crate::error::DiagnosticKind::Runtime);
        let err = run("\"abc\".Substring(1, 9223372036854775807)").unwrap_err();
        assert!(err.message.contains("Index and length"));
        assert!(run("Enumerable.Repeat(1, 9223372036854775807).Count()").is_err());
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(run("1 + 2 * 3"), Ok(Some(Value::Int(7))));
        assert_eq!(run("7 / 2"), Ok(Some(Value::Int(3))));
        assert_eq!(run("7 / 2.0"), Ok(Some(Value::Float(3.5))));
        assert_eq!(run("-7 % 3"), Ok(Some(Value::Int(-1))));
        assert_eq!(run("'a' + 1"), Ok(Some(Value::Int(98))));
        assert_eq!(run("\"n=\" + 1"), Ok(Some(Value::Str("n=1".into()))));
    }

    #[test]
    fn test_divide_by_zero_is_runtime_error() {
        let err = run("var z = 0; 1 / z").unwrap_err();
        assert_eq!(err.kind, crate::error::DiagnosticKind::Runtime);
        assert_eq!(run("1.0 / 0"), Ok(Some(Value::Float(f64::INFINITY))));
    }

    #[test]
    fn test_short_circuit() {
        assert_eq!(run("var z = 0; z != 0 && 1 / z > 0"), Ok(Some(Value::Bool(false))));
    }

    #[test]
    fn test_loops() {
        assert_eq!(
            run("var total = 0; for (var i = 1; i <= 4; i++) { total += i; } total"),
            Ok(Some(Value::Int(10)))
        );
        assert_eq!(
            run("var n = 0; while (true) { n++; if (n == 3) break; } n"),
            Ok(Some(Value::Int(3)))
        );
        assert_eq!(
            run("var s = 0; foreach (var x in new [] { 1, 2, 3, 4 }) { if (x % 2 == 0) continue; s += x; } s"),
            Ok(Some(Value::Int(4)))
        );
    }

    #[test]
    fn test_foreach_converts_declared_type() {
        assert_eq!(
            run("double s = 0; foreach (double x in new [] { 1, 2 }) { s += x / 2; } s"),
            Ok(Some(Value::Float(1.5)))
        );
    }

    #[test]
    fn test_prefix_and_postfix_steps() {
        assert_eq!(run("var i = 1; var j = i++; j * 10 + i"), Ok(Some(Value::Int(12))));
        assert_eq!(run("var i = 1; var j = ++i; j * 10 + i"), Ok(Some(Value::Int(22))));
    }

    #[test]
    fn test_sequence_lambdas() {
        assert_eq!(
            run("new [] { 3, 1, 2 }.OrderBy(x => x).Select(x => x * 10).ToList()"),
            Ok(Some(Value::List(vec![
                Value::Int(10),
                Value::Int(20),
                Value::Int(30)
            ])))
        );
        assert_eq!(
            run("new [] { \"a\", \"bb\", \"cc\" }.OrderByDescending(s => s.Length).First()"),
            Ok(Some(Value::Str("bb".into())))
        );
        assert_eq!(
            run("new [] { 1, 2, 3 }.Count(x => x > 1)"),
            Ok(Some(Value::Int(2)))
        );
        assert!(run("new [] { 1, 2 }.Single(x => x > 0)").is_err());
    }

    #[test]
    fn test_query_comprehension() {
        assert_eq!(
            run("from i in Enumerable.Range(1, 5) where i % 2 == 1 select i * i"),
            Ok(Some(Value::List(vec![
                Value::Int(1),
                Value::Int(9),
                Value::Int(25)
            ])))
        );
    }

    #[test]
    fn test_console_output_is_not_a_value() {
        assert_eq!(run("Console.WriteLine(1);"), Ok(None));
    }

    #[test]
    fn test_convert() {
        assert_eq!(convert(Value::Int(2), &Type::Float), Ok(Value::Float(2.0)));
        assert_eq!(convert(Value::Char('a'), &Type::Int), Ok(Value::Int(97)));
        assert!(convert(Value::Float(1.5), &Type::Int).is_err());
        assert!(convert(Value::Str("x".into()), &Type::Char).is_err());
        assert_eq!(convert(Value::Null, &Type::Str), Ok(Value::Null));
    }
}
