//! Built-in static classes and instance members, shared by the type checker
//! (signatures) and the evaluator (behaviour).

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::types::{Type, Value};

/// A named group of built-ins that an expression may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Import {
    /// `int`, `double`, `char`, `string`, `Math`, `Console`.
    Core,
    /// `new List<T>(…)`.
    Collections,
    /// Sequence methods, `Enumerable`, query comprehensions.
    Sequences,
}

impl Import {
    pub const ALL: [Import; 3] = [Import::Core, Import::Collections, Import::Sequences];

    pub fn name(&self) -> &'static str {
        match self {
            Import::Core => "core",
            Import::Collections => "collections",
            Import::Sequences => "sequences",
        }
    }

    pub fn parse(name: &str) -> Option<Import> {
        Import::ALL
            .into_iter()
            .find(|i| i.name().eq_ignore_ascii_case(name.trim()))
    }
}

/// Where `Console.Write*` output goes.
#[derive(Debug, Clone, Default)]
pub enum Console {
    #[default]
    Stdout,
    /// In-memory buffer shared with the host.
    Capture(Rc<RefCell<String>>),
}

impl Console {
    /// A capturing console and the handle to read it back.
    pub fn capture() -> (Self, Rc<RefCell<String>>) {
        let buffer = Rc::new(RefCell::new(String::new()));
        (Console::Capture(Rc::clone(&buffer)), buffer)
    }

    pub(crate) fn write(&self, text: &str) {
        match self {
            Console::Stdout => print!("{text}"),
            Console::Capture(buffer) => buffer.borrow_mut().push_str(text),
        }
    }
}

/// Parameter and return types a call is checked against.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Signature {
    pub params: Vec<Type>,
    pub ret: Type,
}

impl Signature {
    fn new(params: Vec<Type>, ret: Type) -> Self {
        Self { params, ret }
    }
}

/// Sequence methods whose single argument is a lambda over the element.
pub(crate) const LAMBDA_METHODS: &[&str] = &[
    "Where",
    "Select",
    "OrderBy",
    "OrderByDescending",
    "Any",
    "All",
    "Count",
    "Sum",
    "Min",
    "Max",
    "Average",
    "First",
    "FirstOrDefault",
    "Last",
    "LastOrDefault",
    "Single",
];

/// Every method that needs the `sequences` import.
pub(crate) const SEQUENCE_METHODS: &[&str] = &[
    "Where",
    "Select",
    "OrderBy",
    "OrderByDescending",
    "Any",
    "All",
    "Count",
    "Sum",
    "Min",
    "Max",
    "Average",
    "First",
    "FirstOrDefault",
    "Last",
    "LastOrDefault",
    "Single",
    "Contains",
    "ToList",
    "ToArray",
    "Distinct",
    "Reverse",
    "Take",
    "Skip",
];

/// The import a static class belongs to.
pub(crate) fn static_class(name: &str) -> Option<Import> {
    match name {
        "int" | "long" | "double" | "char" | "string" | "Math" | "Console" => Some(Import::Core),
        "Enumerable" => Some(Import::Sequences),
        _ => None,
    }
}

pub(crate) fn static_property(class: &str, name: &str) -> Option<(Type, Value)> {
    Some(match (class, name) {
        ("int", "MaxValue") => (Type::Int, Value::Int(i32::MAX as i64)),
        ("int", "MinValue") => (Type::Int, Value::Int(i32::MIN as i64)),
        ("long", "MaxValue") => (Type::Int, Value::Int(i64::MAX)),
        ("long", "MinValue") => (Type::Int, Value::Int(i64::MIN)),
        ("string", "Empty") => (Type::Str, Value::Str(String::new())),
        ("Math", "PI") => (Type::Float, Value::Float(std::f64::consts::PI)),
        ("Math", "E") => (Type::Float, Value::Float(std::f64::consts::E)),
        _ => return None,
    })
}

/// Result type of arithmetic between two operands, if any.
pub(crate) fn numeric_result(a: &Type, b: &Type) -> Option<Type> {
    match (a, b) {
        (Type::Any, t) | (t, Type::Any) if t.is_numeric() || *t == Type::Any => Some(Type::Any),
        (Type::Float, t) | (t, Type::Float) if t.is_numeric() => Some(Type::Float),
        (Type::Int | Type::Char, Type::Int | Type::Char) => Some(Type::Int),
        _ => None,
    }
}

fn unary_numeric(t: &Type) -> Option<Type> {
    match t {
        Type::Any => Some(Type::Any),
        Type::Float => Some(Type::Float),
        Type::Int | Type::Char => Some(Type::Int),
        _ => None,
    }
}

pub(crate) fn static_signature(class: &str, method: &str, args: &[Type]) -> Result<Signature, String> {
    let no_overload = || format!("No overload for method '{method}' takes {} arguments", args.len());
    let sig = match (class, method, args) {
        ("int" | "long", "Parse", [_]) => Signature::new(vec![Type::Str], Type::Int),
        ("double", "Parse", [_]) => Signature::new(vec![Type::Str], Type::Float),
        (
            "char",
            "IsDigit" | "IsLetter" | "IsLetterOrDigit" | "IsUpper" | "IsLower" | "IsWhiteSpace",
            [_],
        ) => Signature::new(vec![Type::Char], Type::Bool),
        ("char", "ToUpper" | "ToLower", [_]) => Signature::new(vec![Type::Char], Type::Char),
        ("string", "Join", [_, seq]) => {
            let elem = seq.element().ok_or_else(no_overload)?;
            Signature::new(vec![Type::Str, Type::list(elem)], Type::Str)
        }
        ("string", "IsNullOrEmpty" | "IsNullOrWhiteSpace", [_]) => {
            Signature::new(vec![Type::Str], Type::Bool)
        }
        ("string", "Concat", [_, _]) => Signature::new(vec![Type::Object, Type::Object], Type::Str),
        ("Math", "Abs", [t]) => {
            let ret = unary_numeric(t).ok_or_else(no_overload)?;
            Signature::new(vec![ret.clone()], ret)
        }
        ("Math", "Max" | "Min", [a, b]) => {
            let ret = numeric_result(a, b).ok_or_else(no_overload)?;
            Signature::new(vec![ret.clone(), ret.clone()], ret)
        }
        ("Math", "Sqrt" | "Floor" | "Ceiling" | "Round", [_]) => {
            Signature::new(vec![Type::Float], Type::Float)
        }
        ("Math", "Pow", [_, _]) => Signature::new(vec![Type::Float, Type::Float], Type::Float),
        ("Console", "WriteLine", []) => Signature::new(vec![], Type::Void),
        ("Console", "WriteLine" | "Write", [_]) => Signature::new(vec![Type::Object], Type::Void),
        ("Enumerable", "Range", [_, _]) => {
            Signature::new(vec![Type::Int, Type::Int], Type::list(Type::Int))
        }
        ("Enumerable", "Repeat", [t, _]) => {
            Signature::new(vec![t.clone(), Type::Int], Type::list(t.clone()))
        }
        _ => {
            return Err(if static_method_exists(class, method) {
                no_overload()
            } else {
                format!("'{class}' does not contain a definition for '{method}'")
            })
        }
    };
    Ok(sig)
}

fn static_method_exists(class: &str, method: &str) -> bool {
    matches!(
        (class, method),
        ("int" | "long" | "double", "Parse")
            | (
                "char",
                "IsDigit"
                    | "IsLetter"
                    | "IsLetterOrDigit"
                    | "IsUpper"
                    | "IsLower"
                    | "IsWhiteSpace"
                    | "ToUpper"
                    | "ToLower"
            )
            | ("string", "Join" | "IsNullOrEmpty" | "IsNullOrWhiteSpace" | "Concat")
            | (
                "Math",
                "Abs" | "Max" | "Min" | "Sqrt" | "Floor" | "Ceiling" | "Round" | "Pow"
            )
            | ("Console", "WriteLine" | "Write")
            | ("Enumerable", "Range" | "Repeat")
    )
}

/// Signature of a non-lambda instance method.
pub(crate) fn instance_signature(
    target: &Type,
    method: &str,
    args: &[Type],
) -> Result<Signature, String> {
    let missing = || format!("'{target}' does not contain a definition for '{method}'");

    if method == "ToString" && args.is_empty() && *target != Type::Void {
        return Ok(Signature::new(vec![], Type::Str));
    }

    match target {
        Type::Any => Ok(Signature::new(args.to_vec(), Type::Any)),
        Type::Str => {
            let sig = match (method, args) {
                ("ToUpper" | "ToLower" | "Trim", []) => Signature::new(vec![], Type::Str),
                ("Contains" | "IndexOf", [Type::Char]) => {
                    let ret = if method == "Contains" { Type::Bool } else { Type::Int };
                    Signature::new(vec![Type::Char], ret)
                }
                ("Contains" | "StartsWith" | "EndsWith", [_]) => {
                    Signature::new(vec![Type::Str], Type::Bool)
                }
                ("IndexOf", [_]) => Signature::new(vec![Type::Str], Type::Int),
                ("Substring", [_]) => Signature::new(vec![Type::Int], Type::Str),
                ("Substring", [_, _]) => Signature::new(vec![Type::Int, Type::Int], Type::Str),
                ("Replace", [_, _]) => Signature::new(vec![Type::Str, Type::Str], Type::Str),
                ("Split", [_]) => Signature::new(vec![Type::Char], Type::list(Type::Str)),
                _ => return Err(missing()),
            };
            Ok(sig)
        }
        Type::List(elem) => {
            let elem = (**elem).clone();
            let sig = match (method, args) {
                ("Count", []) => Signature::new(vec![], Type::Int),
                ("Any", []) => Signature::new(vec![], Type::Bool),
                ("Sum", []) => {
                    let ret = unary_numeric(&elem).ok_or_else(missing)?;
                    Signature::new(vec![], ret)
                }
                ("Average", []) => {
                    unary_numeric(&elem).ok_or_else(missing)?;
                    Signature::new(vec![], Type::Float)
                }
                (
                    "Min" | "Max" | "First" | "FirstOrDefault" | "Last" | "LastOrDefault"
                    | "Single",
                    [],
                ) => Signature::new(vec![], elem),
                ("Contains", [_]) => Signature::new(vec![elem], Type::Bool),
                ("ToList" | "ToArray" | "Distinct" | "Reverse", []) => {
                    Signature::new(vec![], Type::list(elem))
                }
                ("Take" | "Skip", [_]) => Signature::new(vec![Type::Int], Type::list(elem)),
                _ => return Err(missing()),
            };
            Ok(sig)
        }
        _ => Err(missing()),
    }
}

/// Result type of a lambda-taking sequence method, given the lambda's body type.
pub(crate) fn lambda_method_result(method: &str, elem: &Type, body: &Type) -> Result<Type, String> {
    let want_bool = || {
        if matches!(body, Type::Bool | Type::Any) {
            Ok(())
        } else {
            Err(format!("Cannot implicitly convert type '{body}' to 'bool'"))
        }
    };
    match method {
        "Where" => want_bool().map(|_| Type::list(elem.clone())),
        "Any" | "All" => want_bool().map(|_| Type::Bool),
        "Count" => want_bool().map(|_| Type::Int),
        "First" | "FirstOrDefault" | "Last" | "LastOrDefault" | "Single" => {
            want_bool().map(|_| elem.clone())
        }
        "Select" => match body {
            Type::Void | Type::Null => Err(format!(
                "The type arguments for method 'Select' cannot be inferred from '{body}'"
            )),
            other => Ok(Type::list(other.clone())),
        },
        "OrderBy" | "OrderByDescending" => {
            if is_orderable(body) {
                Ok(Type::list(elem.clone()))
            } else {
                Err(format!("'{body}' values cannot be ordered"))
            }
        }
        "Min" | "Max" => {
            if is_orderable(body) {
                Ok(body.clone())
            } else {
                Err(format!("'{body}' values cannot be ordered"))
            }
        }
        "Sum" => unary_numeric(body).ok_or_else(|| format!("Cannot sum values of type '{body}'")),
        "Average" => unary_numeric(body)
            .map(|_| Type::Float)
            .ok_or_else(|| format!("Cannot average values of type '{body}'")),
        _ => Err(format!("'{method}' does not take a lambda")),
    }
}

fn is_orderable(t: &Type) -> bool {
    matches!(
        t,
        Type::Any | Type::Bool | Type::Int | Type::Float | Type::Char | Type::Str
    )
}

// ── Behaviour ──

const NULL_REFERENCE: &str = "Object reference not set to an instance of an object";

/// Largest sequence `Enumerable.Range` and `Enumerable.Repeat` will materialize.
const MAX_SEQUENCE_LEN: i64 = 1 << 24;

pub(crate) fn member(target: &Value, name: &str) -> Result<Value, String> {
    match (target, name) {
        (Value::Null, _) => Err(format!("{NULL_REFERENCE} (reading '{name}')")),
        (Value::Str(s), "Length") => Ok(Value::Int(s.chars().count() as i64)),
        (Value::List(items), "Count" | "Length") => Ok(Value::Int(items.len() as i64)),
        (Value::Record(r), _) => r.get(name).cloned().ok_or_else(|| {
            format!(
                "'{}' does not contain a definition for '{name}'",
                target.type_name()
            )
        }),
        _ => Err(format!(
            "'{}' does not contain a definition for '{name}'",
            target.type_name()
        )),
    }
}

pub(crate) fn index(target: &Value, index: &Value) -> Result<Value, String> {
    let i = index
        .as_i64()
        .ok_or_else(|| format!("Cannot index with a value of type '{}'", index.type_name()))?;
    let out_of_range = || format!("Index {i} was outside the bounds of the array");
    match target {
        Value::Null => Err(format!("{NULL_REFERENCE} (indexing)")),
        Value::Str(s) => usize::try_from(i)
            .ok()
            .and_then(|i| s.chars().nth(i))
            .map(Value::Char)
            .ok_or_else(out_of_range),
        Value::List(items) => usize::try_from(i)
            .ok()
            .and_then(|i| items.get(i))
            .cloned()
            .ok_or_else(out_of_range),
        other => Err(format!(
            "Cannot apply indexing to a value of type '{}'",
            other.type_name()
        )),
    }
}

pub(crate) fn call_static(
    class: &str,
    method: &str,
    args: Vec<Value>,
    console: &Console,
) -> Result<Value, String> {
    let arg = |i: usize| args.get(i).cloned().unwrap_or(Value::Null);
    let float = |i: usize| {
        arg(i)
            .as_f64()
            .ok_or_else(|| format!("'{method}' expects a number"))
    };
    let chr = |i: usize| match arg(i) {
        Value::Char(c) => Ok(c),
        other => Err(format!("'{method}' expects a char, got '{}'", other.type_name())),
    };

    match (class, method) {
        ("int" | "long", "Parse") => {
            let input = arg(0);
            let text = expect_str(&input, method)?;
            let parsed: i64 = text
                .trim()
                .parse()
                .map_err(|_| format!("Input string '{text}' was not in a correct format"))?;
            if class == "int" && i32::try_from(parsed).is_err() {
                return Err(format!("Value '{text}' was either too large or too small for an int"));
            }
            Ok(Value::Int(parsed))
        }
        ("double", "Parse") => {
            let input = arg(0);
            let text = expect_str(&input, method)?;
            text.trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| format!("Input string '{text}' was not in a correct format"))
        }
        ("char", "IsDigit") => Ok(Value::Bool(chr(0)?.is_ascii_digit())),
        ("char", "IsLetter") => Ok(Value::Bool(chr(0)?.is_alphabetic())),
        ("char", "IsLetterOrDigit") => Ok(Value::Bool(chr(0)?.is_alphanumeric())),
        ("char", "IsUpper") => Ok(Value::Bool(chr(0)?.is_uppercase())),
        ("char", "IsLower") => Ok(Value::Bool(chr(0)?.is_lowercase())),
        ("char", "IsWhiteSpace") => Ok(Value::Bool(chr(0)?.is_whitespace())),
        ("char", "ToUpper") => Ok(Value::Char(chr(0)?.to_uppercase().next().unwrap_or('\0'))),
        ("char", "ToLower") => Ok(Value::Char(chr(0)?.to_lowercase().next().unwrap_or('\0'))),
        ("string", "Join") => {
            let separator = arg(0).to_string();
            let items = expect_list(arg(1), method)?;
            Ok(Value::Str(
                items
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(&separator),
            ))
        }
        ("string", "IsNullOrEmpty") => Ok(Value::Bool(match arg(0) {
            Value::Str(s) => s.is_empty(),
            _ => true,
        })),
        ("string", "IsNullOrWhiteSpace") => Ok(Value::Bool(match arg(0) {
            Value::Str(s) => s.trim().is_empty(),
            _ => true,
        })),
        ("string", "Concat") => Ok(Value::Str(format!("{}{}", arg(0), arg(1)))),
        ("Math", "Abs") => match arg(0) {
            Value::Int(i) => Ok(Value::Int(i.wrapping_abs())),
            Value::Char(c) => Ok(Value::Int(c as i64)),
            other => Ok(Value::Float(
                other.as_f64().ok_or("'Abs' expects a number")?.abs(),
            )),
        },
        ("Math", "Max" | "Min") => {
            let (a, b) = (arg(0), arg(1));
            let pick_first = match (method, a.compare(&b)) {
                ("Max", std::cmp::Ordering::Less) | ("Min", std::cmp::Ordering::Greater) => false,
                _ => true,
            };
            let picked = if pick_first { a } else { b };
            // Mixed int/double promotes like the static signature does.
            match (&arg(0), &arg(1)) {
                (Value::Float(_), _) | (_, Value::Float(_)) => Ok(Value::Float(
                    picked.as_f64().ok_or("'Max'/'Min' expect numbers")?,
                )),
                _ => Ok(picked),
            }
        }
        ("Math", "Sqrt") => Ok(Value::Float(float(0)?.sqrt())),
        ("Math", "Floor") => Ok(Value::Float(float(0)?.floor())),
        ("Math", "Ceiling") => Ok(Value::Float(float(0)?.ceil())),
        ("Math", "Round") => Ok(Value::Float(round_half_even(float(0)?))),
        ("Math", "Pow") => Ok(Value::Float(float(0)?.powf(float(1)?))),
        ("Console", "WriteLine") => {
            let text = args.first().map(|v| v.to_string()).unwrap_or_default();
            console.write(&format!("{text}\n"));
            Ok(Value::Null)
        }
        ("Console", "Write") => {
            console.write(&arg(0).to_string());
            Ok(Value::Null)
        }
        ("Enumerable", "Range") => {
            let start = arg(0).as_i64().ok_or("'Range' expects ints")?;
            let count = arg(1).as_i64().ok_or("'Range' expects ints")?;
            if !(0..=MAX_SEQUENCE_LEN).contains(&count) {
                return Err("Specified argument was out of the range of valid values (count)".into());
            }
            let end = start
                .checked_add(count)
                .ok_or("Specified argument was out of the range of valid values (count)")?;
            Ok(Value::List((start..end).map(Value::Int).collect()))
        }
        ("Enumerable", "Repeat") => {
            let count = arg(1).as_i64().ok_or("'Repeat' expects an int count")?;
            if !(0..=MAX_SEQUENCE_LEN).contains(&count) {
                return Err("Specified argument was out of the range of valid values (count)".into());
            }
            Ok(Value::List(vec![arg(0); count as usize]))
        }
        _ => Err(format!("'{class}' does not contain a definition for '{method}'")),
    }
}

fn round_half_even(v: f64) -> f64 {
    let rounded = v.round();
    if (v - v.trunc()).abs() == 0.5 && rounded % 2.0 != 0.0 {
        rounded - v.signum()
    } else {
        rounded
    }
}

fn expect_str<'v>(value: &'v Value, method: &str) -> Result<&'v str, String> {
    match value {
        Value::Str(s) => Ok(s),
        Value::Null => Err(format!("Value cannot be null ('{method}')")),
        other => Err(format!(
            "'{method}' expects a string, got '{}'",
            other.type_name()
        )),
    }
}

pub(crate) fn expect_list(value: Value, method: &str) -> Result<Vec<Value>, String> {
    match value {
        Value::List(items) => Ok(items),
        Value::Null => Err(format!("Value cannot be null ('{method}')")),
        other => Err(format!(
            "'{method}' expects a sequence, got '{}'",
            other.type_name()
        )),
    }
}

/// Non-lambda instance methods, dispatched on the runtime value.
pub(crate) fn call_instance(target: Value, method: &str, args: Vec<Value>) -> Result<Value, String> {
    if matches!(target, Value::Null) {
        return Err(format!("{NULL_REFERENCE} (calling '{method}')"));
    }
    if method == "ToString" && args.is_empty() {
        return Ok(Value::Str(target.to_string()));
    }

    let arg = |i: usize| args.get(i).cloned().unwrap_or(Value::Null);
    let missing = |target: &Value| {
        format!(
            "'{}' does not contain a definition for '{method}'",
            target.type_name()
        )
    };

    match target {
        Value::Str(s) => match (method, args.len()) {
            ("ToUpper", 0) => Ok(Value::Str(s.to_uppercase())),
            ("ToLower", 0) => Ok(Value::Str(s.to_lowercase())),
            ("Trim", 0) => Ok(Value::Str(s.trim().to_string())),
            ("Contains", 1) => Ok(Value::Bool(match arg(0) {
                Value::Char(c) => s.contains(c),
                other => s.contains(expect_str(&other, method)?),
            })),
            ("StartsWith", 1) => Ok(Value::Bool(s.starts_with(expect_str(&arg(0), method)?))),
            ("EndsWith", 1) => Ok(Value::Bool(s.ends_with(expect_str(&arg(0), method)?))),
            ("IndexOf", 1) => {
                let found = match arg(0) {
                    Value::Char(c) => s.find(c),
                    other => s.find(expect_str(&other, method)?),
                };
                Ok(Value::Int(match found {
                    Some(byte) => s[..byte].chars().count() as i64,
                    None => -1,
                }))
            }
            ("Substring", 1 | 2) => {
                let chars: Vec<char> = s.chars().collect();
                let start = arg(0).as_i64().ok_or("'Substring' expects ints")?;
                let len = match args.len() {
                    2 => arg(1).as_i64().ok_or("'Substring' expects ints")?,
                    _ => (chars.len() as i64).saturating_sub(start),
                };
                let end = start
                    .checked_add(len)
                    .filter(|end| start >= 0 && len >= 0 && *end <= chars.len() as i64)
                    .ok_or("Index and length must refer to a location within the string")?;
                Ok(Value::Str(
                    chars[start as usize..end as usize].iter().collect(),
                ))
            }
            ("Replace", 2) => {
                let from = expect_str(&arg(0), method)?.to_string();
                if from.is_empty() {
                    return Err("String cannot be of zero length ('Replace')".into());
                }
                let to = arg(1).to_string();
                Ok(Value::Str(s.replace(&from, &to)))
            }
            ("Split", 1) => match arg(0) {
                Value::Char(c) => Ok(Value::List(
                    s.split(c).map(|part| Value::Str(part.to_string())).collect(),
                )),
                other => Err(format!(
                    "'Split' expects a char, got '{}'",
                    other.type_name()
                )),
            },
            _ => Err(missing(&Value::Str(s))),
        },
        Value::List(items) => sequence_method(items, method, args),
        other => Err(missing(&other)),
    }
}

fn sequence_method(items: Vec<Value>, method: &str, args: Vec<Value>) -> Result<Value, String> {
    let arg = |i: usize| args.get(i).cloned().unwrap_or(Value::Null);
    match (method, args.len()) {
        ("Count", 0) => Ok(Value::Int(items.len() as i64)),
        ("Any", 0) => Ok(Value::Bool(!items.is_empty())),
        ("Sum", 0) => sum(&items),
        ("Average", 0) => average(&items),
        ("Min", 0) => extreme(items, std::cmp::Ordering::Less),
        ("Max", 0) => extreme(items, std::cmp::Ordering::Greater),
        ("First", 0) | ("Single", 0) if items.is_empty() => {
            Err("Sequence contains no elements".into())
        }
        ("Single", 0) if items.len() > 1 => Err("Sequence contains more than one element".into()),
        ("First" | "Single" | "FirstOrDefault", 0) => {
            Ok(items.into_iter().next().unwrap_or(Value::Null))
        }
        ("Last", 0) if items.is_empty() => Err("Sequence contains no elements".into()),
        ("Last" | "LastOrDefault", 0) => Ok(items.into_iter().last().unwrap_or(Value::Null)),
        ("Contains", 1) => {
            let needle = arg(0);
            Ok(Value::Bool(items.iter().any(|v| v.loose_eq(&needle))))
        }
        ("ToList" | "ToArray", 0) => Ok(Value::List(items)),
        ("Reverse", 0) => Ok(Value::List(items.into_iter().rev().collect())),
        ("Distinct", 0) => {
            let mut seen: Vec<Value> = Vec::new();
            for item in items {
                if !seen.iter().any(|s| s.loose_eq(&item)) {
                    seen.push(item);
                }
            }
            Ok(Value::List(seen))
        }
        ("Take" | "Skip", 1) => {
            let n = arg(0).as_i64().ok_or("'Take'/'Skip' expect an int")?.max(0) as usize;
            Ok(Value::List(if method == "Take" {
                items.into_iter().take(n).collect()
            } else {
                items.into_iter().skip(n).collect()
            }))
        }
        _ => Err(format!("'list' does not contain a definition for '{method}'")),
    }
}

pub(crate) fn sum(items: &[Value]) -> Result<Value, String> {
    if items.iter().all(|v| matches!(v, Value::Int(_) | Value::Char(_))) {
        let mut total = 0i64;
        for v in items {
            total = total.wrapping_add(v.as_i64().unwrap_or(0));
        }
        return Ok(Value::Int(total));
    }
    let mut total = 0.0;
    for v in items {
        total += v
            .as_f64()
            .ok_or_else(|| format!("Cannot sum a value of type '{}'", v.type_name()))?;
    }
    Ok(Value::Float(total))
}

pub(crate) fn average(items: &[Value]) -> Result<Value, String> {
    if items.is_empty() {
        return Err("Sequence contains no elements".into());
    }
    let total = sum(items)?
        .as_f64()
        .ok_or("Cannot average non-numeric values")?;
    Ok(Value::Float(total / items.len() as f64))
}

pub(crate) fn extreme(items: Vec<Value>, keep: std::cmp::Ordering) -> Result<Value, String> {
    let mut iter = items.into_iter();
    let mut best = iter.next().ok_or("Sequence contains no elements")?;
    for item in iter {
        if item.compare(&best) == keep {
            best = item;
        }
    }
    Ok(best)
}
