//! Dynamic values, static types, and the element bridge between host
//! sequences and expressions.

use std::cmp::Ordering;
use std::fmt;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};

/// A runtime value produced or consumed by a compiled expression.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    Str(String),
    List(Vec<Value>),
    Record(Record),
}

/// An ordered set of named fields, optionally carrying a type name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    pub type_name: Option<String>,
    pub fields: Vec<(String, Value)>,
}

impl Record {
    /// An anonymous record.
    pub fn new(fields: Vec<(String, Value)>) -> Self {
        Self {
            type_name: None,
            fields,
        }
    }

    /// A record of a named host type.
    pub fn named(type_name: impl Into<String>, fields: Vec<(String, Value)>) -> Self {
        Self {
            type_name: Some(type_name.into()),
            fields,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Name of the value's runtime type, as used in diagnostics.
    pub fn type_name(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(_) => "bool".to_string(),
            Value::Int(_) => "int".to_string(),
            Value::Float(_) => "double".to_string(),
            Value::Char(_) => "char".to_string(),
            Value::Str(_) => "string".to_string(),
            Value::List(_) => "list".to_string(),
            Value::Record(r) => r.type_name.clone().unwrap_or_else(|| "record".to_string()),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integral view; chars widen to their code point.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Char(c) => Some(*c as i64),
            _ => None,
        }
    }

    /// Numeric view; ints and chars widen.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            Value::Char(c) => Some(*c as u32 as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Structural ordering used by sequence methods inside expressions.
    /// Values of unrelated types compare equal.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Char(a), Value::Char(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                _ => Ordering::Equal,
            },
        }
    }

    /// Equality with numeric widening (`1 == 1.0`).
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(_) | Value::Float(_) | Value::Char(_), Value::Int(_) | Value::Float(_))
            | (Value::Int(_) | Value::Float(_), Value::Char(_)) => {
                match (self.as_f64(), other.as_f64()) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                }
            }
            _ => self == other,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Char(c) => write!(f, "{c}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Record(r) => {
                write!(f, "{{ ")?;
                for (i, (name, value)) in r.fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name} = {value}")?;
                }
                write!(f, " }}")
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::Char(c) => serializer.serialize_char(*c),
            Value::Str(s) => serializer.serialize_str(s),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Record(r) => {
                let mut map = serializer.serialize_map(Some(r.fields.len()))?;
                for (name, value) in &r.fields {
                    map.serialize_entry(name, value)?;
                }
                map.end()
            }
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Record(Record::new(
                map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            )),
        }
    }
}

macro_rules! value_from {
    ($($t:ty => $variant:ident via $conv:expr),* $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant($conv(v))
                }
            }
        )*
    };
}

value_from! {
    bool => Bool via |v| v,
    i32 => Int via i64::from,
    i64 => Int via |v| v,
    u32 => Int via i64::from,
    f64 => Float via |v| v,
    char => Char via |v| v,
    String => Str via |v| v,
    &str => Str via str::to_string,
}

/// Static type of an expression or sequence element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Type {
    /// Dynamically typed; checked when the value is used.
    Any,
    /// Boxes any value-producing type.
    Object,
    Void,
    Null,
    Bool,
    Int,
    Float,
    Char,
    Str,
    List(Box<Type>),
    Record(RecordType),
}

/// Field layout of a record type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordType {
    pub name: Option<String>,
    pub fields: Vec<(String, Type)>,
}

impl RecordType {
    pub fn field(&self, name: &str) -> Option<&Type> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }
}

impl Type {
    pub fn list(elem: Type) -> Self {
        Type::List(Box::new(elem))
    }

    pub fn record(name: impl Into<String>, fields: Vec<(&str, Type)>) -> Self {
        Type::Record(RecordType {
            name: Some(name.into()),
            fields: fields
                .into_iter()
                .map(|(n, t)| (n.to_string(), t))
                .collect(),
        })
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Int | Type::Float | Type::Char)
    }

    /// Types that may hold `null`.
    pub fn is_nullable(&self) -> bool {
        matches!(
            self,
            Type::Any | Type::Object | Type::Null | Type::Str | Type::List(_) | Type::Record(_)
        )
    }

    /// Element type when the value can be enumerated.
    pub fn element(&self) -> Option<Type> {
        match self {
            Type::List(elem) => Some((**elem).clone()),
            Type::Any => Some(Type::Any),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Any => write!(f, "dynamic"),
            Type::Object => write!(f, "object"),
            Type::Void => write!(f, "void"),
            Type::Null => write!(f, "null"),
            Type::Bool => write!(f, "bool"),
            Type::Int => write!(f, "int"),
            Type::Float => write!(f, "double"),
            Type::Char => write!(f, "char"),
            Type::Str => write!(f, "string"),
            Type::List(elem) => write!(f, "List<{elem}>"),
            Type::Record(r) => match &r.name {
                Some(name) => write!(f, "{name}"),
                None => {
                    write!(f, "{{ ")?;
                    for (i, (name, ty)) in r.fields.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{name}: {ty}")?;
                    }
                    write!(f, " }}")
                }
            },
        }
    }
}

/// A host sequence element that expressions can see.
///
/// `element_type` is static so that expressions are type-checked without a
/// sample element (an empty sequence still rejects an ill-typed expression).
pub trait Element {
    fn element_type() -> Type;
    fn to_value(&self) -> Value;
}

macro_rules! primitive_element {
    ($($t:ty => $ty:expr),* $(,)?) => {
        $(
            impl Element for $t {
                fn element_type() -> Type {
                    $ty
                }

                fn to_value(&self) -> Value {
                    Value::from(self.clone())
                }
            }
        )*
    };
}

primitive_element! {
    bool => Type::Bool,
    i32 => Type::Int,
    i64 => Type::Int,
    u32 => Type::Int,
    f64 => Type::Float,
    char => Type::Char,
    String => Type::Str,
}

impl Element for &str {
    fn element_type() -> Type {
        Type::Str
    }

    fn to_value(&self) -> Value {
        Value::Str(self.to_string())
    }
}

impl Element for Value {
    fn element_type() -> Type {
        Type::Any
    }

    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl Element for serde_json::Value {
    fn element_type() -> Type {
        Type::Any
    }

    fn to_value(&self) -> Value {
        Value::from(self.clone())
    }
}

impl<T: Element> Element for Vec<T> {
    fn element_type() -> Type {
        Type::list(T::element_type())
    }

    fn to_value(&self) -> Value {
        Value::List(self.iter().map(Element::to_value).collect())
    }
}

/// Typed extraction of a projected value.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(i) => i32::try_from(*i).ok(),
            _ => None,
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl FromValue for char {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Char(c) => Some(*c),
            _ => None,
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => T::from_value(other).map(Some),
        }
    }
}
