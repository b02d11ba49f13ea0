//! Ordering by a key whose type is chosen at run time.
//!
//! The supported key types form a closed set ([`KeyType`]). An
//! [`OrderProvider`] hands out an order-by routine monomorphized for the
//! requested key type; [`OrderByRegistry`] is the built-in provider.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use crate::compiler::{CompiledCallable, ExpressionCompiler, Shape};
use crate::error::{Diagnostic, QueryError, QueryResult};
use crate::resolver::{self, Role};
use crate::types::{Type, Value};

/// Key types that sequences can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    Bool,
    Int,
    Float,
    Char,
    Str,
}

impl KeyType {
    pub const ALL: [KeyType; 5] = [
        KeyType::Bool,
        KeyType::Int,
        KeyType::Float,
        KeyType::Char,
        KeyType::Str,
    ];

    pub fn as_type(&self) -> Type {
        match self {
            KeyType::Bool => Type::Bool,
            KeyType::Int => Type::Int,
            KeyType::Float => Type::Float,
            KeyType::Char => Type::Char,
            KeyType::Str => Type::Str,
        }
    }

    /// Runtime type of a sample value, if it is a key type.
    pub fn of_value(value: &Value) -> Option<KeyType> {
        match value {
            Value::Bool(_) => Some(KeyType::Bool),
            Value::Int(_) => Some(KeyType::Int),
            Value::Float(_) => Some(KeyType::Float),
            Value::Char(_) => Some(KeyType::Char),
            Value::Str(_) => Some(KeyType::Str),
            _ => None,
        }
    }

    /// Parse a type keyword (`int`, `string`, …).
    pub fn parse(name: &str) -> Option<KeyType> {
        match name.trim() {
            "bool" => Some(KeyType::Bool),
            "int" | "long" => Some(KeyType::Int),
            "double" | "float" => Some(KeyType::Float),
            "char" => Some(KeyType::Char),
            "string" => Some(KeyType::Str),
            _ => None,
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_type())
    }
}

/// A Rust type usable as a sort key.
pub trait SortKey: Sized + 'static {
    const KEY_TYPE: KeyType;

    fn from_key(value: &Value) -> Option<Self>;

    fn compare(a: &Self, b: &Self) -> Ordering;
}

macro_rules! ord_sort_key {
    ($($t:ty => $key:ident, $pat:pat => $out:expr),* $(,)?) => {
        $(
            impl SortKey for $t {
                const KEY_TYPE: KeyType = KeyType::$key;

                fn from_key(value: &Value) -> Option<Self> {
                    match value {
                        $pat => $out,
                        _ => None,
                    }
                }

                fn compare(a: &Self, b: &Self) -> Ordering {
                    a.cmp(b)
                }
            }
        )*
    };
}

ord_sort_key! {
    bool => Bool, Value::Bool(b) => Some(*b),
    i64 => Int, Value::Int(i) => Some(*i),
    i32 => Int, Value::Int(i) => i32::try_from(*i).ok(),
    char => Char, Value::Char(c) => Some(*c),
    String => Str, Value::Str(s) => Some(s.clone()),
}

impl SortKey for f64 {
    const KEY_TYPE: KeyType = KeyType::Float;

    fn from_key(value: &Value) -> Option<Self> {
        match value {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    fn compare(a: &Self, b: &Self) -> Ordering {
        a.total_cmp(b)
    }
}

/// The three ways a caller names the key type.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyTypeSelector {
    Type(KeyType),
    /// A sample value whose runtime type is the key type.
    Indicator(Value),
}

impl KeyTypeSelector {
    pub fn of<K: SortKey>() -> Self {
        KeyTypeSelector::Type(K::KEY_TYPE)
    }

    pub fn like(indicator: impl Into<Value>) -> Self {
        KeyTypeSelector::Indicator(indicator.into())
    }

    pub fn resolve(&self) -> QueryResult<KeyType> {
        match self {
            KeyTypeSelector::Type(key) => Ok(*key),
            KeyTypeSelector::Indicator(Value::Null) => Err(QueryError::invalid_argument(
                "key_type_indicator",
                "Argument can't be null.",
            )),
            KeyTypeSelector::Indicator(value) => KeyType::of_value(value).ok_or_else(|| {
                QueryError::invalid_argument(
                    "key_type_indicator",
                    format!("'{}' is not a supported key type", value.type_name()),
                )
            }),
        }
    }
}

impl From<KeyType> for KeyTypeSelector {
    fn from(key: KeyType) -> Self {
        KeyTypeSelector::Type(key)
    }
}

/// Stable ascending order-by over erased elements; yields source indices.
pub type OrderByFn = fn(&[Value], &CompiledCallable) -> Result<Vec<usize>, Diagnostic>;

/// Supplies order-by routines instantiated for an element/key type pair.
pub trait OrderProvider {
    fn instantiate_order_by(&self, element: &Type, key: KeyType) -> Option<OrderByFn>;
}

fn order_by<K: SortKey>(
    items: &[Value],
    key_selector: &CompiledCallable,
) -> Result<Vec<usize>, Diagnostic> {
    let mut keyed: Vec<(Option<K>, usize)> = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let key = key_selector.invoke(std::slice::from_ref(item))?;
        let key = match key {
            Value::Null => None,
            other => Some(K::from_key(&other).ok_or_else(|| {
                Diagnostic::runtime(
                    0,
                    format!(
                        "key selector produced a '{}' where '{}' was expected",
                        other.type_name(),
                        K::KEY_TYPE
                    ),
                )
            })?),
        };
        keyed.push((key, index));
    }
    // Null keys sort first.
    keyed.sort_by(|(a, _), (b, _)| match (a, b) {
        (Some(a), Some(b)) => K::compare(a, b),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
    });
    Ok(keyed.into_iter().map(|(_, index)| index).collect())
}

/// Built-in provider: one monomorphized routine per key type.
#[derive(Debug, Clone)]
pub struct OrderByRegistry {
    entries: HashMap<KeyType, OrderByFn>,
}

impl OrderByRegistry {
    /// A registry with no entries.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn register(&mut self, key: KeyType, order_by: OrderByFn) -> &mut Self {
        self.entries.insert(key, order_by);
        self
    }

    pub fn register_key<K: SortKey>(&mut self) -> &mut Self {
        self.register(K::KEY_TYPE, order_by::<K>)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for OrderByRegistry {
    fn default() -> Self {
        let mut registry = Self::new();
        registry
            .register_key::<bool>()
            .register_key::<i64>()
            .register_key::<f64>()
            .register_key::<char>()
            .register_key::<String>();
        registry
    }
}

impl OrderProvider for OrderByRegistry {
    fn instantiate_order_by(&self, element: &Type, key: KeyType) -> Option<OrderByFn> {
        tracing::debug!(%element, %key, "instantiating order-by");
        self.entries.get(&key).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Compile the key selector for `fn(source) -> key`.
pub fn resolve_key_selector(
    compiler: &dyn ExpressionCompiler,
    expression: &str,
    source: &Type,
    key: KeyType,
) -> QueryResult<CompiledCallable> {
    resolver::resolve(
        compiler,
        Role::KeySelector,
        expression,
        source,
        Some(key),
        &[Shape::unary(source.clone(), key.as_type())],
    )
}

/// Look up the order-by routine; a missing one is a defect, not bad input.
pub fn instantiate(
    provider: &dyn OrderProvider,
    element: &Type,
    key: KeyType,
) -> QueryResult<OrderByFn> {
    provider.instantiate_order_by(element, key).ok_or_else(|| {
        tracing::warn!(%element, %key, "no order-by instantiation available");
        QueryError::Internal(format!(
            "no order-by instantiation available for element '{element}' and key '{key}'"
        ))
    })
}

/// Run an instantiated order-by. Descending reverses the whole ascending
/// result, so equal keys come out in reverse of their ascending order.
pub fn apply_order(
    order_by: OrderByFn,
    items: &[Value],
    key_selector: &CompiledCallable,
    direction: Direction,
) -> QueryResult<Vec<usize>> {
    let mut indices = order_by(items, key_selector).map_err(QueryError::Evaluation)?;
    if direction == Direction::Descending {
        indices.reverse();
    }
    Ok(indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(shape_param: Type, key: KeyType) -> CompiledCallable {
        CompiledCallable::new(Shape::unary(shape_param, key.as_type()), |args| {
            Ok(args[0].clone())
        })
    }

    fn first_field(key: KeyType) -> CompiledCallable {
        CompiledCallable::new(Shape::unary(Type::Any, key.as_type()), |args| match &args[0] {
            Value::List(items) => Ok(items[0].clone()),
            other => Ok(other.clone()),
        })
    }

    #[test]
    fn test_key_type_selector_forms_agree() {
        assert_eq!(KeyTypeSelector::of::<i32>().resolve().unwrap(), KeyType::Int);
        assert_eq!(KeyTypeSelector::from(KeyType::Int).resolve().unwrap(), KeyType::Int);
        assert_eq!(KeyTypeSelector::like(0).resolve().unwrap(), KeyType::Int);
        assert_eq!(KeyTypeSelector::like("").resolve().unwrap(), KeyType::Str);
        assert_eq!(KeyTypeSelector::like('a').resolve().unwrap(), KeyType::Char);
    }

    #[test]
    fn test_null_indicator_is_invalid_argument() {
        let err = KeyTypeSelector::Indicator(Value::Null).resolve().unwrap_err();
        assert!(matches!(
            err,
            QueryError::InvalidArgument {
                param: "key_type_indicator",
                ..
            }
        ));
        let err = KeyTypeSelector::Indicator(Value::List(vec![]))
            .resolve()
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidArgument { .. }));
    }

    #[test]
    fn test_ascending_is_stable() {
        let items: Vec<Value> = [(2, 'a'), (1, 'b'), (2, 'c'), (1, 'd')]
            .into_iter()
            .map(|(k, tag)| Value::List(vec![Value::Int(k), Value::Char(tag)]))
            .collect();
        let order = apply_order(
            order_by::<i64>,
            &items,
            &first_field(KeyType::Int),
            Direction::Ascending,
        )
        .unwrap();
        assert_eq!(order, vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_descending_reverses_equal_keys() {
        let items: Vec<Value> = [(2, 'a'), (1, 'b'), (2, 'c'), (1, 'd')]
            .into_iter()
            .map(|(k, tag)| Value::List(vec![Value::Int(k), Value::Char(tag)]))
            .collect();
        let order = apply_order(
            order_by::<i64>,
            &items,
            &first_field(KeyType::Int),
            Direction::Descending,
        )
        .unwrap();
        // c before a, d before b: reverse of the ascending result.
        assert_eq!(order, vec![2, 0, 3, 1]);
    }

    #[test]
    fn test_float_keys_use_total_order() {
        let items = vec![Value::Float(2.5), Value::Float(-0.0), Value::Float(0.0), Value::Float(-1.0)];
        let order = apply_order(
            order_by::<f64>,
            &items,
            &identity(Type::Float, KeyType::Float),
            Direction::Ascending,
        )
        .unwrap();
        assert_eq!(order, vec![3, 1, 2, 0]);
    }

    #[test]
    fn test_null_keys_sort_first() {
        let items = vec![Value::Str("b".into()), Value::Null, Value::Str("a".into())];
        let order = apply_order(
            order_by::<String>,
            &items,
            &identity(Type::Str, KeyType::Str),
            Direction::Ascending,
        )
        .unwrap();
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn test_mistyped_key_is_evaluation_error() {
        let items = vec![Value::Int(1)];
        let err = apply_order(
            order_by::<char>,
            &items,
            &identity(Type::Int, KeyType::Char),
            Direction::Ascending,
        )
        .unwrap_err();
        assert!(matches!(err, QueryError::Evaluation(_)));
    }

    #[test]
    fn test_registry_lookup() {
        let registry = OrderByRegistry::default();
        assert_eq!(registry.len(), KeyType::ALL.len());
        for key in KeyType::ALL {
            assert!(instantiate(&registry, &Type::Int, key).is_ok());
        }
        let err = instantiate(&OrderByRegistry::new(), &Type::Int, KeyType::Int).unwrap_err();
        assert!(err.is_internal());
    }

    #[test]
    fn test_parse_key_type() {
        assert_eq!(KeyType::parse("string"), Some(KeyType::Str));
        assert_eq!(KeyType::parse("long"), Some(KeyType::Int));
        assert_eq!(KeyType::parse("decimal"), None);
    }
}
