//! Eager query operators and terminal selection.

use crate::compiler::{CompiledCallable, Engine, ExpressionCompiler, Shape};
use crate::dispatch::{self, Direction, KeyType, KeyTypeSelector, OrderByRegistry, OrderProvider};
use crate::error::{require_text, Diagnostic, QueryError, QueryResult};
use crate::lazy::{FilterView, OrderView, ProjectView};
use crate::resolver::{self, Role};
use crate::types::{Element, FromValue, Type, Value};

/// Query operators over a host-supplied compiler and order provider.
#[derive(Clone, Copy)]
pub struct Operators<'a> {
    compiler: &'a dyn ExpressionCompiler,
    orders: &'a dyn OrderProvider,
}

impl<'a> Operators<'a> {
    pub fn new(compiler: &'a dyn ExpressionCompiler, orders: &'a dyn OrderProvider) -> Self {
        Self { compiler, orders }
    }

    pub(crate) fn compile_predicate<T: Element>(&self, expression: &str) -> QueryResult<CompiledCallable> {
        let source = T::element_type();
        resolver::resolve(
            self.compiler,
            Role::Predicate,
            expression,
            &source,
            None,
            &resolver::predicate_shapes(&source),
        )
    }

    pub(crate) fn compile_selector<T: Element>(&self, expression: &str) -> QueryResult<CompiledCallable> {
        let source = T::element_type();
        resolver::resolve(
            self.compiler,
            Role::Selector,
            expression,
            &source,
            None,
            &[Shape::unary(source.clone(), Type::Object)],
        )
    }

    pub(crate) fn compile_order<T: Element>(
        &self,
        expression: &str,
        key: impl Into<KeyTypeSelector>,
    ) -> QueryResult<(CompiledCallable, dispatch::OrderByFn)> {
        require_text(Role::KeySelector.param(), expression)?;
        let key = key.into().resolve()?;
        let source = T::element_type();
        let selector = dispatch::resolve_key_selector(self.compiler, expression, &source, key)?;
        let order_by = dispatch::instantiate(self.orders, &source, key)?;
        Ok((selector, order_by))
    }

    pub fn where_fx<'s, T: Element>(&self, source: &'s [T], predicate_expression: &str) -> QueryResult<Vec<&'s T>> {
        self.where_fx_lazy(source, predicate_expression)?.to_vec()
    }

    pub fn select_fx<T: Element>(&self, source: &[T], selector_expression: &str) -> QueryResult<Vec<Value>> {
        self.select_fx_lazy(source, selector_expression)?.to_vec()
    }

    /// Project as `object`, then cast every item to `K`.
    pub fn select_fx_as<T: Element, K: FromValue>(
        &self,
        source: &[T],
        selector_expression: &str,
    ) -> QueryResult<Vec<K>> {
        self.select_fx(source, selector_expression)?
            .iter()
            .map(|value| {
                K::from_value(value).ok_or_else(|| {
                    QueryError::Evaluation(Diagnostic::runtime(
                        0,
                        format!(
                            "Unable to cast object of type '{}' to type '{}'",
                            value.type_name(),
                            std::any::type_name::<K>()
                        ),
                    ))
                })
            })
            .collect()
    }

    pub fn order_by_fx<'s, T: Element>(
        &self,
        source: &'s [T],
        key_selector_expression: &str,
        key: impl Into<KeyTypeSelector>,
        direction: Direction,
    ) -> QueryResult<Vec<&'s T>> {
        self.order_by_fx_lazy(source, key_selector_expression, key, direction)?
            .to_vec()
    }

    pub fn first_fx<'s, T>(&self, source: &'s [T]) -> QueryResult<&'s T> {
        source.first().ok_or(QueryError::Empty)
    }

    pub fn first_fx_where<'s, T: Element>(
        &self,
        source: &'s [T],
        predicate_expression: &str,
    ) -> QueryResult<&'s T> {
        let view = self.where_fx_lazy(source, predicate_expression)?;
        let first = view.iter().next().transpose()?;
        first.ok_or(QueryError::Empty)
    }

    pub fn first_or_default_fx<T: Clone + Default>(&self, source: &[T]) -> T {
        source.first().cloned().unwrap_or_default()
    }

    pub fn first_or_default_fx_where<T: Element + Clone + Default>(
        &self,
        source: &[T],
        predicate_expression: &str,
    ) -> QueryResult<T> {
        let view = self.where_fx_lazy(source, predicate_expression)?;
        let first = view.iter().next().transpose()?;
        Ok(first.cloned().unwrap_or_default())
    }

    pub fn single_fx<'s, T>(&self, source: &'s [T]) -> QueryResult<&'s T> {
        match source {
            [one] => Ok(one),
            [] => Err(QueryError::Empty),
            _ => Err(QueryError::MoreThanOne),
        }
    }

    pub fn single_fx_where<'s, T: Element>(
        &self,
        source: &'s [T],
        predicate_expression: &str,
    ) -> QueryResult<&'s T> {
        let view = self.where_fx_lazy(source, predicate_expression)?;
        single_match(view)?.ok_or(QueryError::Empty)
    }

    pub fn single_or_default_fx<T: Clone + Default>(&self, source: &[T]) -> QueryResult<T> {
        match source {
            [] => Ok(T::default()),
            [one] => Ok(one.clone()),
            _ => Err(QueryError::MoreThanOne),
        }
    }

    pub fn single_or_default_fx_where<T: Element + Clone + Default>(
        &self,
        source: &[T],
        predicate_expression: &str,
    ) -> QueryResult<T> {
        let view = self.where_fx_lazy(source, predicate_expression)?;
        Ok(single_match(view)?.cloned().unwrap_or_default())
    }
}

/// Zero or one match; stops after the second.
fn single_match<'s, T: Element>(view: FilterView<'s, T>) -> QueryResult<Option<&'s T>> {
    let mut matches = view.iter();
    let first = matches.next().transpose()?;
    match matches.next().transpose()? {
        Some(_) => Err(QueryError::MoreThanOne),
        None => Ok(first),
    }
}

fn with_defaults<R>(f: impl FnOnce(Operators<'_>) -> R) -> R {
    let engine = Engine::default();
    let orders = OrderByRegistry::default();
    f(Operators::new(&engine, &orders))
}

/// Query operators on slices, compiled with the default [`Engine`].
///
/// ```
/// use queryfx::FxExt;
///
/// let evens = [1, 2, 3, 4].where_fx("x => x % 2 == 0").unwrap();
/// assert_eq!(evens, vec![&2, &4]);
/// ```
pub trait FxExt<T: Element> {
    fn where_fx(&self, predicate_expression: &str) -> QueryResult<Vec<&T>>;

    fn select_fx(&self, selector_expression: &str) -> QueryResult<Vec<Value>>;

    fn select_fx_as<K: FromValue>(&self, selector_expression: &str) -> QueryResult<Vec<K>>;

    /// Order by a key whose type is given as a type parameter.
    fn order_by_fx<K: dispatch::SortKey>(&self, key_selector_expression: &str) -> QueryResult<Vec<&T>>;

    fn order_by_fx_as(&self, key_selector_expression: &str, key: KeyType) -> QueryResult<Vec<&T>>;

    /// Order by a key whose type is that of `indicator`.
    fn order_by_fx_like(
        &self,
        key_selector_expression: &str,
        indicator: impl Into<Value>,
    ) -> QueryResult<Vec<&T>>;

    fn order_by_descending_fx<K: dispatch::SortKey>(
        &self,
        key_selector_expression: &str,
    ) -> QueryResult<Vec<&T>>;

    fn order_by_descending_fx_as(
        &self,
        key_selector_expression: &str,
        key: KeyType,
    ) -> QueryResult<Vec<&T>>;

    fn order_by_descending_fx_like(
        &self,
        key_selector_expression: &str,
        indicator: impl Into<Value>,
    ) -> QueryResult<Vec<&T>>;

    fn first_fx(&self) -> QueryResult<&T>;

    fn first_fx_where(&self, predicate_expression: &str) -> QueryResult<&T>;

    fn first_or_default_fx(&self) -> T
    where
        T: Clone + Default;

    fn first_or_default_fx_where(&self, predicate_expression: &str) -> QueryResult<T>
    where
        T: Clone + Default;

    fn single_fx(&self) -> QueryResult<&T>;

    fn single_fx_where(&self, predicate_expression: &str) -> QueryResult<&T>;

    fn single_or_default_fx(&self) -> QueryResult<T>
    where
        T: Clone + Default;

    fn single_or_default_fx_where(&self, predicate_expression: &str) -> QueryResult<T>
    where
        T: Clone + Default;

    fn where_fx_lazy(&self, predicate_expression: &str) -> QueryResult<FilterView<'_, T>>;

    fn select_fx_lazy(&self, selector_expression: &str) -> QueryResult<ProjectView<'_, T>>;

    fn order_by_fx_lazy(
        &self,
        key_selector_expression: &str,
        key: impl Into<KeyTypeSelector>,
    ) -> QueryResult<OrderView<'_, T>>;

    fn order_by_descending_fx_lazy(
        &self,
        key_selector_expression: &str,
        key: impl Into<KeyTypeSelector>,
    ) -> QueryResult<OrderView<'_, T>>;
}

impl<T: Element> FxExt<T> for [T] {
    fn where_fx(&self, predicate_expression: &str) -> QueryResult<Vec<&T>> {
        with_defaults(|ops| ops.where_fx(self, predicate_expression))
    }

    fn select_fx(&self, selector_expression: &str) -> QueryResult<Vec<Value>> {
        with_defaults(|ops| ops.select_fx(self, selector_expression))
    }

    fn select_fx_as<K: FromValue>(&self, selector_expression: &str) -> QueryResult<Vec<K>> {
        with_defaults(|ops| ops.select_fx_as(self, selector_expression))
    }

    fn order_by_fx<K: dispatch::SortKey>(&self, key_selector_expression: &str) -> QueryResult<Vec<&T>> {
        with_defaults(|ops| {
            ops.order_by_fx(
                self,
                key_selector_expression,
                KeyTypeSelector::of::<K>(),
                Direction::Ascending,
            )
        })
    }

    fn order_by_fx_as(&self, key_selector_expression: &str, key: KeyType) -> QueryResult<Vec<&T>> {
        with_defaults(|ops| ops.order_by_fx(self, key_selector_expression, key, Direction::Ascending))
    }

    fn order_by_fx_like(
        &self,
        key_selector_expression: &str,
        indicator: impl Into<Value>,
    ) -> QueryResult<Vec<&T>> {
        let key = KeyTypeSelector::like(indicator);
        with_defaults(|ops| ops.order_by_fx(self, key_selector_expression, key, Direction::Ascending))
    }

    fn order_by_descending_fx<K: dispatch::SortKey>(
        &self,
        key_selector_expression: &str,
    ) -> QueryResult<Vec<&T>> {
        with_defaults(|ops| {
            ops.order_by_fx(
                self,
                key_selector_expression,
                KeyTypeSelector::of::<K>(),
                Direction::Descending,
            )
        })
    }

    fn order_by_descending_fx_as(
        &self,
        key_selector_expression: &str,
        key: KeyType,
    ) -> QueryResult<Vec<&T>> {
        with_defaults(|ops| ops.order_by_fx(self, key_selector_expression, key, Direction::Descending))
    }

    fn order_by_descending_fx_like(
        &self,
        key_selector_expression: &str,
        indicator: impl Into<Value>,
    ) -> QueryResult<Vec<&T>> {
        let key = KeyTypeSelector::like(indicator);
        with_defaults(|ops| ops.order_by_fx(self, key_selector_expression, key, Direction::Descending))
    }

    fn first_fx(&self) -> QueryResult<&T> {
        with_defaults(|ops| ops.first_fx(self))
    }

    fn first_fx_where(&self, predicate_expression: &str) -> QueryResult<&T> {
        with_defaults(|ops| ops.first_fx_where(self, predicate_expression))
    }

    fn first_or_default_fx(&self) -> T
    where
        T: Clone + Default,
    {
        with_defaults(|ops| ops.first_or_default_fx(self))
    }

    fn first_or_default_fx_where(&self, predicate_expression: &str) -> QueryResult<T>
    where
        T: Clone + Default,
    {
        with_defaults(|ops| ops.first_or_default_fx_where(self, predicate_expression))
    }

    fn single_fx(&self) -> QueryResult<&T> {
        with_defaults(|ops| ops.single_fx(self))
    }

    fn single_fx_where(&self, predicate_expression: &str) -> QueryResult<&T> {
        with_defaults(|ops| ops.single_fx_where(self, predicate_expression))
    }

    fn single_or_default_fx(&self) -> QueryResult<T>
    where
        T: Clone + Default,
    {
        with_defaults(|ops| ops.single_or_default_fx(self))
    }

    fn single_or_default_fx_where(&self, predicate_expression: &str) -> QueryResult<T>
    where
        T: Clone + Default,
    {
        with_defaults(|ops| ops.single_or_default_fx_where(self, predicate_expression))
    }

    fn where_fx_lazy(&self, predicate_expression: &str) -> QueryResult<FilterView<'_, T>> {
        with_defaults(|ops| ops.where_fx_lazy(self, predicate_expression))
    }

    fn select_fx_lazy(&self, selector_expression: &str) -> QueryResult<ProjectView<'_, T>> {
        with_defaults(|ops| ops.select_fx_lazy(self, selector_expression))
    }

    fn order_by_fx_lazy(
        &self,
        key_selector_expression: &str,
        key: impl Into<KeyTypeSelector>,
    ) -> QueryResult<OrderView<'_, T>> {
        with_defaults(|ops| {
            ops.order_by_fx_lazy(self, key_selector_expression, key, Direction::Ascending)
        })
    }

    fn order_by_descending_fx_lazy(
        &self,
        key_selector_expression: &str,
        key: impl Into<KeyTypeSelector>,
    ) -> QueryResult<OrderView<'_, T>> {
        with_defaults(|ops| {
            ops.order_by_fx_lazy(self, key_selector_expression, key, Direction::Descending)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_where_keeps_order() {
        let xs = vec![5, 2, 8, 1];
        assert_eq!(xs.where_fx("x => x > 1").unwrap(), vec![&5, &2, &8]);
    }

    #[test]
    fn test_terminal_without_predicate_compiles_nothing() {
        let empty: Vec<i32> = Vec::new();
        assert!(matches!(empty.first_fx(), Err(QueryError::Empty)));
        assert_eq!(empty.first_or_default_fx(), 0);
        assert_eq!(empty.single_or_default_fx().unwrap(), 0);
        assert!(matches!([1, 2].single_fx(), Err(QueryError::MoreThanOne)));
    }

    #[test]
    fn test_first_where_stops_at_first_match() {
        // The third element would divide by zero; it is never reached.
        let xs = [2, 1, 0];
        assert_eq!(xs.first_fx_where("x => 2 / x == 1").unwrap(), &2);
    }

    #[test]
    fn test_single_where_stops_after_second_match() {
        let xs = [1, 1, 0];
        let err = xs.single_fx_where("x => 1 / x == 1").unwrap_err();
        assert!(matches!(err, QueryError::MoreThanOne));
    }

    #[test]
    fn test_select_as_reports_bad_cast() {
        let err = ["a"].select_fx_as::<i64>("x => x").unwrap_err();
        assert!(matches!(err, QueryError::Evaluation(_)));
        assert!(err.to_string().contains("Unable to cast"));
    }

    #[test]
    fn test_empty_key_selector_rejected_before_key_type() {
        let err = [1].order_by_fx_like("", Value::Null).unwrap_err();
        assert!(matches!(
            err,
            QueryError::InvalidArgument {
                param: "key_selector_expression",
                ..
            }
        ));
    }
}
