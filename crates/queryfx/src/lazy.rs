//! Deferred views.
//!
//! The expression is compiled when the view is created; elements are only
//! evaluated while the view is iterated, and every `iter()` starts over.

use crate::compiler::CompiledCallable;
use crate::dispatch::{self, Direction, KeyTypeSelector, OrderByFn};
use crate::error::{Diagnostic, QueryError, QueryResult};
use crate::ops::Operators;
use crate::types::{Element, Value};

fn as_predicate_result(value: Value) -> QueryResult<bool> {
    value.as_bool().ok_or_else(|| {
        QueryError::Evaluation(Diagnostic::runtime(
            0,
            format!("predicate returned '{}' instead of 'bool'", value.type_name()),
        ))
    })
}

/// Elements matching a predicate, in source order.
#[derive(Debug, Clone)]
pub struct FilterView<'s, T> {
    source: &'s [T],
    predicate: CompiledCallable,
}

impl<'s, T: Element> FilterView<'s, T> {
    pub fn iter(&self) -> impl Iterator<Item = QueryResult<&'s T>> + '_ {
        let indexed = self.predicate.arity() == 2;
        let source: &'s [T] = self.source;
        source.iter().enumerate().filter_map(move |(index, item)| {
            let mut args = vec![item.to_value()];
            if indexed {
                args.push(Value::Int(index as i64));
            }
            let matched = self
                .predicate
                .invoke(&args)
                .map_err(QueryError::Evaluation)
                .and_then(as_predicate_result);
            match matched {
                Ok(true) => Some(Ok(item)),
                Ok(false) => None,
                Err(err) => Some(Err(err)),
            }
        })
    }

    pub fn to_vec(&self) -> QueryResult<Vec<&'s T>> {
        self.iter().collect()
    }
}

/// Each element mapped through a selector.
#[derive(Debug, Clone)]
pub struct ProjectView<'s, T> {
    source: &'s [T],
    selector: CompiledCallable,
}

impl<'s, T: Element> ProjectView<'s, T> {
    pub fn iter(&self) -> impl Iterator<Item = QueryResult<Value>> + '_ {
        self.source.iter().map(move |item| {
            self.selector
                .invoke(&[item.to_value()])
                .map_err(QueryError::Evaluation)
        })
    }

    pub fn to_vec(&self) -> QueryResult<Vec<Value>> {
        self.iter().collect()
    }
}

/// The source ordered by a key; sorted on the first `next()` of each pass.
#[derive(Clone)]
pub struct OrderView<'s, T> {
    source: &'s [T],
    selector: CompiledCallable,
    order_by: OrderByFn,
    direction: Direction,
}

impl<T> std::fmt::Debug for OrderView<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderView")
            .field("len", &self.source.len())
            .field("selector", &self.selector)
            .field("direction", &self.direction)
            .finish()
    }
}

impl<'s, T: Element> OrderView<'s, T> {
    fn sorted(&self) -> QueryResult<Vec<usize>> {
        let items: Vec<Value> = self.source.iter().map(Element::to_value).collect();
        dispatch::apply_order(self.order_by, &items, &self.selector, self.direction)
    }

    pub fn iter(&self) -> impl Iterator<Item = QueryResult<&'s T>> + '_ {
        let source: &'s [T] = self.source;
        let mut order: Option<std::vec::IntoIter<usize>> = None;
        let mut done = false;
        std::iter::from_fn(move || {
            if done {
                return None;
            }
            if order.is_none() {
                match self.sorted() {
                    Ok(indices) => order = Some(indices.into_iter()),
                    Err(err) => {
                        done = true;
                        return Some(Err(err));
                    }
                }
            }
            let next = order.as_mut()?.next().and_then(|index| source.get(index));
            if next.is_none() {
                done = true;
            }
            next.map(Ok)
        })
    }

    pub fn to_vec(&self) -> QueryResult<Vec<&'s T>> {
        self.iter().collect()
    }
}

impl Operators<'_> {
    pub fn where_fx_lazy<'s, T: Element>(
        &self,
        source: &'s [T],
        predicate_expression: &str,
    ) -> QueryResult<FilterView<'s, T>> {
        let predicate = self.compile_predicate::<T>(predicate_expression)?;
        Ok(FilterView { source, predicate })
    }

    pub fn select_fx_lazy<'s, T: Element>(
        &self,
        source: &'s [T],
        selector_expression: &str,
    ) -> QueryResult<ProjectView<'s, T>> {
        let selector = self.compile_selector::<T>(selector_expression)?;
        Ok(ProjectView { source, selector })
    }

    pub fn order_by_fx_lazy<'s, T: Element>(
        &self,
        source: &'s [T],
        key_selector_expression: &str,
        key: impl Into<KeyTypeSelector>,
        direction: Direction,
    ) -> QueryResult<OrderView<'s, T>> {
        let (selector, order_by) = self.compile_order::<T>(key_selector_expression, key)?;
        Ok(OrderView {
            source,
            selector,
            order_by,
            direction,
        })
    }
}
