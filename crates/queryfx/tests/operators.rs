//! Integration tests for the query operators.
//!
//! Each operator is compared against the same query written directly in Rust.

use queryfx::*;

// ─────────────────────── helpers ───────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
struct TestClass {
    prop: i32,
}

impl TestClass {
    fn new(prop: i32) -> Self {
        Self { prop }
    }
}

impl Element for TestClass {
    fn element_type() -> Type {
        Type::record("TestClass", vec![("Prop", Type::Int)])
    }

    fn to_value(&self) -> Value {
        Value::Record(Record::named(
            "TestClass",
            vec![("Prop".to_string(), Value::Int(self.prop as i64))],
        ))
    }
}

fn one_to(n: i32) -> Vec<i32> {
    (1..=n).collect()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn anonymous(fields: Vec<(&str, Value)>) -> Value {
    Value::Record(Record::new(
        fields
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect(),
    ))
}

// ═══════════════════════════════════════════════════════
// FILTER
// ═══════════════════════════════════════════════════════

#[test]
fn test_where_filters_ints_by_simple_predicate() {
    let items = one_to(4);
    let expected: Vec<&i32> = items.iter().filter(|x| *x % 2 == 0).collect();
    assert_eq!(items.where_fx("x => x % 2 == 0").unwrap(), expected);
}

#[test]
fn test_where_filters_strings_by_simple_predicate() {
    let items: Vec<String> = one_to(4).iter().map(|x| x.to_string()).collect();
    let expected: Vec<&String> = items
        .iter()
        .filter(|x| x.parse::<i32>().unwrap() % 2 == 0)
        .collect();
    assert_eq!(items.where_fx("x => int.Parse(x) % 2 == 0").unwrap(), expected);
}

#[test]
fn test_where_with_string_literal() {
    let items: Vec<String> = one_to(4).iter().map(|x| x.to_string()).collect();
    assert_eq!(items.where_fx("x => x == \"2\"").unwrap(), vec![&items[1]]);
}

#[test]
fn test_where_with_single_quote_string_literal() {
    let items: Vec<String> = one_to(4).iter().map(|x| x.to_string()).collect();
    assert_eq!(items.where_fx("x => x == '2'").unwrap(), vec![&items[1]]);
}

#[test]
fn test_where_filters_chars_with_escaped_single_quotes() {
    let items = vec!['a', 'b', 'c'];
    assert_eq!(items.where_fx("x => x == ''b''").unwrap(), vec![&'b']);
}

#[test]
fn test_where_char_compared_with_string_literal_fails() {
    let items = vec!['a', 'b', 'c'];
    let err = items.where_fx("x => x == 'b'").unwrap_err();
    assert!(matches!(err, QueryError::Resolution { .. }));
}

#[test]
fn test_where_filters_custom_types() {
    let items = vec![TestClass::new(1), TestClass::new(2)];
    assert_eq!(
        items.where_fx("x => x.Prop == 1").unwrap(),
        vec![&TestClass::new(1)]
    );
}

#[test]
fn test_where_with_index() {
    let items = strings(&["one", "two", "three", "four"]);
    let expected: Vec<&String> = items
        .iter()
        .enumerate()
        .filter(|(i, _)| i % 2 == 0)
        .map(|(_, x)| x)
        .collect();
    assert_eq!(items.where_fx("(x, i) => i % 2 == 0").unwrap(), expected);
}

#[test]
fn test_where_prefers_element_only_shape() {
    // Valid as `fn(int) -> bool`, so the index shape is never used.
    let items = vec![10, 20, 30];
    let view = items.where_fx_lazy("x => x > 15").unwrap();
    assert_eq!(view.to_vec().unwrap(), vec![&20, &30]);
}

#[test]
fn test_where_invalid_expression_fails() {
    let err = [1, 2, 3].where_fx("(x, i) => 'qwe'").unwrap_err();
    match &err {
        QueryError::Resolution {
            role, expression, ..
        } => {
            assert_eq!(*role, "predicate");
            assert_eq!(expression, "(x, i) => 'qwe'");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    let message = err.to_string();
    assert!(message.contains("neither fn(int) -> bool nor fn(int, int) -> bool"));
    assert!(message.ends_with("Source: 'int'."));
}

#[test]
fn test_where_empty_expression_is_invalid_argument() {
    for expression in ["", "   "] {
        let err = [1].where_fx(expression).unwrap_err();
        assert!(matches!(
            err,
            QueryError::InvalidArgument {
                param: "predicate_expression",
                ..
            }
        ));
    }
}

#[test]
fn test_where_over_json_rows() {
    let rows: Vec<serde_json::Value> = serde_json::from_str(
        r#"[{"name": "a", "qty": 3}, {"name": "b", "qty": 0}, {"name": "c", "qty": 7}]"#,
    )
    .unwrap();
    let matched = rows.where_fx("r => r.qty > 2").unwrap();
    assert_eq!(matched.len(), 2);
    assert_eq!(matched[1]["name"], "c");
}

// ═══════════════════════════════════════════════════════
// ORDER
// ═══════════════════════════════════════════════════════

#[test]
fn test_order_by_element_value() {
    let items = strings(&["c", "b", "a"]);
    let ordered = items.order_by_fx::<String>("x => x").unwrap();
    assert_eq!(ordered, vec!["a", "b", "c"]);
}

#[test]
fn test_order_by_property() {
    let items = strings(&["aaa", "bb", "c"]);
    let ordered = items.order_by_fx::<i32>("x => x.Length").unwrap();
    assert_eq!(ordered, vec!["c", "bb", "aaa"]);
}

#[test]
fn test_order_by_with_explicit_key_type() {
    let items = strings(&["aaa", "bb", "c"]);
    let ordered = items.order_by_fx_as("x => x.Length", KeyType::Int).unwrap();
    assert_eq!(ordered, vec!["c", "bb", "aaa"]);
}

#[test]
fn test_order_by_with_key_type_indicator() {
    let items = strings(&["aaa", "bb", "c"]);
    let ordered = items.order_by_fx_like("x => x.Length", 0).unwrap();
    assert_eq!(ordered, vec!["c", "bb", "aaa"]);
}

#[test]
fn test_order_by_incompatible_key_type_fails() {
    let items = ["aaa", "bb", "c"];
    let err = items.order_by_fx_as("x => x.Length", KeyType::Char).unwrap_err();
    match &err {
        QueryError::Resolution { key_type, .. } => {
            assert_eq!(key_type.as_deref(), Some("char"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().ends_with("Source: 'string'. Key: 'char'."));
}

#[test]
fn test_order_by_null_indicator_is_invalid_argument() {
    let err = [1].order_by_fx_like("x => x", Value::Null).unwrap_err();
    assert!(matches!(
        err,
        QueryError::InvalidArgument {
            param: "key_type_indicator",
            ..
        }
    ));
}

#[test]
fn test_order_by_custom_type_property() {
    let items = vec![TestClass::new(3), TestClass::new(1), TestClass::new(2)];
    let ordered = items.order_by_fx::<i64>("x => x.Prop").unwrap();
    let props: Vec<i32> = ordered.iter().map(|x| x.prop).collect();
    assert_eq!(props, vec![1, 2, 3]);
}

#[test]
fn test_order_by_descending_element_value() {
    let items = strings(&["a", "b", "c"]);
    let ordered = items.order_by_descending_fx::<String>("x => x").unwrap();
    assert_eq!(ordered, vec!["c", "b", "a"]);
}

#[test]
fn test_order_by_descending_property() {
    let items = strings(&["a", "bb", "ccc"]);
    let expected = vec!["ccc", "bb", "a"];
    assert_eq!(
        items.order_by_descending_fx::<i32>("x => x.Length").unwrap(),
        expected
    );
    assert_eq!(
        items
            .order_by_descending_fx_as("x => x.Length", KeyType::Int)
            .unwrap(),
        expected
    );
    assert_eq!(
        items
            .order_by_descending_fx_like("x => x.Length", 0)
            .unwrap(),
        expected
    );
}

#[test]
fn test_order_by_descending_incompatible_key_type_fails() {
    let items = ["a", "bb", "ccc"];
    let err = items
        .order_by_descending_fx_as("x => x.Length", KeyType::Char)
        .unwrap_err();
    assert!(matches!(err, QueryError::Resolution { .. }));
}

#[test]
fn test_order_by_descending_unique_keys_is_reverse_of_ascending() {
    let items = vec![4, 9, 1, 7];
    let mut ascending = items.order_by_fx::<i32>("x => x").unwrap();
    ascending.reverse();
    assert_eq!(items.order_by_descending_fx::<i32>("x => x").unwrap(), ascending);
}

#[test]
fn test_order_by_descending_reverses_equal_keys() {
    let items = strings(&["ab", "x", "cd", "y"]);
    let ascending = items.order_by_fx::<i32>("x => x.Length").unwrap();
    assert_eq!(ascending, vec!["x", "y", "ab", "cd"]);
    // Equal-length strings come out in reverse of their ascending order.
    let descending = items.order_by_descending_fx::<i32>("x => x.Length").unwrap();
    assert_eq!(descending, vec!["cd", "ab", "y", "x"]);
}

#[test]
fn test_order_by_with_custom_provider() {
    let engine = Engine::default();
    let empty = OrderByRegistry::new();
    let ops = Operators::new(&engine, &empty);
    let err = ops
        .order_by_fx(&[1, 2], "x => x", KeyType::Int, Direction::Ascending)
        .unwrap_err();
    assert!(err.is_internal());

    let mut registry = OrderByRegistry::new();
    registry.register_key::<i64>();
    let ops = Operators::new(&engine, &registry);
    assert_eq!(
        ops.order_by_fx(&[2, 1], "x => x", KeyType::Int, Direction::Ascending)
            .unwrap(),
        vec![&1, &2]
    );
}

// ═══════════════════════════════════════════════════════
// PROJECT
// ═══════════════════════════════════════════════════════

#[test]
fn test_select_ints() {
    let items = vec![1, 2, 3];
    assert_eq!(
        items.select_fx("x => x").unwrap(),
        vec![Value::Int(1), Value::Int(2), Value::Int(3)]
    );
}

#[test]
fn test_select_string_lengths() {
    let items = ["a", "aa", "aaa"];
    assert_eq!(
        items.select_fx("x => x.Length").unwrap(),
        vec![Value::Int(1), Value::Int(2), Value::Int(3)]
    );
}

#[test]
fn test_select_custom_type_property() {
    let items = vec![TestClass::new(1), TestClass::new(2)];
    assert_eq!(
        items.select_fx("x => x.Prop").unwrap(),
        vec![Value::Int(1), Value::Int(2)]
    );
}

#[test]
fn test_select_anonymous_records() {
    let items = ["a", "aa", "aaa"];
    let expected: Vec<Value> = items
        .iter()
        .map(|x| {
            anonymous(vec![
                ("Element", Value::from(*x)),
                ("Length", Value::Int(x.len() as i64)),
            ])
        })
        .collect();
    assert_eq!(
        items
            .select_fx("x => new { Element = x, Length = x.Length }")
            .unwrap(),
        expected
    );
}

#[test]
fn test_select_anonymous_records_twice() {
    // Each call compiles in its own context; the same record shape twice is fine.
    let items = ["a"];
    for _ in 0..2 {
        assert!(items.select_fx("x => new { x.Length }").is_ok());
    }
}

#[test]
fn test_select_with_result_type() {
    let items = vec![TestClass::new(1), TestClass::new(2)];
    let expected: i32 = items.iter().map(|x| x.prop).sum();
    let props = items.select_fx_as::<i32>("x => x.Prop").unwrap();
    assert_eq!(props.iter().sum::<i32>(), expected);
}

#[test]
fn test_select_serializes_to_json() {
    let items = ["ab"];
    let projected = items
        .select_fx("x => new { Element = x, Upper = x.ToUpper() }")
        .unwrap();
    assert_eq!(
        serde_json::to_value(&projected).unwrap(),
        serde_json::json!([{ "Element": "ab", "Upper": "AB" }])
    );
}

// ═══════════════════════════════════════════════════════
// TERMINAL SELECTION
// ═══════════════════════════════════════════════════════

#[test]
fn test_first_without_predicate() {
    assert_eq!(one_to(3).first_fx().unwrap(), &1);
}

#[test]
fn test_first_with_predicate() {
    assert_eq!(one_to(3).first_fx_where("x => x % 2 == 0").unwrap(), &2);
}

#[test]
fn test_first_with_no_match_is_empty() {
    assert!(matches!(
        one_to(3).first_fx_where("x => x > 5"),
        Err(QueryError::Empty)
    ));
}

#[test]
fn test_first_or_default_without_predicate() {
    let items: Vec<i32> = Vec::new();
    assert_eq!(items.first_or_default_fx(), 0);
}

#[test]
fn test_first_or_default_with_predicate() {
    assert_eq!(vec![1].first_or_default_fx_where("x => false").unwrap(), 0);
}

#[test]
fn test_single_without_predicate() {
    assert_eq!(vec![1].single_fx().unwrap(), &1);
}

#[test]
fn test_single_with_predicate() {
    assert_eq!(one_to(3).single_fx_where("x => x % 2 == 0").unwrap(), &2);
}

#[test]
fn test_single_without_predicate_more_than_one() {
    let err = vec![1, 2].single_fx().unwrap_err();
    assert!(err.is_selection_violation());
    assert!(matches!(err, QueryError::MoreThanOne));
}

#[test]
fn test_single_with_predicate_more_than_one() {
    assert!(matches!(
        one_to(3).single_fx_where("x => x % 2 == 1"),
        Err(QueryError::MoreThanOne)
    ));
}

#[test]
fn test_single_or_default_without_predicate() {
    let items: Vec<i32> = Vec::new();
    assert_eq!(items.single_or_default_fx().unwrap(), 0);
}

#[test]
fn test_single_or_default_with_predicate() {
    assert_eq!(vec![1].single_or_default_fx_where("x => false").unwrap(), 0);
}

#[test]
fn test_single_or_default_without_predicate_more_than_one() {
    assert!(matches!(
        vec![1, 2].single_or_default_fx(),
        Err(QueryError::MoreThanOne)
    ));
}

#[test]
fn test_single_or_default_with_predicate_more_than_one() {
    assert!(matches!(
        one_to(4).single_or_default_fx_where("x => x % 2 == 1"),
        Err(QueryError::MoreThanOne)
    ));
}

#[test]
fn test_single_or_default_with_predicate_no_match() {
    assert_eq!(
        one_to(4)
            .single_or_default_fx_where("x => x % 2 == 3")
            .unwrap(),
        0
    );
}

#[test]
fn test_single_or_default_custom_type() {
    let items = vec![TestClass::new(1), TestClass::new(2)];
    assert_eq!(
        items.single_or_default_fx_where("x => x.Prop == 5").unwrap(),
        TestClass::default()
    );
}
