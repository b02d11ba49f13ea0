//! Integration tests for dataset sessions loaded from disk.

use std::io::Write;

use queryfx::{Console, Direction, EngineConfig, Import, KeyType, QueryError, Value};
use queryfx_repl::{DatasetSession, ReplError};

// ─────────────────────── helpers ───────────────────────

const PEOPLE: &str = r#"[
    {"name": "ada", "age": 36, "langs": ["analytical"]},
    {"name": "grace", "age": 45, "langs": ["cobol", "flow-matic"]},
    {"name": "alan", "age": 41, "langs": []},
    {"name": "edsger", "age": 72, "langs": ["algol"]}
]"#;

fn dataset(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".json")
        .tempfile()
        .unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn open(file: &tempfile::NamedTempFile) -> DatasetSession {
    DatasetSession::open(file.path().to_str().unwrap(), EngineConfig::default()).unwrap()
}

fn names(session: &DatasetSession) -> Vec<&str> {
    session
        .rows()
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect()
}

// ═══════════════════════════════════════════════════════
// LOADING
// ═══════════════════════════════════════════════════════

#[test]
fn test_open_reads_all_rows() {
    let file = dataset(PEOPLE);
    let session = open(&file);
    assert_eq!(session.count(), 4);
    assert_eq!(session.path(), Some(file.path()));
}

#[test]
fn test_open_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.json");
    let result = DatasetSession::open(path.to_str().unwrap(), EngineConfig::default());
    assert!(matches!(result, Err(ReplError::DatasetNotFound(_))));
}

#[test]
fn test_open_rejects_non_array() {
    let file = dataset(r#"{"name": "ada"}"#);
    let result = DatasetSession::open(file.path().to_str().unwrap(), EngineConfig::default());
    match result {
        Err(ReplError::InvalidDataset(reason)) => assert!(reason.contains("an object")),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected an error"),
    }
}

#[test]
fn test_open_rejects_malformed_json() {
    let file = dataset("[1, 2,");
    let result = DatasetSession::open(file.path().to_str().unwrap(), EngineConfig::default());
    assert!(matches!(result, Err(ReplError::Json(_))));
}

// ═══════════════════════════════════════════════════════
// PIPELINE
// ═══════════════════════════════════════════════════════

#[test]
fn test_where_then_order_then_reset() {
    let file = dataset(PEOPLE);
    let mut session = open(&file);

    assert_eq!(session.filter("r => r.age > 40").unwrap(), 3);
    session
        .order("r => r.name", KeyType::Str, Direction::Ascending)
        .unwrap();
    assert_eq!(names(&session), vec!["alan", "edsger", "grace"]);

    session.reset();
    assert_eq!(session.count(), 4);
    assert_eq!(names(&session)[0], "ada");
}

#[test]
fn test_order_descending_by_list_count() {
    let file = dataset(PEOPLE);
    let mut session = open(&file);
    session
        .order("r => r.langs.Count", KeyType::Int, Direction::Descending)
        .unwrap();
    assert_eq!(names(&session)[0], "grace");
    assert_eq!(names(&session)[3], "alan");
}

#[test]
fn test_select_projects_without_narrowing() {
    let file = dataset(PEOPLE);
    let session = open(&file);
    let projected = session
        .select("r => new { Who = r.name, Senior = r.age > 60 }")
        .unwrap();
    assert_eq!(projected.len(), 4);
    assert_eq!(
        serde_json::to_value(&projected[3]).unwrap(),
        serde_json::json!({ "Who": "edsger", "Senior": true })
    );
    assert_eq!(session.count(), 4);
}

#[test]
fn test_first_and_single() {
    let file = dataset(PEOPLE);
    let session = open(&file);
    assert_eq!(session.first(None).unwrap()["name"], "ada");
    assert_eq!(
        session.single(Some("r => r.name.StartsWith('g')")).unwrap()["age"],
        45
    );
    assert!(matches!(
        session.single(Some("r => r.name.StartsWith('a')")),
        Err(ReplError::Query(QueryError::MoreThanOne))
    ));
    assert!(matches!(
        session.first(Some("r => r.age > 100")),
        Err(ReplError::Query(QueryError::Empty))
    ));
}

#[test]
fn test_bad_expression_leaves_rows_untouched() {
    let file = dataset(PEOPLE);
    let mut session = open(&file);
    let err = session.filter("r => r.age >").unwrap_err();
    assert!(matches!(
        err,
        ReplError::Query(QueryError::Resolution { .. })
    ));
    assert_eq!(session.count(), 4);
}

// ═══════════════════════════════════════════════════════
// EVALUATION
// ═══════════════════════════════════════════════════════

#[test]
fn test_eval_uses_session_engine() {
    let (console, buffer) = Console::capture();
    let session = DatasetSession::from_rows(
        Vec::new(),
        EngineConfig::default().with_console(console),
    );
    assert!(session.eval("Console.Write('hi')").unwrap().is_none());
    assert_eq!(buffer.borrow().as_str(), "hi");
    assert_eq!(session.eval("2 * 21").unwrap(), Some(Value::Int(42)));
}

#[test]
fn test_eval_respects_imports() {
    let session = DatasetSession::from_rows(
        Vec::new(),
        EngineConfig::default().with_imports([Import::Core]),
    );
    assert!(session.eval("Enumerable.Range(1, 3).Sum()").is_err());
}
