//! Interactive QueryFx evaluator.
//!
//! Launch with `queryfx repl` (or plain `queryfx`). Lines starting with `/`
//! are commands; anything else is run as code. Tab completes commands.

use rustyline::completion::{Completer, Pair};
use rustyline::config::CompletionType;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{
    Cmd, ConditionalEventHandler, Config, Editor, Event, EventContext, EventHandler, Helper,
    KeyEvent, RepeatCount,
};

use queryfx::{run_with, Direction, Engine, EngineConfig, KeyType};

use crate::config::resolve_data_path;
use crate::session::manager::{is_expression_error, parse_key_type};
use crate::session::{DatasetSession, ReplError};

/// Available REPL commands.
const COMMANDS: &[(&str, &str)] = &[
    ("/load", "Load a JSON array dataset"),
    ("/where", "Keep rows matching a predicate"),
    ("/select", "Project the current rows"),
    ("/orderby", "Order rows: /orderby <type> <expr>"),
    ("/orderbydesc", "Order rows descending: /orderbydesc <type> <expr>"),
    ("/first", "First row, optionally matching a predicate"),
    ("/single", "The only row, optionally matching a predicate"),
    ("/count", "Number of rows in the working set"),
    ("/show", "Print the working set"),
    ("/reset", "Restore the loaded rows"),
    ("/clear", "Clear the screen"),
    ("/help", "Show available commands"),
    ("/exit", "Quit the REPL"),
];

/// REPL helper for tab completion.
#[derive(Default)]
struct QueryHelper;

impl Completer for QueryHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let input = &line[..pos];

        if !input.contains(' ') {
            let matches: Vec<Pair> = COMMANDS
                .iter()
                .filter(|(cmd, _)| cmd.starts_with(input))
                .map(|(cmd, desc)| Pair {
                    display: format!("{cmd:<16} {desc}"),
                    replacement: format!("{cmd} "),
                })
                .collect();
            return Ok((0, matches));
        }

        let (cmd, args) = input.split_once(' ').unwrap_or((input, ""));
        let prefix_start = input.len() - args.len();

        if cmd == "/load" {
            let mut files = Vec::new();
            if let Ok(entries) = std::fs::read_dir(".") {
                for entry in entries.flatten() {
                    let path = entry.path();
                    if path.extension().is_some_and(|e| e == "json") {
                        if let Some(name) = path.file_name().and_then(|s| s.to_str()) {
                            files.push(name.to_string());
                        }
                    }
                }
            }
            files.sort();
            let matches = candidates(files.iter().map(String::as_str), args);
            return Ok((prefix_start, matches));
        }

        if (cmd == "/orderby" || cmd == "/orderbydesc") && !args.contains(' ') {
            let names = KeyType::ALL.map(|k| k.to_string());
            let matches = candidates(names.iter().map(String::as_str), args);
            return Ok((prefix_start, matches));
        }

        Ok((pos, Vec::new()))
    }
}

fn candidates<'a>(options: impl Iterator<Item = &'a str>, typed: &str) -> Vec<Pair> {
    options
        .filter(|o| o.starts_with(typed.trim()))
        .map(|o| Pair {
            display: o.to_string(),
            replacement: format!("{o} "),
        })
        .collect()
}

impl Hinter for QueryHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        if pos < line.len() || line.is_empty() {
            return None;
        }
        if line.starts_with('/') && !line.contains(' ') {
            for (cmd, _) in COMMANDS {
                if cmd.starts_with(line) && *cmd != line {
                    return Some(cmd[line.len()..].to_string());
                }
            }
        }
        None
    }
}

impl Highlighter for QueryHelper {}
impl Validator for QueryHelper {}
impl Helper for QueryHelper {}

struct TabCompleteOrAcceptHint;

impl ConditionalEventHandler for TabCompleteOrAcceptHint {
    fn handle(
        &self,
        _evt: &Event,
        _n: RepeatCount,
        _positive: bool,
        ctx: &EventContext<'_>,
    ) -> Option<Cmd> {
        if ctx.has_hint() {
            Some(Cmd::CompleteHint)
        } else {
            Some(Cmd::Complete)
        }
    }
}

/// Session state.
struct ReplState {
    config: EngineConfig,
    session: Option<DatasetSession>,
}

impl ReplState {
    fn session(&mut self) -> Option<&mut DatasetSession> {
        if self.session.is_none() {
            eprintln!("  No dataset loaded. Use /load <file.json>.");
        }
        self.session.as_mut()
    }
}

/// Run the interactive REPL.
pub fn run(data_path: Option<&str>, config: EngineConfig) -> anyhow::Result<()> {
    eprintln!();
    eprintln!(
        "  \x1b[32m\u{25c9}\x1b[0m \x1b[1mqueryfx v{}\x1b[0m \x1b[90m- query JSON rows with lambda expressions\x1b[0m",
        env!("CARGO_PKG_VERSION")
    );
    eprintln!();
    eprintln!(
        "    Press \x1b[36m/\x1b[0m to browse commands, \x1b[90mTab\x1b[0m to complete, \x1b[90m/exit\x1b[0m to quit."
    );
    eprintln!();

    let rl_config = Config::builder()
        .history_ignore_space(true)
        .auto_add_history(true)
        .completion_type(CompletionType::List)
        .completion_prompt_limit(20)
        .build();

    let mut rl: Editor<QueryHelper, rustyline::history::DefaultHistory> =
        Editor::with_config(rl_config)?;
    rl.set_helper(Some(QueryHelper));
    rl.bind_sequence(
        KeyEvent::from('\t'),
        EventHandler::Conditional(Box::new(TabCompleteOrAcceptHint)),
    );

    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    let hist_path = std::path::PathBuf::from(&home).join(".queryfx_history");
    if hist_path.exists() {
        let _ = rl.load_history(&hist_path);
    }

    let mut state = ReplState {
        config,
        session: None,
    };
    let path = resolve_data_path(data_path);
    match DatasetSession::open(&path, state.config.clone()) {
        Ok(session) => {
            eprintln!("  Loaded: {path} ({} rows)", session.count());
            state.session = Some(session);
        }
        Err(ReplError::DatasetNotFound(_)) if data_path.is_none() => {}
        Err(e) => eprintln!("  Failed to load: {e}"),
    }
    let prompt = " \x1b[36mfx>\x1b[0m ";

    loop {
        match rl.readline(prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let Some(input) = line.strip_prefix('/') else {
                    cmd_eval(line, &state);
                    continue;
                };
                if input.is_empty() {
                    cmd_help();
                    continue;
                }

                let (cmd, args) = input.split_once(' ').unwrap_or((input, ""));
                let args = args.trim();

                match cmd {
                    "exit" | "quit" => {
                        eprintln!("  \x1b[90m\u{2728}\x1b[0m Goodbye!");
                        break;
                    }
                    "help" | "h" | "?" => cmd_help(),
                    "clear" | "cls" => eprint!("\x1b[2J\x1b[H"),
                    "load" => cmd_load(args, &mut state),
                    "where" => cmd_where(args, &mut state),
                    "select" => cmd_select(args, &mut state),
                    "orderby" => cmd_order(args, Direction::Ascending, &mut state),
                    "orderbydesc" => cmd_order(args, Direction::Descending, &mut state),
                    "first" => cmd_first(args, &mut state),
                    "single" => cmd_single(args, &mut state),
                    "count" => {
                        if let Some(session) = state.session() {
                            eprintln!("  {} of {} rows", session.count(), session.loaded_count());
                        }
                    }
                    "show" => {
                        if let Some(session) = state.session() {
                            print_json(&session.rows());
                        }
                    }
                    "reset" => {
                        if let Some(session) = state.session() {
                            session.reset();
                            eprintln!("  Restored {} rows", session.count());
                        }
                    }
                    _ => {
                        eprintln!("  Unknown command '/{cmd}'. Type /help for commands.");
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                eprintln!("  \x1b[90m(Ctrl+C)\x1b[0m Type \x1b[1m/exit\x1b[0m to quit.");
            }
            Err(ReadlineError::Eof) => {
                eprintln!("  \x1b[90m\u{2728}\x1b[0m Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("  Error: {err}");
                break;
            }
        }
    }

    let _ = std::fs::create_dir_all(hist_path.parent().unwrap_or(std::path::Path::new(".")));
    let _ = rl.save_history(&hist_path);

    Ok(())
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => eprintln!("  Error: {e}"),
    }
}

fn report(err: &ReplError) {
    if is_expression_error(err) {
        eprintln!("  \x1b[33m{err}\x1b[0m");
    } else {
        eprintln!("  Error: {err}");
    }
}

fn cmd_help() {
    eprintln!();
    eprintln!("  Commands:");
    eprintln!();
    for (cmd, desc) in COMMANDS {
        eprintln!("    {cmd:<18} {desc}");
    }
    eprintln!();
    eprintln!("  Anything else is run as code, e.g. Enumerable.Range(1, 3).Sum()");
    eprintln!("  Tip: Tab completion works for commands, key types and .json files.");
    eprintln!();
}

fn cmd_eval(code: &str, state: &ReplState) {
    let result = match &state.session {
        Some(session) => session.eval(code),
        None => run_with(&Engine::new(state.config.clone()), code).map_err(ReplError::from),
    };
    match result {
        Ok(Some(value)) => print_json(&value),
        Ok(None) => {}
        Err(e) => report(&e),
    }
}

fn cmd_load(args: &str, state: &mut ReplState) {
    if args.is_empty() {
        eprintln!("  Usage: /load <file.json>");
        return;
    }
    let path = args.split_whitespace().next().unwrap_or(args);
    match DatasetSession::open(path, state.config.clone()) {
        Ok(session) => {
            eprintln!("  Loaded: {path} ({} rows)", session.count());
            state.session = Some(session);
        }
        Err(e) => eprintln!("  Failed to load: {e}"),
    }
}

fn cmd_where(args: &str, state: &mut ReplState) {
    if args.is_empty() {
        eprintln!("  Usage: /where <predicate>");
        return;
    }
    if let Some(session) = state.session() {
        match session.filter(args) {
            Ok(count) => eprintln!("  {count} rows"),
            Err(e) => report(&e),
        }
    }
}

fn cmd_select(args: &str, state: &mut ReplState) {
    if args.is_empty() {
        eprintln!("  Usage: /select <selector>");
        return;
    }
    if let Some(session) = state.session() {
        match session.select(args) {
            Ok(values) => print_json(&values),
            Err(e) => report(&e),
        }
    }
}

fn cmd_order(args: &str, direction: Direction, state: &mut ReplState) {
    let Some((key, expr)) = args.split_once(' ') else {
        eprintln!("  Usage: /orderby <bool|int|double|char|string> <key selector>");
        return;
    };
    let key = match parse_key_type(key) {
        Ok(key) => key,
        Err(e) => {
            report(&e);
            return;
        }
    };
    if let Some(session) = state.session() {
        match session.order(expr.trim(), key, direction) {
            Ok(()) => eprintln!("  Ordered {} rows by {key}", session.count()),
            Err(e) => report(&e),
        }
    }
}

fn optional(args: &str) -> Option<&str> {
    (!args.is_empty()).then_some(args)
}

fn cmd_first(args: &str, state: &mut ReplState) {
    if let Some(session) = state.session() {
        match session.first(optional(args)) {
            Ok(row) => print_json(&row),
            Err(e) => report(&e),
        }
    }
}

fn cmd_single(args: &str, state: &mut ReplState) {
    if let Some(session) = state.session() {
        match session.single(optional(args)) {
            Ok(row) => print_json(&row),
            Err(e) => report(&e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_args() {
        assert_eq!(optional(""), None);
        assert_eq!(optional("x => true"), Some("x => true"));
    }

    #[test]
    fn test_command_hints() {
        let helper = QueryHelper;
        let history = rustyline::history::DefaultHistory::new();
        let ctx = rustyline::Context::new(&history);
        assert_eq!(helper.hint("/orderbyd", 9, &ctx).as_deref(), Some("esc"));
        assert_eq!(helper.hint("/exit", 5, &ctx), None);
    }
}
