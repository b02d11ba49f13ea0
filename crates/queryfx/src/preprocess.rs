//! Single-quote literal dialect.
//!
//! Typing `"` inside a host string is awkward, so expressions may quote
//! strings with `'…'`. A character literal is written with doubled quotes
//! on each side (`''x''`).
//!
//! Two passes, always both, in order:
//! 1. a `'` with no `'` directly before or after it becomes `"`;
//! 2. every remaining `''` collapses to `'`.

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::{Captures, Regex};

fn quote_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("'+").expect("quote run regex is valid"))
}

/// Rewrite the single-quote dialect into literal syntax the compiler accepts.
pub fn preprocess(code: &str) -> Cow<'_, str> {
    if !code.contains('\'') {
        return Cow::Borrowed(code);
    }

    // A quote is isolated exactly when its run of consecutive quotes has length 1.
    let isolated = quote_runs().replace_all(code, |caps: &Captures<'_>| {
        let run = &caps[0];
        if run.len() == 1 {
            "\"".to_string()
        } else {
            run.to_string()
        }
    });

    Cow::Owned(isolated.replace("''", "'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isolated_quotes_become_string_literal() {
        assert_eq!(preprocess("'hello'"), "\"hello\"");
        assert_eq!(preprocess("x == '2'"), "x == \"2\"");
    }

    #[test]
    fn test_doubled_quotes_become_char_literal() {
        assert_eq!(preprocess("''X''"), "'X'");
        assert_eq!(preprocess("x == ''b''"), "x == 'b'");
    }

    #[test]
    fn test_text_without_single_quotes_is_untouched() {
        for code in [
            "",
            "x => x % 2 == 0",
            "x => x == \"2\"",
            "new { Element = x, Length = x.Length }",
        ] {
            assert_eq!(preprocess(code), code);
            assert!(matches!(preprocess(code), Cow::Borrowed(_)));
        }
    }

    #[test]
    fn test_double_quoted_literals_survive() {
        assert_eq!(preprocess("x == \"a\" || x == 'b'"), "x == \"a\" || x == \"b\"");
    }

    #[test]
    fn test_mixed_string_and_char_literals() {
        assert_eq!(
            preprocess("string.Join(', ', xs) + ''!''"),
            "string.Join(\", \", xs) + '!'"
        );
    }

    #[test]
    fn test_runs_longer_than_two() {
        // Pass 1 leaves the run of three alone; pass 2 collapses the first pair.
        assert_eq!(preprocess("'''"), "''");
        assert_eq!(preprocess("''''"), "''");
    }
}
