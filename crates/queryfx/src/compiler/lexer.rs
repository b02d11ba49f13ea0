//! Tokenizer for the expression language.

use crate::error::Diagnostic;

/// A lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    Char(char),
    /// Operators and punctuation.
    Punct(&'static str),
    Eof,
}

/// A token with its character offset.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub pos: usize,
}

/// Longest first so that `=>` wins over `=`.
const PUNCTUATION: &[&str] = &[
    "=>", "==", "!=", "<=", ">=", "&&", "||", "??", "++", "--", "+=", "-=", "*=", "/=", "(", ")",
    "{", "}", "[", "]", ",", ".", ";", "?", ":", "=", "<", ">", "+", "-", "*", "/", "%", "!",
];

pub fn tokenize(input: &str) -> Result<Vec<Spanned>, Diagnostic> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    'outer: while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        // Line comment
        if c == '/' && chars.get(i + 1) == Some(&'/') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }

        let start = i;

        if c == '"' {
            i += 1;
            let mut s = String::new();
            loop {
                match chars.get(i) {
                    None => return Err(Diagnostic::syntax(start, "unterminated string literal")),
                    Some('"') => break,
                    Some('\\') => {
                        s.push(escape(&chars, i + 1)?);
                        i += 2;
                    }
                    Some(ch) => {
                        s.push(*ch);
                        i += 1;
                    }
                }
            }
            i += 1;
            tokens.push(Spanned {
                token: Token::Str(s),
                pos: start,
            });
            continue;
        }

        if c == '\'' {
            let (ch, width) = match chars.get(i + 1) {
                Some('\\') => (escape(&chars, i + 2)?, 2),
                Some('\'') | None => {
                    return Err(Diagnostic::syntax(start, "empty character literal"))
                }
                Some(ch) => (*ch, 1),
            };
            if chars.get(i + 1 + width) != Some(&'\'') {
                return Err(Diagnostic::syntax(start, "too many characters in character literal"));
            }
            i += 2 + width;
            tokens.push(Spanned {
                token: Token::Char(ch),
                pos: start,
            });
            continue;
        }

        if c.is_ascii_digit() {
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let mut is_float = false;
            if chars.get(i) == Some(&'.') && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit()) {
                is_float = true;
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            let text: String = chars[start..i].iter().collect();
            // Numeric suffixes: d/D marks a double, l/L a long.
            match chars.get(i) {
                Some('d' | 'D') => {
                    is_float = true;
                    i += 1;
                }
                Some('l' | 'L') => i += 1,
                _ => {}
            }
            let token = if is_float {
                Token::Float(
                    text.parse()
                        .map_err(|_| Diagnostic::syntax(start, format!("invalid number: {text}")))?,
                )
            } else {
                Token::Int(text.parse().map_err(|_| {
                    Diagnostic::syntax(start, format!("integral constant is too large: {text}"))
                })?)
            };
            tokens.push(Spanned { token, pos: start });
            continue;
        }

        if c.is_alphabetic() || c == '_' || c == '@' {
            i += 1;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            tokens.push(Spanned {
                token: Token::Ident(word.trim_start_matches('@').to_string()),
                pos: start,
            });
            continue;
        }

        for p in PUNCTUATION {
            let len = p.chars().count();
            if chars.len() - i >= len && p.chars().zip(&chars[i..]).all(|(a, b)| a == *b) {
                tokens.push(Spanned {
                    token: Token::Punct(p),
                    pos: start,
                });
                i += len;
                continue 'outer;
            }
        }

        return Err(Diagnostic::syntax(start, format!("unexpected character '{c}'")));
    }

    tokens.push(Spanned {
        token: Token::Eof,
        pos: chars.len(),
    });
    Ok(tokens)
}

fn escape(chars: &[char], at: usize) -> Result<char, Diagnostic> {
    Ok(match chars.get(at) {
        Some('n') => '\n',
        Some('t') => '\t',
        Some('r') => '\r',
        Some('0') => '\0',
        Some('\\') => '\\',
        Some('"') => '"',
        Some('\'') => '\'',
        Some(other) => {
            return Err(Diagnostic::syntax(
                at - 1,
                format!("unrecognized escape sequence '\\{other}'"),
            ))
        }
        None => return Err(Diagnostic::syntax(at - 1, "unterminated escape sequence")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<Token> {
        tokenize(input).unwrap().into_iter().map(|t| t.token).collect()
    }

    #[test]
    fn test_lambda_tokens() {
        assert_eq!(
            kinds("x => x % 2 == 0"),
            vec![
                Token::Ident("x".into()),
                Token::Punct("=>"),
                Token::Ident("x".into()),
                Token::Punct("%"),
                Token::Int(2),
                Token::Punct("=="),
                Token::Int(0),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_literals() {
        assert_eq!(
            kinds(r#""a\"b" 'c' 1.5 2d 7L"#),
            vec![
                Token::Str("a\"b".into()),
                Token::Char('c'),
                Token::Float(1.5),
                Token::Float(2.0),
                Token::Int(7),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_member_access_on_int_is_not_float() {
        assert_eq!(
            kinds("1.ToString()"),
            vec![
                Token::Int(1),
                Token::Punct("."),
                Token::Ident("ToString".into()),
                Token::Punct("("),
                Token::Punct(")"),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_positions() {
        let tokens = tokenize("a  +b").unwrap();
        assert_eq!(tokens[1].pos, 3);
        assert_eq!(tokens[2].pos, 4);
    }

    #[test]
    fn test_errors() {
        assert!(tokenize("\"open").is_err());
        assert!(tokenize("'ab'").is_err());
        assert!(tokenize("''").is_err());
        assert!(tokenize("x # y").is_err());
        assert!(tokenize("99999999999999999999").is_err());
    }
}
