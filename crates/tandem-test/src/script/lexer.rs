//! Tokenizer for the script language.

use tandem_bridge::Diagnostic;

/// Token kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Tok {
    Ident(String),
    Str(String),
    Int(i64),
    Punct(&'static str),
}

impl std::fmt::Display for Tok {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ident(s) => f.write_str(s),
            Self::Str(s) => write!(f, "\"{s}\""),
            Self::Int(n) => write!(f, "{n}"),
            Self::Punct(p) => f.write_str(p),
        }
    }
}

/// A token and where it starts, 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    pub(crate) tok: Tok,
    pub(crate) line: usize,
    pub(crate) col: usize,
}

/// Diagnostic at a position, in the `(line,col): error CSxxxx: message` form.
pub(crate) fn diagnostic(line: usize, col: usize, code: &str, message: &str) -> Diagnostic {
    Diagnostic::new(format!("({line},{col}): error {code}: {message}"))
}

const PUNCT: [&str; 14] = [
    "=>", "{", "}", "(", ")", "[", "]", ";", ",", ".", "<", ">", "+", "=",
];

struct Cursor<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    col: usize,
}

impl Cursor<'_> {
    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line = self.line.saturating_add(1);
            self.col = 1;
        } else {
            self.col = self.col.saturating_add(1);
        }
        Some(c)
    }
}

/// Split `source` into tokens, dropping whitespace and comments.
pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>, Diagnostic> {
    let mut cursor = Cursor {
        chars: source.chars().peekable(),
        line: 1,
        col: 1,
    };
    let mut tokens = Vec::new();

    while let Some(c) = cursor.peek() {
        let (line, col) = (cursor.line, cursor.col);

        if c.is_whitespace() {
            cursor.bump();
            continue;
        }

        if c == '/' {
            cursor.bump();
            match cursor.peek() {
                Some('/') => {
                    while cursor.peek().is_some_and(|c| c != '\n') {
                        cursor.bump();
                    }
                },
                Some('*') => {
                    cursor.bump();
                    let mut prev = '\0';
                    loop {
                        let Some(c) = cursor.bump() else {
                            return Err(diagnostic(line, col, "CS1035", "End-of-file found, '*/' expected"));
                        };
                        if prev == '*' && c == '/' {
                            break;
                        }
                        prev = c;
                    }
                },
                _ => return Err(diagnostic(line, col, "CS1525", "Invalid expression term '/'")),
            }
            continue;
        }

        if c.is_ascii_alphabetic() || c == '_' {
            let mut ident = String::new();
            while let Some(c) = cursor.peek().filter(|c| c.is_ascii_alphanumeric() || *c == '_') {
                ident.push(c);
                cursor.bump();
            }
            tokens.push(Token {
                tok: Tok::Ident(ident),
                line,
                col,
            });
            continue;
        }

        if c.is_ascii_digit() {
            let mut digits = String::new();
            while let Some(c) = cursor.peek().filter(char::is_ascii_digit) {
                digits.push(c);
                cursor.bump();
            }
            let value = digits.parse::<i64>().map_err(|_| {
                diagnostic(line, col, "CS1021", "Integral constant is too large")
            })?;
            tokens.push(Token {
                tok: Tok::Int(value),
                line,
                col,
            });
            continue;
        }

        if c == '"' {
            cursor.bump();
            let mut text = String::new();
            loop {
                match cursor.bump() {
                    None | Some('\n') => {
                        return Err(diagnostic(line, col, "CS1010", "Newline in constant"));
                    },
                    Some('"') => break,
                    Some('\\') => match cursor.bump() {
                        Some('n') => text.push('\n'),
                        Some('t') => text.push('\t'),
                        Some('r') => text.push('\r'),
                        Some('0') => text.push('\0'),
                        Some(c @ ('"' | '\\' | '\'')) => text.push(c),
                        _ => {
                            return Err(diagnostic(
                                cursor.line,
                                cursor.col,
                                "CS1009",
                                "Unrecognized escape sequence",
                            ));
                        },
                    },
                    Some(c) => text.push(c),
                }
            }
            tokens.push(Token {
                tok: Tok::Str(text),
                line,
                col,
            });
            continue;
        }

        cursor.bump();
        let punct = if c == '=' && cursor.peek() == Some('>') {
            cursor.bump();
            Some("=>")
        } else {
            PUNCT.iter().copied().find(|p| p.len() == 1 && p.starts_with(c))
        };
        let Some(punct) = punct else {
            return Err(diagnostic(
                line,
                col,
                "CS1056",
                &format!("Unexpected character '{c}'"),
            ));
        };
        tokens.push(Token {
            tok: Tok::Punct(punct),
            line,
            col,
        });
    }

    Ok(tokens)
}
