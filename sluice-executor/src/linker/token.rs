//! Tokenizer for the graph definition language.
//!
//! A character-at-a-time transducer. Tokens are classified as whitespace,
//! newline, comment, literal, or operator; literals sub-classify into
//! quoted strings (escapable with `"`, raw with `'`) and keywords. Each
//! token carries both its raw source text and its cooked (`parsed`) form,
//! plus the source location where it started.

use sluice_core::{Result, SluiceError};
use std::fmt;

/// A position in the script: byte-ish offset plus zero-based line/column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    /// Character offset from the start of the script.
    pub offset: usize,
    /// Zero-based line.
    pub line: usize,
    /// Zero-based column.
    pub col: usize,
}

impl Location {
    fn advance(&mut self, ch: char) {
        self.offset += 1;
        if ch == '\n' {
            self.line += 1;
            self.col = 0;
        } else {
            self.col += 1;
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:L{}C{}", self.offset, self.line + 1, self.col + 1)
    }
}

/// Build a located definition-language error.
pub fn parse_error(loc: Location, message: impl Into<String>) -> SluiceError {
    SluiceError::Parse {
        offset: loc.offset,
        line: loc.line,
        col: loc.col,
        message: message.into(),
    }
}

/// Keywords of the definition language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    /// `graph`: starts a named graph section.
    Graph,
    /// `arg`: declares build arguments with optional defaults.
    Arg,
    /// `op`: declares an operator (also implied by a leading name).
    Op,
    /// `in`: declares an ingress.
    In,
}

impl Keyword {
    fn parse(text: &str) -> Option<Self> {
        match text {
            "graph" => Some(Self::Graph),
            "arg" => Some(Self::Arg),
            "op" => Some(Self::Op),
            "in" => Some(Self::In),
            _ => None,
        }
    }
}

/// Sub-classification of literal tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    /// A bare word.
    Plain,
    /// A quoted string.
    Str,
    /// A bare word that is a language keyword.
    Keyword(Keyword),
}

/// Token classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Spaces and tabs between tokens.
    Space,
    /// A line break.
    Newline,
    /// `#` to end of line.
    Comment,
    /// A bare word, keyword, or quoted string.
    Literal(LiteralKind),
    /// One of `, = ( ) { } :`.
    Op(char),
}

/// One token with its location, raw text, and cooked text.
#[derive(Debug, Clone)]
pub struct Token {
    /// Where the token started.
    pub loc: Location,
    /// Classification.
    pub kind: TokenKind,
    /// Raw source text, including quotes and escapes.
    pub text: String,
    /// Cooked text: escapes resolved, quotes stripped.
    pub parsed: String,
}

impl Token {
    /// Whitespace (not newline).
    pub fn is_space(&self) -> bool {
        self.kind == TokenKind::Space
    }

    /// Line break.
    pub fn is_newline(&self) -> bool {
        self.kind == TokenKind::Newline
    }

    /// Comment to end of line.
    pub fn is_comment(&self) -> bool {
        self.kind == TokenKind::Comment
    }

    /// Any literal, including strings.
    pub fn is_literal(&self) -> bool {
        matches!(self.kind, TokenKind::Literal(_))
    }

    /// A symbol: any literal except a quoted string. Keywords qualify.
    pub fn is_sym(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Literal(LiteralKind::Plain) | TokenKind::Literal(LiteralKind::Keyword(_))
        )
    }

    /// The keyword, if this token is one.
    pub fn keyword(&self) -> Option<Keyword> {
        match self.kind {
            TokenKind::Literal(LiteralKind::Keyword(kw)) => Some(kw),
            _ => None,
        }
    }

    /// The operator character, if this token is an operator.
    pub fn op(&self) -> Option<char> {
        match self.kind {
            TokenKind::Op(ch) => Some(ch),
            _ => None,
        }
    }
}

fn is_op_char(ch: char) -> bool {
    ",=(){}:".contains(ch)
}

fn is_literal_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || "_$.@".contains(ch)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Comment,
    Literal,
    EscapableStr,
    Escape,
    RawStr,
}

/// Incremental tokenizer. Feed characters with [`push`](Tokenizer::push),
/// then call [`finish`](Tokenizer::finish); complete tokens are appended
/// to the output as soon as they end.
pub struct Tokenizer {
    state: State,
    cur: Location,
    start: Location,
    text: String,
    parsed: String,
}

impl Tokenizer {
    /// A fresh tokenizer at offset zero.
    pub fn new() -> Self {
        Self {
            state: State::Idle,
            cur: Location::default(),
            start: Location::default(),
            text: String::new(),
            parsed: String::new(),
        }
    }

    /// Consume one character, emitting any tokens it completes.
    pub fn push(&mut self, ch: char, out: &mut Vec<Token>) -> Result<()> {
        match self.state {
            State::Idle => {
                if ch == '#' {
                    self.emit(out, TokenKind::Space);
                    self.consume(ch, None);
                    self.state = State::Comment;
                } else if is_op_char(ch) {
                    self.emit(out, TokenKind::Space);
                    self.consume(ch, Some(ch));
                    self.emit(out, TokenKind::Op(ch));
                } else if ch == '\n' {
                    self.emit(out, TokenKind::Space);
                    self.consume(ch, Some(ch));
                    self.emit(out, TokenKind::Newline);
                } else if ch == '"' {
                    self.emit(out, TokenKind::Space);
                    self.consume(ch, None);
                    self.state = State::EscapableStr;
                } else if ch == '\'' {
                    self.emit(out, TokenKind::Space);
                    self.consume(ch, None);
                    self.state = State::RawStr;
                } else if is_literal_char(ch) {
                    self.emit(out, TokenKind::Space);
                    self.consume(ch, Some(ch));
                    self.state = State::Literal;
                } else if ch.is_whitespace() {
                    self.consume(ch, None);
                } else {
                    return Err(parse_error(self.cur, format!("illegal character '{ch}'")));
                }
            }
            State::Comment => {
                if ch == '\n' {
                    self.emit(out, TokenKind::Comment);
                    self.consume(ch, Some(ch));
                    self.emit(out, TokenKind::Newline);
                    self.state = State::Idle;
                } else {
                    self.consume(ch, Some(ch));
                }
            }
            State::Literal => {
                if ch == '#' {
                    self.emit_literal(out);
                    self.consume(ch, None);
                    self.state = State::Comment;
                } else if is_op_char(ch) {
                    self.emit_literal(out);
                    self.consume(ch, Some(ch));
                    self.emit(out, TokenKind::Op(ch));
                    self.state = State::Idle;
                } else if ch == '\n' {
                    self.emit_literal(out);
                    self.consume(ch, Some(ch));
                    self.emit(out, TokenKind::Newline);
                    self.state = State::Idle;
                } else if ch == '"' {
                    self.emit_literal(out);
                    self.consume(ch, None);
                    self.state = State::EscapableStr;
                } else if ch == '\'' {
                    self.emit_literal(out);
                    self.consume(ch, None);
                    self.state = State::RawStr;
                } else if ch.is_whitespace() {
                    self.emit_literal(out);
                    self.consume(ch, None);
                    self.state = State::Idle;
                } else if is_literal_char(ch) {
                    self.consume(ch, Some(ch));
                } else {
                    return Err(parse_error(self.cur, format!("illegal character '{ch}'")));
                }
            }
            State::EscapableStr => {
                if ch == '"' {
                    self.consume(ch, None);
                    self.emit(out, TokenKind::Literal(LiteralKind::Str));
                    self.state = State::Idle;
                } else if ch == '\\' {
                    self.consume(ch, None);
                    self.state = State::Escape;
                } else {
                    self.consume(ch, Some(ch));
                }
            }
            State::Escape => {
                let cooked = match ch {
                    'r' => '\r',
                    'n' => '\n',
                    't' => '\t',
                    'f' => '\x0c',
                    'a' => '\x07',
                    'b' => '\x08',
                    'v' => '\x0b',
                    other => other,
                };
                self.consume(ch, Some(cooked));
                self.state = State::EscapableStr;
            }
            State::RawStr => {
                if ch == '\'' {
                    self.consume(ch, None);
                    self.emit(out, TokenKind::Literal(LiteralKind::Str));
                    self.state = State::Idle;
                } else {
                    self.consume(ch, Some(ch));
                }
            }
        }
        Ok(())
    }

    /// Flush the trailing token. Fails inside an unterminated string or
    /// escape.
    pub fn finish(&mut self, out: &mut Vec<Token>) -> Result<()> {
        match self.state {
            State::Idle => self.emit(out, TokenKind::Space),
            State::Comment => self.emit(out, TokenKind::Comment),
            State::Literal => self.emit_literal(out),
            State::EscapableStr | State::RawStr => {
                return Err(parse_error(self.cur, "unexpected end of string"));
            }
            State::Escape => {
                return Err(parse_error(self.cur, "unexpected end of escape character"));
            }
        }
        Ok(())
    }

    fn emit_literal(&mut self, out: &mut Vec<Token>) {
        let kind = match Keyword::parse(&self.text) {
            Some(kw) => LiteralKind::Keyword(kw),
            None => LiteralKind::Plain,
        };
        self.emit(out, TokenKind::Literal(kind));
    }

    fn emit(&mut self, out: &mut Vec<Token>, kind: TokenKind) {
        if self.text.is_empty() {
            self.start = self.cur;
            return;
        }
        out.push(Token {
            loc: self.start,
            kind,
            text: std::mem::take(&mut self.text),
            parsed: std::mem::take(&mut self.parsed),
        });
        self.start = self.cur;
    }

    fn consume(&mut self, ch: char, cooked: Option<char>) {
        self.text.push(ch);
        if let Some(cooked) = cooked {
            self.parsed.push(cooked);
        }
        self.cur.advance(ch);
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Tokenize a complete script.
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokenizer = Tokenizer::new();
    let mut tokens = Vec::new();
    for ch in input.chars() {
        tokenizer.push(ch, &mut tokens)?;
    }
    tokenizer.finish(&mut tokens)?;
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input() {
        assert!(tokenize("").unwrap().is_empty());
    }

    #[test]
    fn comment() {
        let tokens = tokenize("# comment").unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Comment);
        assert_eq!(tokens[0].text, "# comment");
        assert_eq!(tokens[0].parsed, " comment");

        let tokens = tokenize(" \t# comment").unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].kind, TokenKind::Space);
        assert_eq!(tokens[0].text, " \t");
        assert_eq!(tokens[1].kind, TokenKind::Comment);
    }

    #[test]
    fn operators() {
        let source = ",=(){}:_.";
        let tokens = tokenize(source).unwrap();
        assert_eq!(tokens.len(), 8);
        for (i, expected) in source.chars().take(7).enumerate() {
            assert_eq!(tokens[i].op(), Some(expected));
        }
        assert!(tokens[7].is_literal());
        assert_eq!(tokens[7].text, "_.");

        let tokens = tokenize("abc,def").unwrap();
        assert_eq!(tokens.len(), 3);
        assert!(tokens[0].is_literal());
        assert_eq!(tokens[1].op(), Some(','));
        assert!(tokens[2].is_literal());
    }

    #[test]
    fn newlines() {
        let tokens = tokenize("\na\n").unwrap();
        assert_eq!(tokens.len(), 3);
        assert!(tokens[0].is_newline());
        assert!(tokens[1].is_literal());
        assert!(tokens[2].is_newline());

        let tokens = tokenize("# comment\r\n\r ,\na").unwrap();
        assert_eq!(tokens.len(), 6);
        assert!(tokens[0].is_comment());
        assert_eq!(tokens[0].text, "# comment\r");
        assert!(tokens[1].is_newline());
        assert!(tokens[2].is_space());
        assert_eq!(tokens[2].text, "\r ");
        assert_eq!(tokens[3].op(), Some(','));
        assert!(tokens[4].is_newline());
        assert!(tokens[5].is_literal());
    }

    #[test]
    fn escapable_string() {
        let tokens = tokenize(r#"abc"def\a\b\f\n\r\t\vg"123"#).unwrap();
        assert_eq!(tokens.len(), 3);
        assert!(tokens[0].is_sym());
        assert_eq!(tokens[0].text, "abc");
        assert_eq!(tokens[1].kind, TokenKind::Literal(LiteralKind::Str));
        assert_eq!(tokens[1].text, r#""def\a\b\f\n\r\t\vg""#);
        assert_eq!(tokens[1].parsed, "def\x07\x08\x0c\n\r\t\x0bg");
        assert!(tokens[2].is_sym());
        assert_eq!(tokens[2].parsed, "123");
    }

    #[test]
    fn raw_string_keeps_backslashes() {
        let tokens = tokenize(r"abc'def\ng'123").unwrap();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[1].kind, TokenKind::Literal(LiteralKind::Str));
        assert_eq!(tokens[1].text, r"'def\ng'");
        assert_eq!(tokens[1].parsed, r"def\ng");
    }

    #[test]
    fn keywords() {
        let tokens = tokenize("arg op in graph none").unwrap();
        assert_eq!(tokens.len(), 9);
        assert_eq!(tokens[0].keyword(), Some(Keyword::Arg));
        assert_eq!(tokens[2].keyword(), Some(Keyword::Op));
        assert_eq!(tokens[4].keyword(), Some(Keyword::In));
        assert_eq!(tokens[6].keyword(), Some(Keyword::Graph));
        assert_eq!(tokens[8].keyword(), None);
        assert!(tokens[8].is_sym());
    }

    #[test]
    fn string_adjacent_to_keyword() {
        let tokens = tokenize("'good'use arg").unwrap();
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[0].kind, TokenKind::Literal(LiteralKind::Str));
        assert_eq!(tokens[0].parsed, "good");
        assert!(!tokens[0].is_sym());
        assert!(tokens[1].is_sym());
        assert_eq!(tokens[1].parsed, "use");
        assert_eq!(tokens[3].keyword(), Some(Keyword::Arg));
    }

    #[test]
    fn unterminated_string_fails() {
        let err = tokenize(r#""abc"#).unwrap_err();
        assert_eq!(err.code(), "E201");
        assert!(format!("{}", err).contains("unexpected end of string"));
    }

    #[test]
    fn dangling_escape_fails() {
        let err = tokenize(r#""abc\"#).unwrap_err();
        assert!(format!("{}", err).contains("unexpected end of escape"));
    }

    #[test]
    fn illegal_character_is_located() {
        let err = tokenize("a\nb %").unwrap_err();
        let msg = format!("{}", err);
        assert!(msg.contains("illegal character"));
        assert!(msg.contains("4:L2C3"));
    }

    #[test]
    fn locations_track_lines_and_columns() {
        let tokens = tokenize("a\n bc").unwrap();
        // a, newline, space, bc
        assert_eq!(tokens[0].loc, Location { offset: 0, line: 0, col: 0 });
        assert_eq!(tokens[1].loc, Location { offset: 1, line: 0, col: 1 });
        assert_eq!(tokens[3].loc, Location { offset: 3, line: 1, col: 1 });
    }
}
