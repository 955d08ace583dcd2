//! Schemafile tokenizer.

use crate::error::{Result, SchemaError};

/// Token kinds of the Schemafile DSL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Bare word: `create_table`, `t`, `do`, `true`, `nil`, ...
    Ident(String),
    /// Hash label `key:`.
    Label(String),
    /// `:symbol`.
    Symbol(String),
    /// Double- or single-quoted string, unescaped.
    Str(String),
    /// Integer literal.
    Int(i64),
    /// `,`
    Comma,
    /// `.`
    Dot,
    /// `|`
    Pipe,
    /// `{`
    LeftBrace,
    /// `}`
    RightBrace,
    /// `[`
    LeftBracket,
    /// `]`
    RightBracket,
    /// `=>`
    Arrow,
    /// End of input.
    Eof,
}

/// A token and the 1-based line it starts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Token kind.
    pub kind: TokenKind,
    /// Line number.
    pub line: usize,
}

/// A lexer over Schemafile source.
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    line: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input.
    #[must_use]
    pub const fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
        }
    }

    /// Tokenizes the whole input, ending with [`TokenKind::Eof`].
    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if eof {
                return Ok(tokens);
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_next(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> SchemaError {
        SchemaError::Parse {
            line: self.line,
            message: message.into(),
        }
    }

    /// Skips whitespace and `#` comments.
    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.peek().is_some_and(char::is_whitespace) {
                self.advance();
            }
            if self.peek() == Some('#') {
                while self.peek().is_some_and(|c| c != '\n') {
                    self.advance();
                }
                continue;
            }
            break;
        }
    }

    fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace_and_comments();
        let line = self.line;
        let token = |kind| Ok(Token { kind, line });

        let Some(c) = self.peek() else {
            return token(TokenKind::Eof);
        };

        match c {
            ',' | '.' | '|' | '{' | '}' | '[' | ']' => {
                self.advance();
                token(match c {
                    ',' => TokenKind::Comma,
                    '.' => TokenKind::Dot,
                    '|' => TokenKind::Pipe,
                    '{' => TokenKind::LeftBrace,
                    '}' => TokenKind::RightBrace,
                    '[' => TokenKind::LeftBracket,
                    _ => TokenKind::RightBracket,
                })
            }
            '=' if self.peek_next() == Some('>') => {
                self.advance();
                self.advance();
                token(TokenKind::Arrow)
            }
            '"' | '\'' => {
                let s = self.scan_string(c)?;
                // `"key": value` is a label too.
                if self.peek() == Some(':') && self.peek_next() != Some(':') {
                    self.advance();
                    return token(TokenKind::Label(s));
                }
                token(TokenKind::Str(s))
            }
            ':' if self.peek_next().is_some_and(is_ident_start) => {
                self.advance();
                token(TokenKind::Symbol(self.scan_word()))
            }
            ':' if matches!(self.peek_next(), Some('"' | '\'')) => {
                self.advance();
                let quote = self.peek().unwrap_or('"');
                token(TokenKind::Symbol(self.scan_string(quote)?))
            }
            '-' if self.peek_next().is_some_and(|d| d.is_ascii_digit()) => {
                token(TokenKind::Int(self.scan_integer()?))
            }
            c if c.is_ascii_digit() => token(TokenKind::Int(self.scan_integer()?)),
            c if is_ident_start(c) => {
                let word = self.scan_word();
                if self.peek() == Some(':') && self.peek_next() != Some(':') {
                    self.advance();
                    return token(TokenKind::Label(word));
                }
                token(TokenKind::Ident(word))
            }
            other => Err(self.error(format!("unexpected character '{other}'"))),
        }
    }

    fn scan_word(&mut self) -> String {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '?' || c == '!')
        {
            self.advance();
        }
        self.input[start..self.pos].to_string()
    }

    /// Scans an optionally negative integer; the sign is parsed with the
    /// digits so `i64::MIN` fits.
    fn scan_integer(&mut self) -> Result<i64> {
        let mut digits = String::new();
        if self.peek() == Some('-') {
            self.advance();
            digits.push('-');
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                digits.push(c);
            } else if c != '_' {
                break;
            }
            self.advance();
        }
        digits
            .parse()
            .map_err(|_| self.error(format!("integer literal out of range: {digits}")))
    }

    /// Scans a string opened by `quote`. Single-quoted strings only
    /// unescape `\\` and `\'`, as in Ruby.
    fn scan_string(&mut self, quote: char) -> Result<String> {
        self.advance();
        let mut value = String::new();
        loop {
            match self.advance() {
                Some(c) if c == quote => return Ok(value),
                Some('\\') if quote == '\'' => match self.advance() {
                    Some(c @ ('\\' | '\'')) => value.push(c),
                    Some(other) => {
                        value.push('\\');
                        value.push(other);
                    }
                    None => break,
                },
                Some('\\') => match self.advance() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some(other) => value.push(other),
                    None => break,
                },
                Some(c) => value.push(c),
                None => break,
            }
        }
        Err(self.error("unterminated string literal"))
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_create_table_header() {
        assert_eq!(
            kinds(r#"create_table "users", id: :bigint, auto_random: 5 do |t|"#),
            vec![
                TokenKind::Ident("create_table".into()),
                TokenKind::Str("users".into()),
                TokenKind::Comma,
                TokenKind::Label("id".into()),
                TokenKind::Symbol("bigint".into()),
                TokenKind::Comma,
                TokenKind::Label("auto_random".into()),
                TokenKind::Int(5),
                TokenKind::Ident("do".into()),
                TokenKind::Pipe,
                TokenKind::Ident("t".into()),
                TokenKind::Pipe,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_and_lines() {
        let tokens = Lexer::new("# -*- mode: ruby -*-\n\n  t.string \"a\\\"b\"")
            .tokenize()
            .unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Ident("t".into()));
        assert_eq!(tokens[0].line, 3);
        assert_eq!(tokens[3].kind, TokenKind::Str("a\"b".into()));
    }

    #[test]
    fn test_negative_integer_and_arrow() {
        assert_eq!(
            kinds(":default => -1"),
            vec![
                TokenKind::Symbol("default".into()),
                TokenKind::Arrow,
                TokenKind::Int(-1),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_smallest_integer() {
        assert_eq!(
            kinds("-9223372036854775808"),
            vec![TokenKind::Int(i64::MIN), TokenKind::Eof]
        );
        assert!(Lexer::new("9223372036854775808").tokenize().is_err());
    }

    #[test]
    fn test_single_quoted_strings() {
        assert_eq!(
            kinds(r"comment: 'it\'s a\n', 'key': :'odd sym'"),
            vec![
                TokenKind::Label("comment".into()),
                TokenKind::Str("it's a\\n".into()),
                TokenKind::Comma,
                TokenKind::Label("key".into()),
                TokenKind::Symbol("odd sym".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_unterminated_string() {
        let err = Lexer::new("\n\"abc").tokenize().unwrap_err();
        assert!(matches!(err, SchemaError::Parse { line: 2, .. }));
    }
}
