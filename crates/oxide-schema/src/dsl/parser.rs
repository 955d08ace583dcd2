//! Recursive-descent parser for Schemafiles.

use super::lexer::{Lexer, Token, TokenKind};
use crate::error::{Result, SchemaError};
use crate::options::{OptionMap, OptionValue};
use crate::schema::{ColumnDeclaration, TableDeclaration};

/// Parses Schemafile source into table declarations, in file order.
pub fn parse_schemafile(input: &str) -> Result<Vec<TableDeclaration>> {
    Parser::new(Lexer::new(input).tokenize()?).parse_file()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    const fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> &TokenKind {
        self.tokens
            .get(self.pos)
            .map_or(&TokenKind::Eof, |t| &t.kind)
    }

    fn peek_at(&self, offset: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map_or(&TokenKind::Eof, |t| &t.kind)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |t| t.line)
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        kind
    }

    fn error(&self, message: impl Into<String>) -> SchemaError {
        SchemaError::Parse {
            line: self.line(),
            message: message.into(),
        }
    }

    fn expect(&mut self, expected: &TokenKind, what: &str) -> Result<()> {
        if self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!("expected {what}, found {:?}", self.peek())))
        }
    }

    fn expect_word(&mut self, word: &str) -> Result<()> {
        self.expect(&TokenKind::Ident(word.to_string()), &format!("`{word}`"))
    }

    fn is_word(&self, word: &str) -> bool {
        matches!(self.peek(), TokenKind::Ident(w) if w == word)
    }

    fn parse_file(&mut self) -> Result<Vec<TableDeclaration>> {
        let mut tables = Vec::new();
        loop {
            match self.peek().clone() {
                TokenKind::Eof => return Ok(tables),
                TokenKind::Ident(w) if w == "require" => {
                    self.advance();
                    self.parse_name("required file")?;
                }
                TokenKind::Ident(w) if w == "create_table" => {
                    let table = self.parse_create_table()?;
                    if tables.iter().any(|t: &TableDeclaration| t.name == table.name) {
                        return Err(self.error(format!("table `{}` is defined twice", table.name)));
                    }
                    tables.push(table);
                }
                other => return Err(self.error(format!("unexpected {other:?} at top level"))),
            }
        }
    }

    /// `"name"` or `:name`.
    fn parse_name(&mut self, what: &str) -> Result<String> {
        match self.advance() {
            TokenKind::Str(s) | TokenKind::Symbol(s) => Ok(s),
            other => Err(self.error(format!("expected {what}, found {other:?}"))),
        }
    }

    fn parse_create_table(&mut self) -> Result<TableDeclaration> {
        self.expect_word("create_table")?;
        let mut table = TableDeclaration::new(self.parse_name("table name")?);
        if self.peek() == &TokenKind::Comma {
            self.advance();
            table.options = self.parse_pairs()?;
        }

        self.expect_word("do")?;
        self.expect(&TokenKind::Pipe, "`|`")?;
        let var = match self.advance() {
            TokenKind::Ident(v) => v,
            other => return Err(self.error(format!("expected block variable, found {other:?}"))),
        };
        self.expect(&TokenKind::Pipe, "`|`")?;

        while !self.is_word("end") {
            if self.peek() == &TokenKind::Eof {
                return Err(self.error(format!("missing `end` for table `{}`", table.name)));
            }
            let column = self.parse_column(&var)?;
            if table.get_column(&column.name).is_some() {
                return Err(self.error(format!(
                    "column `{}` is defined twice in `{}`",
                    column.name, table.name
                )));
            }
            table.columns.push(column);
        }
        self.expect_word("end")?;
        Ok(table)
    }

    fn parse_column(&mut self, var: &str) -> Result<ColumnDeclaration> {
        self.expect_word(var)?;
        self.expect(&TokenKind::Dot, "`.`")?;
        let type_name = match self.advance() {
            TokenKind::Ident(t) => t,
            other => return Err(self.error(format!("expected column type, found {other:?}"))),
        };
        let mut column = ColumnDeclaration::new(self.parse_name("column name")?, type_name);
        if self.peek() == &TokenKind::Comma {
            self.advance();
            column.options = self.parse_pairs()?;
        }
        Ok(column)
    }

    /// `key: value, :key => value, ...`
    fn parse_pairs(&mut self) -> Result<OptionMap> {
        let mut map = OptionMap::new();
        loop {
            let arrow = self.peek_at(1) == &TokenKind::Arrow;
            let key = match self.peek().clone() {
                TokenKind::Label(k) => {
                    self.advance();
                    k
                }
                TokenKind::Symbol(k) | TokenKind::Str(k) if arrow => {
                    self.advance();
                    self.advance();
                    k
                }
                other => return Err(self.error(format!("expected option key, found {other:?}"))),
            };
            let value = self.parse_value()?;
            if map.insert(key.clone(), value).is_some() {
                return Err(self.error(format!("duplicate option `{key}`")));
            }
            if self.peek() != &TokenKind::Comma {
                return Ok(map);
            }
            self.advance();
        }
    }

    fn parse_value(&mut self) -> Result<OptionValue> {
        match self.advance() {
            TokenKind::Str(s) => Ok(OptionValue::String(s)),
            TokenKind::Symbol(s) => Ok(OptionValue::Symbol(s)),
            TokenKind::Int(i) => Ok(OptionValue::Integer(i)),
            TokenKind::Ident(w) => match w.as_str() {
                "true" => Ok(OptionValue::Bool(true)),
                "false" => Ok(OptionValue::Bool(false)),
                "nil" => Ok(OptionValue::Nil),
                _ => Err(self.error(format!("unexpected word `{w}` in option value"))),
            },
            TokenKind::LeftBracket => {
                let mut items = Vec::new();
                while self.peek() != &TokenKind::RightBracket {
                    items.push(self.parse_value()?);
                    if self.peek() == &TokenKind::Comma {
                        self.advance();
                    } else {
                        break;
                    }
                }
                self.expect(&TokenKind::RightBracket, "`]`")?;
                Ok(OptionValue::Array(items))
            }
            TokenKind::LeftBrace => {
                let map = if self.peek() == &TokenKind::RightBrace {
                    OptionMap::new()
                } else {
                    self.parse_pairs()?
                };
                self.expect(&TokenKind::RightBrace, "`}`")?;
                Ok(OptionValue::Map(map))
            }
            other => Err(self.error(format!("expected option value, found {other:?}"))),
        }
    }
}
