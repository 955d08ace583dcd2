//! The Schemafile DSL: `create_table "name", opts do |t| ... end` blocks.

mod lexer;
mod parser;
mod writer;

pub use lexer::{Lexer, Token, TokenKind};
pub use parser::parse_schemafile;
pub use writer::{write_schemafile, write_table, SCHEMAFILE_HEADER};
