//! Syntax layer for Cinder.
//!
//! This crate provides:
//! - `token`: Token kinds and token structures
//! - `lexer`: Tokenization
//! - `ast`: Owned AST for executable documents
//! - `parser`: Recursive descent parser

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::*;
pub use lexer::Lexer;
pub use parser::{parse, parse_executable, ParseResult, Parser, SyntaxError};
pub use token::{Token, TokenKind};
