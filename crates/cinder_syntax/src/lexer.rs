//! Lexer for executable GraphQL documents.

use crate::token::{Token, TokenKind};
use cinder_core::Span;

/// A lexer over GraphQL source text.
pub struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: u32,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
        }
    }

    /// Peeks at the current byte without consuming.
    #[inline]
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos as usize).copied()
    }

    /// Peeks at the byte at offset from current position.
    #[inline]
    fn peek_at(&self, offset: u32) -> Option<u8> {
        self.bytes.get((self.pos + offset) as usize).copied()
    }

    #[inline]
    fn advance(&mut self) {
        self.pos += 1;
    }

    #[inline]
    fn advance_by(&mut self, n: u32) {
        self.pos += n;
    }

    /// Advances while `pred` holds for the current byte.
    fn eat_while(&mut self, pred: impl Fn(u8) -> bool) {
        while self.peek().is_some_and(&pred) {
            self.advance();
        }
    }

    /// Scans the next token.
    pub fn next_token(&mut self) -> Token {
        self.skip_trivia();

        let start = self.pos;

        let Some(c) = self.peek() else {
            return Token::new(TokenKind::Eof, Span::new(start, start));
        };

        let kind = match c {
            b'{' => self.single(TokenKind::LBrace),
            b'}' => self.single(TokenKind::RBrace),
            b'(' => self.single(TokenKind::LParen),
            b')' => self.single(TokenKind::RParen),
            b'[' => self.single(TokenKind::LBracket),
            b']' => self.single(TokenKind::RBracket),
            b':' => self.single(TokenKind::Colon),
            b'=' => self.single(TokenKind::Eq),
            b'@' => self.single(TokenKind::At),
            b'!' => self.single(TokenKind::Bang),
            b'$' => self.single(TokenKind::Dollar),
            b'.' => {
                if self.peek_at(1) == Some(b'.') && self.peek_at(2) == Some(b'.') {
                    self.advance_by(3);
                    TokenKind::Spread
                } else {
                    self.single(TokenKind::Error)
                }
            }
            b'"' => self.scan_string(),
            b'-' | b'0'..=b'9' => self.scan_number(),
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.scan_identifier(),
            _ => {
                // Consume a whole UTF-8 scalar so spans stay on char boundaries.
                let width = self.source[self.pos as usize..]
                    .chars()
                    .next()
                    .map_or(1, char::len_utf8);
                self.advance_by(width as u32);
                TokenKind::Error
            }
        };

        Token::new(kind, Span::new(start, self.pos))
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    /// Skips whitespace, commas, comments and the byte-order mark.
    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\r' | b'\n' | b',') => self.advance(),
                Some(b'#') => {
                    let rest = &self.bytes[self.pos as usize..];
                    match memchr::memchr(b'\n', rest) {
                        Some(newline) => self.advance_by(newline as u32),
                        None => self.pos = self.bytes.len() as u32,
                    }
                }
                Some(0xEF) if self.peek_at(1) == Some(0xBB) && self.peek_at(2) == Some(0xBF) => {
                    self.advance_by(3);
                }
                _ => break,
            }
        }
    }

    /// Scans an identifier or keyword.
    fn scan_identifier(&mut self) -> TokenKind {
        let start = self.pos as usize;
        self.eat_while(|c| c.is_ascii_alphanumeric() || c == b'_');
        let text = &self.source[start..self.pos as usize];
        TokenKind::from_keyword(text).unwrap_or(TokenKind::Ident)
    }

    /// Scans a number literal.
    fn scan_number(&mut self) -> TokenKind {
        let mut is_float = false;

        if self.peek() == Some(b'-') {
            self.advance();
        }

        if !self.peek().is_some_and(|c| c.is_ascii_digit()) {
            return TokenKind::Error;
        }

        if self.peek() == Some(b'0') {
            self.advance();
        } else {
            self.eat_while(|c| c.is_ascii_digit());
        }

        if self.peek() == Some(b'.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            self.advance();
            self.eat_while(|c| c.is_ascii_digit());
        }

        if let Some(b'e' | b'E') = self.peek() {
            is_float = true;
            self.advance();
            if let Some(b'+' | b'-') = self.peek() {
                self.advance();
            }
            self.eat_while(|c| c.is_ascii_digit());
        }

        // A name directly after a number (`12abc`) is not a valid literal.
        if self
            .peek()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == b'_' || c == b'.')
        {
            self.eat_while(|c| c.is_ascii_alphanumeric() || c == b'_' || c == b'.');
            return TokenKind::Error;
        }

        if is_float {
            TokenKind::FloatLiteral
        } else {
            TokenKind::IntLiteral
        }
    }

    /// Scans a string literal.
    fn scan_string(&mut self) -> TokenKind {
        self.advance();

        if self.peek() == Some(b'"') && self.peek_at(1) == Some(b'"') {
            self.advance_by(2);
            return self.scan_block_string();
        }

        loop {
            match self.peek() {
                None | Some(b'\n') => return TokenKind::Error,
                Some(b'"') => {
                    self.advance();
                    return TokenKind::StringLiteral;
                }
                Some(b'\\') => self.advance_by(2),
                _ => self.advance(),
            }
        }
    }

    /// Scans a block string literal.
    fn scan_block_string(&mut self) -> TokenKind {
        loop {
            match self.peek() {
                None => return TokenKind::Error,
                Some(b'"') if self.peek_at(1) == Some(b'"') && self.peek_at(2) == Some(b'"') => {
                    self.advance_by(3);
                    return TokenKind::BlockStringLiteral;
                }
                Some(b'\\')
                    if self.peek_at(1) == Some(b'"')
                        && self.peek_at(2) == Some(b'"')
                        && self.peek_at(3) == Some(b'"') =>
                {
                    self.advance_by(4);
                }
                _ => self.advance(),
            }
        }
    }

    /// Gets the text at the given span.
    pub fn span_text(&self, span: Span) -> &'a str {
        &self.source[span.start as usize..span.end as usize]
    }
}

/// Decodes the contents of a quoted string token, including its quotes.
///
/// Returns `None` when an escape sequence is malformed.
pub fn string_value(raw: &str) -> Option<String> {
    let inner = raw.get(1..raw.len().checked_sub(1)?)?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            '"' => out.push('"'),
            '\\' => out.push('\\'),
            '/' => out.push('/'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'u' => {
                let hex: String = chars.by_ref().take(4).collect();
                let code = u32::from_str_radix(&hex, 16).ok()?;
                out.push(char::from_u32(code)?);
            }
            _ => return None,
        }
    }

    Some(out)
}

/// Decodes a block string token, including its triple quotes.
///
/// Common indentation is removed and leading/trailing blank lines dropped.
pub fn block_string_value(raw: &str) -> String {
    let inner = raw
        .get(3..raw.len().saturating_sub(3))
        .unwrap_or_default()
        .replace("\\\"\"\"", "\"\"\"");
    let lines: Vec<&str> = inner.lines().collect();

    let indent = lines
        .iter()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut dedented: Vec<&str> = lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            if i == 0 {
                *line
            } else {
                line.get(indent..).unwrap_or_else(|| line.trim_start())
            }
        })
        .collect();

    while dedented.first().is_some_and(|line| line.trim().is_empty()) {
        dedented.remove(0);
    }
    while dedented.last().is_some_and(|line| line.trim().is_empty()) {
        dedented.pop();
    }

    dedented.join("\n")
}

/// Tokenizes the entire source.
pub fn tokenize(source: &str) -> Vec<Token> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();

    loop {
        let token = lexer.next_token();
        let is_eof = token.kind == TokenKind::Eof;
        tokens.push(token);
        if is_eof {
            break;
        }
    }

    tokens
}
