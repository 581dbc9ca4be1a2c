//! Token kinds and structures for executable GraphQL documents.

use cinder_core::Span;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The kind of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum TokenKind {
    // Special tokens
    Eof,
    Error,

    // Literals
    Ident,
    IntLiteral,
    FloatLiteral,
    StringLiteral,
    BlockStringLiteral,

    // Keywords
    Query,
    Mutation,
    Subscription,
    Fragment,
    On,
    True,
    False,
    Null,

    // Type-system keywords, recognized so they can be rejected
    Type,
    Interface,
    Union,
    Enum,
    Input,
    Scalar,
    Schema,
    Extend,
    Directive,

    // Punctuation
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Colon,
    Spread,
    Eq,
    At,
    Bang,
    Dollar,
}

impl TokenKind {
    #[must_use]
    pub const fn is_keyword(self) -> bool {
        matches!(
            self,
            Self::Query
                | Self::Mutation
                | Self::Subscription
                | Self::Fragment
                | Self::On
                | Self::True
                | Self::False
                | Self::Null
                | Self::Type
                | Self::Interface
                | Self::Union
                | Self::Enum
                | Self::Input
                | Self::Scalar
                | Self::Schema
                | Self::Extend
                | Self::Directive
        )
    }

    /// Returns true for keywords that only appear in type-system documents.
    #[must_use]
    pub const fn is_type_system(self) -> bool {
        matches!(
            self,
            Self::Type
                | Self::Interface
                | Self::Union
                | Self::Enum
                | Self::Input
                | Self::Scalar
                | Self::Schema
                | Self::Extend
                | Self::Directive
        )
    }

    #[must_use]
    pub fn from_keyword(s: &str) -> Option<Self> {
        Some(match s {
            "query" => Self::Query,
            "mutation" => Self::Mutation,
            "subscription" => Self::Subscription,
            "fragment" => Self::Fragment,
            "on" => Self::On,
            "true" => Self::True,
            "false" => Self::False,
            "null" => Self::Null,
            "type" => Self::Type,
            "interface" => Self::Interface,
            "union" => Self::Union,
            "enum" => Self::Enum,
            "input" => Self::Input,
            "scalar" => Self::Scalar,
            "schema" => Self::Schema,
            "extend" => Self::Extend,
            "directive" => Self::Directive,
            _ => return None,
        })
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Eof => "end of file",
            Self::Error => "invalid token",
            Self::Ident => "name",
            Self::IntLiteral => "integer",
            Self::FloatLiteral => "float",
            Self::StringLiteral => "string",
            Self::BlockStringLiteral => "block string",
            Self::Query => "'query'",
            Self::Mutation => "'mutation'",
            Self::Subscription => "'subscription'",
            Self::Fragment => "'fragment'",
            Self::On => "'on'",
            Self::True => "'true'",
            Self::False => "'false'",
            Self::Null => "'null'",
            Self::Type => "'type'",
            Self::Interface => "'interface'",
            Self::Union => "'union'",
            Self::Enum => "'enum'",
            Self::Input => "'input'",
            Self::Scalar => "'scalar'",
            Self::Schema => "'schema'",
            Self::Extend => "'extend'",
            Self::Directive => "'directive'",
            Self::LBrace => "'{'",
            Self::RBrace => "'}'",
            Self::LParen => "'('",
            Self::RParen => "')'",
            Self::LBracket => "'['",
            Self::RBracket => "']'",
            Self::Colon => "':'",
            Self::Spread => "'...'",
            Self::Eq => "'='",
            Self::At => "'@'",
            Self::Bang => "'!'",
            Self::Dollar => "'$'",
        };
        write!(f, "{s}")
    }
}

/// A token with its kind and span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    #[must_use]
    pub const fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}
