//! Abstract syntax tree for executable GraphQL documents.
//!
//! The tree is fully owned so that a parsed document can be shared across
//! tasks (behind an `Arc`) for as long as an execution or a subscription needs it.

use cinder_core::{LineCol, LineIndex, Span};

/// A parsed executable document.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub definitions: Vec<Definition>,
    pub span: Span,
    pub line_index: LineIndex,
}

impl Document {
    /// Returns all operation definitions in document order.
    pub fn operations(&self) -> impl Iterator<Item = &OperationDefinition> {
        self.definitions.iter().filter_map(|def| match def {
            Definition::Operation(op) => Some(op),
            Definition::Fragment(_) => None,
        })
    }

    /// Returns all fragment definitions in document order.
    pub fn fragments(&self) -> impl Iterator<Item = &FragmentDefinition> {
        self.definitions.iter().filter_map(|def| match def {
            Definition::Fragment(fragment) => Some(fragment),
            Definition::Operation(_) => None,
        })
    }

    /// Looks up a fragment definition by name.
    pub fn fragment(&self, name: &str) -> Option<&FragmentDefinition> {
        self.fragments().find(|f| f.name.value == name)
    }

    /// Converts a span start into a 1-based line/column position.
    #[must_use]
    pub fn location(&self, span: Span) -> LineCol {
        self.line_index.line_col(span.start)
    }
}

/// A top-level definition.
#[derive(Debug, Clone)]
pub enum Definition {
    Operation(OperationDefinition),
    Fragment(FragmentDefinition),
}

/// Type of operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationType {
    Query,
    Mutation,
    Subscription,
}

impl OperationType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
            Self::Subscription => "subscription",
        }
    }
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operation definition.
#[derive(Debug, Clone)]
pub struct OperationDefinition {
    pub operation: OperationType,
    pub name: Option<Name>,
    pub variables: Vec<VariableDefinition>,
    pub directives: Vec<Directive>,
    pub selection_set: SelectionSet,
    pub span: Span,
}

impl OperationDefinition {
    /// Returns the operation name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_ref().map(Name::as_str)
    }
}

/// Variable definition.
#[derive(Debug, Clone)]
pub struct VariableDefinition {
    pub name: Name,
    pub ty: Type,
    pub default_value: Option<Value>,
    pub directives: Vec<Directive>,
    pub span: Span,
}

/// Type reference as written in a variable definition.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    /// Named type: `User`
    Named(Name),
    /// List type: `[User]`
    List(Box<Type>, Span),
    /// Non-null type: `User!`
    NonNull(Box<Type>, Span),
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name.as_str()),
            Self::List(inner, _) => write!(f, "[{inner}]"),
            Self::NonNull(inner, _) => write!(f, "{inner}!"),
        }
    }
}

/// Fragment definition.
#[derive(Debug, Clone)]
pub struct FragmentDefinition {
    pub name: Name,
    pub type_condition: Name,
    pub directives: Vec<Directive>,
    pub selection_set: SelectionSet,
    pub span: Span,
}

/// Selection set.
#[derive(Debug, Clone, Default)]
pub struct SelectionSet {
    pub selections: Vec<Selection>,
    pub span: Span,
}

/// Selection.
#[derive(Debug, Clone)]
pub enum Selection {
    Field(Field),
    FragmentSpread(FragmentSpread),
    InlineFragment(InlineFragment),
}

/// Field selection.
#[derive(Debug, Clone)]
pub struct Field {
    pub alias: Option<Name>,
    pub name: Name,
    pub arguments: Vec<Argument>,
    pub directives: Vec<Directive>,
    pub selection_set: Option<SelectionSet>,
    pub span: Span,
}

impl Field {
    /// The key this field is stored under in the response.
    pub fn response_key(&self) -> &str {
        self.alias.as_ref().unwrap_or(&self.name).as_str()
    }

    /// Looks up an argument by name.
    pub fn argument(&self, name: &str) -> Option<&Argument> {
        self.arguments.iter().find(|a| a.name.value == name)
    }
}

/// Fragment spread.
#[derive(Debug, Clone)]
pub struct FragmentSpread {
    pub name: Name,
    pub directives: Vec<Directive>,
    pub span: Span,
}

/// Inline fragment.
#[derive(Debug, Clone)]
pub struct InlineFragment {
    pub type_condition: Option<Name>,
    pub directives: Vec<Directive>,
    pub selection_set: SelectionSet,
    pub span: Span,
}

/// Directive usage.
#[derive(Debug, Clone)]
pub struct Directive {
    pub name: Name,
    pub arguments: Vec<Argument>,
    pub span: Span,
}

impl Directive {
    /// Looks up an argument by name.
    pub fn argument(&self, name: &str) -> Option<&Argument> {
        self.arguments.iter().find(|a| a.name.value == name)
    }
}

/// Argument.
#[derive(Debug, Clone)]
pub struct Argument {
    pub name: Name,
    pub value: Value,
    pub span: Span,
}

/// Input value literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Variable(Name),
    Int(i64, Span),
    Float(f64, Span),
    String(String, Span),
    Boolean(bool, Span),
    Null(Span),
    Enum(Name),
    List(Vec<Value>, Span),
    Object(Vec<(Name, Value)>, Span),
}

impl Value {
    /// Returns the span covered by this literal.
    pub fn span(&self) -> Span {
        match self {
            Self::Variable(name) | Self::Enum(name) => name.span,
            Self::Int(_, span)
            | Self::Float(_, span)
            | Self::String(_, span)
            | Self::Boolean(_, span)
            | Self::Null(span)
            | Self::List(_, span)
            | Self::Object(_, span) => *span,
        }
    }
}

/// Name with span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Name {
    pub value: String,
    pub span: Span,
}

impl Name {
    pub fn new(value: impl Into<String>, span: Span) -> Self {
        Self {
            value: value.into(),
            span,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}
