//! Recursive descent parser for executable GraphQL documents.

use crate::ast::*;
use crate::lexer::{block_string_value, string_value, Lexer};
use crate::token::{Token, TokenKind};
use cinder_core::{diagnostics::codes, DiagnosticBag, LineIndex, Span};
use miette::SourceSpan;
use thiserror::Error;

/// Parser for executable documents.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    source: &'a str,
    current: Token,
    /// End offset of the last consumed token.
    prev_end: u32,
    diagnostics: DiagnosticBag,
}

/// Result of parsing.
pub struct ParseResult {
    pub document: Document,
    pub diagnostics: DiagnosticBag,
}

/// The first syntax error of a document that failed to parse.
#[derive(Debug, Clone, Error, miette::Diagnostic)]
#[error("{message}")]
pub struct SyntaxError {
    pub message: String,
    #[label("here")]
    pub span: SourceSpan,
    /// Number of errors reported in total.
    pub count: usize,
}

/// Parses a source string into a document, collecting diagnostics.
pub fn parse(source: &str) -> ParseResult {
    let mut parser = Parser::new(source);
    let document = parser.parse_document();
    ParseResult {
        document,
        diagnostics: parser.diagnostics,
    }
}

/// Parses a source string, failing on the first syntax error.
pub fn parse_executable(source: &str) -> Result<Document, SyntaxError> {
    let ParseResult {
        document,
        diagnostics,
    } = parse(source);

    let count = diagnostics.errors().count();
    let result = match diagnostics.errors().next() {
        Some(first) => Err(SyntaxError {
            message: first.primary_message().to_string(),
            span: first.primary_span().unwrap_or_default().into(),
            count,
        }),
        None => Ok(document),
    };
    result
}

impl<'a> Parser<'a> {
    /// Creates a new parser.
    pub fn new(source: &'a str) -> Self {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token();
        Self {
            lexer,
            source,
            current,
            prev_end: 0,
            diagnostics: DiagnosticBag::new(),
        }
    }

    #[inline]
    fn at(&self) -> TokenKind {
        self.current.kind
    }

    #[inline]
    fn at_kind(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn advance(&mut self) {
        self.prev_end = self.current.span.end;
        self.current = self.lexer.next_token();
    }

    /// Consumes the current token if it has the given kind.
    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at_kind(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> bool {
        if self.eat(kind) {
            true
        } else {
            self.error_expected(&kind.to_string());
            false
        }
    }

    fn current_text(&self) -> &'a str {
        self.lexer.span_text(self.current.span)
    }

    fn span_from(&self, start: u32) -> Span {
        Span::new(start, self.prev_end.max(start))
    }

    fn error(&mut self, code: &'static str, message: impl Into<String>) {
        let message = message.into();
        self.diagnostics
            .error(code, "syntax error", self.current.span, message);
    }

    fn error_expected(&mut self, expected: &str) {
        let code = if self.at_kind(TokenKind::Eof) {
            codes::UNEXPECTED_EOF
        } else {
            codes::UNEXPECTED_TOKEN
        };
        let found = self.at();
        self.error(code, format!("expected {expected}, found {found}"));
    }

    /// Parses a document.
    pub fn parse_document(&mut self) -> Document {
        let start = self.current.span.start;
        let mut definitions = Vec::new();

        while !self.at_kind(TokenKind::Eof) {
            match self.at() {
                TokenKind::Query
                | TokenKind::Mutation
                | TokenKind::Subscription
                | TokenKind::LBrace => {
                    definitions.push(Definition::Operation(self.parse_operation()));
                }
                TokenKind::Fragment => {
                    definitions.push(Definition::Fragment(self.parse_fragment_definition()));
                }
                kind if kind.is_type_system()
                    || matches!(
                        kind,
                        TokenKind::StringLiteral | TokenKind::BlockStringLiteral
                    ) =>
                {
                    self.error(
                        codes::NOT_EXECUTABLE,
                        "type system definitions are not allowed in an executable document",
                    );
                    self.skip_definition();
                }
                _ => {
                    self.error(codes::INVALID_SYNTAX, "expected an operation or fragment");
                    self.skip_definition();
                }
            }
        }

        Document {
            definitions,
            span: Span::new(start, self.current.span.end),
            line_index: LineIndex::new(self.source),
        }
    }

    /// Skips tokens up to the end of the current (unparseable) definition.
    fn skip_definition(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.at() {
                TokenKind::Eof => return,
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        self.advance();
                        return;
                    }
                }
                _ => {}
            }
            self.advance();
        }
    }

    /// Parses a name. Keywords are valid names outside their keyword position.
    fn parse_name(&mut self) -> Name {
        let span = self.current.span;
        if self.at_kind(TokenKind::Ident) || self.at().is_keyword() {
            let name = Name::new(self.current_text(), span);
            self.advance();
            name
        } else {
            self.error_expected("name");
            if !self.at_kind(TokenKind::Eof) {
                self.advance();
            }
            Name::new(String::new(), span)
        }
    }

    /// Parses an operation definition.
    fn parse_operation(&mut self) -> OperationDefinition {
        let start = self.current.span.start;

        if self.at_kind(TokenKind::LBrace) {
            let selection_set = self.parse_selection_set();
            return OperationDefinition {
                operation: OperationType::Query,
                name: None,
                variables: Vec::new(),
                directives: Vec::new(),
                selection_set,
                span: self.span_from(start),
            };
        }

        let operation = match self.at() {
            TokenKind::Mutation => OperationType::Mutation,
            TokenKind::Subscription => OperationType::Subscription,
            _ => OperationType::Query,
        };
        self.advance();

        let name = if self.at_kind(TokenKind::Ident) || self.at().is_keyword() {
            Some(self.parse_name())
        } else {
            None
        };

        let variables = if self.eat(TokenKind::LParen) {
            let mut vars = Vec::new();
            while !self.at_kind(TokenKind::RParen) && !self.at_kind(TokenKind::Eof) {
                vars.push(self.parse_variable_definition());
            }
            self.expect(TokenKind::RParen);
            vars
        } else {
            Vec::new()
        };

        let directives = self.parse_directives(false);
        let selection_set = self.parse_selection_set();

        OperationDefinition {
            operation,
            name,
            variables,
            directives,
            selection_set,
            span: self.span_from(start),
        }
    }

    /// Parses a variable definition.
    fn parse_variable_definition(&mut self) -> VariableDefinition {
        let start = self.current.span.start;
        if !self.expect(TokenKind::Dollar) {
            self.advance();
        }
        let name = self.parse_name();
        self.expect(TokenKind::Colon);
        let ty = self.parse_type();

        let default_value = if self.eat(TokenKind::Eq) {
            Some(self.parse_value(true))
        } else {
            None
        };

        let directives = self.parse_directives(true);

        VariableDefinition {
            name,
            ty,
            default_value,
            directives,
            span: self.span_from(start),
        }
    }

    /// Parses a type reference.
    fn parse_type(&mut self) -> Type {
        let start = self.current.span.start;

        let ty = if self.eat(TokenKind::LBracket) {
            let inner = self.parse_type();
            self.expect(TokenKind::RBracket);
            Type::List(Box::new(inner), self.span_from(start))
        } else {
            Type::Named(self.parse_name())
        };

        if self.eat(TokenKind::Bang) {
            Type::NonNull(Box::new(ty), self.span_from(start))
        } else {
            ty
        }
    }

    /// Parses a fragment definition.
    fn parse_fragment_definition(&mut self) -> FragmentDefinition {
        let start = self.current.span.start;
        self.advance(); // fragment

        let name = self.parse_name();
        if name.value == "on" {
            self.diagnostics.error(
                codes::INVALID_SYNTAX,
                "syntax error",
                name.span,
                "a fragment cannot be named 'on'",
            );
        }
        self.expect(TokenKind::On);
        let type_condition = self.parse_name();
        let directives = self.parse_directives(false);
        let selection_set = self.parse_selection_set();

        FragmentDefinition {
            name,
            type_condition,
            directives,
            selection_set,
            span: self.span_from(start),
        }
    }

    /// Parses a selection set.
    fn parse_selection_set(&mut self) -> SelectionSet {
        let start = self.current.span.start;
        self.expect(TokenKind::LBrace);

        let mut selections = Vec::new();
        while !self.at_kind(TokenKind::RBrace) && !self.at_kind(TokenKind::Eof) {
            selections.push(self.parse_selection());
        }
        if selections.is_empty() {
            self.error_expected("a selection");
        }
        self.expect(TokenKind::RBrace);

        SelectionSet {
            selections,
            span: self.span_from(start),
        }
    }

    /// Parses a selection.
    fn parse_selection(&mut self) -> Selection {
        let start = self.current.span.start;
        if !self.eat(TokenKind::Spread) {
            return Selection::Field(self.parse_field());
        }

        if self.eat(TokenKind::On) {
            let type_condition = Some(self.parse_name());
            let directives = self.parse_directives(false);
            let selection_set = self.parse_selection_set();
            Selection::InlineFragment(InlineFragment {
                type_condition,
                directives,
                selection_set,
                span: self.span_from(start),
            })
        } else if self.at_kind(TokenKind::LBrace) || self.at_kind(TokenKind::At) {
            let directives = self.parse_directives(false);
            let selection_set = self.parse_selection_set();
            Selection::InlineFragment(InlineFragment {
                type_condition: None,
                directives,
                selection_set,
                span: self.span_from(start),
            })
        } else {
            let name = self.parse_name();
            let directives = self.parse_directives(false);
            Selection::FragmentSpread(FragmentSpread {
                name,
                directives,
                span: self.span_from(start),
            })
        }
    }

    /// Parses a field selection.
    fn parse_field(&mut self) -> Field {
        let start = self.current.span.start;

        let first_name = self.parse_name();
        let (alias, name) = if self.eat(TokenKind::Colon) {
            (Some(first_name), self.parse_name())
        } else {
            (None, first_name)
        };

        let arguments = self.parse_arguments(false);
        let directives = self.parse_directives(false);

        let selection_set = if self.at_kind(TokenKind::LBrace) {
            Some(self.parse_selection_set())
        } else {
            None
        };

        Field {
            alias,
            name,
            arguments,
            directives,
            selection_set,
            span: self.span_from(start),
        }
    }

    fn parse_directives(&mut self, is_const: bool) -> Vec<Directive> {
        let mut directives = Vec::new();
        while self.at_kind(TokenKind::At) {
            let start = self.current.span.start;
            self.advance();
            let name = self.parse_name();
            let arguments = self.parse_arguments(is_const);
            directives.push(Directive {
                name,
                arguments,
                span: self.span_from(start),
            });
        }
        directives
    }

    fn parse_arguments(&mut self, is_const: bool) -> Vec<Argument> {
        let mut args = Vec::new();
        if !self.eat(TokenKind::LParen) {
            return args;
        }

        while !self.at_kind(TokenKind::RParen) && !self.at_kind(TokenKind::Eof) {
            let start = self.current.span.start;
            let name = self.parse_name();
            self.expect(TokenKind::Colon);
            let value = self.parse_value(is_const);
            args.push(Argument {
                name,
                value,
                span: self.span_from(start),
            });
        }
        self.expect(TokenKind::RParen);
        args
    }

    /// Parses a value literal. Variables are rejected in constant positions.
    fn parse_value(&mut self, is_const: bool) -> Value {
        let start = self.current.span.start;

        match self.at() {
            TokenKind::Dollar => {
                self.advance();
                let name = self.parse_name();
                if is_const {
                    self.diagnostics.error(
                        codes::INVALID_SYNTAX,
                        "syntax error",
                        name.span,
                        format!("variable ${} is not allowed in a constant value", name.value),
                    );
                }
                Value::Variable(name)
            }
            TokenKind::IntLiteral => {
                let parsed = self.current_text().parse::<i64>();
                if parsed.is_err() {
                    self.error(codes::INVALID_NUMBER, "integer literal out of range");
                }
                self.advance();
                Value::Int(parsed.unwrap_or_default(), self.span_from(start))
            }
            TokenKind::FloatLiteral => {
                let parsed = self.current_text().parse::<f64>();
                if parsed.is_err() {
                    self.error(codes::INVALID_NUMBER, "invalid float literal");
                }
                self.advance();
                Value::Float(parsed.unwrap_or_default(), self.span_from(start))
            }
            TokenKind::StringLiteral => {
                let decoded = string_value(self.current_text());
                if decoded.is_none() {
                    self.error(codes::INVALID_SYNTAX, "invalid escape sequence in string");
                }
                self.advance();
                Value::String(decoded.unwrap_or_default(), self.span_from(start))
            }
            TokenKind::BlockStringLiteral => {
                let decoded = block_string_value(self.current_text());
                self.advance();
                Value::String(decoded, self.span_from(start))
            }
            TokenKind::True => {
                self.advance();
                Value::Boolean(true, self.span_from(start))
            }
            TokenKind::False => {
                self.advance();
                Value::Boolean(false, self.span_from(start))
            }
            TokenKind::Null => {
                self.advance();
                Value::Null(self.span_from(start))
            }
            TokenKind::LBracket => {
                self.advance();
                let mut values = Vec::new();
                while !self.at_kind(TokenKind::RBracket) && !self.at_kind(TokenKind::Eof) {
                    values.push(self.parse_value(is_const));
                }
                self.expect(TokenKind::RBracket);
                Value::List(values, self.span_from(start))
            }
            TokenKind::LBrace => {
                self.advance();
                let mut fields = Vec::new();
                while !self.at_kind(TokenKind::RBrace) && !self.at_kind(TokenKind::Eof) {
                    let name = self.parse_name();
                    self.expect(TokenKind::Colon);
                    let value = self.parse_value(is_const);
                    fields.push((name, value));
                }
                self.expect(TokenKind::RBrace);
                Value::Object(fields, self.span_from(start))
            }
            kind if kind == TokenKind::Ident || kind.is_keyword() => Value::Enum(self.parse_name()),
            TokenKind::Error => {
                self.error(codes::INVALID_SYNTAX, "invalid token");
                self.advance();
                Value::Null(self.span_from(start))
            }
            _ => {
                self.error_expected("value");
                if !self.at_kind(TokenKind::Eof) {
                    self.advance();
                }
                Value::Null(self.span_from(start))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Document {
        match parse_executable(source) {
            Ok(doc) => doc,
            Err(err) => panic!("unexpected syntax error: {err}"),
        }
    }

    fn first_field(doc: &Document) -> &Field {
        let op = doc.operations().next().expect("operation");
        match &op.selection_set.selections[0] {
            Selection::Field(field) => field,
            other => panic!("expected field, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_anonymous_query() {
        let doc = parse_ok("{ hello world }");
        let op = doc.operations().next().unwrap();
        assert_eq!(op.operation, OperationType::Query);
        assert!(op.name.is_none());
        assert_eq!(op.selection_set.selections.len(), 2);
    }

    #[test]
    fn test_parse_named_operation_with_variables() {
        let doc = parse_ok(
            r#"
            mutation Rename($id: ID!, $names: [String!] = ["a", "b"]) {
                rename(id: $id, names: $names) { id }
            }
        "#,
        );
        let op = doc.operations().next().unwrap();
        assert_eq!(op.operation, OperationType::Mutation);
        assert_eq!(op.name(), Some("Rename"));
        assert_eq!(op.variables.len(), 2);
        assert_eq!(op.variables[0].ty.to_string(), "ID!");
        assert_eq!(op.variables[1].ty.to_string(), "[String!]");
        assert!(matches!(
            op.variables[1].default_value,
            Some(Value::List(ref items, _)) if items.len() == 2
        ));
    }

    #[test]
    fn test_parse_alias_arguments_and_directives() {
        let doc = parse_ok(r#"{ me: user(id: 4, filter: { tags: [$t] }) @skip(if: $flag) { name } }"#);
        let field = first_field(&doc);
        assert_eq!(field.response_key(), "me");
        assert_eq!(field.name.as_str(), "user");
        assert_eq!(field.arguments.len(), 2);
        assert_eq!(field.directives[0].name.as_str(), "skip");
        assert!(field.selection_set.is_some());
    }

    #[test]
    fn test_parse_fragments() {
        let doc = parse_ok(
            r#"
            query { pet { ...PetFields ... on Dog { barks } ... @include(if: true) { name } } }
            fragment PetFields on Pet { name }
        "#,
        );
        assert_eq!(doc.operations().count(), 1);
        let fragment = doc.fragment("PetFields").unwrap();
        assert_eq!(fragment.type_condition.as_str(), "Pet");

        let pet = first_field(&doc);
        let selections = &pet.selection_set.as_ref().unwrap().selections;
        assert!(matches!(selections[0], Selection::FragmentSpread(_)));
        assert!(matches!(
            &selections[1],
            Selection::InlineFragment(f) if f.type_condition.as_ref().unwrap().as_str() == "Dog"
        ));
        assert!(matches!(
            &selections[2],
            Selection::InlineFragment(f) if f.type_condition.is_none() && f.directives.len() == 1
        ));
    }

    #[test]
    fn test_keywords_as_field_names() {
        let doc = parse_ok("{ type query: on }");
        let op = doc.operations().next().unwrap();
        assert_eq!(op.selection_set.selections.len(), 2);
    }

    #[test]
    fn test_rejects_type_system_definitions() {
        let result = parse("type Query { hello: String } { hello }");
        assert!(result.diagnostics.has_errors());
        assert_eq!(result.document.operations().count(), 1);
    }

    #[test]
    fn test_variables_rejected_in_defaults() {
        let err = parse_executable("query ($a: Int = $b) { f(a: $a) }").unwrap_err();
        assert!(err.message.contains("not allowed"));
    }

    #[test]
    fn test_syntax_error_reports_position() {
        let err = parse_executable("{ a(x: ) }").unwrap_err();
        assert_eq!(err.message, "expected value, found ')'");
        assert_eq!(err.span.offset(), 7);
    }

    #[test]
    fn test_locations() {
        let doc = parse_ok("query {\n  a\n  b\n}");
        let op = doc.operations().next().unwrap();
        let Selection::Field(b) = &op.selection_set.selections[1] else {
            panic!("expected field");
        };
        let loc = doc.location(b.span);
        assert_eq!((loc.line, loc.column), (3, 3));
    }

    #[test]
    fn test_parse_tree_snapshot() {
        let doc = parse_ok("{ a: b(x: [1, ENUM]) }");
        let field = first_field(&doc);
        let summary = format!(
            "{} <- {}({})",
            field.response_key(),
            field.name.as_str(),
            field
                .arguments
                .iter()
                .map(|a| format!("{}: {:?}", a.name.as_str(), a.value))
                .collect::<Vec<_>>()
                .join(", ")
        );
        insta::assert_snapshot!(summary, @r#"a <- b(x: List([Int(1, Span { start: 11, end: 12 }), Enum(Name { value: "ENUM", span: Span { start: 14, end: 18 } })], Span { start: 10, end: 19 }))"#);
    }
}
