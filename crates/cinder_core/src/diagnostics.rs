//! Diagnostic reporting for Cinder.

use crate::span::Span;

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticSeverity {
    /// An error that prevents the document from being executed.
    Error,
    /// A warning that doesn't prevent execution.
    Warning,
}

/// A label attached to a diagnostic.
#[derive(Debug, Clone)]
pub struct Label {
    /// The span this label points to.
    pub span: Span,
    /// The label message.
    pub message: String,
}

impl Label {
    /// Creates a new label.
    pub fn new(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
        }
    }
}

/// A diagnostic message.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Severity level.
    pub severity: DiagnosticSeverity,
    /// Error code.
    pub code: &'static str,
    /// Short title.
    pub title: String,
    /// Labels pointing to source locations.
    pub labels: Vec<Label>,
}

impl Diagnostic {
    /// Creates a new error diagnostic.
    pub fn error(code: &'static str, title: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            code,
            title: title.into(),
            labels: Vec::new(),
        }
    }

    /// Creates a new warning diagnostic.
    pub fn warning(code: &'static str, title: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            code,
            title: title.into(),
            labels: Vec::new(),
        }
    }

    /// Adds a primary label at a span.
    #[must_use]
    pub fn with_span(mut self, span: Span, message: impl Into<String>) -> Self {
        self.labels.push(Label::new(span, message));
        self
    }

    /// Returns the primary span, if any.
    pub fn primary_span(&self) -> Option<Span> {
        self.labels.first().map(|l| l.span)
    }

    /// Returns the message of the primary label, falling back to the title.
    pub fn primary_message(&self) -> &str {
        self.labels
            .first()
            .map_or(self.title.as_str(), |l| l.message.as_str())
    }
}

/// A collection of diagnostics.
#[derive(Debug, Default)]
pub struct DiagnosticBag {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticBag {
    /// Creates a new empty diagnostic bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a diagnostic.
    pub fn add(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Adds an error diagnostic.
    pub fn error(
        &mut self,
        code: &'static str,
        title: impl Into<String>,
        span: Span,
        message: impl Into<String>,
    ) {
        self.add(Diagnostic::error(code, title).with_span(span, message));
    }

    /// Returns true if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    /// Returns an iterator over errors.
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == DiagnosticSeverity::Error)
    }

    /// Returns an iterator over all diagnostics.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    /// Returns true if there are no diagnostics.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Returns the number of diagnostics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }
}

impl IntoIterator for DiagnosticBag {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.diagnostics.into_iter()
    }
}

/// Common diagnostic codes.
pub mod codes {
    pub const UNEXPECTED_TOKEN: &str = "E0001";
    pub const UNEXPECTED_EOF: &str = "E0002";
    pub const INVALID_SYNTAX: &str = "E0003";
    pub const INVALID_NUMBER: &str = "E0004";
    pub const UNTERMINATED_STRING: &str = "E0005";
    pub const NOT_EXECUTABLE: &str = "E0010";
}
