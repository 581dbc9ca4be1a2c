//! Errors reported by the executor.

use crate::path::{Path, PathSegment};
use cinder_core::LineCol;
use cinder_syntax::OperationType;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A source location in the query document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

impl From<LineCol> for Location {
    fn from(lc: LineCol) -> Self {
        Self {
            line: lc.line,
            column: lc.column,
        }
    }
}

/// A field error as it appears in a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    /// The error message.
    pub message: String,
    /// Locations of the selections that caused the error.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Location>,
    /// The path to the field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<PathSegment>>,
    /// Error extensions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<IndexMap<String, serde_json::Value>>,
}

impl FieldError {
    /// Creates a new field error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: Vec::new(),
            path: None,
            extensions: None,
        }
    }

    /// Adds a path to the error.
    #[must_use]
    pub fn with_path(mut self, path: &Path) -> Self {
        self.path = Some(path.segments());
        self
    }

    #[must_use]
    pub fn with_location(mut self, location: impl Into<Location>) -> Self {
        self.locations.push(location.into());
        self
    }

    #[must_use]
    pub fn with_locations(mut self, locations: impl IntoIterator<Item = Location>) -> Self {
        self.locations.extend(locations);
        self
    }

    /// Adds an extension.
    #[must_use]
    pub fn with_extension(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extensions
            .get_or_insert_with(IndexMap::new)
            .insert(key.into(), value);
        self
    }

    /// Sets the error code extension.
    #[must_use]
    pub fn with_code(self, code: impl Into<String>) -> Self {
        self.with_extension("code", serde_json::Value::String(code.into()))
    }
}

/// A request-level failure. No partial data is produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    #[error("Must provide an operation.")]
    NoOperation,

    #[error("Must provide operation name if query contains multiple operations.")]
    OperationNameRequired,

    #[error("Unknown operation named \"{0}\".")]
    UnknownOperation(String),

    #[error("Schema is not configured to execute {0} operation.")]
    MissingRootType(OperationType),

    #[error("Subscription requests must carry a client id.")]
    MissingClientId,

    #[error("Unknown client \"{0}\".")]
    UnknownClient(String),

    #[error("Subscription field \"{0}\" has no channel.")]
    MissingChannel(String),

    #[error("Subscription operations must select exactly one top-level field.")]
    InvalidSubscription,
}

/// Error from a resolver.
#[derive(Debug, Error)]
pub enum ResolverError {
    /// A user-facing error; the message reaches the response unchanged.
    #[error("{0}")]
    Message(String),

    #[error("Missing required argument \"{0}\".")]
    MissingArgument(String),

    #[error("Argument \"{name}\" has invalid value: {reason}")]
    InvalidArgument { name: String, reason: String },

    #[error("Field \"{0}\" is not available on the parent value.")]
    FieldNotFound(String),

    /// Any other failure. Masked in responses unless configured otherwise.
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
}

impl ResolverError {
    /// Creates a user-facing error.
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    /// Wraps an arbitrary error.
    pub fn internal(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Internal(error.into())
    }

    /// Returns true for errors whose message is not shown to clients by default.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }

    /// The `code` extension reported with this error, if any.
    #[must_use]
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::MissingArgument(_) | Self::InvalidArgument { .. } => Some("BAD_USER_INPUT"),
            Self::Internal(_) => Some("INTERNAL_SERVER_ERROR"),
            Self::Message(_) | Self::FieldNotFound(_) => None,
        }
    }
}

impl From<serde_json::Error> for ResolverError {
    fn from(error: serde_json::Error) -> Self {
        Self::Internal(Box::new(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_error() {
        let error = FieldError::new("Something went wrong")
            .with_path(&Path::root().field("user").field("name"))
            .with_location(Location { line: 1, column: 3 })
            .with_code("NOT_FOUND");

        assert_eq!(error.message, "Something went wrong");
        assert_eq!(
            serde_json::to_value(&error).unwrap(),
            serde_json::json!({
                "message": "Something went wrong",
                "locations": [{"line": 1, "column": 3}],
                "path": ["user", "name"],
                "extensions": {"code": "NOT_FOUND"},
            })
        );
    }

    #[test]
    fn test_field_error_skips_empty_parts() {
        let json = serde_json::to_value(FieldError::new("boom")).unwrap();
        assert_eq!(json, serde_json::json!({"message": "boom"}));
    }

    #[test]
    fn test_execution_error_messages() {
        assert_eq!(
            ExecutionError::NoOperation.to_string(),
            "Must provide an operation."
        );
        assert_eq!(
            ExecutionError::UnknownOperation("Foo".into()).to_string(),
            "Unknown operation named \"Foo\"."
        );
        assert_eq!(
            ExecutionError::MissingRootType(OperationType::Mutation).to_string(),
            "Schema is not configured to execute mutation operation."
        );
    }

    #[test]
    fn test_resolver_error_kinds() {
        assert!(!ResolverError::message("nope").is_internal());
        assert!(ResolverError::internal("db down").is_internal());
        assert_eq!(ResolverError::internal("db down").to_string(), "db down");
    }
}
