//! Error types for association resolution with actionable messages.
//!
//! Every failure surfaced by this crate is a [`QueryError`] carrying an
//! [`ErrorCode`], a message and optional context (model, association,
//! suggestions).
//!
//! # Error Codes
//!
//! Error codes follow a pattern: W{category}{number}
//! - 1xxx: Resolution errors (unknown association, invalid include, etc.)
//! - 2xxx: Constraint violations reported by storage
//! - 3xxx: Connection errors
//! - 5xxx: Execution errors
//! - 6xxx: Data errors (decoding stored values)
//! - 7xxx: Configuration errors
//! - 9xxx: Internal errors
//!
//! ```rust
//! use weft_query::{QueryError, ErrorCode};
//!
//! let err = QueryError::unknown_association("Task", "Group");
//! assert_eq!(err.code, ErrorCode::UnknownAssociation);
//! assert!(!err.is_storage_error());
//!
//! let err = QueryError::database("disk I/O error");
//! assert!(err.is_storage_error());
//! ```

use std::fmt;
use thiserror::Error;

/// Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Resolution errors (1xxx)
    /// Record not found (W1001).
    RecordNotFound = 1001,
    /// Malformed or ambiguous include tree (W1003).
    InvalidInclude = 1003,
    /// Include references a relation the registry cannot resolve (W1004).
    UnknownAssociation = 1004,
    /// Entity type is not registered (W1005).
    UnknownEntity = 1005,
    /// Single-valued association matched more than one row (W1006).
    AmbiguousMatch = 1006,
    /// Association assignment does not fit the association kind (W1007).
    InvalidAssignment = 1007,

    // Constraint errors (2xxx)
    /// Unique constraint violation (W2001).
    UniqueConstraint = 2001,
    /// Foreign key constraint violation (W2002).
    ForeignKeyConstraint = 2002,
    /// Not null constraint violation (W2003).
    NotNullConstraint = 2003,

    // Connection errors (3xxx)
    /// Storage connection failed (W3001).
    ConnectionFailed = 3001,
    /// Connection timeout (W3003).
    ConnectionTimeout = 3003,

    // Execution errors (5xxx)
    /// General storage error (W5002).
    DatabaseError = 5002,

    // Data errors (6xxx)
    /// Deserialization error (W6003).
    DeserializationError = 6003,

    // Configuration errors (7xxx)
    /// Invalid configuration (W7001).
    InvalidConfiguration = 7001,

    // Internal errors (9xxx)
    /// Internal error (W9001).
    Internal = 9001,
}

impl ErrorCode {
    /// Get the error code string (e.g., "W1004").
    pub fn code(&self) -> String {
        format!("W{}", *self as u16)
    }

    /// Get a short description of the error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::RecordNotFound => "Record not found",
            Self::InvalidInclude => "Invalid include",
            Self::UnknownAssociation => "Unknown association",
            Self::UnknownEntity => "Unknown entity type",
            Self::AmbiguousMatch => "Ambiguous single-valued association",
            Self::InvalidAssignment => "Invalid association assignment",
            Self::UniqueConstraint => "Unique constraint violation",
            Self::ForeignKeyConstraint => "Foreign key constraint violation",
            Self::NotNullConstraint => "Not null constraint violation",
            Self::ConnectionFailed => "Storage connection failed",
            Self::ConnectionTimeout => "Connection timeout",
            Self::DatabaseError => "Storage error",
            Self::DeserializationError => "Deserialization error",
            Self::InvalidConfiguration => "Invalid configuration",
            Self::Internal => "Internal error",
        }
    }

    /// Numeric category (the thousands digit).
    pub fn category(&self) -> u16 {
        *self as u16 / 1000
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Suggestion for fixing an error.
#[derive(Debug, Clone)]
pub struct Suggestion {
    /// The suggestion text.
    pub text: String,
    /// Optional code example.
    pub code: Option<String>,
}

impl Suggestion {
    /// Create a new suggestion.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            code: None,
        }
    }

    /// Add a code example.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Additional context for an error.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The operation that was being performed.
    pub operation: Option<String>,
    /// The model involved.
    pub model: Option<String>,
    /// The association (role name or target) involved.
    pub association: Option<String>,
    /// Suggestions for fixing the error.
    pub suggestions: Vec<Suggestion>,
    /// Help text.
    pub help: Option<String>,
}

/// Errors that can occur while planning, fetching or assembling a query.
#[derive(Error, Debug)]
pub struct QueryError {
    /// The error code.
    pub code: ErrorCode,
    /// The error message.
    pub message: String,
    /// Additional context.
    pub context: ErrorContext,
    /// The source error (if any).
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.code(), self.message)
    }
}

impl QueryError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: ErrorContext::default(),
            source: None,
        }
    }

    /// Add context about the operation.
    pub fn with_context(mut self, operation: impl Into<String>) -> Self {
        self.context.operation = Some(operation.into());
        self
    }

    /// Add a suggestion for fixing the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context.suggestions.push(Suggestion::new(suggestion));
        self
    }

    /// Add a code suggestion.
    pub fn with_code_suggestion(
        mut self,
        text: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        self.context.suggestions.push(Suggestion::new(text).with_code(code));
        self
    }

    /// Add help text.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.context.help = Some(help.into());
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.context.model = Some(model.into());
        self
    }

    /// Set the association.
    pub fn with_association(mut self, association: impl Into<String>) -> Self {
        self.context.association = Some(association.into());
        self
    }

    /// Set the source error.
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // ============== Constructor Functions ==============

    /// Create a not found error.
    pub fn not_found(model: impl Into<String>) -> Self {
        let model = model.into();
        Self::new(
            ErrorCode::RecordNotFound,
            format!("No {} record found matching the query", model),
        )
        .with_model(&model)
        .with_suggestion("Use find_one() to get None instead of an error")
    }

    /// Create an unknown association error.
    pub fn unknown_association(model: impl Into<String>, association: impl Into<String>) -> Self {
        let model = model.into();
        let association = association.into();
        Self::new(
            ErrorCode::UnknownAssociation,
            format!("{} has no association to {}", model, association),
        )
        .with_model(&model)
        .with_association(&association)
        .with_code_suggestion(
            "Declare the association before including it",
            format!("registry.belongs_to(\"{}\", \"{}\")?", model, association),
        )
    }

    /// Create an invalid include error.
    pub fn invalid_include(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInclude, message)
    }

    /// Create an ambiguous include error (two associations to one target, no alias).
    pub fn ambiguous_include(
        model: impl Into<String>,
        target: impl Into<String>,
        roles: &[&str],
    ) -> Self {
        let model = model.into();
        let target = target.into();
        Self::new(
            ErrorCode::InvalidInclude,
            format!(
                "{} has {} associations to {}; include one by alias",
                model,
                roles.len(),
                target
            ),
        )
        .with_model(&model)
        .with_association(&target)
        .with_suggestion(format!("Use one of: {}", roles.join(", ")))
    }

    /// Create an unknown entity error.
    pub fn unknown_entity(model: impl Into<String>) -> Self {
        let model = model.into();
        Self::new(
            ErrorCode::UnknownEntity,
            format!("Entity type {} is not registered", model),
        )
        .with_model(&model)
        .with_suggestion("Register the entity type before declaring associations or querying it")
    }

    /// Create an ambiguous single-valued match error.
    pub fn ambiguous_match(
        model: impl Into<String>,
        association: impl Into<String>,
        matches: usize,
    ) -> Self {
        let model = model.into();
        let association = association.into();
        Self::new(
            ErrorCode::AmbiguousMatch,
            format!(
                "{}.{} is single-valued but storage returned {} candidate rows",
                model, association, matches
            ),
        )
        .with_model(&model)
        .with_association(&association)
        .with_help("Set single_match = \"first\" to keep the first candidate instead")
    }

    /// Create an invalid association assignment error.
    pub fn invalid_assignment(
        model: impl Into<String>,
        association: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let model = model.into();
        let association = association.into();
        Self::new(
            ErrorCode::InvalidAssignment,
            format!("Cannot set {}.{}: {}", model, association, message.into()),
        )
        .with_model(&model)
        .with_association(&association)
    }

    /// Create a unique constraint violation error.
    pub fn unique_violation(model: impl Into<String>, field: impl Into<String>) -> Self {
        let model = model.into();
        let field = field.into();
        Self::new(
            ErrorCode::UniqueConstraint,
            format!("Unique constraint violated on {}.{}", model, field),
        )
        .with_model(&model)
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(ErrorCode::ConnectionFailed, format!("Connection error: {}", message))
            .with_suggestion("Check that the storage backend is reachable")
    }

    /// Create a general storage error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(
            ErrorCode::InvalidConfiguration,
            format!("Invalid configuration: {}", message),
        )
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(ErrorCode::Internal, format!("Internal error: {}", message))
            .with_help("This is likely a bug in Weft - please report it")
    }

    // ============== Error Checks ==============

    /// Check if this is a not found error.
    pub fn is_not_found(&self) -> bool {
        self.code == ErrorCode::RecordNotFound
    }

    /// Check if this is an unknown association error.
    pub fn is_unknown_association(&self) -> bool {
        self.code == ErrorCode::UnknownAssociation
    }

    /// Check if this is an invalid include error.
    pub fn is_invalid_include(&self) -> bool {
        self.code == ErrorCode::InvalidInclude
    }

    /// Check if this error originated in the storage collaborator.
    pub fn is_storage_error(&self) -> bool {
        matches!(self.code.category(), 2 | 3 | 5 | 6)
    }

    /// Check if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        self.code == ErrorCode::ConnectionTimeout
    }

    /// Check if this is a connection error.
    pub fn is_connection_error(&self) -> bool {
        matches!(self.code, ErrorCode::ConnectionFailed | ErrorCode::ConnectionTimeout)
    }

    // ============== Display Functions ==============

    /// Display the full error with all context and suggestions.
    pub fn display_full(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("Error [{}]: {}\n", self.code.code(), self.message));

        if let Some(ref op) = self.context.operation {
            output.push_str(&format!("  → While: {}\n", op));
        }
        if let Some(ref model) = self.context.model {
            output.push_str(&format!("  → Model: {}\n", model));
        }
        if let Some(ref association) = self.context.association {
            output.push_str(&format!("  → Association: {}\n", association));
        }

        if !self.context.suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for (i, suggestion) in self.context.suggestions.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, suggestion.text));
                if let Some(ref code) = suggestion.code {
                    let code = code.replace('\n', "\n     ");
                    output.push_str(&format!("     ```\n     {}\n     ```\n", code));
                }
            }
        }

        if let Some(ref help) = self.context.help {
            output.push_str(&format!("\nHelp: {}\n", help));
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_format() {
        assert_eq!(ErrorCode::InvalidInclude.code(), "W1003");
        assert_eq!(ErrorCode::UnknownAssociation.code(), "W1004");
        assert_eq!(ErrorCode::DatabaseError.code(), "W5002");
    }

    #[test]
    fn test_unknown_association_error() {
        let err = QueryError::unknown_association("Task", "Group");
        assert!(err.is_unknown_association());
        assert!(err.message.contains("Task"));
        assert!(err.message.contains("Group"));
        assert_eq!(err.context.association.as_deref(), Some("Group"));
        assert!(!err.context.suggestions.is_empty());
    }

    #[test]
    fn test_ambiguous_include_lists_roles() {
        let err = QueryError::ambiguous_include("Post", "User", &["author", "editor"]);
        assert!(err.is_invalid_include());
        assert!(err.context.suggestions[0].text.contains("author, editor"));
    }

    #[test]
    fn test_storage_classification() {
        assert!(QueryError::database("boom").is_storage_error());
        assert!(QueryError::connection("refused").is_storage_error());
        assert!(QueryError::unique_violation("User", "email").is_storage_error());
        assert!(!QueryError::invalid_include("bad").is_storage_error());
        assert!(!QueryError::invalid_configuration("bad").is_storage_error());
    }

    #[test]
    fn test_display_full() {
        let err = QueryError::unknown_association("Task", "Group")
            .with_context("Planning include tree");

        let output = err.display_full();
        assert!(output.contains("W1004"));
        assert!(output.contains("Planning include tree"));
        assert!(output.contains("Suggestions"));
    }
}
