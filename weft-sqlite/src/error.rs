//! Error types for SQLite operations.

use thiserror::Error;
use weft_query::error::{ErrorCode, QueryError};

/// Result type for SQLite operations.
pub type SqliteResult<T> = Result<T, SqliteError>;

/// Error type for SQLite operations.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// SQLite driver error.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] tokio_rusqlite::Error),
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
    /// Statement could not be built.
    #[error("Query error: {0}")]
    Query(String),
    /// A stored value could not be converted.
    #[error("Type conversion error: {0}")]
    TypeConversion(String),
}

impl SqliteError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a query error.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Create a type conversion error.
    pub fn type_conversion(msg: impl Into<String>) -> Self {
        Self::TypeConversion(msg.into())
    }

    /// The extended SQLite result code, if the driver reported one.
    pub fn extended_code(&self) -> Option<i32> {
        match self {
            Self::Sqlite(tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(
                failure,
                _,
            ))) => Some(failure.extended_code),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for SqliteError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Sqlite(tokio_rusqlite::Error::Rusqlite(err))
    }
}

impl From<SqliteError> for QueryError {
    fn from(err: SqliteError) -> Self {
        let message = err.to_string();
        let code = match (&err, err.extended_code()) {
            (_, Some(rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE))
            | (_, Some(rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)) => ErrorCode::UniqueConstraint,
            (_, Some(rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY)) => {
                ErrorCode::ForeignKeyConstraint
            }
            (_, Some(rusqlite::ffi::SQLITE_CONSTRAINT_NOTNULL)) => ErrorCode::NotNullConstraint,
            (_, Some(rusqlite::ffi::SQLITE_BUSY)) => ErrorCode::ConnectionTimeout,
            (SqliteError::Sqlite(tokio_rusqlite::Error::ConnectionClosed), _) => {
                ErrorCode::ConnectionFailed
            }
            (SqliteError::Config(_), _) => ErrorCode::InvalidConfiguration,
            (SqliteError::TypeConversion(_), _) => ErrorCode::DeserializationError,
            _ => ErrorCode::DatabaseError,
        };
        QueryError::new(code, message).with_source(err)
    }
}
