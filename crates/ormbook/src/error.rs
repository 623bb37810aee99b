//! Error types for ormbook

use thiserror::Error;

/// Result type alias for ormbook operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for pipeline execution and SQL synthesis
#[derive(Debug, Error)]
pub enum Error {
    /// A mandatory pipeline stage has no registered hook
    #[error("missing {chain} {stage} hook")]
    MissingHook {
        chain: &'static str,
        stage: &'static str,
    },

    /// An update or delete was attempted without any filtering condition
    #[error("missing WHERE clause for {operation}")]
    MissingWhereClause { operation: &'static str },

    /// A single-record query matched no rows
    #[error("record not found")]
    NotFound,

    /// The scope's destination value has the wrong shape for the operation
    #[error("unsupported destination: {0}")]
    UnsupportedDestination(&'static str),

    /// A generated key could not be written back into the record
    #[error("field '{0}' is not addressable")]
    UnaddressableField(String),

    /// The record exposes no field under the given name
    #[error("unknown field '{field}' on {record}")]
    UnknownField {
        record: &'static str,
        field: String,
    },

    /// A value could not be coerced into the field's native type
    #[error("invalid value for field '{field}': expected {expected}")]
    InvalidFieldValue {
        field: String,
        expected: &'static str,
    },

    /// An exec stage ran before any SQL was synthesized
    #[error("missing {0} SQL")]
    MissingSql(&'static str),

    /// Error surfaced by the database driver
    #[error("driver error: {0}")]
    Driver(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Create a driver error from any underlying error type
    pub fn driver(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Driver(err.into())
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Check if this is a missing hook error
    pub fn is_missing_hook(&self) -> bool {
        matches!(self, Self::MissingHook { .. })
    }

    /// Check if this is a missing WHERE clause error
    pub fn is_missing_where_clause(&self) -> bool {
        matches!(self, Self::MissingWhereClause { .. })
    }

    /// Check if this is a driver error
    pub fn is_driver(&self) -> bool {
        matches!(self, Self::Driver(_))
    }
}
