//! Error types for quarry.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QuarryError {
    /// The pool could not produce a connection handle.
    #[error("Connection failure: {0}")]
    Connection(String),

    /// A table or column name violates the identifier grammar.
    #[error("Invalid identifier: '{0}'")]
    InvalidIdentifier(String),

    /// An unknown operator token appeared in a condition key.
    #[error("Unsupported operator [{operator}] on column '{column}'")]
    UnsupportedOperator { column: String, operator: String },

    /// A descriptor token could not be parsed.
    #[error("Invalid descriptor: {0}")]
    Descriptor(String),

    /// The backend rejected the statement at prepare time.
    #[error("Prepare failure: {0}")]
    Prepare(String),

    /// The backend rejected the statement at execute time.
    #[error("Execute failure: {0}")]
    Execute(String),

    /// `begin` was called while a transaction is already active.
    #[error("A transaction is already active")]
    TransactionActive,

    /// `replace` was called without any substitution pairs.
    #[error("No replacement columns given")]
    NoReplacementColumns,

    /// A shaped column could not be coerced to its declared type.
    #[error("Coercion failure on column '{column}': {message}")]
    Coercion { column: String, message: String },
}

/// Result type alias for quarry operations.
pub type Result<T> = std::result::Result<T, QuarryError>;
