//! Error types for the storage layer

use std::fmt;
use thiserror::Error;

use crate::query::QueryError;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage error types
#[derive(Error, Debug)]
pub enum StorageError {
    /// Store unreachable or a session could not be started
    #[error("Connection error: {0}")]
    Connection(String),

    /// A unit of work failed and its transaction was aborted
    #[error("Transaction aborted during {operation}: {source}")]
    Transaction {
        operation: &'static str,
        #[source]
        source: Box<StorageError>,
    },

    /// Serialization/deserialization between records and stored documents failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Database operation failed
    #[error("Database error: {0}")]
    Database(String),

    /// Input violated a precondition of the operation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Query tree could not be translated or evaluated
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    /// Storage backend unavailable
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The unit of work panicked
    #[error("Unit of work panicked: {0}")]
    Panicked(String),

    /// Generic error wrapper
    #[error("Storage error: {0}")]
    Other(#[from] anyhow::Error),
}

impl StorageError {
    /// Create a connection error
    pub fn connection<E: fmt::Display>(msg: E) -> Self {
        Self::Connection(msg.to_string())
    }

    /// Wrap the failure of a unit of work
    pub fn transaction(operation: &'static str, source: StorageError) -> Self {
        Self::Transaction {
            operation,
            source: Box::new(source),
        }
    }

    /// Create a serialization error
    pub fn serialization<E: fmt::Display>(err: E) -> Self {
        Self::Serialization(err.to_string())
    }

    /// Create a database error
    pub fn database<E: fmt::Display>(err: E) -> Self {
        Self::Database(err.to_string())
    }

    /// Create a validation error
    pub fn validation<E: fmt::Display>(msg: E) -> Self {
        Self::Validation(msg.to_string())
    }

    /// Create an unavailable error
    pub fn unavailable<E: fmt::Display>(msg: E) -> Self {
        Self::Unavailable(msg.to_string())
    }

    /// Create a configuration error
    pub fn configuration<E: fmt::Display>(msg: E) -> Self {
        Self::Configuration(msg.to_string())
    }

    /// Check if this is a retryable error
    ///
    /// Informational only: nothing in this crate retries.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Database(_) | Self::Unavailable(_) => true,
            Self::Transaction { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Check if this error came out of an aborted transaction
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Transaction { .. })
    }

    /// The innermost cause, looking through transaction wrappers
    pub fn root(&self) -> &StorageError {
        match self {
            Self::Transaction { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err)
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => Self::unavailable(err),
            sqlx::Error::Io(_) => Self::connection(err),
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => Self::serialization(err),
            _ => Self::database(err),
        }
    }
}

#[cfg(feature = "mongodb")]
impl From<mongodb::error::Error> for StorageError {
    fn from(err: mongodb::error::Error) -> Self {
        use mongodb::error::ErrorKind;

        match *err.kind {
            ErrorKind::ServerSelection { .. } => Self::unavailable(err),
            ErrorKind::Io(_) => Self::connection(err),
            ErrorKind::BsonSerialization(_) | ErrorKind::BsonDeserialization(_) => {
                Self::serialization(err)
            }
            _ => Self::database(err),
        }
    }
}
