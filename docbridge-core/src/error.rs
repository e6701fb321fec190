//! Error types and result types for bridge operations.
//!
//! Two layers of errors exist. Backends report [`StoreError`] from their primitives.
//! The dispatcher reports [`BridgeError`], which wraps store failures together with the
//! name of the operation that triggered them, and adds the precondition and lifecycle
//! failures the dispatcher itself detects. Use [`BridgeResult<T>`] as the return type of
//! fallible bridge operations.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Broad classification of a [`BridgeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The call never reached the store: not connected, malformed params, unknown
    /// collection or a malformed required field.
    Precondition,
    /// The store rejected or failed the operation while executing it.
    StoreOperation,
    /// Configuration or connection setup failed.
    Lifecycle,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Precondition => "precondition",
            ErrorKind::StoreOperation => "store_operation",
            ErrorKind::Lifecycle => "lifecycle",
        }
    }
}

/// Errors surfaced by the dispatcher to the host and to callbacks.
///
/// The type is `Clone` because a store failure is delivered to the caller's callback
/// and returned to the host at the same time.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    /// No store handle has been published yet.
    #[error("Database connection not established")]
    NotConnected,
    /// The params bag is not a document.
    #[error("{operation}: invalid params object")]
    InvalidParams { operation: &'static str },
    /// `params.collection` is missing or does not resolve on the store.
    #[error("{operation}: invalid collection {collection}")]
    InvalidCollection {
        operation: &'static str,
        collection: String,
    },
    /// An operation-specific required field is missing or has the wrong shape.
    #[error("{operation}: invalid params.{field} value, expected {expected}")]
    InvalidField {
        operation: &'static str,
        field: &'static str,
        expected: &'static str,
    },
    /// The backing store failed while executing the operation.
    #[error("{operation}: {message}")]
    Store {
        operation: &'static str,
        message: String,
    },
    /// Conversion between host values and BSON failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Required configuration is missing or malformed.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// Establishing the store connection failed.
    #[error("Database connection FAILED: {0}")]
    Initialization(String),
    /// A store handle was already published into the connection state.
    #[error("Database connection already established")]
    AlreadyConnected,
}

impl BridgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::NotConnected
            | BridgeError::InvalidParams { .. }
            | BridgeError::InvalidCollection { .. }
            | BridgeError::InvalidField { .. } => ErrorKind::Precondition,
            BridgeError::Store { .. } | BridgeError::Serialization(_) => ErrorKind::StoreOperation,
            BridgeError::Configuration(_)
            | BridgeError::Initialization(_)
            | BridgeError::AlreadyConnected => ErrorKind::Lifecycle,
        }
    }

    /// The operation the error was raised for, if it belongs to one.
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            BridgeError::InvalidParams { operation }
            | BridgeError::InvalidCollection { operation, .. }
            | BridgeError::InvalidField { operation, .. }
            | BridgeError::Store { operation, .. } => Some(operation),
            _ => None,
        }
    }

    /// Tags a backend failure with the operation that produced it.
    pub fn store(operation: &'static str, err: StoreError) -> Self {
        match err {
            StoreError::Serialization(message) => BridgeError::Serialization(message),
            other => BridgeError::Store {
                operation,
                message: other.to_string(),
            },
        }
    }
}

/// A specialized `Result` type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors reported by [`StoreBackend`](crate::backend::StoreBackend) implementations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Options or documents could not be converted for the backend.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// A document with the given identifier already exists in the collection.
    /// The first argument is the identifier, the second is the collection name.
    #[error("E11000 duplicate key error collection: {1} dup key: {{ _id: {0} }}")]
    DuplicateKey(String, String),
    /// The filter or update document is not valid for the store.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    /// An error occurred in the underlying storage engine or driver.
    #[error("{0}")]
    Backend(String),
}

/// A specialized `Result` type for store backend primitives.
pub type StoreResult<T> = Result<T, StoreError>;

impl From<BsonError> for StoreError {
    fn from(err: BsonError) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<BsonError> for BridgeError {
    fn from(err: BsonError) -> Self {
        BridgeError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for BridgeError {
    fn from(err: SerdeJsonError) -> Self {
        BridgeError::Serialization(err.to_string())
    }
}
