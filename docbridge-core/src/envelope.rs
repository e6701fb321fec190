//! The result shape delivered to callers.
//!
//! Hosts pattern-match callback arguments positionally: a leading success flag followed
//! by an operation-specific payload. [`ResultEnvelope`] keeps that contract typed inside
//! Rust and renders it positionally with [`ResultEnvelope::into_args`]. A failure payload is a
//! document carrying the operation (when there is one), the error kind and the message.

use bson::{Bson, Document};
use serde_json::Value;

use crate::error::BridgeError;

/// Operation-specific success payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Number of inserted documents and their identifiers in insertion order.
    Inserted { count: u64, ids: Vec<String> },
    /// Exported documents of a find.
    Documents(Vec<Document>),
    /// Number of documents an update modified.
    Modified(u64),
    /// Number of documents matching a count.
    Counted(u64),
    /// Number of documents a delete removed.
    Deleted(u64),
}

impl Reply {
    /// The positional payload that follows the success flag.
    pub fn into_payload(self) -> Vec<Bson> {
        match self {
            Reply::Inserted { count, ids } => vec![
                count_to_bson(count),
                Bson::Array(ids.into_iter().map(Bson::String).collect()),
            ],
            Reply::Documents(documents) => vec![Bson::Array(
                documents.into_iter().map(Bson::Document).collect(),
            )],
            Reply::Modified(n) | Reply::Counted(n) | Reply::Deleted(n) => vec![count_to_bson(n)],
        }
    }
}

/// Success flag plus payload, or the error that stopped the operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultEnvelope(pub Result<Reply, BridgeError>);

impl ResultEnvelope {
    pub fn success(reply: Reply) -> Self {
        Self(Ok(reply))
    }

    pub fn failure(error: BridgeError) -> Self {
        Self(Err(error))
    }

    pub fn is_success(&self) -> bool {
        self.0.is_ok()
    }

    pub fn reply(&self) -> Option<&Reply> {
        self.0.as_ref().ok()
    }

    pub fn error(&self) -> Option<&BridgeError> {
        self.0.as_ref().err()
    }

    /// Renders the envelope as positional callback arguments.
    ///
    /// `[true, count, [ids]]`, `[true, [docs]]`, `[true, n]` or
    /// `[false, { operation, kind, message }]`.
    pub fn into_args(self) -> Vec<Bson> {
        match self.0 {
            Ok(reply) => std::iter::once(Bson::Boolean(true))
                .chain(reply.into_payload())
                .collect(),
            Err(error) => vec![Bson::Boolean(false), Bson::Document(error_document(&error))],
        }
    }

    /// Renders the positional arguments as host JSON values.
    pub fn into_json_args(self) -> Vec<Value> {
        self.into_args()
            .into_iter()
            .map(|arg| serde_json::to_value(&arg).unwrap_or(Value::Null))
            .collect()
    }
}

impl From<Result<Reply, BridgeError>> for ResultEnvelope {
    fn from(result: Result<Reply, BridgeError>) -> Self {
        Self(result)
    }
}

fn error_document(error: &BridgeError) -> Document {
    let mut document = Document::new();

    if let Some(operation) = error.operation() {
        document.insert("operation", operation);
    }
    document.insert("kind", error.kind().as_str());
    document.insert("message", error.to_string());

    document
}

fn count_to_bson(count: u64) -> Bson {
    i64::try_from(count)
        .map(Bson::Int64)
        .unwrap_or(Bson::Double(count as f64))
}
