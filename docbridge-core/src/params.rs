//! Operation parameters.
//!
//! Hosts pass a loosely-typed [`OperationParams`] bag. The dispatcher checks that the bag
//! is a document, resolves its `collection` and then parses it into one of the typed
//! parameter structs below. Unknown keys are ignored.
//!
//! Rust callers can build the typed structs directly and convert them into an
//! [`OperationParams`] with `into()`.

use bson::{Bson, Document, ser::serialize_to_bson};
use serde_json::Value;

use crate::{
    error::{BridgeError, BridgeResult},
    sanitize::ParamSanitizer,
};

pub const COLLECTION: &str = "collection";
pub const QUERY: &str = "query";
pub const UPDATE: &str = "update";
pub const OPTIONS: &str = "options";
pub const DOCUMENTS: &str = "documents";
pub const DOCUMENT: &str = "document";
pub const LIMIT: &str = "limit";

/// The raw params bag received from the host.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OperationParams(Bson);

impl OperationParams {
    pub fn new(value: impl Into<Bson>) -> Self {
        Self(value.into())
    }

    /// Converts a host JSON value into params.
    pub fn from_json(value: &Value) -> BridgeResult<Self> {
        Ok(Self(serialize_to_bson(value)?))
    }

    pub fn as_bson(&self) -> &Bson {
        &self.0
    }

    /// Sets a key when the bag is a document, otherwise does nothing.
    pub(crate) fn set(&mut self, key: &str, value: impl Into<Bson>) {
        if let Bson::Document(fields) = &mut self.0 {
            fields.insert(key, value.into());
        }
    }

    /// Checks that the bag is a document and returns its fields.
    pub(crate) fn into_fields(self, operation: &'static str) -> BridgeResult<ParamFields> {
        match self.0 {
            Bson::Document(fields) => Ok(ParamFields { operation, fields }),
            _ => Err(BridgeError::InvalidParams { operation }),
        }
    }
}

impl From<Document> for OperationParams {
    fn from(document: Document) -> Self {
        Self(Bson::Document(document))
    }
}

impl From<Bson> for OperationParams {
    fn from(value: Bson) -> Self {
        Self(value)
    }
}

/// A params bag known to be a document.
#[derive(Debug)]
pub(crate) struct ParamFields {
    operation: &'static str,
    fields: Document,
}

impl ParamFields {
    /// The target collection name. Missing or falsy names are rejected.
    pub(crate) fn collection(&self) -> BridgeResult<String> {
        match self.fields.get(COLLECTION) {
            Some(Bson::String(name)) if !name.is_empty() => Ok(name.clone()),
            other => Err(BridgeError::InvalidCollection {
                operation: self.operation,
                collection: other
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "undefined".to_string()),
            }),
        }
    }

    fn sanitized(&mut self, key: &str) -> Document {
        ParamSanitizer::sanitize(self.fields.remove(key))
    }

    fn invalid(&self, field: &'static str, expected: &'static str) -> BridgeError {
        BridgeError::InvalidField {
            operation: self.operation,
            field,
            expected,
        }
    }
}

/// Parameters of an insert.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertParams {
    pub collection: String,
    pub documents: Vec<Document>,
    pub options: Document,
}

impl InsertParams {
    pub fn new(collection: impl Into<String>, documents: Vec<Document>) -> Self {
        Self {
            collection: collection.into(),
            documents,
            options: Document::new(),
        }
    }

    pub(crate) fn parse(collection: String, mut fields: ParamFields) -> BridgeResult<Self> {
        let documents = match fields.fields.remove(DOCUMENTS) {
            Some(Bson::Array(items)) => items
                .into_iter()
                .map(|item| match item {
                    Bson::Document(doc) => Ok(doc),
                    _ => Err(fields.invalid(DOCUMENTS, "array of objects")),
                })
                .collect::<BridgeResult<Vec<_>>>()?,
            _ => return Err(fields.invalid(DOCUMENTS, "array of objects")),
        };

        Ok(Self {
            collection,
            documents,
            options: fields.sanitized(OPTIONS),
        })
    }

    /// Parses a single `document` as a one-element insert.
    pub(crate) fn parse_single(collection: String, mut fields: ParamFields) -> BridgeResult<Self> {
        match fields.fields.remove(DOCUMENT) {
            Some(Bson::Document(document)) => Ok(Self {
                collection,
                documents: vec![document],
                options: fields.sanitized(OPTIONS),
            }),
            _ => Err(fields.invalid(DOCUMENT, "object")),
        }
    }
}

impl From<InsertParams> for OperationParams {
    fn from(params: InsertParams) -> Self {
        let mut fields = Document::new();
        fields.insert(COLLECTION, params.collection);
        fields.insert(
            DOCUMENTS,
            Bson::Array(params.documents.into_iter().map(Bson::Document).collect()),
        );
        fields.insert(OPTIONS, params.options);
        fields.into()
    }
}

/// Parameters of a find.
#[derive(Debug, Clone, PartialEq)]
pub struct FindParams {
    pub collection: String,
    pub query: Document,
    pub options: Document,
    /// Result cap; `None` drains the whole cursor.
    pub limit: Option<i64>,
}

impl FindParams {
    pub fn new(collection: impl Into<String>, query: Document) -> Self {
        Self {
            collection: collection.into(),
            query,
            options: Document::new(),
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub(crate) fn parse(collection: String, mut fields: ParamFields) -> BridgeResult<Self> {
        let limit = match fields.fields.remove(LIMIT) {
            None => None,
            Some(value) if ParamSanitizer::is_falsy(&value) => None,
            Some(Bson::Int32(n)) => Some(i64::from(n)),
            Some(Bson::Int64(n)) => Some(n),
            Some(Bson::Double(n)) if n.fract() == 0.0 => Some(n as i64),
            Some(_) => return Err(fields.invalid(LIMIT, "integer")),
        };

        Ok(Self {
            collection,
            query: fields.sanitized(QUERY),
            options: fields.sanitized(OPTIONS),
            limit,
        })
    }
}

impl From<FindParams> for OperationParams {
    fn from(params: FindParams) -> Self {
        let mut fields = Document::new();
        fields.insert(COLLECTION, params.collection);
        fields.insert(QUERY, params.query);
        fields.insert(OPTIONS, params.options);
        if let Some(limit) = params.limit {
            fields.insert(LIMIT, limit);
        }
        fields.into()
    }
}

/// Parameters of an update.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateParams {
    pub collection: String,
    pub query: Document,
    pub update: Document,
    pub options: Document,
}

impl UpdateParams {
    pub fn new(collection: impl Into<String>, query: Document, update: Document) -> Self {
        Self {
            collection: collection.into(),
            query,
            update,
            options: Document::new(),
        }
    }

    pub(crate) fn parse(collection: String, mut fields: ParamFields) -> BridgeResult<Self> {
        if !matches!(fields.fields.get(UPDATE), Some(Bson::Document(_))) {
            return Err(fields.invalid(UPDATE, "object"));
        }

        Ok(Self {
            collection,
            query: fields.sanitized(QUERY),
            update: fields.sanitized(UPDATE),
            options: fields.sanitized(OPTIONS),
        })
    }
}

impl From<UpdateParams> for OperationParams {
    fn from(params: UpdateParams) -> Self {
        let mut fields = Document::new();
        fields.insert(COLLECTION, params.collection);
        fields.insert(QUERY, params.query);
        fields.insert(UPDATE, params.update);
        fields.insert(OPTIONS, params.options);
        fields.into()
    }
}

/// Parameters shared by count and delete: a filter plus options.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterParams {
    pub collection: String,
    pub query: Document,
    pub options: Document,
}

impl FilterParams {
    pub fn new(collection: impl Into<String>, query: Document) -> Self {
        Self {
            collection: collection.into(),
            query,
            options: Document::new(),
        }
    }

    pub(crate) fn parse(collection: String, mut fields: ParamFields) -> BridgeResult<Self> {
        Ok(Self {
            collection,
            query: fields.sanitized(QUERY),
            options: fields.sanitized(OPTIONS),
        })
    }
}

impl From<FilterParams> for OperationParams {
    fn from(params: FilterParams) -> Self {
        let mut fields = Document::new();
        fields.insert(COLLECTION, params.collection);
        fields.insert(QUERY, params.query);
        fields.insert(OPTIONS, params.options);
        fields.into()
    }
}

pub type CountParams = FilterParams;
pub type DeleteParams = FilterParams;
