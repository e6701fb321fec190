//! Conversion between the store's native identifier and its portable string form.
//!
//! MongoDB identifies documents by a 12-byte [`ObjectId`] stored under `_id`. Hosts only
//! ever see the 24-character hex rendering. Neither direction fails: values that are not
//! identifiers pass through untouched and any problem surfaces later as a store error.

use bson::{Bson, Document, oid::ObjectId};

/// Name of the identifier field in every stored document.
pub const ID_FIELD: &str = "_id";

/// Converts identifier values across the bridge boundary.
pub struct IdentifierCodec;

impl IdentifierCodec {
    /// Returns the native form of `value`.
    ///
    /// `ObjectId` values are returned as-is, strings that parse as an `ObjectId` are
    /// converted and everything else is returned unchanged.
    pub fn to_native(value: Bson) -> Bson {
        match value {
            Bson::String(s) => match ObjectId::parse_str(&s) {
                Ok(oid) => Bson::ObjectId(oid),
                Err(_) => Bson::String(s),
            },
            other => other,
        }
    }

    /// Returns the portable form of `value`: `ObjectId` becomes its hex string.
    pub fn to_portable(value: Bson) -> Bson {
        match value {
            Bson::ObjectId(oid) => Bson::String(oid.to_hex()),
            other => other,
        }
    }

    /// Renders an identifier as a plain string, whatever its native type.
    pub fn portable_string(value: &Bson) -> String {
        match value {
            Bson::ObjectId(oid) => oid.to_hex(),
            Bson::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Returns the document's identifier, assigning a fresh `ObjectId` when it has none.
    ///
    /// An assigned identifier becomes the first field, where the server puts it.
    pub fn ensure_identifier(document: Document) -> (Bson, Document) {
        if let Some(id) = document.get(ID_FIELD) {
            return (id.clone(), document);
        }

        let id = Bson::ObjectId(ObjectId::new());
        let mut assigned = Document::new();
        assigned.insert(ID_FIELD, id.clone());
        for (key, value) in document {
            assigned.insert(key, value);
        }

        (id, assigned)
    }
}
