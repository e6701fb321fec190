//! Normalization of untrusted query, update and options values.
//!
//! Hosts hand the bridge loosely-typed values. Before anything reaches the store those
//! values are turned into a well-formed [`Document`]:
//!
//! - absent, null and falsy values become an empty document
//! - arrays become a document keyed by the stringified index (`"0"`, `"1"`, ...)
//! - any other non-document scalar becomes an empty document
//! - documents keep their shape, with `_id` operands converted to native identifiers
//!
//! Sanitizing never fails.

use bson::{Bson, Document};

use crate::identifier::{ID_FIELD, IdentifierCodec};

/// Logical operators whose operands are themselves filter documents.
const LOGICAL_OPERATORS: [&str; 3] = ["$and", "$or", "$nor"];

/// Turns arbitrary host values into documents that are safe to hand to the store.
pub struct ParamSanitizer;

impl ParamSanitizer {
    /// Sanitizes a value claimed to be a query, update or options object.
    pub fn sanitize(value: Option<Bson>) -> Document {
        match value {
            None => Document::new(),
            Some(value) if Self::is_falsy(&value) => Document::new(),
            Some(Bson::Array(items)) => items
                .into_iter()
                .enumerate()
                .map(|(index, item)| (index.to_string(), item))
                .collect(),
            Some(Bson::Document(document)) => Self::sanitize_document(document),
            Some(_) => Document::new(),
        }
    }

    /// Converts identifier-shaped fields of a document to their native form.
    pub fn sanitize_document(document: Document) -> Document {
        document
            .into_iter()
            .map(|(key, value)| {
                let value = if key == ID_FIELD {
                    Self::native_operand(value)
                } else if LOGICAL_OPERATORS.contains(&key.as_str()) {
                    Self::sanitize_clauses(value)
                } else {
                    value
                };
                (key, value)
            })
            .collect()
    }

    /// Whether `value` counts as "not provided" for an optional argument.
    pub fn is_falsy(value: &Bson) -> bool {
        match value {
            Bson::Null | Bson::Undefined => true,
            Bson::Boolean(b) => !b,
            Bson::Int32(n) => *n == 0,
            Bson::Int64(n) => *n == 0,
            Bson::Double(n) => *n == 0.0 || n.is_nan(),
            Bson::String(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Converts an `_id` operand: a plain value, an array of values or an operator
    /// document such as `{ "$in": [...] }`.
    fn native_operand(value: Bson) -> Bson {
        match value {
            Bson::Array(items) => Bson::Array(items.into_iter().map(Self::native_operand).collect()),
            Bson::Document(operators) => Bson::Document(
                operators
                    .into_iter()
                    .map(|(op, operand)| {
                        if op.starts_with('$') {
                            (op, Self::native_operand(operand))
                        } else {
                            (op, operand)
                        }
                    })
                    .collect(),
            ),
            other => IdentifierCodec::to_native(other),
        }
    }

    fn sanitize_clauses(value: Bson) -> Bson {
        match value {
            Bson::Array(clauses) => Bson::Array(
                clauses
                    .into_iter()
                    .map(|clause| match clause {
                        Bson::Document(doc) => Bson::Document(Self::sanitize_document(doc)),
                        other => other,
                    })
                    .collect(),
            ),
            other => other,
        }
    }
}
