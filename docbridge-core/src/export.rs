//! Conversion of store results into their host-facing form.
//!
//! Identifier fields always leave the bridge as strings.

use bson::{Bson, Document};

use crate::identifier::{ID_FIELD, IdentifierCodec};

pub struct ResultExporter;

impl ResultExporter {
    /// Renders the `_id` of a document in portable form. Absent documents stay absent.
    pub fn export_document(document: Option<Document>) -> Option<Document> {
        let mut document = document?;

        if let Some(id) = document.get_mut(ID_FIELD) {
            *id = IdentifierCodec::to_portable(std::mem::take(id));
        }

        Some(document)
    }

    /// Exports every document of a result set, preserving order and length.
    pub fn export_documents(documents: Vec<Document>) -> Vec<Document> {
        documents
            .into_iter()
            .filter_map(|document| Self::export_document(Some(document)))
            .collect()
    }

    /// Exports an untyped result value.
    ///
    /// Arrays are exported element-wise. Anything else is returned unchanged.
    pub fn export_value(value: Bson) -> Bson {
        match value {
            Bson::Array(items) => Bson::Array(
                items
                    .into_iter()
                    .map(|item| match item {
                        Bson::Document(doc) => Self::export_document(Some(doc))
                            .map(Bson::Document)
                            .unwrap_or(Bson::Null),
                        other => other,
                    })
                    .collect(),
            ),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use bson::{doc, oid::ObjectId};

    use super::*;

    #[test]
    fn test_export_document_stringifies_identifier() {
        let oid = ObjectId::new();
        let exported = ResultExporter::export_document(Some(doc! { "_id": oid, "name": "a" }));

        assert_eq!(exported, Some(doc! { "_id": oid.to_hex(), "name": "a" }));
    }

    #[test]
    fn test_export_document_keeps_field_order() {
        let oid = ObjectId::new();
        let exported = ResultExporter::export_document(Some(doc! { "_id": oid, "b": 1, "a": 2 }))
            .unwrap();

        assert_eq!(
            exported.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["_id", "b", "a"]
        );
    }

    #[test]
    fn test_export_document_absent() {
        assert_eq!(ResultExporter::export_document(None), None);
        assert_eq!(
            ResultExporter::export_document(Some(doc! { "name": "no id" })),
            Some(doc! { "name": "no id" })
        );
    }

    #[test]
    fn test_export_documents_preserves_order_and_length() {
        let ids = [ObjectId::new(), ObjectId::new(), ObjectId::new()];
        let exported = ResultExporter::export_documents(
            ids.iter().map(|id| doc! { "_id": *id }).collect(),
        );

        assert_eq!(exported.len(), 3);
        for (document, id) in exported.iter().zip(ids.iter()) {
            assert_eq!(document.get_str("_id").unwrap(), id.to_hex());
        }
    }

    #[test]
    fn test_export_value_returns_non_sequences_unchanged() {
        let value = Bson::Document(doc! { "_id": ObjectId::new() });

        assert_eq!(ResultExporter::export_value(value.clone()), value);
        assert_eq!(ResultExporter::export_value(Bson::Int32(3)), Bson::Int32(3));
    }
}
