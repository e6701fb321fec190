//! Filter and update evaluation for in-memory documents.
//!
//! This module interprets the subset of the MongoDB query dialect that hosts send
//! through the bridge: implicit equality, comparison and membership operators, `$exists`,
//! `$not` and the logical `$and` / `$or` / `$nor` combinators, plus the `$set`, `$unset`
//! and `$inc` update operators. Dotted paths address nested documents.

use std::cmp::Ordering;

use bson::{Bson, Document, datetime::DateTime, oid::ObjectId};

use docbridge_core::{
    error::{StoreError, StoreResult},
    identifier::ID_FIELD,
};

/// Type-erased, comparable representation of BSON values.
///
/// Numeric types are normalized to f64 so that `Int32(1)` equals `Double(1.0)`.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// Numeric value (all integers and floats normalized to f64)
    Number(f64),
    /// DateTime value
    DateTime(DateTime),
    /// ObjectId value
    ObjectId(ObjectId),
    /// String value
    String(&'a str),
    /// Array of comparable values
    Array(Vec<Comparable<'a>>),
    /// Embedded document; field order is significant, as it is to the server
    Map(Vec<(&'a str, Comparable<'a>)>),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<Vec<_>>()
            ),
            _ => Comparable::Null, // Other types are not comparable
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl Comparable<'_> {
    /// Position of the value's type in the BSON comparison order.
    fn type_rank(&self) -> u8 {
        match self {
            Comparable::Null => 1,
            Comparable::Number(_) => 2,
            Comparable::String(_) => 3,
            Comparable::Map(_) => 4,
            Comparable::Array(_) => 5,
            Comparable::ObjectId(_) => 7,
            Comparable::Bool(_) => 8,
            Comparable::DateTime(_) => 9,
        }
    }

    /// Total order for sorting: BSON type order first, then value order within a type.
    pub(crate) fn sort_cmp(&self, other: &Self) -> Ordering {
        self.type_rank()
            .cmp(&other.type_rank())
            .then_with(|| self.partial_cmp(other).unwrap_or(Ordering::Equal))
    }
}

/// Resolves a dotted path inside a document.
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = match current {
            Bson::Document(doc) => doc.get(segment)?,
            Bson::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

/// Evaluates filter documents against a single stored document.
pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Whether the document satisfies every clause of `filter`.
    pub fn matches(&self, filter: &Document) -> StoreResult<bool> {
        for (key, condition) in filter {
            let matched = match key.as_str() {
                "$and" => self.clauses(key, condition)?.iter().all(|m| *m),
                "$or" => self.clauses(key, condition)?.iter().any(|m| *m),
                "$nor" => !self.clauses(key, condition)?.iter().any(|m| *m),
                op if op.starts_with('$') => {
                    return Err(StoreError::InvalidQuery(format!("unknown top level operator: {op}")));
                }
                path => self.matches_condition(lookup(self.document, path), condition)?,
            };

            if !matched {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Keeps the documents that satisfy `filter`, in their original order.
    pub fn filter_documents(
        documents: impl IntoIterator<Item = &'a Document>,
        filter: &Document,
    ) -> StoreResult<Vec<&'a Document>> {
        let mut matched = Vec::new();

        for document in documents {
            if DocumentEvaluator::new(document).matches(filter)? {
                matched.push(document);
            }
        }

        Ok(matched)
    }

    fn clauses(&self, op: &str, condition: &Bson) -> StoreResult<Vec<bool>> {
        match condition {
            Bson::Array(items) if !items.is_empty() => items
                .iter()
                .map(|item| match item {
                    Bson::Document(clause) => self.matches(clause),
                    _ => Err(StoreError::InvalidQuery(format!("{op} entries must be objects"))),
                })
                .collect(),
            _ => Err(StoreError::InvalidQuery(format!("{op} must be a nonempty array"))),
        }
    }

    fn matches_condition(&self, value: Option<&Bson>, condition: &Bson) -> StoreResult<bool> {
        match condition {
            Bson::Document(ops) if ops.keys().next().is_some_and(|k| k.starts_with('$')) => {
                for (op, operand) in ops {
                    if !Self::matches_operator(value, op, operand)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            _ => Ok(Self::equals(value, condition)),
        }
    }

    fn matches_operator(value: Option<&Bson>, op: &str, operand: &Bson) -> StoreResult<bool> {
        match op {
            "$eq" => Ok(Self::equals(value, operand)),
            "$ne" => Ok(!Self::equals(value, operand)),
            "$gt" => Ok(Self::compare(value, operand, |o| o == Ordering::Greater)),
            "$gte" => Ok(Self::compare(value, operand, |o| o != Ordering::Less)),
            "$lt" => Ok(Self::compare(value, operand, |o| o == Ordering::Less)),
            "$lte" => Ok(Self::compare(value, operand, |o| o != Ordering::Greater)),
            "$in" => match operand {
                Bson::Array(candidates) => Ok(candidates.iter().any(|c| Self::equals(value, c))),
                _ => Err(StoreError::InvalidQuery("$in needs an array".into())),
            },
            "$nin" => match operand {
                Bson::Array(candidates) => Ok(!candidates.iter().any(|c| Self::equals(value, c))),
                _ => Err(StoreError::InvalidQuery("$nin needs an array".into())),
            },
            "$exists" => Ok(value.is_some() == is_truthy(operand)),
            "$not" => match operand {
                Bson::Document(ops) => {
                    for (inner, inner_operand) in ops {
                        if !Self::matches_operator(value, inner, inner_operand)? {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
                _ => Err(StoreError::InvalidQuery("$not needs an object".into())),
            },
            other => Err(StoreError::InvalidQuery(format!("unknown operator: {other}"))),
        }
    }

    /// Equality with array membership: `{ tags: "a" }` matches `tags: ["a", "b"]`.
    fn equals(value: Option<&Bson>, operand: &Bson) -> bool {
        match value {
            None => matches!(operand, Bson::Null),
            Some(Bson::Array(items)) if !matches!(operand, Bson::Array(_)) => items
                .iter()
                .any(|item| Comparable::from(item) == Comparable::from(operand)),
            Some(value) => Comparable::from(value) == Comparable::from(operand),
        }
    }

    fn compare(value: Option<&Bson>, operand: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
        let right = Comparable::from(operand);

        match value {
            None => false,
            Some(Bson::Array(items)) => items
                .iter()
                .any(|item| Comparable::from(item).partial_cmp(&right).is_some_and(&accept)),
            Some(value) => Comparable::from(value)
                .partial_cmp(&right)
                .is_some_and(&accept),
        }
    }
}

/// Applies an operator update document in place and reports whether anything changed.
pub(crate) fn apply_update(document: &mut Document, update: &Document) -> StoreResult<bool> {
    if update.is_empty() || update.keys().any(|k| !k.starts_with('$')) {
        return Err(StoreError::InvalidQuery(
            "update document requires atomic operators".into(),
        ));
    }

    let before = document.clone();

    for (op, fields) in update {
        let fields = fields.as_document().ok_or_else(|| {
            StoreError::InvalidQuery(format!("modifiers for {op} must be an object"))
        })?;

        for (path, operand) in fields {
            if path == ID_FIELD || path.starts_with("_id.") {
                let unchanged = op == "$set" && lookup(document, path) == Some(operand);
                if !unchanged {
                    return Err(StoreError::InvalidQuery(
                        "Performing an update on the path '_id' would modify the immutable field '_id'".into(),
                    ));
                }
            }

            match op.as_str() {
                "$set" => set_path(document, path, operand.clone())?,
                "$unset" => unset_path(document, path),
                "$inc" => {
                    let incremented = increment(lookup(document, path), operand, path)?;
                    set_path(document, path, incremented)?;
                }
                other => {
                    return Err(StoreError::InvalidQuery(format!("unknown update operator: {other}")));
                }
            }
        }
    }

    Ok(*document != before)
}

fn set_path(document: &mut Document, path: &str, value: Bson) -> StoreResult<()> {
    match path.split_once('.') {
        None => {
            document.insert(path, value);
            Ok(())
        }
        Some((head, rest)) => {
            if !document.contains_key(head) {
                document.insert(head, Document::new());
            }
            match document.get_mut(head) {
                Some(Bson::Document(child)) => set_path(child, rest, value),
                _ => Err(StoreError::InvalidQuery(format!(
                    "cannot create field '{rest}' in non-object element '{head}'"
                ))),
            }
        }
    }
}

fn unset_path(document: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            document.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(child)) = document.get_mut(head) {
                unset_path(child, rest);
            }
        }
    }
}

fn increment(current: Option<&Bson>, by: &Bson, path: &str) -> StoreResult<Bson> {
    let non_numeric = || StoreError::InvalidQuery(format!("cannot apply $inc to non-numeric field '{path}'"));
    let long_sum = |a: i64, b: i64| {
        a.checked_add(b).map(Bson::Int64).ok_or_else(|| {
            StoreError::InvalidQuery(format!(
                "Failed to apply $inc operations to current value ({a}) for field '{path}': overflow"
            ))
        })
    };

    Ok(match (current, by) {
        (None, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)) => by.clone(),
        // An int32 overflow widens to int64, which cannot overflow from two int32 operands.
        (Some(Bson::Int32(a)), Bson::Int32(b)) => match a.checked_add(*b) {
            Some(sum) => Bson::Int32(sum),
            None => Bson::Int64(i64::from(*a) + i64::from(*b)),
        },
        (Some(Bson::Int32(a)), Bson::Int64(b)) => long_sum(i64::from(*a), *b)?,
        (Some(Bson::Int64(a)), Bson::Int32(b)) => long_sum(*a, i64::from(*b))?,
        (Some(Bson::Int64(a)), Bson::Int64(b)) => long_sum(*a, *b)?,
        (Some(a), b) => match (as_f64(a), as_f64(b)) {
            (Some(a), Some(b)) => Bson::Double(a + b),
            _ => return Err(non_numeric()),
        },
        (None, _) => return Err(non_numeric()),
    })
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

fn is_truthy(value: &Bson) -> bool {
    match value {
        Bson::Null | Bson::Undefined => false,
        Bson::Boolean(b) => *b,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;

    fn matches(document: Document, filter: Document) -> bool {
        DocumentEvaluator::new(&document).matches(&filter).unwrap()
    }

    #[test]
    fn test_implicit_equality_and_membership() {
        let user = doc! { "name": "a", "age": 30, "tags": ["x", "y"] };

        assert!(matches(user.clone(), doc! {}));
        assert!(matches(user.clone(), doc! { "name": "a" }));
        assert!(matches(user.clone(), doc! { "age": 30.0 }));
        assert!(matches(user.clone(), doc! { "tags": "y" }));
        assert!(!matches(user.clone(), doc! { "name": "b" }));
        assert!(matches(user, doc! { "missing": null }));
    }

    #[test]
    fn test_comparison_operators() {
        let user = doc! { "age": 30 };

        assert!(matches(user.clone(), doc! { "age": { "$gt": 18, "$lte": 30 } }));
        assert!(!matches(user.clone(), doc! { "age": { "$lt": 30 } }));
        assert!(matches(user.clone(), doc! { "age": { "$in": [1, 30] } }));
        assert!(matches(user.clone(), doc! { "age": { "$nin": [1, 2] } }));
        assert!(matches(user.clone(), doc! { "age": { "$not": { "$gt": 40 } } }));
        assert!(!matches(user, doc! { "age": { "$gt": "a" } }));
    }

    #[test]
    fn test_exists_and_nested_paths() {
        let user = doc! { "profile": { "city": "x" } };

        assert!(matches(user.clone(), doc! { "profile.city": "x" }));
        assert!(matches(user.clone(), doc! { "profile.zip": { "$exists": false } }));
        assert!(!matches(user, doc! { "profile": { "$exists": false } }));
    }

    #[test]
    fn test_logical_operators() {
        let user = doc! { "name": "a", "age": 30 };

        assert!(matches(user.clone(), doc! { "$or": [{ "name": "b" }, { "age": 30 }] }));
        assert!(!matches(user.clone(), doc! { "$and": [{ "name": "a" }, { "age": 31 }] }));
        assert!(matches(user, doc! { "$nor": [{ "name": "b" }] }));
    }

    #[test]
    fn test_object_id_equality() {
        let oid = ObjectId::new();

        assert!(matches(doc! { "_id": oid }, doc! { "_id": oid }));
        assert!(!matches(doc! { "_id": oid }, doc! { "_id": oid.to_hex() }));
    }

    #[test]
    fn test_embedded_document_equality_respects_field_order() {
        let player = doc! { "pos": { "x": 1, "y": 2 } };

        assert!(matches(player.clone(), doc! { "pos": { "x": 1, "y": 2 } }));
        assert!(!matches(player, doc! { "pos": { "y": 2, "x": 1 } }));
    }

    #[test]
    fn test_sort_order_follows_bson_type_order() {
        let values = [
            Bson::Boolean(false),
            Bson::String("a".into()),
            Bson::Int32(7),
            Bson::Null,
            Bson::ObjectId(ObjectId::new()),
            Bson::Document(doc! {}),
        ];
        let mut sorted = values.iter().map(Comparable::from).collect::<Vec<_>>();
        sorted.sort_by(|a, b| a.sort_cmp(b));

        let ranks = sorted.iter().map(Comparable::type_rank).collect::<Vec<_>>();
        assert_eq!(ranks, vec![1, 2, 3, 4, 7, 8]);
        assert_eq!(Comparable::Number(2.0).sort_cmp(&Comparable::Number(10.0)), Ordering::Less);
    }

    #[test]
    fn test_inc_overflow_is_an_error() {
        let mut document = doc! { "n": i64::MAX };

        let err = apply_update(&mut document, &doc! { "$inc": { "n": 1_i64 } }).unwrap_err();

        assert!(matches!(err, StoreError::InvalidQuery(message) if message.contains("overflow")));
        assert_eq!(document, doc! { "n": i64::MAX });

        let mut small = doc! { "n": i32::MAX };
        apply_update(&mut small, &doc! { "$inc": { "n": 1 } }).unwrap();
        let widened = i64::from(i32::MAX) + 1;
        assert_eq!(small, doc! { "n": widened });
    }

    #[test]
    fn test_unknown_operator_is_an_error() {
        let document = doc! { "a": 1 };
        let evaluator = DocumentEvaluator::new(&document);

        assert!(evaluator.matches(&doc! { "a": { "$regex": "x" } }).is_err());
        assert!(evaluator.matches(&doc! { "$where": "1" }).is_err());
    }

    #[test]
    fn test_apply_update_operators() {
        let mut document = doc! { "name": "a", "visits": 1, "stale": true };

        let changed = apply_update(
            &mut document,
            &doc! {
                "$set": { "name": "b", "profile.city": "x" },
                "$inc": { "visits": 2 },
                "$unset": { "stale": "" },
            },
        )
        .unwrap();

        assert!(changed);
        assert_eq!(document, doc! { "name": "b", "visits": 3, "profile": { "city": "x" } });
    }

    #[test]
    fn test_apply_update_reports_no_change() {
        let mut document = doc! { "name": "a" };

        assert!(!apply_update(&mut document, &doc! { "$set": { "name": "a" } }).unwrap());
    }

    #[test]
    fn test_apply_update_rejects_replacements_and_id_changes() {
        let mut document = doc! { "_id": ObjectId::new(), "name": "a" };

        assert!(apply_update(&mut document, &doc! { "name": "b" }).is_err());
        assert!(apply_update(&mut document, &doc! {}).is_err());
        assert!(apply_update(&mut document, &doc! { "$set": { "_id": 1 } }).is_err());
        assert!(apply_update(&mut document, &doc! { "$inc": { "name": 1 } }).is_err());
    }
}
