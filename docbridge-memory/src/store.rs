//! In-memory storage implementation for the bridge.
//!
//! Collections are ordered vectors of BSON documents guarded by an async-aware
//! read-write lock. Filters and updates are interpreted by [`crate::evaluator`].

use std::{cmp::Ordering, collections::HashMap, sync::Arc};

use async_trait::async_trait;
use bson::{Bson, Document};
use mea::rwlock::RwLock;
use tracing::debug;

use docbridge_core::{
    backend::{InsertOutcome, Scope, StoreBackend, StoreBackendBuilder},
    error::{BridgeResult, StoreError, StoreResult},
    identifier::{ID_FIELD, IdentifierCodec},
};

use crate::evaluator::{Comparable, DocumentEvaluator, apply_update, lookup};

type CollectionDocs = Vec<Document>;
type StoreMap = HashMap<String, CollectionDocs>;

/// Thread-safe in-memory document storage backend.
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, so clones
/// share the same underlying data. Documents keep their insertion order, which is the
/// natural order `find` returns them in when no sort is given.
///
/// Queries scan every document in a collection. There are no indexes beyond the
/// uniqueness of `_id`.
///
/// # Example
///
/// ```ignore
/// use docbridge_memory::InMemoryStore;
/// use docbridge_core::backend::{Scope, StoreBackend};
/// use bson::doc;
///
/// let store = InMemoryStore::new();
///
/// store.insert_many("users", vec![doc! { "name": "Alice", "age": 30 }], doc! {}).await?;
///
/// let adults = store.find("users", doc! { "age": { "$gte": 18 } }, doc! {}, None).await?;
/// assert_eq!(adults.len(), 1);
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> documents in insertion order
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Names of the collections that have received at least one write.
    pub async fn collection_names(&self) -> Vec<String> {
        self.store
            .read()
            .await
            .keys()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
        options: Document,
    ) -> StoreResult<InsertOutcome> {
        let ordered = options.get_bool("ordered").unwrap_or(true);

        let mut store = self.store.write().await;
        let docs = store
            .entry(collection.to_string())
            .or_default();

        let mut outcome = InsertOutcome::default();
        let mut first_error = None;

        for document in documents {
            let (id, document) = IdentifierCodec::ensure_identifier(document);

            let duplicate = docs
                .iter()
                .any(|existing| existing.get(ID_FIELD).map(Comparable::from) == Some(Comparable::from(&id)));

            if duplicate {
                let err = StoreError::DuplicateKey(
                    IdentifierCodec::portable_string(&id),
                    collection.to_string(),
                );
                debug!(
                    target: "docbridge::memory",
                    collection,
                    error = %err,
                    "Rejected insert"
                );

                if ordered {
                    return Err(err);
                }
                first_error.get_or_insert(err);
                continue;
            }

            docs.push(document);
            outcome.inserted_count += 1;
            outcome.inserted_ids.push(id);
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(outcome),
        }
    }

    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: Document,
        limit: Option<i64>,
    ) -> StoreResult<Vec<Document>> {
        let store = self.store.read().await;
        let docs = match store.get(collection) {
            Some(docs) => docs,
            None => return Ok(vec![]),
        };

        let mut matched = DocumentEvaluator::filter_documents(docs, &filter)?;

        if let Ok(sort) = options.get_document("sort") {
            let keys = sort_keys(sort)?;
            matched.sort_by(|a, b| compare_by(a, b, &keys));
        }

        let skip = option_count(&options, "skip")?.unwrap_or(0);
        let take = match limit.or(option_i64(&options, "limit")) {
            Some(0) | None => usize::MAX,
            Some(n) => usize::try_from(n.unsigned_abs()).unwrap_or(usize::MAX),
        };
        let projection = options.get_document("projection").ok();

        matched
            .into_iter()
            .skip(skip)
            .take(take)
            .map(|document| match projection {
                Some(projection) => project(document, projection),
                None => Ok(document.clone()),
            })
            .collect()
    }

    async fn update(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: Document,
        scope: Scope,
    ) -> StoreResult<u64> {
        if options.get_bool("upsert").unwrap_or(false) {
            return Err(StoreError::Backend(
                "upsert is not supported by the in-memory store".into(),
            ));
        }

        let mut store = self.store.write().await;
        let docs = match store.get_mut(collection) {
            Some(docs) => docs,
            None => {
                // Still reject malformed updates against an empty collection.
                apply_update(&mut Document::new(), &update)?;
                return Ok(0);
            }
        };

        let mut modified = 0;

        for document in docs.iter_mut() {
            if !DocumentEvaluator::new(document).matches(&filter)? {
                continue;
            }

            // Apply to a copy so a failing operator leaves the stored document intact.
            let mut updated = document.clone();
            if apply_update(&mut updated, &update)? {
                *document = updated;
                modified += 1;
            }

            if scope == Scope::One {
                break;
            }
        }

        Ok(modified)
    }

    async fn count(&self, collection: &str, filter: Document, options: Document) -> StoreResult<u64> {
        let store = self.store.read().await;
        let docs = match store.get(collection) {
            Some(docs) => docs,
            None => return Ok(0),
        };

        let matched = DocumentEvaluator::filter_documents(docs, &filter)?.len();
        let skip = option_count(&options, "skip")?.unwrap_or(0);
        let limit = option_count(&options, "limit")?
            .filter(|limit| *limit > 0)
            .unwrap_or(usize::MAX);

        Ok(matched.saturating_sub(skip).min(limit) as u64)
    }

    async fn delete(
        &self,
        collection: &str,
        filter: Document,
        _options: Document,
        scope: Scope,
    ) -> StoreResult<u64> {
        let mut store = self.store.write().await;
        let docs = match store.get_mut(collection) {
            Some(docs) => docs,
            None => return Ok(0),
        };

        match scope {
            Scope::One => {
                let mut position = None;
                for (index, document) in docs.iter().enumerate() {
                    if DocumentEvaluator::new(document).matches(&filter)? {
                        position = Some(index);
                        break;
                    }
                }

                Ok(position.map(|index| docs.remove(index)).map_or(0, |_| 1))
            }
            Scope::Many => {
                let mut verdicts = Vec::with_capacity(docs.len());
                for document in docs.iter() {
                    verdicts.push(DocumentEvaluator::new(document).matches(&filter)?);
                }

                let before = docs.len();
                let mut verdicts = verdicts.into_iter();
                docs.retain(|_| !verdicts.next().unwrap_or(false));

                Ok((before - docs.len()) as u64)
            }
        }
    }
}

fn option_i64(options: &Document, key: &str) -> Option<i64> {
    match options.get(key)? {
        Bson::Int32(n) => Some(i64::from(*n)),
        Bson::Int64(n) => Some(*n),
        Bson::Double(n) if n.fract() == 0.0 => Some(*n as i64),
        _ => None,
    }
}

fn option_count(options: &Document, key: &str) -> StoreResult<Option<usize>> {
    match options.get(key) {
        None | Some(Bson::Null) => Ok(None),
        Some(_) => match option_i64(options, key) {
            Some(n) if n >= 0 => Ok(Some(usize::try_from(n).unwrap_or(usize::MAX))),
            _ => Err(StoreError::InvalidQuery(format!(
                "{key} must be a non-negative integer"
            ))),
        },
    }
}

fn sort_keys(sort: &Document) -> StoreResult<Vec<(&str, Ordering)>> {
    sort.iter()
        .map(|(field, direction)| {
            let ascending = match direction {
                Bson::Int32(1) | Bson::Int64(1) => true,
                Bson::Int32(-1) | Bson::Int64(-1) => false,
                Bson::Double(n) if *n == 1.0 => true,
                Bson::Double(n) if *n == -1.0 => false,
                _ => {
                    return Err(StoreError::InvalidQuery(format!(
                        "sort direction for {field} must be 1 or -1"
                    )));
                }
            };
            Ok((field.as_str(), if ascending { Ordering::Less } else { Ordering::Greater }))
        })
        .collect()
}

fn compare_by(a: &Document, b: &Document, keys: &[(&str, Ordering)]) -> Ordering {
    for (field, first) in keys {
        let left = lookup(a, field)
            .map(Comparable::from)
            .unwrap_or(Comparable::Null);
        let right = lookup(b, field)
            .map(Comparable::from)
            .unwrap_or(Comparable::Null);

        let ordering = left.sort_cmp(&right);
        let ordering = match first {
            Ordering::Greater => ordering.reverse(),
            _ => ordering,
        };

        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    Ordering::Equal
}

/// Applies a top-level inclusion or exclusion projection.
fn project(document: &Document, projection: &Document) -> StoreResult<Document> {
    let flag = |value: &Bson| match value {
        Bson::Boolean(b) => *b,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0,
        _ => true,
    };

    let mut includes = projection
        .iter()
        .filter(|(field, _)| field.as_str() != ID_FIELD)
        .map(|(_, value)| flag(value));
    let inclusive = includes.next();

    if includes.any(|include| Some(include) != inclusive) {
        return Err(StoreError::InvalidQuery(
            "projection cannot mix inclusion and exclusion".into(),
        ));
    }

    let keep_id = projection.get(ID_FIELD).is_none_or(flag);

    Ok(document
        .iter()
        .filter(|(field, _)| {
            if field.as_str() == ID_FIELD {
                return keep_id;
            }
            match inclusive {
                Some(true) => projection.contains_key(field.as_str()),
                Some(false) => !projection.contains_key(field.as_str()),
                None => true,
            }
        })
        .map(|(field, value)| (field.clone(), value.clone()))
        .collect())
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// ```ignore
/// use docbridge_memory::InMemoryStore;
/// use docbridge_core::backend::StoreBackendBuilder;
///
/// let store = InMemoryStore::builder().build().await?;
/// ```
#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> BridgeResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}
