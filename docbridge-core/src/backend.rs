//! Storage backend abstraction for the bridge.
//!
//! The dispatcher never talks to a database driver directly. It talks to a connected
//! [`StoreBackend`], which supplies collection resolution and the CRUD primitives the
//! bridge exposes. Backends receive filters, updates and options that have already been
//! sanitized and interpret the options in their own dialect.
//!
//! # Traits
//!
//! - [`StoreBackend`]: The core trait for storage backends
//! - [`StoreBackendBuilder`]: Factory trait that establishes a backend connection
//!
//! # Examples
//!
//! ```ignore
//! use docbridge::backend::{Scope, StoreBackend};
//! use bson::doc;
//!
//! let backend = MyBackendImpl::new();
//!
//! let outcome = backend.insert_many("users", vec![doc! { "name": "Alice" }], doc! {}).await?;
//! let modified = backend
//!     .update("users", doc! { "name": "Alice" }, doc! { "$set": { "age": 30 } }, doc! {}, Scope::One)
//!     .await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use bson::{Bson, Document};
use std::{fmt::Debug, sync::Arc};

use crate::error::{BridgeResult, StoreResult};

/// How many documents a mutating operation may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Only the first matching document.
    One,
    /// Every matching document.
    Many,
}

/// Result of a bulk insert.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InsertOutcome {
    /// Number of documents the store reports as inserted.
    pub inserted_count: u64,
    /// Native identifiers of the inserted documents, in insertion order.
    pub inserted_ids: Vec<Bson>,
}

/// Checks a collection name against the naming rules MongoDB enforces.
pub fn is_valid_collection_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('$') && !name.contains('\0') && !name.starts_with("system.")
}

/// Abstract interface over a connected document store.
///
/// # Thread Safety
///
/// All implementations must be thread-safe. The bridge shares a single backend
/// between every in-flight operation.
///
/// # Error Handling
///
/// Primitives return [`StoreResult<T>`](crate::error::StoreResult). The dispatcher tags
/// failures with the operation name before surfacing them.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Whether `name` resolves to a collection handle on this store.
    ///
    /// Document stores create collections on first write, so the default accepts any
    /// name the store would accept.
    fn resolves_collection(&self, name: &str) -> bool {
        is_valid_collection_name(name)
    }

    /// Inserts documents in order.
    ///
    /// Documents without an `_id` get one assigned by the store. A failure part way
    /// through leaves the earlier documents inserted.
    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
        options: Document,
    ) -> StoreResult<InsertOutcome>;

    /// Returns the documents matching `filter`, at most `limit` of them when set.
    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: Document,
        limit: Option<i64>,
    ) -> StoreResult<Vec<Document>>;

    /// Applies `update` to the documents matching `filter` and returns how many were modified.
    async fn update(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: Document,
        scope: Scope,
    ) -> StoreResult<u64>;

    /// Counts the documents matching `filter`.
    async fn count(&self, collection: &str, filter: Document, options: Document) -> StoreResult<u64>;

    /// Deletes the documents matching `filter` and returns how many were removed.
    async fn delete(
        &self,
        collection: &str,
        filter: Document,
        options: Document,
        scope: Scope,
    ) -> StoreResult<u64>;
}

#[async_trait]
impl<B> StoreBackend for &B
where
    B: StoreBackend,
{
    fn resolves_collection(&self, name: &str) -> bool {
        (*self).resolves_collection(name)
    }

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
        options: Document,
    ) -> StoreResult<InsertOutcome> {
        (*self)
            .insert_many(collection, documents, options)
            .await
    }

    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: Document,
        limit: Option<i64>,
    ) -> StoreResult<Vec<Document>> {
        (*self)
            .find(collection, filter, options, limit)
            .await
    }

    async fn update(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: Document,
        scope: Scope,
    ) -> StoreResult<u64> {
        (*self)
            .update(collection, filter, update, options, scope)
            .await
    }

    async fn count(&self, collection: &str, filter: Document, options: Document) -> StoreResult<u64> {
        (*self)
            .count(collection, filter, options)
            .await
    }

    async fn delete(
        &self,
        collection: &str,
        filter: Document,
        options: Document,
        scope: Scope,
    ) -> StoreResult<u64> {
        (*self)
            .delete(collection, filter, options, scope)
            .await
    }
}

#[async_trait]
impl<B> StoreBackend for Arc<B>
where
    B: StoreBackend,
{
    fn resolves_collection(&self, name: &str) -> bool {
        (**self).resolves_collection(name)
    }

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
        options: Document,
    ) -> StoreResult<InsertOutcome> {
        (**self)
            .insert_many(collection, documents, options)
            .await
    }

    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: Document,
        limit: Option<i64>,
    ) -> StoreResult<Vec<Document>> {
        (**self)
            .find(collection, filter, options, limit)
            .await
    }

    async fn update(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: Document,
        scope: Scope,
    ) -> StoreResult<u64> {
        (**self)
            .update(collection, filter, update, options, scope)
            .await
    }

    async fn count(&self, collection: &str, filter: Document, options: Document) -> StoreResult<u64> {
        (**self)
            .count(collection, filter, options)
            .await
    }

    async fn delete(
        &self,
        collection: &str,
        filter: Document,
        options: Document,
        scope: Scope,
    ) -> StoreResult<u64> {
        (**self)
            .delete(collection, filter, options, scope)
            .await
    }
}

/// Factory that establishes a connected backend.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> BridgeResult<Self::Backend>;
}
