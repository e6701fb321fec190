//! In-memory document storage backend for docbridge.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and is meant for development,
//! testing and hosts that do not need durable storage.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **MongoDB-style filters** - Comparison, membership, `$exists`, `$not` and logical operators over dotted paths
//! - **Operator updates** - `$set`, `$unset` and `$inc`
//! - **Find options** - `sort`, `skip`, `limit` and `projection`
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use docbridge::prelude::*;
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = InMemoryStore::builder().build().await?;
//!     let (dispatcher, mut callbacks) =
//!         Dispatcher::with_callback_loop(Arc::new(ConnectionState::connected(backend)));
//!
//!     dispatcher
//!         .insert_one(doc! { "collection": "users", "document": { "name": "Alice" } }, None)
//!         .await?;
//!
//!     callbacks.run_pending();
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docbridge_memory;

pub mod evaluator;
pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
