//! A procedure bridge between an embedding host and a document store.
//!
//! This crate is the core of the docbridge project and provides:
//!
//! - **Identifier conversion** ([`identifier`]) - Native `ObjectId` values in, hex strings out
//! - **Parameter sanitization** ([`sanitize`]) - Turns untrusted values into well-formed documents
//! - **Result export** ([`export`]) - Renders store results in their host-facing form
//! - **Deferred callbacks** ([`callback`]) - Delivers results on a later turn, never inline
//! - **Operation dispatch** ([`dispatcher`]) - insert, find, update, count, delete and their one-document variants
//! - **Typed parameters** ([`params`]) - Per-operation parameter structs over an open params bag
//! - **Store backend abstraction** ([`backend`]) - The primitives a connected store supplies
//! - **Connection state** ([`connection`]) - The single, write-once store handle
//! - **Configuration** ([`config`]) - Store URL and database name
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use docbridge_core::{connection::ConnectionState, dispatcher::Dispatcher, callback::callback};
//! use bson::doc;
//!
//! let connection = Arc::new(ConnectionState::connected(backend));
//! let (dispatcher, callbacks) = Dispatcher::with_callback_loop(connection);
//! tokio::spawn(callbacks.run());
//!
//! dispatcher
//!     .count(doc! { "collection": "users", "query": {} }, callback(|envelope| {
//!         assert!(envelope.is_success());
//!     }))
//!     .await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docbridge_core;

pub mod backend;
pub mod callback;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod export;
pub mod identifier;
pub mod params;
pub mod procedure;
pub mod sanitize;
