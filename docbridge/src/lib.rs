//! Main docbridge crate: CRUD procedures over a document store for an embedding host.
//!
//! A host runtime (a game server, a scripting engine, a plugin system) registers the
//! bridge's procedures and calls them with a loosely-typed params object and an optional
//! callback. The bridge validates the params, normalizes identifiers, runs one store
//! operation and delivers a positional result envelope to the callback on a later turn.
//!
//! This crate re-exports the core types from the sub-crates and wires startup together.
//!
//! # Quick Start
//!
//! ```ignore
//! use docbridge::prelude::*;
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bootstrap = Bootstrap::new();
//!     let (dispatcher, callbacks) = bootstrap.dispatcher();
//!     tokio::spawn(callbacks.run());
//!
//!     bootstrap.connect(InMemoryStore::builder(), "local").await?;
//!
//!     dispatcher
//!         .insert(
//!             doc! { "collection": "players", "documents": [{ "name": "a" }, { "name": "b" }] },
//!             callback(|envelope| println!("{:?}", envelope.into_args())),
//!         )
//!         .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Host registration
//!
//! Every procedure is reachable by its host-facing name through [`Procedure`](prelude::Procedure):
//!
//! ```ignore
//! for procedure in Procedure::ALL {
//!     host.register(procedure.name(), move |params, cb| dispatcher.call(procedure, params, cb));
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - [`mongodb`] - MongoDB backend (requires `mongodb` feature)

pub mod bootstrap;
pub mod prelude;

pub use docbridge_core::{
    backend, callback, config, connection, dispatcher, envelope, error, export, identifier, params,
    procedure, sanitize,
};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docbridge_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docbridge_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
