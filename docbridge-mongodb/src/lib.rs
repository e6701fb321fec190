//! MongoDB backend implementation for docbridge.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` trait. Filters
//! and updates are handed to the server untouched, and the per-operation `options` object
//! is deserialized into the driver's own option types, so every option the driver knows
//! is available to hosts.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docbridge = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Connection
//!
//! The builder takes the connection string and database name, usually from a
//! [`BridgeConfig`](docbridge_core::config::BridgeConfig). Building pings the server so
//! that an unreachable store fails at startup rather than on the first operation.
//!
//! # Example
//!
//! ```ignore
//! use docbridge::{backend::StoreBackendBuilder, config::BridgeConfig, mongodb::MongoDbStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MongoDbStore::builder("mongodb://localhost:27017", "my_database")
//!         .build()
//!         .await?;
//!
//!     let store = MongoDbStore::from_config(&BridgeConfig::from_env()?)
//!         .build()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docbridge_mongodb;

pub mod store;

pub use store::{MongoDbStore, MongoDbStoreBuilder};
