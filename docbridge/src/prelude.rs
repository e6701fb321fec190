//! Convenient re-exports of commonly used types from docbridge.
//!
//! ```ignore
//! use docbridge::prelude::*;
//! ```
//!
//! This provides access to:
//! - The dispatcher, its failure policy and the procedure table
//! - Callbacks, envelopes and the callback loop
//! - Connection state, bootstrap and configuration
//! - Store backends and builders
//! - Error types

pub use docbridge_core::{
    backend::{InsertOutcome, Scope, StoreBackend, StoreBackendBuilder},
    callback::{Callback, CallbackLoop, DeferredCallback, DeliveryHandle, callback},
    config::BridgeConfig,
    connection::ConnectionState,
    dispatcher::{Dispatcher, FailurePolicy},
    envelope::{Reply, ResultEnvelope},
    error::{BridgeError, BridgeResult, ErrorKind, StoreError, StoreResult},
    params::{CountParams, DeleteParams, FindParams, InsertParams, OperationParams, UpdateParams},
    procedure::{Procedure, ProcedureOutput},
};
pub use docbridge_memory::{InMemoryStore, InMemoryStoreBuilder};

pub use crate::bootstrap::Bootstrap;
