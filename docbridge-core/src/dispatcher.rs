//! The CRUD operations exposed to the host.
//!
//! Every operation follows the same path: precondition checks, parameter sanitization,
//! one store call, result export and deferred delivery of a [`ResultEnvelope`] to the
//! optional callback.
//!
//! Preconditions are checked in this order, and each one stops the operation with an
//! error returned to the host without invoking the callback:
//!
//! 1. the store handle is connected
//! 2. the params bag is a document
//! 3. `params.collection` resolves on the store
//! 4. the operation-specific required fields are present and well-formed
//!
//! A store failure is delivered to the callback as a failed envelope. Under the default
//! [`FailurePolicy`] it is also returned to the host as an error.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use docbridge::prelude::*;
//! use bson::doc;
//!
//! let connection = Arc::new(ConnectionState::connected(InMemoryStore::new()));
//! let (dispatcher, mut callbacks) = Dispatcher::with_callback_loop(connection);
//!
//! dispatcher
//!     .insert(
//!         doc! { "collection": "users", "documents": [{ "name": "a" }, { "name": "b" }] },
//!         callback(|envelope| println!("{:?}", envelope.into_args())),
//!     )
//!     .await?;
//!
//! callbacks.run_pending();
//! ```

use std::{fmt, sync::Arc};

use tracing::{debug, warn};

use crate::{
    backend::{Scope, StoreBackend},
    callback::{Callback, CallbackLoop, DeferredCallback},
    connection::ConnectionState,
    envelope::{Reply, ResultEnvelope},
    error::{BridgeError, BridgeResult, StoreResult},
    export::ResultExporter,
    identifier::IdentifierCodec,
    params::{FilterParams, FindParams, InsertParams, LIMIT, OperationParams, ParamFields, UpdateParams},
    procedure::{Procedure, ProcedureOutput},
};

/// How store failures reach the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailurePolicy {
    /// Return store failures to the host as `Err` in addition to delivering them to the
    /// callback. When `false` the operation returns `Ok` with the failed envelope.
    pub propagate_to_host: bool,
}

impl FailurePolicy {
    pub fn propagate() -> Self {
        Self {
            propagate_to_host: true,
        }
    }

    pub fn callback_only() -> Self {
        Self {
            propagate_to_host: false,
        }
    }
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self::propagate()
    }
}

/// Dispatches host procedures onto a connected store.
pub struct Dispatcher<B: StoreBackend> {
    connection: Arc<ConnectionState<B>>,
    deferred: DeferredCallback,
    policy: FailurePolicy,
}

impl<B: StoreBackend> Dispatcher<B> {
    pub fn new(connection: Arc<ConnectionState<B>>, deferred: DeferredCallback) -> Self {
        Self {
            connection,
            deferred,
            policy: FailurePolicy::default(),
        }
    }

    /// Creates a dispatcher together with the loop that runs its callbacks.
    pub fn with_callback_loop(connection: Arc<ConnectionState<B>>) -> (Self, CallbackLoop) {
        let (deferred, callbacks) = DeferredCallback::channel();

        (Self::new(connection, deferred), callbacks)
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn connection(&self) -> &Arc<ConnectionState<B>> {
        &self.connection
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Inserts `params.documents` and reports the count and identifiers.
    pub async fn insert(
        &self,
        params: impl Into<OperationParams>,
        callback: Option<Callback>,
    ) -> BridgeResult<ResultEnvelope> {
        self.insert_as(Procedure::Insert, params.into(), callback).await
    }

    /// Inserts `params.document` as a one-element insert.
    pub async fn insert_one(
        &self,
        params: impl Into<OperationParams>,
        callback: Option<Callback>,
    ) -> BridgeResult<ResultEnvelope> {
        self.insert_as(Procedure::InsertOne, params.into(), callback).await
    }

    /// Finds the documents matching `params.query`, capped by `params.limit` when truthy.
    pub async fn find(
        &self,
        params: impl Into<OperationParams>,
        callback: Option<Callback>,
    ) -> BridgeResult<ResultEnvelope> {
        self.find_as(Procedure::Find, params.into(), callback).await
    }

    /// Finds at most one document. The payload is still a sequence.
    pub async fn find_one(
        &self,
        params: impl Into<OperationParams>,
        callback: Option<Callback>,
    ) -> BridgeResult<ResultEnvelope> {
        let mut params = params.into();
        params.set(LIMIT, 1_i32);

        self.find_as(Procedure::FindOne, params, callback).await
    }

    /// Updates every document matching `params.query`.
    pub async fn update(
        &self,
        params: impl Into<OperationParams>,
        callback: Option<Callback>,
    ) -> BridgeResult<ResultEnvelope> {
        self.update_with(params, callback, Scope::Many).await
    }

    /// Updates the first document matching `params.query`.
    pub async fn update_one(
        &self,
        params: impl Into<OperationParams>,
        callback: Option<Callback>,
    ) -> BridgeResult<ResultEnvelope> {
        self.update_with(params, callback, Scope::One).await
    }

    /// Updates with an explicit [`Scope`] and reports the modified count.
    pub async fn update_with(
        &self,
        params: impl Into<OperationParams>,
        callback: Option<Callback>,
        scope: Scope,
    ) -> BridgeResult<ResultEnvelope> {
        let operation = match scope {
            Scope::One => Procedure::UpdateOne,
            Scope::Many => Procedure::Update,
        };
        let (backend, collection, fields) = self.prepare(operation, params.into())?;
        let params = UpdateParams::parse(collection, fields)?;

        let result = backend
            .update(&params.collection, params.query, params.update, params.options, scope)
            .await
            .map(Reply::Modified);

        self.complete(operation, result, callback)
    }

    /// Counts the documents matching `params.query`.
    pub async fn count(
        &self,
        params: impl Into<OperationParams>,
        callback: Option<Callback>,
    ) -> BridgeResult<ResultEnvelope> {
        let operation = Procedure::Count;
        let (backend, collection, fields) = self.prepare(operation, params.into())?;
        let params = FilterParams::parse(collection, fields)?;

        let result = backend
            .count(&params.collection, params.query, params.options)
            .await
            .map(Reply::Counted);

        self.complete(operation, result, callback)
    }

    /// Deletes every document matching `params.query`.
    pub async fn delete(
        &self,
        params: impl Into<OperationParams>,
        callback: Option<Callback>,
    ) -> BridgeResult<ResultEnvelope> {
        self.delete_with(params, callback, Scope::Many).await
    }

    /// Deletes the first document matching `params.query`.
    pub async fn delete_one(
        &self,
        params: impl Into<OperationParams>,
        callback: Option<Callback>,
    ) -> BridgeResult<ResultEnvelope> {
        self.delete_with(params, callback, Scope::One).await
    }

    /// Deletes with an explicit [`Scope`] and reports the deleted count.
    pub async fn delete_with(
        &self,
        params: impl Into<OperationParams>,
        callback: Option<Callback>,
        scope: Scope,
    ) -> BridgeResult<ResultEnvelope> {
        let operation = match scope {
            Scope::One => Procedure::DeleteOne,
            Scope::Many => Procedure::Delete,
        };
        let (backend, collection, fields) = self.prepare(operation, params.into())?;
        let params = FilterParams::parse(collection, fields)?;

        let result = backend
            .delete(&params.collection, params.query, params.options, scope)
            .await
            .map(Reply::Deleted);

        self.complete(operation, result, callback)
    }

    /// Runs a procedure by its host-facing name.
    pub async fn call(
        &self,
        procedure: Procedure,
        params: impl Into<OperationParams>,
        callback: Option<Callback>,
    ) -> BridgeResult<ProcedureOutput> {
        let envelope = match procedure {
            Procedure::IsConnected => return Ok(ProcedureOutput::Connected(self.is_connected())),
            Procedure::Insert => self.insert(params, callback).await?,
            Procedure::InsertOne => self.insert_one(params, callback).await?,
            Procedure::Find => self.find(params, callback).await?,
            Procedure::FindOne => self.find_one(params, callback).await?,
            Procedure::Update => self.update(params, callback).await?,
            Procedure::UpdateOne => self.update_one(params, callback).await?,
            Procedure::Count => self.count(params, callback).await?,
            Procedure::Delete => self.delete(params, callback).await?,
            Procedure::DeleteOne => self.delete_one(params, callback).await?,
        };

        Ok(ProcedureOutput::Completed(envelope))
    }

    async fn insert_as(
        &self,
        operation: Procedure,
        params: OperationParams,
        callback: Option<Callback>,
    ) -> BridgeResult<ResultEnvelope> {
        let (backend, collection, fields) = self.prepare(operation, params)?;
        let params = match operation {
            Procedure::InsertOne => InsertParams::parse_single(collection, fields)?,
            _ => InsertParams::parse(collection, fields)?,
        };

        let result = backend
            .insert_many(&params.collection, params.documents, params.options)
            .await
            .map(|outcome| Reply::Inserted {
                count: outcome.inserted_count,
                ids: outcome
                    .inserted_ids
                    .iter()
                    .map(IdentifierCodec::portable_string)
                    .collect(),
            });

        self.complete(operation, result, callback)
    }

    async fn find_as(
        &self,
        operation: Procedure,
        params: OperationParams,
        callback: Option<Callback>,
    ) -> BridgeResult<ResultEnvelope> {
        let (backend, collection, fields) = self.prepare(operation, params)?;
        let params = FindParams::parse(collection, fields)?;

        let result = backend
            .find(&params.collection, params.query, params.options, params.limit)
            .await
            .map(|documents| Reply::Documents(ResultExporter::export_documents(documents)));

        self.complete(operation, result, callback)
    }

    /// Checks the generic preconditions and resolves the target collection.
    fn prepare(
        &self,
        operation: Procedure,
        params: OperationParams,
    ) -> BridgeResult<(&B, String, ParamFields)> {
        let backend = self.connection.handle()?;
        let fields = params.into_fields(operation.name())?;
        let collection = fields.collection()?;

        if !backend.resolves_collection(&collection) {
            return Err(BridgeError::InvalidCollection {
                operation: operation.name(),
                collection,
            });
        }

        debug!(
            target: "docbridge::dispatch",
            operation = operation.name(),
            collection = %collection,
            "Dispatching operation"
        );

        Ok((backend, collection, fields))
    }

    /// Delivers the outcome of a store call and applies the failure policy.
    fn complete(
        &self,
        operation: Procedure,
        result: StoreResult<Reply>,
        callback: Option<Callback>,
    ) -> BridgeResult<ResultEnvelope> {
        let envelope = match result {
            Ok(reply) => ResultEnvelope::success(reply),
            Err(err) => {
                let err = BridgeError::store(operation.name(), err);
                warn!(
                    target: "docbridge::dispatch",
                    operation = operation.name(),
                    error = %err,
                    "Store operation failed"
                );
                ResultEnvelope::failure(err)
            }
        };

        if callback.is_some() {
            self.deferred.deliver(callback, envelope.clone());
        }

        match envelope.0 {
            Err(err) if self.policy.propagate_to_host => Err(err),
            result => Ok(ResultEnvelope(result)),
        }
    }
}

impl<B: StoreBackend> Clone for Dispatcher<B> {
    fn clone(&self) -> Self {
        Self {
            connection: Arc::clone(&self.connection),
            deferred: self.deferred.clone(),
            policy: self.policy,
        }
    }
}

impl<B: StoreBackend> fmt::Debug for Dispatcher<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("connected", &self.is_connected())
            .field("policy", &self.policy)
            .field("deferred", &self.deferred)
            .finish()
    }
}

