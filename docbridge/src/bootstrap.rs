//! Startup: read configuration, connect, publish the store handle.
//!
//! A [`Bootstrap`] owns the shared [`ConnectionState`]. Dispatchers can be handed out
//! before the connection exists; their operations fail with
//! [`BridgeError::NotConnected`] until [`Bootstrap::connect`] publishes the handle.
//!
//! ```ignore
//! use docbridge::prelude::*;
//!
//! let bootstrap = Bootstrap::new();
//! let (dispatcher, callbacks) = bootstrap.dispatcher();
//! tokio::spawn(callbacks.run());
//!
//! bootstrap.connect(InMemoryStore::builder(), "local").await?;
//! assert!(dispatcher.is_connected());
//! ```

use std::sync::Arc;

use tracing::{error, info};

use docbridge_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    callback::CallbackLoop,
    connection::ConnectionState,
    dispatcher::{Dispatcher, FailurePolicy},
    error::BridgeResult,
};

#[cfg(feature = "mongodb")]
use docbridge_core::config::BridgeConfig;
#[cfg(feature = "mongodb")]
use docbridge_mongodb::MongoDbStore;

/// Owner of the connection state shared by every dispatcher.
#[derive(Debug)]
pub struct Bootstrap<B: StoreBackend> {
    connection: Arc<ConnectionState<B>>,
    policy: FailurePolicy,
}

impl<B: StoreBackend> Bootstrap<B> {
    pub fn new() -> Self {
        Self {
            connection: Arc::new(ConnectionState::new()),
            policy: FailurePolicy::default(),
        }
    }

    /// Sets the failure policy of dispatchers created afterwards.
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn connection(&self) -> Arc<ConnectionState<B>> {
        Arc::clone(&self.connection)
    }

    /// Creates a dispatcher over the shared connection, with its callback loop.
    pub fn dispatcher(&self) -> (Dispatcher<B>, CallbackLoop) {
        let (dispatcher, callbacks) = Dispatcher::with_callback_loop(self.connection());

        (dispatcher.with_policy(self.policy), callbacks)
    }

    /// Builds the backend and publishes it. `database` only labels the log event.
    pub async fn connect<T>(&self, builder: T, database: &str) -> BridgeResult<()>
    where
        T: StoreBackendBuilder<Backend = B>,
    {
        let backend = builder.build().await.inspect_err(|err| {
            error!(
                target: "docbridge::bootstrap",
                database,
                error = %err,
                "Database connection failed"
            );
        })?;

        self.connection.connect(backend)?;

        info!(
            target: "docbridge::bootstrap",
            database,
            "Database connection established"
        );

        Ok(())
    }
}

impl<B: StoreBackend> Default for Bootstrap<B> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "mongodb")]
impl Bootstrap<MongoDbStore> {
    /// Connects with settings read from `MONGODB_URL` and `MONGODB_NAME`.
    pub async fn connect_from_env(&self) -> BridgeResult<()> {
        self.connect_with_config(&BridgeConfig::from_env()?).await
    }

    pub async fn connect_with_config(&self, config: &BridgeConfig) -> BridgeResult<()> {
        config.validate()?;

        self.connect(MongoDbStore::from_config(config), &config.database)
            .await
    }
}
