use async_trait::async_trait;
use bson::{Bson, Document, doc};
use futures::TryStreamExt;
use mongodb::{
    Client, Collection as MongoCollection,
    options::{ClientOptions, CountOptions, DeleteOptions, FindOptions, InsertManyOptions, UpdateOptions},
};
use serde::de::DeserializeOwned;
use tracing::debug;

use docbridge_core::{
    backend::{InsertOutcome, Scope, StoreBackend, StoreBackendBuilder},
    config::BridgeConfig,
    error::{BridgeError, BridgeResult, StoreError, StoreResult},
};

#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    pub fn from_config(config: &BridgeConfig) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(&config.url, &config.database)
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }
}

/// Deserializes a host `options` object into a driver option struct.
fn parse_options<T>(options: Document) -> StoreResult<T>
where
    T: DeserializeOwned + Default,
{
    if options.is_empty() {
        return Ok(T::default());
    }

    Ok(bson::deserialize_from_document(options)?)
}

/// Orders the driver's index-keyed inserted ids by insertion position.
fn ordered_ids(inserted: impl IntoIterator<Item = (usize, Bson)>) -> Vec<Bson> {
    let mut ids = inserted.into_iter().collect::<Vec<_>>();
    ids.sort_by_key(|(index, _)| *index);

    ids.into_iter().map(|(_, id)| id).collect()
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
        options: Document,
    ) -> StoreResult<InsertOutcome> {
        let result = self.get_collection(collection)
            .insert_many(documents)
            .with_options(parse_options::<InsertManyOptions>(options)?)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let inserted_ids = ordered_ids(result.inserted_ids);

        Ok(InsertOutcome {
            inserted_count: inserted_ids.len() as u64,
            inserted_ids,
        })
    }

    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: Document,
        limit: Option<i64>,
    ) -> StoreResult<Vec<Document>> {
        let mut options = parse_options::<FindOptions>(options)?;

        if let Some(limit) = limit {
            options.limit = Some(limit);
        }

        self.get_collection(collection)
            .find(filter)
            .with_options(options)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn update(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: Document,
        scope: Scope,
    ) -> StoreResult<u64> {
        let options = parse_options::<UpdateOptions>(options)?;
        let collection = self.get_collection(collection);

        let result = match scope {
            Scope::One => collection
                .update_one(filter, update)
                .with_options(options)
                .await,
            Scope::Many => collection
                .update_many(filter, update)
                .with_options(options)
                .await,
        }
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(result.modified_count)
    }

    async fn count(&self, collection: &str, filter: Document, options: Document) -> StoreResult<u64> {
        self.get_collection(collection)
            .count_documents(filter)
            .with_options(parse_options::<CountOptions>(options)?)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn delete(
        &self,
        collection: &str,
        filter: Document,
        options: Document,
        scope: Scope,
    ) -> StoreResult<u64> {
        let options = parse_options::<DeleteOptions>(options)?;
        let collection = self.get_collection(collection);

        let result = match scope {
            Scope::One => collection
                .delete_one(filter)
                .with_options(options)
                .await,
            Scope::Many => collection
                .delete_many(filter)
                .with_options(options)
                .await,
        }
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(result.deleted_count)
    }
}

pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
        }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> BridgeResult<Self::Backend> {
        let client = Client::with_options(
            ClientOptions::parse(&self.dsn)
                .await
                .map_err(|e| BridgeError::Initialization(e.to_string()))?,
        )
        .map_err(|e| BridgeError::Initialization(e.to_string()))?;

        // The driver connects lazily; ping so an unreachable server fails here.
        client
            .database(&self.database)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| BridgeError::Initialization(e.to_string()))?;

        debug!(
            target: "docbridge::mongodb",
            database = %self.database,
            "Server answered ping"
        );

        Ok(MongoDbStore::new(client, self.database))
    }
}
