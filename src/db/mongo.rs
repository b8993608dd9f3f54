//! MongoDB client and collection wrapper

use async_trait::async_trait;
use bson::{doc, DateTime, Document};
use mongodb::{
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{IndexOptions, ReturnDocument},
    Client, Collection, IndexModel,
};
use tracing::{error, info, warn};

use crate::db::schemas::Metadata;
use crate::db::store::{DocumentStore, Patch, Record};
use crate::types::{MentorError, Result};

/// Server error code for unique index violations
const DUPLICATE_KEY: i32 = 11000;

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Trait for schemas with mutable metadata
pub trait MutMetadata {
    fn mut_metadata(&mut self) -> &mut Metadata;
}

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Create a new MongoDB client
    pub async fn new(uri: &str, db_name: &str) -> Result<Self> {
        info!("Connecting to MongoDB at {}", uri);

        // Fail fast when the server is unreachable
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| MentorError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| MentorError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Get the typed collection for a record kind, applying its indexes
    pub async fn collection<T: Record>(&self) -> Result<MongoCollection<T>> {
        MongoCollection::new(&self.client, &self.db_name, T::COLLECTION).await
    }

    /// Get the database name
    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}

/// Typed MongoDB collection with automatic indexing
#[derive(Debug, Clone)]
pub struct MongoCollection<T>
where
    T: Record,
{
    inner: Collection<T>,
}

impl<T: Record> MongoCollection<T> {
    /// Create a new collection and apply indexes
    pub async fn new(client: &Client, db_name: &str, collection_name: &str) -> Result<Self> {
        let collection = client.database(db_name).collection::<T>(collection_name);
        let mongo_collection = MongoCollection { inner: collection };

        mongo_collection.apply_indexes().await?;

        Ok(mongo_collection)
    }

    /// Apply schema-defined indexes
    async fn apply_indexes(&self) -> Result<()> {
        let schema_indices = T::into_indices();

        if schema_indices.is_empty() {
            return Ok(());
        }

        let indices: Vec<IndexModel> = schema_indices
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.inner
            .create_indexes(indices)
            .await
            .map_err(|e| MentorError::Database(format!("Failed to create indexes: {}", e)))?;

        Ok(())
    }
}

/// Add the soft-delete guard to a filter
fn live(mut filter: Document) -> Document {
    filter.insert("metadata.is_deleted", doc! { "$ne": true });
    filter
}

fn is_duplicate_key(e: &MongoError) -> bool {
    match e.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(we)) => we.code == DUPLICATE_KEY,
        ErrorKind::Command(ce) => ce.code == DUPLICATE_KEY,
        _ => false,
    }
}

#[async_trait]
impl<T: Record> DocumentStore<T> for MongoCollection<T> {
    async fn insert(&self, mut record: T) -> Result<T> {
        let metadata = record.mut_metadata();
        metadata.is_deleted = false;
        metadata.created_at = Some(DateTime::now());
        metadata.updated_at = Some(DateTime::now());

        let result = self.inner.insert_one(&record).await.map_err(|e| {
            if is_duplicate_key(&e) {
                MentorError::Conflict(format!("Duplicate {} record", T::COLLECTION))
            } else {
                MentorError::Database(format!("Insert failed: {}", e))
            }
        })?;

        let id = result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| MentorError::Database("Failed to get inserted ID".into()))?;
        record.set_id(id);

        Ok(record)
    }

    async fn find_one(&self, filter: Document) -> Result<Option<T>> {
        self.inner
            .find_one(live(filter))
            .await
            .map_err(|e| MentorError::Database(format!("Find failed: {}", e)))
    }

    async fn find_many(&self, filter: Document) -> Result<Vec<T>> {
        use futures_util::StreamExt;

        let cursor = self
            .inner
            .find(live(filter))
            .await
            .map_err(|e| MentorError::Database(format!("Find failed: {}", e)))?;

        let results: Vec<T> = cursor
            .filter_map(|doc| async {
                match doc {
                    Ok(d) => Some(d),
                    Err(e) => {
                        error!("Error reading {} document: {}", T::COLLECTION, e);
                        None
                    }
                }
            })
            .collect()
            .await;

        Ok(results)
    }

    async fn update_one(&self, filter: Document, patch: Patch) -> Result<Option<T>> {
        self.inner
            .find_one_and_update(live(filter), patch.into_update())
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| MentorError::Database(format!("Update failed: {}", e)))
    }

    async fn find_or_insert(&self, filter: Document, mut record: T) -> Result<T> {
        let metadata = record.mut_metadata();
        metadata.is_deleted = false;
        metadata.created_at = Some(DateTime::now());
        metadata.updated_at = Some(DateTime::now());

        let update = doc! { "$setOnInsert": bson::to_document(&record)? };

        let upserted = self
            .inner
            .find_one_and_update(filter.clone(), update)
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await;

        match upserted {
            Ok(Some(found)) => Ok(found),
            Ok(None) => Err(MentorError::Database(format!(
                "Upsert into {} returned no document",
                T::COLLECTION
            ))),
            // Two concurrent upserts can race on the unique index; the loser
            // reads the winner's document.
            Err(e) if is_duplicate_key(&e) => {
                warn!("Concurrent upsert into {}, re-reading", T::COLLECTION);
                self.find_one(filter).await?.ok_or_else(|| {
                    MentorError::Database(format!(
                        "Record vanished after duplicate key in {}",
                        T::COLLECTION
                    ))
                })
            }
            Err(e) => Err(MentorError::Database(format!("Upsert failed: {}", e))),
        }
    }
}
