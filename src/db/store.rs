//! Persistence contract shared by every component
//!
//! `DocumentStore` is the small CRUD surface the core needs: insert, find,
//! a single atomic conditional update and an atomic find-or-insert. It is
//! implemented by [`MongoCollection`](crate::db::MongoCollection) and by the
//! in-process [`MemoryStore`](crate::db::MemoryStore).

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Bson, DateTime, Document};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::types::Result;

/// A document type stored in its own collection
pub trait Record:
    Serialize
    + DeserializeOwned
    + Debug
    + Unpin
    + Send
    + Sync
    + Clone
    + IntoIndexes
    + MutMetadata
    + 'static
{
    /// Collection name
    const COLLECTION: &'static str;

    /// Store-assigned identifier, if persisted
    fn id(&self) -> Option<ObjectId>;

    /// Set the identifier (used when the store assigns one)
    fn set_id(&mut self, id: ObjectId);
}

/// Field modifications applied by [`DocumentStore::update_one`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    /// Fields to overwrite (`$set`)
    pub set: Document,
    /// Numeric fields to increment (`$inc`)
    pub inc: Document,
}

impl Patch {
    /// Patch that sets a single field
    pub fn set(key: &str, value: impl Into<Bson>) -> Self {
        Self::default().and_set(key, value)
    }

    /// Patch that increments a single field
    pub fn inc(key: &str, delta: impl Into<Bson>) -> Self {
        Self::default().and_inc(key, delta)
    }

    /// Add a field to overwrite
    pub fn and_set(mut self, key: &str, value: impl Into<Bson>) -> Self {
        self.set.insert(key, value.into());
        self
    }

    /// Add a field to increment
    pub fn and_inc(mut self, key: &str, delta: impl Into<Bson>) -> Self {
        self.inc.insert(key, delta.into());
        self
    }

    /// Render as a MongoDB update document, stamping `metadata.updated_at`
    pub fn into_update(self) -> Document {
        let mut set = self.set;
        set.insert("metadata.updated_at", DateTime::now());

        let mut update = doc! { "$set": set };
        if !self.inc.is_empty() {
            update.insert("$inc", self.inc);
        }
        update
    }
}

/// Generic create/find/update adapter over one record kind
#[async_trait]
pub trait DocumentStore<T: Record>: Send + Sync {
    /// Insert a record, assigning `_id` when absent. Returns the stored record.
    async fn insert(&self, record: T) -> Result<T>;

    /// Find the first record matching an equality filter
    async fn find_one(&self, filter: Document) -> Result<Option<T>>;

    /// Find all records matching an equality filter
    async fn find_many(&self, filter: Document) -> Result<Vec<T>>;

    /// Atomically apply `patch` to the first record matching `filter`.
    ///
    /// Returns the updated record, or `None` when nothing matched. The filter
    /// may include state predicates (e.g. `answered: false`), which makes this
    /// a compare-and-set.
    async fn update_one(&self, filter: Document, patch: Patch) -> Result<Option<T>>;

    /// Atomically return the record matching `filter`, inserting `record` if
    /// none exists. At most one record is ever created per filter.
    async fn find_or_insert(&self, filter: Document, record: T) -> Result<T>;
}

/// Filter on a record's `_id`
pub fn by_id(id: ObjectId) -> Document {
    doc! { "_id": id }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_into_update() {
        let update = Patch::set("answered", true)
            .and_inc("mentor_score", 25_i64)
            .into_update();

        let set = update.get_document("$set").unwrap();
        assert_eq!(set.get_bool("answered").unwrap(), true);
        assert!(set.contains_key("metadata.updated_at"));

        let inc = update.get_document("$inc").unwrap();
        assert_eq!(inc.get_i64("mentor_score").unwrap(), 25);
    }

    #[test]
    fn test_patch_without_inc() {
        let update = Patch::set("ended_at", DateTime::now()).into_update();
        assert!(!update.contains_key("$inc"));
    }
}
