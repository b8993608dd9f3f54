//! Database layer
//!
//! MongoDB client, typed collections, the shared `DocumentStore` contract
//! and an in-process store for dev mode and tests.

pub mod memory;
pub mod mongo;
pub mod schemas;
pub mod store;

pub use memory::MemoryStore;
pub use mongo::{IntoIndexes, MongoClient, MongoCollection, MutMetadata};
pub use store::{by_id, DocumentStore, Patch, Record};

use bson::oid::ObjectId;
use std::sync::Arc;

use crate::db::schemas::{CollaborationDoc, ManagerDoc, MemberDoc, QuestionDoc, SkillDoc};
use crate::types::{MentorError, Result};

/// Parse a hex object id supplied by a caller
pub fn parse_object_id(raw: &str, what: &str) -> Result<ObjectId> {
    ObjectId::parse_str(raw.trim())
        .map_err(|_| MentorError::InvalidInput(format!("`{}` is not a valid {} id", raw, what)))
}

/// One store per collection, shared by the services
#[derive(Clone)]
pub struct Stores {
    pub questions: Arc<dyn DocumentStore<QuestionDoc>>,
    pub skills: Arc<dyn DocumentStore<SkillDoc>>,
    pub members: Arc<dyn DocumentStore<MemberDoc>>,
    pub collaborations: Arc<dyn DocumentStore<CollaborationDoc>>,
    pub managers: Arc<dyn DocumentStore<ManagerDoc>>,
}

impl Stores {
    /// In-process stores (dev mode and tests)
    pub fn memory() -> Self {
        Self {
            questions: Arc::new(MemoryStore::<QuestionDoc>::new()),
            skills: Arc::new(MemoryStore::<SkillDoc>::new()),
            members: Arc::new(MemoryStore::<MemberDoc>::new()),
            collaborations: Arc::new(MemoryStore::<CollaborationDoc>::new()),
            managers: Arc::new(MemoryStore::<ManagerDoc>::new()),
        }
    }

    /// MongoDB collections, with indexes applied
    pub async fn mongo(client: &MongoClient) -> Result<Self> {
        Ok(Self {
            questions: Arc::new(client.collection::<QuestionDoc>().await?),
            skills: Arc::new(client.collection::<SkillDoc>().await?),
            members: Arc::new(client.collection::<MemberDoc>().await?),
            collaborations: Arc::new(client.collection::<CollaborationDoc>().await?),
            managers: Arc::new(client.collection::<ManagerDoc>().await?),
        })
    }
}
