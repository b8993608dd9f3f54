//! Member document schema
//!
//! A Discord user tracked by the service, with a cumulative mentor score.

use bson::{doc, oid::ObjectId, DateTime, Document};
use chrono::Utc;
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::{to_utc, Metadata};
use crate::db::store::Record;

/// Collection name for members
pub const MEMBER_COLLECTION: &str = "members";

/// Display fields captured on first contact
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct MemberProfile {
    pub username: Option<String>,
    pub discriminator: Option<String>,
}

/// Member document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct MemberDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Discord user id (unique)
    pub discord_id: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub discriminator: Option<String>,

    /// Cumulative score from answered questions
    #[serde(default)]
    pub mentor_score: i64,

    pub joined_at: DateTime,

    pub last_active: DateTime,

    #[serde(default)]
    pub roles: Vec<String>,
}

impl MemberDoc {
    /// New member with a zero score
    pub fn new(discord_id: String, profile: MemberProfile) -> Self {
        let now = DateTime::now();
        Self {
            _id: None,
            metadata: Metadata::new(),
            discord_id,
            username: profile.username,
            discriminator: profile.discriminator,
            mentor_score: 0,
            joined_at: now,
            last_active: now,
            roles: Vec::new(),
        }
    }

    /// API representation
    pub fn view(&self) -> MemberView {
        MemberView {
            discord_id: self.discord_id.clone(),
            username: self.username.clone(),
            mentor_score: self.mentor_score,
            joined_at: to_utc(self.joined_at),
            last_active: to_utc(self.last_active),
            roles: self.roles.clone(),
        }
    }
}

/// Member as returned by the REST API
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MemberView {
    pub discord_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub mentor_score: i64,
    pub joined_at: chrono::DateTime<Utc>,
    pub last_active: chrono::DateTime<Utc>,
    pub roles: Vec<String>,
}

impl IntoIndexes for MemberDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "discord_id": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("discord_id_unique".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for MemberDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

impl Record for MemberDoc {
    const COLLECTION: &'static str = MEMBER_COLLECTION;

    fn id(&self) -> Option<ObjectId> {
        self._id
    }

    fn set_id(&mut self, id: ObjectId) {
        self._id = Some(id);
    }
}
