//! Collaboration document schema
//!
//! Records a mentor answering a question: the voice channel opened for the
//! pair and the score awarded. One per answered question.

use bson::{doc, oid::ObjectId, DateTime, Document};
use chrono::Utc;
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::{to_utc, Metadata};
use crate::db::store::Record;

/// Collection name for collaborations
pub const COLLABORATION_COLLECTION: &str = "collaborations";

/// Collaboration document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CollaborationDoc {
    /// Minted by the workflow before the question transition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    pub question_id: ObjectId,

    /// Discord id of the asker
    pub mentee_id: String,

    /// Discord id of the answering mentor
    pub mentor_id: String,

    pub skill_id: ObjectId,

    pub skill_level: i32,

    /// Ephemeral voice channel opened for the session
    pub voice_channel_id: String,

    /// Increment configured for the skill level at answer time
    pub mentor_score_increase: i64,

    /// Whether the increase has been applied to the mentor's score
    #[serde(default)]
    pub score_applied: bool,

    pub started_at: DateTime,

    #[serde(default)]
    pub ended_at: Option<DateTime>,
}

impl CollaborationDoc {
    /// API representation
    pub fn view(&self) -> CollaborationView {
        CollaborationView {
            id: self._id.map(|id| id.to_hex()).unwrap_or_default(),
            question_id: self.question_id.to_hex(),
            mentee_id: self.mentee_id.clone(),
            mentor_id: self.mentor_id.clone(),
            skill_id: self.skill_id.to_hex(),
            skill_level: self.skill_level,
            voice_channel_id: self.voice_channel_id.clone(),
            mentor_score_increase: self.mentor_score_increase,
            score_applied: self.score_applied,
            started_at: to_utc(self.started_at),
            ended_at: self.ended_at.map(to_utc),
        }
    }
}

/// Collaboration as returned by the REST API and bus
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CollaborationView {
    pub id: String,
    pub question_id: String,
    pub mentee_id: String,
    pub mentor_id: String,
    pub skill_id: String,
    pub skill_level: i32,
    pub voice_channel_id: String,
    pub mentor_score_increase: i64,
    pub score_applied: bool,
    pub started_at: chrono::DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<chrono::DateTime<Utc>>,
}

impl IntoIndexes for CollaborationDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // At most one collaboration per question
            (
                doc! { "question_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("question_id_unique".to_string())
                        .build(),
                ),
            ),
            // Pending score reconciliation scans
            (
                doc! { "score_applied": 1 },
                Some(
                    IndexOptions::builder()
                        .name("score_applied_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for CollaborationDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

impl Record for CollaborationDoc {
    const COLLECTION: &'static str = COLLABORATION_COLLECTION;

    fn id(&self) -> Option<ObjectId> {
        self._id
    }

    fn set_id(&mut self, id: ObjectId) {
        self._id = Some(id);
    }
}
