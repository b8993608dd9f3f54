//! Question document schema
//!
//! A mentee's request for help, tagged with a skill. Created open and
//! flipped to answered exactly once by the collaboration workflow.

use bson::{doc, oid::ObjectId, DateTime, Document};
use chrono::Utc;
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::{to_utc, Metadata};
use crate::db::store::Record;

/// Collection name for questions
pub const QUESTION_COLLECTION: &str = "questions";

/// Question document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct QuestionDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Discord id of the member who asked
    pub asker_id: String,

    /// Free-text question
    pub body: String,

    /// Normalised skill name the question is tagged with
    pub skill: String,

    /// When the question was asked
    pub asked_at: DateTime,

    /// Whether a mentor has answered
    #[serde(default)]
    pub answered: bool,

    /// Collaboration that answered this question (set together with `answered`)
    #[serde(default)]
    pub collaboration_id: Option<ObjectId>,
}

impl QuestionDoc {
    /// Create a new, open question
    pub fn new(asker_id: String, body: String, skill: String) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            asker_id,
            body,
            skill,
            asked_at: DateTime::now(),
            answered: false,
            collaboration_id: None,
        }
    }

    /// Hex id, or empty when not yet persisted
    pub fn id_hex(&self) -> String {
        self._id.map(|id| id.to_hex()).unwrap_or_default()
    }

    /// API representation
    pub fn view(&self) -> QuestionView {
        QuestionView {
            id: self.id_hex(),
            asker_id: self.asker_id.clone(),
            body: self.body.clone(),
            skill: self.skill.clone(),
            asked_at: to_utc(self.asked_at),
            answered: self.answered,
            collaboration_id: self.collaboration_id.map(|id| id.to_hex()),
        }
    }
}

/// Question as returned by the REST API and bus
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub id: String,
    pub asker_id: String,
    pub body: String,
    pub skill: String,
    pub asked_at: chrono::DateTime<Utc>,
    pub answered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collaboration_id: Option<String>,
}

impl IntoIndexes for QuestionDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "answered": 1, "skill": 1 },
            Some(
                IndexOptions::builder()
                    .name("answered_skill_index".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for QuestionDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

impl Record for QuestionDoc {
    const COLLECTION: &'static str = QUESTION_COLLECTION;

    fn id(&self) -> Option<ObjectId> {
        self._id
    }

    fn set_id(&mut self, id: ObjectId) {
        self._id = Some(id);
    }
}
