//! Skill document schema
//!
//! Reference data: a named skill with an ordered list of levels, each
//! awarding a fixed mentor score increment.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::db::store::Record;

/// Collection name for skills
pub const SKILL_COLLECTION: &str = "skills";

/// Canonical form of a skill name used for storage and lookup
pub fn normalize_skill_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// One level of a skill
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SkillLevel {
    /// Level number, unique within the skill (higher = harder)
    pub level: i32,
    /// Mentor score awarded for answering at this level
    pub score_increment: i64,
    /// Human description of the level
    #[serde(default)]
    pub description: String,
}

/// Skill document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SkillDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Normalised unique name
    pub name: String,

    /// Description
    #[serde(default)]
    pub description: String,

    /// Levels, kept sorted by level number
    pub levels: Vec<SkillLevel>,
}

impl SkillDoc {
    /// Create a skill; levels are sorted by number
    pub fn new(name: &str, description: String, mut levels: Vec<SkillLevel>) -> Self {
        levels.sort_by_key(|l| l.level);
        Self {
            _id: None,
            metadata: Metadata::new(),
            name: normalize_skill_name(name),
            description,
            levels,
        }
    }

    /// Look up a level by number
    pub fn level(&self, level: i32) -> Option<&SkillLevel> {
        self.levels.iter().find(|l| l.level == level)
    }

    /// Check the catalog invariants: non-empty name, at least one level,
    /// unique level numbers, non-negative increments.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("Skill name must not be empty".to_string());
        }
        if self.levels.is_empty() {
            return Err(format!("Skill `{}` must define at least one level", self.name));
        }

        let mut seen = HashSet::new();
        for level in &self.levels {
            if !seen.insert(level.level) {
                return Err(format!(
                    "Skill `{}` defines level {} more than once",
                    self.name, level.level
                ));
            }
            if level.score_increment < 0 {
                return Err(format!(
                    "Skill `{}` level {} has a negative score increment",
                    self.name, level.level
                ));
            }
        }
        Ok(())
    }

    /// API representation
    pub fn view(&self) -> SkillView {
        SkillView {
            id: self._id.map(|id| id.to_hex()).unwrap_or_default(),
            name: self.name.clone(),
            description: self.description.clone(),
            levels: self.levels.clone(),
        }
    }
}

/// Skill as returned by the REST API
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SkillView {
    pub id: String,
    pub name: String,
    pub description: String,
    pub levels: Vec<SkillLevel>,
}

impl IntoIndexes for SkillDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "name": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("name_unique".to_string())
                    // Retired skills release their name
                    .partial_filter_expression(doc! { "metadata.is_deleted": false })
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for SkillDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

impl Record for SkillDoc {
    const COLLECTION: &'static str = SKILL_COLLECTION;

    fn id(&self) -> Option<ObjectId> {
        self._id
    }

    fn set_id(&mut self, id: ObjectId) {
        self._id = Some(id);
    }
}
