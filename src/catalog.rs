//! Skill catalog
//!
//! Read-mostly reference data mapping a skill and level to the mentor score
//! increment awarded for answering at that level. Administration (create,
//! replace levels, retire, seed from file) validates the catalog invariants
//! on every write.

use bson::{doc, oid::ObjectId, Bson};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::db::schemas::{normalize_skill_name, SkillDoc, SkillLevel};
use crate::db::{DocumentStore, Patch};
use crate::types::{MentorError, Result};

/// Skill level resolved for a specific answer
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLevel {
    pub skill_id: ObjectId,
    pub skill_name: String,
    pub level: i32,
    pub score_increment: i64,
}

/// Skill definition accepted by the admin API and seed files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSkill {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub levels: Vec<SkillLevel>,
}

impl NewSkill {
    fn into_doc(self) -> Result<SkillDoc> {
        let doc = SkillDoc::new(&self.name, self.description, self.levels);
        doc.validate().map_err(MentorError::InvalidInput)?;
        Ok(doc)
    }
}

/// Skill catalog backed by the skills collection
#[derive(Clone)]
pub struct SkillCatalog {
    skills: Arc<dyn DocumentStore<SkillDoc>>,
}

impl SkillCatalog {
    pub fn new(skills: Arc<dyn DocumentStore<SkillDoc>>) -> Self {
        Self { skills }
    }

    /// Resolve the score increment for `level` of `skill_name`.
    ///
    /// Fails with `SkillNotFound` when the skill is unknown and
    /// `LevelNotFound` when the skill has no such level.
    pub async fn resolve_increment(&self, skill_name: &str, level: i32) -> Result<ResolvedLevel> {
        let skill = self.get(skill_name).await?;

        let found = skill.level(level).ok_or_else(|| MentorError::LevelNotFound {
            skill: skill.name.clone(),
            level,
        })?;

        let skill_id = skill
            ._id
            .ok_or_else(|| MentorError::Internal(format!("Skill {} has no id", skill.name)))?;

        debug!(
            skill = %skill.name,
            level = level,
            increment = found.score_increment,
            "Resolved skill level"
        );

        Ok(ResolvedLevel {
            skill_id,
            skill_name: skill.name.clone(),
            level,
            score_increment: found.score_increment,
        })
    }

    /// Look up a skill by name (case-insensitive)
    pub async fn get(&self, name: &str) -> Result<SkillDoc> {
        let normalized = normalize_skill_name(name);
        self.skills
            .find_one(doc! { "name": &normalized })
            .await?
            .ok_or(MentorError::SkillNotFound(normalized))
    }

    /// All skills, sorted by name
    pub async fn list(&self) -> Result<Vec<SkillDoc>> {
        let mut skills = self.skills.find_many(doc! {}).await?;
        skills.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(skills)
    }

    /// Add a skill to the catalog
    pub async fn create(&self, skill: NewSkill) -> Result<SkillDoc> {
        let doc = skill.into_doc()?;

        if self
            .skills
            .find_one(doc! { "name": &doc.name })
            .await?
            .is_some()
        {
            return Err(MentorError::Conflict(format!(
                "Skill `{}` already exists",
                doc.name
            )));
        }

        let created = self.skills.insert(doc).await?;
        info!(skill = %created.name, levels = created.levels.len(), "Skill created");
        Ok(created)
    }

    /// Replace the levels of an existing skill
    pub async fn replace_levels(&self, name: &str, levels: Vec<SkillLevel>) -> Result<SkillDoc> {
        let current = self.get(name).await?;
        let candidate = SkillDoc::new(&current.name, current.description.clone(), levels);
        candidate.validate().map_err(MentorError::InvalidInput)?;

        let levels = bson::to_bson(&candidate.levels)?;
        self.skills
            .update_one(doc! { "name": &current.name }, Patch::set("levels", levels))
            .await?
            .ok_or(MentorError::SkillNotFound(current.name))
    }

    /// Soft-delete a skill; questions already tagged with it stay readable
    pub async fn retire(&self, name: &str) -> Result<()> {
        let normalized = normalize_skill_name(name);
        let patch = Patch::set("metadata.is_deleted", true)
            .and_set("metadata.deleted_at", Bson::DateTime(bson::DateTime::now()));

        self.skills
            .update_one(doc! { "name": &normalized }, patch)
            .await?
            .ok_or(MentorError::SkillNotFound(normalized.clone()))?;

        info!(skill = %normalized, "Skill retired");
        Ok(())
    }

    /// Create every skill that does not exist yet. Returns how many were added.
    pub async fn seed(&self, skills: Vec<NewSkill>) -> Result<usize> {
        let mut added = 0;
        for skill in skills {
            match self.create(skill).await {
                Ok(_) => added += 1,
                Err(MentorError::Conflict(msg)) => debug!("Seed skipped: {}", msg),
                Err(e) => return Err(e),
            }
        }
        Ok(added)
    }

    /// Read a JSON array of skills from disk
    pub async fn load_seed_file(path: &Path) -> Result<Vec<NewSkill>> {
        let raw = tokio::fs::read(path).await?;
        Ok(serde_json::from_slice(&raw)?)
    }
}
