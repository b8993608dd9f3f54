//! Member registry
//!
//! Discord users known to the service and their cumulative mentor score.
//! Members are created on first contact; the score only ever moves through
//! a single atomic increment.

use bson::{doc, DateTime};
use std::sync::Arc;
use tracing::{debug, info};

use crate::db::schemas::{MemberDoc, MemberProfile};
use crate::db::{DocumentStore, Patch};
use crate::types::{MentorError, Result};

#[derive(Clone)]
pub struct MemberRegistry {
    members: Arc<dyn DocumentStore<MemberDoc>>,
}

impl MemberRegistry {
    pub fn new(members: Arc<dyn DocumentStore<MemberDoc>>) -> Self {
        Self { members }
    }

    /// Return the member for `discord_id`, creating it with a zero score on
    /// first contact. Concurrent first contacts produce a single member.
    pub async fn get_or_create(&self, discord_id: &str, profile: MemberProfile) -> Result<MemberDoc> {
        let discord_id = discord_id.trim();
        if discord_id.is_empty() {
            return Err(MentorError::InvalidInput("Member id is empty".into()));
        }

        let member = self
            .members
            .find_or_insert(
                doc! { "discord_id": discord_id },
                MemberDoc::new(discord_id.to_string(), profile),
            )
            .await?;

        debug!(member = %member.discord_id, score = member.mentor_score, "Member resolved");
        Ok(member)
    }

    pub async fn get(&self, discord_id: &str) -> Result<MemberDoc> {
        self.members
            .find_one(doc! { "discord_id": discord_id })
            .await?
            .ok_or_else(|| MentorError::MemberNotFound(discord_id.to_string()))
    }

    /// Atomically add `delta` to the member's score and refresh `last_active`
    pub async fn apply_score_increase(&self, discord_id: &str, delta: i64) -> Result<MemberDoc> {
        if delta < 0 {
            return Err(MentorError::InvalidInput(format!(
                "Score increase must not be negative (got {})",
                delta
            )));
        }

        let patch = Patch::inc("mentor_score", delta).and_set("last_active", DateTime::now());
        let member = self
            .members
            .update_one(doc! { "discord_id": discord_id }, patch)
            .await?
            .ok_or_else(|| MentorError::MemberNotFound(discord_id.to_string()))?;

        info!(
            member = %member.discord_id,
            delta = delta,
            score = member.mentor_score,
            "Mentor score increased"
        );
        Ok(member)
    }

    /// Refresh `last_active`
    pub async fn touch(&self, discord_id: &str) -> Result<MemberDoc> {
        self.members
            .update_one(
                doc! { "discord_id": discord_id },
                Patch::set("last_active", DateTime::now()),
            )
            .await?
            .ok_or_else(|| MentorError::MemberNotFound(discord_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    fn registry() -> (MemberRegistry, Arc<MemoryStore<MemberDoc>>) {
        let store = Arc::new(MemoryStore::<MemberDoc>::new());
        (MemberRegistry::new(store.clone()), store)
    }

    fn profile(name: &str) -> MemberProfile {
        MemberProfile {
            username: Some(name.to_string()),
            discriminator: None,
        }
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let (registry, store) = registry();

        let first = registry.get_or_create("42", profile("ada")).await.unwrap();
        assert_eq!(first.mentor_score, 0);
        assert_eq!(first.username.as_deref(), Some("ada"));

        let second = registry.get_or_create("42", profile("renamed")).await.unwrap();
        assert_eq!(first._id, second._id);
        assert_eq!(second.username.as_deref(), Some("ada"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_contact_creates_one_member() {
        let (registry, store) = registry();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    registry.get_or_create("7", MemberProfile::default()).await
                })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap()._id);
        }

        assert_eq!(store.len().await, 1);
        assert!(ids.windows(2).all(|w| w[0] == w[1]));
    }

    #[tokio::test]
    async fn test_apply_score_increase() {
        let (registry, _) = registry();
        registry.get_or_create("m1", MemberProfile::default()).await.unwrap();

        registry.apply_score_increase("m1", 10).await.unwrap();
        let member = registry.apply_score_increase("m1", 25).await.unwrap();
        assert_eq!(member.mentor_score, 35);
        assert_eq!(registry.get("m1").await.unwrap().mentor_score, 35);
    }

    #[tokio::test]
    async fn test_zero_increase_is_allowed() {
        let (registry, _) = registry();
        registry.get_or_create("m1", MemberProfile::default()).await.unwrap();
        let member = registry.apply_score_increase("m1", 0).await.unwrap();
        assert_eq!(member.mentor_score, 0);
    }

    #[tokio::test]
    async fn test_negative_increase_rejected() {
        let (registry, _) = registry();
        registry.get_or_create("m1", MemberProfile::default()).await.unwrap();

        let err = registry.apply_score_increase("m1", -5).await.unwrap_err();
        assert!(matches!(err, MentorError::InvalidInput(_)));
        assert_eq!(registry.get("m1").await.unwrap().mentor_score, 0);
    }

    #[tokio::test]
    async fn test_unknown_member() {
        let (registry, _) = registry();
        let err = registry.apply_score_increase("ghost", 5).await.unwrap_err();
        assert!(matches!(err, MentorError::MemberNotFound(id) if id == "ghost"));
        assert!(registry.touch("ghost").await.is_err());
    }

    #[tokio::test]
    async fn test_empty_identity_rejected() {
        let (registry, _) = registry();
        let err = registry
            .get_or_create("  ", MemberProfile::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MentorError::InvalidInput(_)));
    }
}
