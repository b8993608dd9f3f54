//! Ephemeral side-channels
//!
//! A collaboration opens a voice channel for the mentor and mentee. The
//! workflow only needs open and close; Discord provides the real adapter
//! ([`DiscordChannels`](crate::discord::DiscordChannels)) and dev mode uses
//! [`LocalChannels`].

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::types::Result;

/// Opaque channel identifier assigned by the adapter
pub type ChannelId = String;

/// Opens and closes ephemeral channels
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Open (or return the already open) channel for `scope_key`
    async fn open_channel(&self, scope_key: &str) -> Result<ChannelId>;

    /// Close a channel. Closing an unknown channel succeeds.
    async fn close_channel(&self, channel_id: &str) -> Result<()>;
}

/// In-process channels keyed by scope, for dev mode
#[derive(Default)]
pub struct LocalChannels {
    by_scope: DashMap<String, ChannelId>,
}

impl LocalChannels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open channels
    pub fn open_count(&self) -> usize {
        self.by_scope.len()
    }
}

#[async_trait]
impl ChannelAdapter for LocalChannels {
    async fn open_channel(&self, scope_key: &str) -> Result<ChannelId> {
        let id = self
            .by_scope
            .entry(scope_key.to_string())
            .or_insert_with(|| format!("local-{}", Uuid::new_v4()))
            .clone();
        info!(scope = %scope_key, channel = %id, "Local channel opened");
        Ok(id)
    }

    async fn close_channel(&self, channel_id: &str) -> Result<()> {
        self.by_scope.retain(|_, id| id != channel_id);
        debug!(channel = %channel_id, "Local channel closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_is_idempotent_per_scope() {
        let channels = LocalChannels::new();
        let a = channels.open_channel("discussion-1-a").await.unwrap();
        let again = channels.open_channel("discussion-1-a").await.unwrap();
        let b = channels.open_channel("discussion-1-b").await.unwrap();

        assert_eq!(a, again);
        assert_ne!(a, b);
        assert_eq!(channels.open_count(), 2);
    }

    #[tokio::test]
    async fn test_close() {
        let channels = LocalChannels::new();
        let id = channels.open_channel("discussion-2-a").await.unwrap();
        channels.close_channel(&id).await.unwrap();
        assert_eq!(channels.open_count(), 0);

        // Closing twice is fine
        channels.close_channel(&id).await.unwrap();
    }
}
