//! Discord voice channels as collaboration side-channels

use async_trait::async_trait;

use crate::channels::{ChannelAdapter, ChannelId};
use crate::discord::rest::DiscordRest;
use crate::types::{MentorError, Result};

/// Opens one guild voice channel per scope key.
///
/// Scope keys name a single answer attempt, so every open creates a new
/// channel; there is nothing earlier to reuse.
pub struct DiscordChannels {
    rest: DiscordRest,
    category_id: Option<String>,
}

impl DiscordChannels {
    pub fn new(rest: DiscordRest, category_id: Option<String>) -> Self {
        Self { rest, category_id }
    }
}

#[async_trait]
impl ChannelAdapter for DiscordChannels {
    async fn open_channel(&self, scope_key: &str) -> Result<ChannelId> {
        self.rest
            .create_voice_channel(scope_key, self.category_id.as_deref())
            .await
            .map(|c| c.id)
            .map_err(|e| MentorError::ChannelCreationFailed(e.to_string()))
    }

    async fn close_channel(&self, channel_id: &str) -> Result<()> {
        self.rest.delete_channel(channel_id).await
    }
}
