//! Discord REST client
//!
//! The few bot endpoints the service needs: voice channel create/delete, guild command registration and interaction
//! webhook replies.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

use crate::commands::Reply;
use crate::config::DiscordArgs;
use crate::discord::interactions::{reply_message, InteractionResponder};
use crate::types::{MentorError, Result};

/// Discord channel type for guild voice channels
pub const GUILD_VOICE: u8 = 2;

/// Subset of a Discord channel object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildChannel {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
}

#[derive(Clone)]
pub struct DiscordRest {
    client: Client,
    api_url: String,
    token: String,
    application_id: String,
    guild_id: String,
}

impl DiscordRest {
    pub fn new(args: &DiscordArgs, timeout: Duration) -> Result<Self> {
        let missing = |what: &str| MentorError::Discord(format!("{} is not configured", what));

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("guild-mentor/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MentorError::Http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url: args.discord_api_url.trim_end_matches('/').to_string(),
            token: args.discord_token.clone().ok_or_else(|| missing("DISCORD_TOKEN"))?,
            application_id: args
                .discord_application_id
                .clone()
                .ok_or_else(|| missing("CLIENT_ID"))?,
            guild_id: args.discord_guild_id.clone().ok_or_else(|| missing("GUILD_ID"))?,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.api_url, path))
            .header("Authorization", format!("Bot {}", self.token))
    }

    /// Interaction webhooks authenticate with the token in the path
    fn webhook(&self, method: Method, token: &str, suffix: &str) -> RequestBuilder {
        self.client.request(
            method,
            format!(
                "{}/webhooks/{}/{}{}",
                self.api_url, self.application_id, token, suffix
            ),
        )
    }

    async fn send(&self, builder: RequestBuilder, what: &str) -> Result<Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| MentorError::Discord(format!("{} failed: {}", what, e)))?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(MentorError::Discord(format!("{} returned {}: {}", what, status, body)))
    }

    /// Create a voice channel, optionally under a category
    pub async fn create_voice_channel(
        &self,
        name: &str,
        parent_id: Option<&str>,
    ) -> Result<GuildChannel> {
        let mut body = json!({ "name": name, "type": GUILD_VOICE });
        if let Some(parent) = parent_id {
            body["parent_id"] = json!(parent);
        }

        let path = format!("/guilds/{}/channels", self.guild_id);
        let response = self
            .send(self.request(Method::POST, &path).json(&body), "Create channel")
            .await?;
        let channel: GuildChannel = response
            .json()
            .await
            .map_err(|e| MentorError::Discord(format!("Invalid channel: {}", e)))?;

        info!(channel = %channel.id, name = %name, "Voice channel created");
        Ok(channel)
    }

    /// Delete a channel; an already deleted channel counts as success
    pub async fn delete_channel(&self, channel_id: &str) -> Result<()> {
        let path = format!("/channels/{}", channel_id);
        let response = self
            .request(Method::DELETE, &path)
            .send()
            .await
            .map_err(|e| MentorError::Discord(format!("Delete channel failed: {}", e)))?;

        match response.status() {
            s if s.is_success() => {
                debug!(channel = %channel_id, "Channel deleted");
                Ok(())
            }
            StatusCode::NOT_FOUND => {
                debug!(channel = %channel_id, "Channel already gone");
                Ok(())
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(MentorError::Discord(format!(
                    "Delete channel returned {}: {}",
                    status, body
                )))
            }
        }
    }

    /// Overwrite the guild's application commands. Returns how many were registered.
    pub async fn register_commands(&self, commands: &Value) -> Result<usize> {
        let path = format!(
            "/applications/{}/guilds/{}/commands",
            self.application_id, self.guild_id
        );
        let response = self
            .send(
                self.request(Method::PUT, &path).json(commands),
                "Register commands",
            )
            .await?;

        let registered: Vec<Value> = response
            .json()
            .await
            .map_err(|e| MentorError::Discord(format!("Invalid command list: {}", e)))?;
        info!("Registered {} guild commands", registered.len());
        Ok(registered.len())
    }
}

#[async_trait]
impl InteractionResponder for DiscordRest {
    async fn deliver(&self, token: &str, reply: &Reply) -> Result<()> {
        let message = reply_message(reply);

        if reply.ephemeral {
            // A deferred message keeps the visibility it was created with
            self.send(
                self.webhook(Method::DELETE, token, "/messages/@original"),
                "Delete deferred reply",
            )
            .await?;
            self.send(
                self.webhook(Method::POST, token, "").json(&message),
                "Send follow-up",
            )
            .await?;
        } else {
            self.send(
                self.webhook(Method::PATCH, token, "/messages/@original")
                    .json(&message),
                "Edit deferred reply",
            )
            .await?;
        }

        debug!(title = %reply.title, "Interaction reply delivered");
        Ok(())
    }
}
