//! NATS client wrapper
//!
//! Provides connection management with reconnection and request/response
//! patterns with timeouts.

use async_nats::{Client, ConnectOptions};
use bytes::Bytes;
use std::time::Duration;
use tracing::info;

use crate::config::NatsArgs;
use crate::types::{MentorError, Result};

/// Default request timeout for RPC-style calls
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default ping interval for keep-alive
const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(120);

/// NATS client wrapper
#[derive(Clone)]
pub struct NatsClient {
    client: Client,
    /// Request timeout for RPC calls
    request_timeout: Duration,
    /// Client name for logging
    name: String,
}

impl NatsClient {
    /// Connect to the configured server
    pub async fn new(args: &NatsArgs, name: &str) -> Result<Self> {
        info!("Connecting to NATS at {}", args.nats_url);

        // No retry on the initial connect: fail fast when NATS is down.
        // Reconnection still works once connected.
        let mut options = ConnectOptions::new()
            .name(name)
            .ping_interval(DEFAULT_PING_INTERVAL)
            .connection_timeout(Duration::from_secs(5));

        if let (Some(user), Some(pass)) = (&args.nats_user, &args.nats_password) {
            options = options.user_and_password(user.clone(), pass.clone());
        }

        let client = options
            .connect(&args.nats_url)
            .await
            .map_err(|e| MentorError::Nats(format!("Failed to connect: {}", e)))?;

        info!("Connected to NATS at {}", args.nats_url);

        Ok(Self {
            client,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            name: name.to_string(),
        })
    }

    /// Set the request timeout for RPC calls
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Publish a message to a subject
    pub async fn publish(&self, subject: String, payload: Bytes) -> Result<()> {
        self.client
            .publish(subject, payload)
            .await
            .map_err(|e| MentorError::Nats(format!("Publish failed: {}", e)))
    }

    /// Request/response pattern with timeout
    pub async fn request(&self, subject: String, payload: Bytes) -> Result<async_nats::Message> {
        tokio::time::timeout(
            self.request_timeout,
            self.client.request(subject.clone(), payload),
        )
        .await
        .map_err(|_| MentorError::Nats(format!("Request to {} timed out", subject)))?
        .map_err(|e| MentorError::Nats(format!("Request failed: {}", e)))
    }

    /// Subscribe to a subject, optionally as part of a queue group
    pub async fn subscribe(
        &self,
        subject: &str,
        queue_group: Option<&str>,
    ) -> Result<async_nats::Subscriber> {
        let subscribed = match queue_group {
            Some(group) => {
                self.client
                    .queue_subscribe(subject.to_string(), group.to_string())
                    .await
            }
            None => self.client.subscribe(subject.to_string()).await,
        };
        subscribed.map_err(|e| MentorError::Nats(format!("Subscribe failed: {}", e)))
    }

    /// Flush pending messages
    pub async fn flush(&self) -> Result<()> {
        self.client
            .flush()
            .await
            .map_err(|e| MentorError::Nats(format!("Flush failed: {}", e)))
    }

    /// Get the client name
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    // Exercised against a running NATS server only
}
