//! Domain event publishing
//!
//! Publishing is best-effort: a lost event is logged, never surfaced to the
//! caller that changed state.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::nats::{DomainEvent, NatsClient};

/// Receives domain events after state changes
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: DomainEvent);
}

#[async_trait]
impl EventSink for NatsClient {
    async fn publish(&self, event: DomainEvent) {
        let subject = event.subject();
        let payload = match event.to_bytes() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(subject = %subject, error = %e, "Failed to serialize event");
                return;
            }
        };

        match NatsClient::publish(self, subject.clone(), payload).await {
            Ok(()) => debug!(subject = %subject, "Event published"),
            Err(e) => warn!(subject = %subject, error = %e, "Event dropped"),
        }
    }
}
