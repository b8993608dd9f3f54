//! Command responder
//!
//! Serves `mentor.cmd.*` requests from other services. Every message is
//! handled on its own task; replies go to the request's reply subject.

use futures_util::StreamExt;
use tracing::{debug, error, info, warn};

use crate::commands::{CommandRegistry, Reply};
use crate::nats::{CommandRequest, CommandResponse, NatsClient, COMMAND_SUBJECT_PREFIX};
use crate::types::{MentorError, Result};

/// Queue group shared by all replicas
const QUEUE_GROUP: &str = "guild-mentor";

/// Subscribe and serve command requests until the subscription closes
pub async fn serve_commands(client: NatsClient, registry: CommandRegistry) -> Result<()> {
    let subject = format!("{COMMAND_SUBJECT_PREFIX}.*");
    let mut subscriber = client.subscribe(&subject, Some(QUEUE_GROUP)).await?;
    info!("Serving commands on {}", subject);

    while let Some(message) = subscriber.next().await {
        let client = client.clone();
        let registry = registry.clone();

        tokio::spawn(async move {
            let Some(reply_to) = message.reply.clone() else {
                warn!(subject = %message.subject, "Command request without reply subject");
                return;
            };

            let response = handle(&registry, message.subject.as_str(), &message.payload).await;
            let payload = match response.to_bytes() {
                Ok(payload) => payload,
                Err(e) => {
                    error!("Failed to serialize command response: {}", e);
                    return;
                }
            };

            if let Err(e) = client.publish(reply_to.to_string(), payload).await {
                warn!(request = %response.request_id, error = %e, "Failed to send command reply");
            }
        });
    }

    warn!("Command subscription on {} closed", subject);
    Ok(())
}

async fn handle(registry: &CommandRegistry, subject: &str, payload: &[u8]) -> CommandResponse {
    let request = match CommandRequest::from_bytes(payload) {
        Ok(request) => request,
        Err(e) => {
            let err = MentorError::from(e);
            return CommandResponse::new(String::new(), Reply::failure(&err));
        }
    };

    let Some(command) = CommandRequest::command_from_subject(subject) else {
        let err = MentorError::InvalidInput(format!("No command in subject `{}`", subject));
        return CommandResponse::new(request.request_id, Reply::failure(&err));
    };
    let command = command.to_string();

    debug!(request = %request.request_id, command = %command, "Command request");
    let request_id = request.request_id.clone();
    let reply = registry.invoke(request.into_invocation(&command)).await;
    CommandResponse::new(request_id, reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::registry;

    #[tokio::test]
    async fn test_handle_ask_over_bus() {
        let (registry, questions, _) = registry().await;
        let payload = br#"{"request_id":"r-1","user":{"id":"55"},"options":{"text":"help","skill":"go"}}"#;

        let response = handle(&registry, "mentor.cmd.ask", payload).await;
        assert_eq!(response.request_id, "r-1");
        assert!(response.success);
        assert_eq!(response.reply.title, "Question Received");
        assert_eq!(questions.list_open(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_handle_bad_payload() {
        let (registry, _, _) = registry().await;
        let response = handle(&registry, "mentor.cmd.ask", b"not json").await;
        assert!(!response.success);
        assert!(response.reply.ephemeral);
    }

    #[tokio::test]
    async fn test_handle_unknown_command() {
        let (registry, _, _) = registry().await;
        let response = handle(&registry, "mentor.cmd.dance", br#"{"user":{"id":"1"}}"#).await;
        assert!(!response.success);
    }
}
