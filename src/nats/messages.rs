//! NATS message types
//!
//! Command request/response pairs served on `mentor.cmd.{name}` and the
//! domain events published under `mentor.events`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::commands::{Invocation, Invoker, Reply};
use crate::db::schemas::{CollaborationView, QuestionView};

/// Subject prefix for command requests
pub const COMMAND_SUBJECT_PREFIX: &str = "mentor.cmd";

/// Subject prefix for domain events
pub const EVENT_SUBJECT_PREFIX: &str = "mentor.events";

/// A command sent over the bus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    /// Unique request ID
    #[serde(default = "new_request_id")]
    pub request_id: String,

    pub user: Invoker,

    #[serde(default)]
    pub options: Map<String, Value>,
}

fn new_request_id() -> String {
    Uuid::new_v4().to_string()
}

impl CommandRequest {
    pub fn new(user: Invoker, options: Map<String, Value>) -> Self {
        Self {
            request_id: new_request_id(),
            user,
            options,
        }
    }

    /// Subject for invoking `command`
    pub fn subject(command: &str) -> String {
        format!("{COMMAND_SUBJECT_PREFIX}.{command}")
    }

    /// Command name carried by a request subject
    pub fn command_from_subject(subject: &str) -> Option<&str> {
        subject
            .strip_prefix(COMMAND_SUBJECT_PREFIX)
            .and_then(|rest| rest.strip_prefix('.'))
            .filter(|name| !name.is_empty() && !name.contains('.'))
    }

    pub fn into_invocation(self, command: &str) -> Invocation {
        Invocation {
            name: command.to_string(),
            invoker: self.user,
            options: self.options,
        }
    }

    /// Serialize to JSON bytes
    pub fn to_bytes(&self) -> Result<bytes::Bytes, serde_json::Error> {
        serde_json::to_vec(self).map(Into::into)
    }

    /// Deserialize from JSON bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }
}

/// Reply to a [`CommandRequest`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    /// Original request ID
    pub request_id: String,

    /// Whether the command succeeded
    pub success: bool,

    pub reply: Reply,
}

impl CommandResponse {
    pub fn new(request_id: String, reply: Reply) -> Self {
        Self {
            request_id,
            success: !reply.is_failure(),
            reply,
        }
    }

    /// Serialize to JSON bytes
    pub fn to_bytes(&self) -> Result<bytes::Bytes, serde_json::Error> {
        serde_json::to_vec(self).map(Into::into)
    }

    /// Deserialize from JSON bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }
}

/// State changes announced to other services
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    QuestionOpened {
        question: QuestionView,
    },
    CollaborationStarted {
        collaboration: CollaborationView,
    },
    CollaborationEnded {
        collaboration: CollaborationView,
    },
    /// A mentor's score increase could not be applied yet
    ScorePending {
        collaboration_id: String,
        mentor_id: String,
        delta: i64,
        reason: String,
    },
}

impl DomainEvent {
    /// Subject this event is published on
    pub fn subject(&self) -> String {
        let suffix = match self {
            DomainEvent::QuestionOpened { .. } => "question.opened",
            DomainEvent::CollaborationStarted { .. } => "collaboration.started",
            DomainEvent::CollaborationEnded { .. } => "collaboration.ended",
            DomainEvent::ScorePending { .. } => "score.pending",
        };
        format!("{EVENT_SUBJECT_PREFIX}.{suffix}")
    }

    /// Serialize to JSON bytes
    pub fn to_bytes(&self) -> Result<bytes::Bytes, serde_json::Error> {
        serde_json::to_vec(self).map(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_command_subjects() {
        assert_eq!(CommandRequest::subject("answer"), "mentor.cmd.answer");
        assert_eq!(
            CommandRequest::command_from_subject("mentor.cmd.ask"),
            Some("ask")
        );
        assert_eq!(CommandRequest::command_from_subject("mentor.cmd."), None);
        assert_eq!(CommandRequest::command_from_subject("mentor.cmd.a.b"), None);
        assert_eq!(CommandRequest::command_from_subject("other.cmd.ask"), None);
    }

    #[test]
    fn test_request_defaults() {
        let req = CommandRequest::from_bytes(br#"{"user":{"id":"42"}}"#).unwrap();
        assert!(!req.request_id.is_empty());
        assert!(req.options.is_empty());

        let invocation = req.into_invocation("ask");
        assert_eq!(invocation.name, "ask");
        assert_eq!(invocation.invoker.id, "42");
    }

    #[test]
    fn test_response_success_flag() {
        let ok = CommandResponse::new("r1".into(), Reply::success("Done", "ok"));
        assert!(ok.success);

        let err = crate::types::MentorError::InvalidInput("bad".into());
        let failed = CommandResponse::new("r2".into(), Reply::failure(&err));
        assert!(!failed.success);
    }

    #[test]
    fn test_event_subjects_and_shape() {
        let event = DomainEvent::ScorePending {
            collaboration_id: "c1".into(),
            mentor_id: "m1".into(),
            delta: 25,
            reason: "timeout".into(),
        };
        assert_eq!(event.subject(), "mentor.events.score.pending");

        let value: Value = serde_json::from_slice(&event.to_bytes().unwrap()).unwrap();
        assert_eq!(value["type"], json!("score_pending"));
        assert_eq!(value["delta"], json!(25));
    }
}
