//! Shared error and result types

use hyper::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, MentorError>;

/// Errors raised by the mentoring core and its collaborators
#[derive(Error, Debug)]
pub enum MentorError {
    #[error("Question not found: {0}")]
    QuestionNotFound(String),

    #[error("Member not found: {0}")]
    MemberNotFound(String),

    #[error("Skill not found: {0}")]
    SkillNotFound(String),

    #[error("Skill {skill} has no level {level}")]
    LevelNotFound { skill: String, level: i32 },

    #[error("Collaboration not found: {0}")]
    CollaborationNotFound(String),

    #[error("Question already answered: {0}")]
    AlreadyAnswered(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Channel creation failed: {0}")]
    ChannelCreationFailed(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("NATS error: {0}")]
    Nats(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Discord API error: {0}")]
    Discord(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse error categories reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    Conflict,
    UpstreamFailure,
    InvalidInput,
    Unauthorized,
    Internal,
}

impl MentorError {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            MentorError::QuestionNotFound(_)
            | MentorError::MemberNotFound(_)
            | MentorError::SkillNotFound(_)
            | MentorError::LevelNotFound { .. }
            | MentorError::CollaborationNotFound(_) => ErrorKind::NotFound,
            MentorError::AlreadyAnswered(_) | MentorError::Conflict(_) => ErrorKind::Conflict,
            MentorError::ChannelCreationFailed(_)
            | MentorError::Database(_)
            | MentorError::Nats(_)
            | MentorError::Http(_)
            | MentorError::Discord(_)
            | MentorError::Io(_) => ErrorKind::UpstreamFailure,
            MentorError::InvalidInput(_) => ErrorKind::InvalidInput,
            MentorError::Auth(_) => ErrorKind::Unauthorized,
            MentorError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            MentorError::QuestionNotFound(_) => "QUESTION_NOT_FOUND",
            MentorError::MemberNotFound(_) => "MEMBER_NOT_FOUND",
            MentorError::SkillNotFound(_) => "SKILL_NOT_FOUND",
            MentorError::LevelNotFound { .. } => "LEVEL_NOT_FOUND",
            MentorError::CollaborationNotFound(_) => "COLLABORATION_NOT_FOUND",
            MentorError::AlreadyAnswered(_) => "ALREADY_ANSWERED",
            MentorError::Conflict(_) => "CONFLICT",
            MentorError::ChannelCreationFailed(_) => "CHANNEL_CREATION_FAILED",
            MentorError::InvalidInput(_) => "INVALID_INPUT",
            MentorError::Auth(_) => "UNAUTHORIZED",
            MentorError::Internal(_) => "INTERNAL_ERROR",
            _ => "UPSTREAM_FAILURE",
        }
    }

    /// Short human-readable message, safe to show to end users.
    ///
    /// Upstream failures never leak the underlying store or transport text.
    pub fn user_message(&self) -> String {
        match self {
            MentorError::QuestionNotFound(id) => format!("Question `{}` does not exist.", id),
            MentorError::MemberNotFound(_) => "You are not registered as a member yet.".to_string(),
            MentorError::SkillNotFound(skill) => format!("Unknown skill `{}`.", skill),
            MentorError::LevelNotFound { skill, level } => {
                format!("Skill `{}` has no level {}.", skill, level)
            }
            MentorError::CollaborationNotFound(id) => {
                format!("Collaboration `{}` does not exist.", id)
            }
            MentorError::AlreadyAnswered(_) => {
                "This question has already been answered by another mentor.".to_string()
            }
            MentorError::Conflict(msg) => msg.clone(),
            MentorError::ChannelCreationFailed(_) => {
                "Could not create a voice channel for this discussion. Please try again."
                    .to_string()
            }
            MentorError::InvalidInput(msg) => msg.clone(),
            MentorError::Auth(_) => "Invalid credentials.".to_string(),
            MentorError::Internal(_) => "Something went wrong. Please try again later.".to_string(),
            _ => "A backing service is unavailable. Please try again later.".to_string(),
        }
    }

    /// HTTP status for REST responses
    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::UpstreamFailure => StatusCode::BAD_GATEWAY,
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<bson::ser::Error> for MentorError {
    fn from(e: bson::ser::Error) -> Self {
        MentorError::Database(format!("Serialization failed: {}", e))
    }
}

impl From<bson::de::Error> for MentorError {
    fn from(e: bson::de::Error) -> Self {
        MentorError::Database(format!("Deserialization failed: {}", e))
    }
}

impl From<serde_json::Error> for MentorError {
    fn from(e: serde_json::Error) -> Self {
        tracing::debug!(error = %e, "Rejected JSON payload");
        MentorError::InvalidInput("Malformed JSON body.".into())
    }
}
