//! Database schemas
//!
//! MongoDB document structures for questions, skills, members,
//! collaborations and managers, plus the JSON views exposed over the API.

mod collaboration;
mod manager;
mod member;
mod metadata;
mod question;
mod skill;

pub use collaboration::{CollaborationDoc, CollaborationView, COLLABORATION_COLLECTION};
pub use manager::{ManagerDoc, ManagerView, MANAGER_COLLECTION, ROLE_ADMIN, ROLE_SUPERADMIN};
pub use member::{MemberDoc, MemberProfile, MemberView, MEMBER_COLLECTION};
pub use metadata::Metadata;
pub use question::{QuestionDoc, QuestionView, QUESTION_COLLECTION};
pub use skill::{normalize_skill_name, SkillDoc, SkillLevel, SkillView, SKILL_COLLECTION};

use bson::DateTime;

/// Convert a stored timestamp for API output
pub(crate) fn to_utc(dt: DateTime) -> chrono::DateTime<chrono::Utc> {
    dt.to_chrono()
}
