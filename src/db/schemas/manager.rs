//! Manager document schema
//!
//! Administrator accounts for the REST API.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::db::store::Record;

/// Collection name for managers
pub const MANAGER_COLLECTION: &str = "managers";

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_SUPERADMIN: &str = "superadmin";

/// Manager document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ManagerDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Login email (unique)
    pub email: String,

    /// Argon2 password hash
    pub password_hash: String,

    #[serde(default)]
    pub roles: Vec<String>,
}

impl ManagerDoc {
    pub fn new(email: String, password_hash: String, roles: Vec<String>) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            email,
            password_hash,
            roles,
        }
    }

    /// Whether this account may use admin endpoints
    pub fn is_admin(&self) -> bool {
        self.roles
            .iter()
            .any(|r| r == ROLE_ADMIN || r == ROLE_SUPERADMIN)
    }

    /// API representation (never includes the hash)
    pub fn view(&self) -> ManagerView {
        ManagerView {
            id: self._id.map(|id| id.to_hex()).unwrap_or_default(),
            email: self.email.clone(),
            roles: self.roles.clone(),
        }
    }
}

/// Manager as returned by the REST API
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ManagerView {
    pub id: String,
    pub email: String,
    pub roles: Vec<String>,
}

impl IntoIndexes for ManagerDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "email": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("email_unique".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for ManagerDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

impl Record for ManagerDoc {
    const COLLECTION: &'static str = MANAGER_COLLECTION;

    fn id(&self) -> Option<ObjectId> {
        self._id
    }

    fn set_id(&mut self, id: ObjectId) {
        self._id = Some(id);
    }
}
