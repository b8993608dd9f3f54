//! Manager accounts
//!
//! Admins sign in with email and password and receive a JWT for the REST
//! API. The superadmin account is seeded from configuration on startup.

use bson::doc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::{
    extract_token_from_header, hash_password, level_for_roles, verify_password, Claims,
    JwtValidator, TokenInput,
};
use crate::db::schemas::{ManagerDoc, ROLE_ADMIN, ROLE_SUPERADMIN};
use crate::db::DocumentStore;
use crate::types::{MentorError, Result};

const MIN_PASSWORD_LEN: usize = 8;

/// Successful login
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub role: String,
    pub expires_at: u64,
}

#[derive(Clone)]
pub struct ManagerService {
    managers: Arc<dyn DocumentStore<ManagerDoc>>,
    jwt: JwtValidator,
}

impl ManagerService {
    pub fn new(managers: Arc<dyn DocumentStore<ManagerDoc>>, jwt: JwtValidator) -> Self {
        Self { managers, jwt }
    }

    /// Exchange credentials for a token
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse> {
        let email = normalize_email(email);
        let invalid = || MentorError::Auth("Invalid credentials".into());

        let Some(manager) = self.managers.find_one(doc! { "email": &email }).await? else {
            warn!(email = %email, "Login for unknown manager");
            return Err(invalid());
        };

        if !manager.is_admin() {
            warn!(email = %email, "Login for manager without admin role");
            return Err(invalid());
        }

        if !verify_password(password, &manager.password_hash)? {
            warn!(email = %email, "Manager password mismatch");
            return Err(invalid());
        }

        let role = if manager.roles.iter().any(|r| r == ROLE_SUPERADMIN) {
            ROLE_SUPERADMIN
        } else {
            ROLE_ADMIN
        };

        let token = self.jwt.generate_token(TokenInput {
            manager_id: manager._id.map(|id| id.to_hex()).unwrap_or_default(),
            email: manager.email.clone(),
            roles: manager.roles.clone(),
            permission_level: level_for_roles(&manager.roles),
        })?;
        let expires_at = self
            .jwt
            .verify_token(&token)
            .claims
            .map(|c| c.exp)
            .unwrap_or(0);

        info!(email = %email, role = %role, "Manager signed in");
        Ok(LoginResponse {
            token,
            role: role.to_string(),
            expires_at,
        })
    }

    /// Create an admin account
    pub async fn create_admin(&self, email: &str, password: &str) -> Result<ManagerDoc> {
        self.create(email, password, ROLE_ADMIN).await
    }

    /// Create the superadmin if it does not exist yet. Returns whether it was created.
    pub async fn seed_superadmin(&self, email: &str, password: &str) -> Result<bool> {
        match self.create(email, password, ROLE_SUPERADMIN).await {
            Ok(_) => {
                info!(email = %normalize_email(email), "Superadmin seeded");
                Ok(true)
            }
            Err(MentorError::Conflict(_)) => {
                info!("Superadmin already exists");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Claims for a bearer header, if it carries a valid token
    pub fn authenticate(&self, header: Option<&str>) -> Result<Claims> {
        let token = extract_token_from_header(header)
            .ok_or_else(|| MentorError::Auth("No token provided".into()))?;

        let result = self.jwt.verify_token(token);
        match result.claims {
            Some(claims) if result.valid => Ok(claims),
            _ => Err(MentorError::Auth(
                result.error.unwrap_or_else(|| "Invalid token".into()),
            )),
        }
    }

    async fn create(&self, email: &str, password: &str, role: &str) -> Result<ManagerDoc> {
        let email = normalize_email(email);
        if !email.contains('@') {
            return Err(MentorError::InvalidInput(format!("`{}` is not an email", email)));
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(MentorError::InvalidInput(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        if self.managers.find_one(doc! { "email": &email }).await?.is_some() {
            return Err(MentorError::Conflict(format!("Manager `{}` already exists", email)));
        }

        let manager = ManagerDoc::new(email, hash_password(password)?, vec![role.to_string()]);
        let created = self.managers.insert(manager).await?;
        info!(email = %created.email, role = %role, "Manager created");
        Ok(created)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
