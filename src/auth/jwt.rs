//! JWT tokens for manager sessions (HS256)

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::auth::PermissionLevel;
use crate::types::{MentorError, Result};

const ISSUER: &str = "guild-mentor";
const DEV_SECRET: &str = "dev-only-insecure-secret";
const DEV_EXPIRY_SECONDS: u64 = 24 * 3600;

/// Token claims
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// Manager id
    pub sub: String,
    pub email: String,
    pub roles: Vec<String>,
    pub permission_level: PermissionLevel,
    pub iss: String,
    pub iat: u64,
    pub exp: u64,
}

/// What goes into a new token
#[derive(Debug, Clone)]
pub struct TokenInput {
    pub manager_id: String,
    pub email: String,
    pub roles: Vec<String>,
    pub permission_level: PermissionLevel,
}

/// Outcome of verifying a token
#[derive(Debug, Clone)]
pub struct TokenValidationResult {
    pub valid: bool,
    pub claims: Option<Claims>,
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct JwtValidator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expiry_seconds: u64,
}

impl JwtValidator {
    pub fn new(secret: String, expiry_seconds: u64) -> Result<Self> {
        if secret.len() < 16 {
            return Err(MentorError::Auth(
                "JWT secret must be at least 16 characters".into(),
            ));
        }
        if expiry_seconds == 0 {
            return Err(MentorError::Auth("JWT expiry must be positive".into()));
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            expiry_seconds,
        })
    }

    /// Validator with a fixed, well-known secret for dev mode
    pub fn new_dev() -> Self {
        Self {
            encoding: EncodingKey::from_secret(DEV_SECRET.as_bytes()),
            decoding: DecodingKey::from_secret(DEV_SECRET.as_bytes()),
            expiry_seconds: DEV_EXPIRY_SECONDS,
        }
    }

    pub fn expiry_seconds(&self) -> u64 {
        self.expiry_seconds
    }

    pub fn generate_token(&self, input: TokenInput) -> Result<String> {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        let claims = Claims {
            sub: input.manager_id,
            email: input.email,
            roles: input.roles,
            permission_level: input.permission_level,
            iss: ISSUER.to_string(),
            iat: now,
            exp: now + self.expiry_seconds,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| MentorError::Auth(format!("Failed to sign token: {}", e)))
    }

    pub fn verify_token(&self, token: &str) -> TokenValidationResult {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);

        match decode::<Claims>(token, &self.decoding, &validation) {
            Ok(data) => TokenValidationResult {
                valid: true,
                claims: Some(data.claims),
                error: None,
            },
            Err(e) => TokenValidationResult {
                valid: false,
                claims: None,
                error: Some(format!("Invalid token: {}", e)),
            },
        }
    }
}

/// Take the token out of an `Authorization: Bearer ...` header
pub fn extract_token_from_header(header: Option<&str>) -> Option<&str> {
    let header = header?.trim();
    let (scheme, token) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(level: PermissionLevel) -> TokenInput {
        TokenInput {
            manager_id: "m-1".into(),
            email: "admin@example.com".into(),
            roles: vec!["admin".into()],
            permission_level: level,
        }
    }

    #[test]
    fn test_generate_and_verify() {
        let jwt = JwtValidator::new("a-sufficiently-long-secret".into(), 600).unwrap();
        let token = jwt.generate_token(input(PermissionLevel::Admin)).unwrap();

        let result = jwt.verify_token(&token);
        assert!(result.valid);
        let claims = result.claims.unwrap();
        assert_eq!(claims.sub, "m-1");
        assert_eq!(claims.roles, vec!["admin".to_string()]);
        assert_eq!(claims.permission_level, PermissionLevel::Admin);
        assert_eq!(claims.exp - claims.iat, 600);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issuer = JwtValidator::new("a-sufficiently-long-secret".into(), 600).unwrap();
        let other = JwtValidator::new("another-long-secret-value".into(), 600).unwrap();
        let token = issuer.generate_token(input(PermissionLevel::Authenticated)).unwrap();

        let result = other.verify_token(&token);
        assert!(!result.valid);
        assert!(result.error.is_some());
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(JwtValidator::new("short".into(), 600).is_err());
    }

    #[test]
    fn test_dev_validator() {
        let jwt = JwtValidator::new_dev();
        let token = jwt.generate_token(input(PermissionLevel::Admin)).unwrap();
        assert!(JwtValidator::new_dev().verify_token(&token).valid);
    }

    #[test]
    fn test_extract_token() {
        assert_eq!(extract_token_from_header(Some("Bearer abc.def")), Some("abc.def"));
        assert_eq!(extract_token_from_header(Some("bearer  xyz ")), Some("xyz"));
        assert_eq!(extract_token_from_header(Some("Basic abc")), None);
        assert_eq!(extract_token_from_header(Some("Bearer ")), None);
        assert_eq!(extract_token_from_header(None), None);
    }
}
