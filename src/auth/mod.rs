//! Authentication and authorization for the REST API
//!
//! Provides:
//! - JWT token generation and validation
//! - Permission levels for route authorization
//! - Password hashing with Argon2
//! - Manager accounts and login

pub mod jwt;
pub mod manager;
pub mod password;
pub mod permissions;

pub use jwt::{extract_token_from_header, Claims, JwtValidator, TokenInput, TokenValidationResult};
pub use manager::{LoginResponse, ManagerService};
pub use password::{hash_password, verify_password};
pub use permissions::{get_required_permission, is_route_allowed, level_for_roles, PermissionLevel};
