//! Permission levels and the REST route table

use hyper::Method;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Permission levels for API routes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
#[derive(Default)]
pub enum PermissionLevel {
    /// No authentication - read-only routes
    #[default]
    Public = 0,
    /// Any signed-in manager
    Authenticated = 1,
    /// Admin - catalog changes, session control, manager accounts
    Admin = 2,
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionLevel::Public => write!(f, "PUBLIC"),
            PermissionLevel::Authenticated => write!(f, "AUTHENTICATED"),
            PermissionLevel::Admin => write!(f, "ADMIN"),
        }
    }
}

/// Permission level a manager's roles grant
pub fn level_for_roles(roles: &[String]) -> PermissionLevel {
    use crate::db::schemas::{ROLE_ADMIN, ROLE_SUPERADMIN};

    if roles.iter().any(|r| r == ROLE_ADMIN || r == ROLE_SUPERADMIN) {
        PermissionLevel::Admin
    } else {
        PermissionLevel::Authenticated
    }
}

/// Level required to call an `/api` route
pub fn get_required_permission(method: &Method, path: &str) -> PermissionLevel {
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

    match (method, segments.as_slice()) {
        (&Method::POST, ["api", "manager", "login"]) => PermissionLevel::Public,
        (&Method::POST, ["api", "manager", "admin", "register"]) => PermissionLevel::Admin,

        (&Method::POST, ["api", "questions"]) => PermissionLevel::Authenticated,

        (&Method::POST, ["api", "skills"]) => PermissionLevel::Admin,
        (&Method::PUT, ["api", "skills", _, "levels"]) => PermissionLevel::Admin,
        (&Method::DELETE, ["api", "skills", _]) => PermissionLevel::Admin,

        (&Method::POST, ["api", "collaborations", "reconcile"]) => PermissionLevel::Admin,
        (&Method::POST, ["api", "collaborations", _, "end"]) => PermissionLevel::Admin,

        (&Method::GET, _) => PermissionLevel::Public,

        // Unknown writes need the highest level
        _ => PermissionLevel::Admin,
    }
}

/// Check if a route is allowed for the given permission level
pub fn is_route_allowed(method: &Method, path: &str, level: PermissionLevel) -> bool {
    level >= get_required_permission(method, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_routes() {
        assert!(is_route_allowed(&Method::GET, "/api/skills", PermissionLevel::Public));
        assert!(is_route_allowed(&Method::GET, "/api/questions/abc", PermissionLevel::Public));
        assert!(is_route_allowed(&Method::POST, "/api/manager/login", PermissionLevel::Public));
    }

    #[test]
    fn test_authenticated_routes() {
        assert!(!is_route_allowed(&Method::POST, "/api/questions", PermissionLevel::Public));
        assert!(is_route_allowed(
            &Method::POST,
            "/api/questions",
            PermissionLevel::Authenticated
        ));
    }

    #[test]
    fn test_admin_routes() {
        assert!(!is_route_allowed(
            &Method::POST,
            "/api/skills",
            PermissionLevel::Authenticated
        ));
        assert!(is_route_allowed(&Method::POST, "/api/skills", PermissionLevel::Admin));
        assert!(!is_route_allowed(
            &Method::POST,
            "/api/collaborations/abc/end",
            PermissionLevel::Authenticated
        ));
        assert!(!is_route_allowed(
            &Method::POST,
            "/api/manager/admin/register",
            PermissionLevel::Authenticated
        ));
    }

    #[test]
    fn test_unknown_writes_need_admin() {
        assert_eq!(
            get_required_permission(&Method::PATCH, "/api/whatever"),
            PermissionLevel::Admin
        );
    }

    #[test]
    fn test_roles_to_level() {
        assert_eq!(level_for_roles(&["superadmin".into()]), PermissionLevel::Admin);
        assert_eq!(level_for_roles(&[]), PermissionLevel::Authenticated);
    }

    #[test]
    fn test_permission_ordering() {
        assert!(PermissionLevel::Admin > PermissionLevel::Authenticated);
        assert!(PermissionLevel::Authenticated > PermissionLevel::Public);
    }
}
