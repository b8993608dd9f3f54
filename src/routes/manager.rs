//! Manager routes: login and admin registration

use hyper::{Response, StatusCode};
use serde::Deserialize;
use tracing::info;

use crate::routes::{json_response, ApiRequest, BoxBody};
use crate::server::AppState;
use crate::types::Result;

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

/// POST /api/manager/login
pub async fn login(state: &AppState, req: &ApiRequest) -> Result<Response<BoxBody>> {
    let body: CredentialsRequest = req.json()?;
    let login = state.managers.login(&body.email, &body.password).await?;
    Ok(json_response(StatusCode::OK, &login))
}

/// POST /api/manager/admin/register
pub async fn register_admin(state: &AppState, req: &ApiRequest) -> Result<Response<BoxBody>> {
    let body: CredentialsRequest = req.json()?;
    let created = state.managers.create_admin(&body.email, &body.password).await?;
    info!(email = %created.email, "Admin registered through API");
    Ok(json_response(StatusCode::CREATED, &created.view()))
}

#[cfg(test)]
mod tests {
    use crate::routes::tests::{admin_token, authed, call, state, ADMIN_EMAIL, ADMIN_PASSWORD};
    use crate::routes::ApiRequest;
    use hyper::{Method, StatusCode};
    use serde_json::json;

    fn login_request(email: &str, password: &str) -> ApiRequest {
        ApiRequest::new(
            Method::POST,
            "/api/manager/login",
            json!({ "email": email, "password": password }).to_string(),
        )
    }

    #[tokio::test]
    async fn test_login() {
        let state = state().await;
        let (status, body) = call(&state, login_request(ADMIN_EMAIL, ADMIN_PASSWORD)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["role"], "superadmin");
        assert!(body["token"].as_str().is_some());

        let (status, body) = call(&state, login_request(ADMIN_EMAIL, "wrong-password")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_register_admin() {
        let state = state().await;
        let token = admin_token(&state).await;
        let register = || {
            ApiRequest::new(
                Method::POST,
                "/api/manager/admin/register",
                json!({ "email": "ops@example.com", "password": "ops-password" }).to_string(),
            )
        };

        let (status, _) = call(&state, register()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = call(&state, authed(register(), &token)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["email"], "ops@example.com");
        assert!(body.get("passwordHash").is_none());

        let (status, body) = call(&state, authed(register(), &token)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "CONFLICT");

        let (status, body) = call(&state, login_request("ops@example.com", "ops-password")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["role"], "admin");
    }
}
