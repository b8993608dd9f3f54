//! HTTP routes for the mentoring gateway
//!
//! Handlers work on a buffered [`ApiRequest`] so they can be exercised
//! without a live connection. Every `/api` route passes the permission
//! table in `auth::permissions` before it is dispatched.

pub mod collaborations;
pub mod health;
pub mod interactions;
pub mod manager;
pub mod members;
pub mod questions;
pub mod skills;

pub use health::{health_check, version_info};
pub use interactions::handle_interaction;

use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use hyper::{Method, Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::auth::{get_required_permission, PermissionLevel};
use crate::server::AppState;
use crate::types::{ErrorKind, MentorError, Result};

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Largest request body accepted
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Error body returned by every route
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

/// Request with its body read into memory
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>, body: impl Into<Bytes>) -> Self {
        let path: String = path.into();
        let (path, query) = match path.split_once('?') {
            Some((p, q)) => (p.to_string(), Some(q.to_string())),
            None => (path, None),
        };
        Self {
            method,
            path,
            query,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Add a header; invalid values are ignored
    pub fn with_header(mut self, name: &'static str, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.insert(HeaderName::from_static(name), value);
        }
        self
    }

    /// Read a hyper request, rejecting bodies over [`MAX_BODY_BYTES`]
    pub async fn from_hyper<B>(req: Request<B>) -> Result<Self>
    where
        B: hyper::body::Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let (parts, body) = req.into_parts();
        let body = Limited::new(body, MAX_BODY_BYTES)
            .collect()
            .await
            .map_err(|e| MentorError::InvalidInput(format!("Failed to read body: {}", e)))?
            .to_bytes();

        Ok(Self {
            method: parts.method,
            path: parts.uri.path().to_string(),
            query: parts.uri.query().map(str::to_string),
            headers: parts.headers,
            body,
        })
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn authorization(&self) -> Option<&str> {
        self.headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
    }

    /// Deserialize the JSON body
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        if self.body.is_empty() {
            return Err(MentorError::InvalidInput("Request body is required".into()));
        }
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn query_param(&self, key: &str) -> Option<String> {
        let query = self.query.as_deref()?;
        serde_urlencoded::from_str::<Vec<(String, String)>>(query)
            .ok()?
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }
}

pub fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

pub fn empty_body() -> BoxBody {
    Full::new(Bytes::new())
        .map_err(|never| match never {})
        .boxed()
}

fn with_cors(headers: &mut HeaderMap) {
    headers.insert("Access-Control-Allow-Origin", HeaderValue::from_static("*"));
    headers.insert(
        "Access-Control-Allow-Methods",
        HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
    );
    headers.insert(
        "Access-Control-Allow-Headers",
        HeaderValue::from_static("Content-Type, Authorization"),
    );
}

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<BoxBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());

    let mut response = Response::new(full_body(json));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    with_cors(response.headers_mut());
    response
}

fn error_body(status: StatusCode, error: &str, code: &str) -> Response<BoxBody> {
    json_response(
        status,
        &ErrorResponse {
            error: error.to_string(),
            code: Some(code.to_string()),
        },
    )
}

/// Map an error to its status and `{error, code}` body
pub fn error_response(err: &MentorError) -> Response<BoxBody> {
    match err.kind() {
        ErrorKind::UpstreamFailure => warn!(error = %err, "Request failed upstream"),
        ErrorKind::Internal => error!(error = %err, "Request failed"),
        _ => debug!(error = %err, "Request rejected"),
    }
    error_body(err.status_code(), &err.user_message(), err.code())
}

pub fn not_found_response(path: &str) -> Response<BoxBody> {
    error_body(
        StatusCode::NOT_FOUND,
        &format!("Not found: {}", path),
        "NOT_FOUND",
    )
}

pub fn bad_request_response(message: &str) -> Response<BoxBody> {
    error_body(StatusCode::BAD_REQUEST, message, "INVALID_INPUT")
}

pub fn preflight_response() -> Response<BoxBody> {
    let mut response = Response::new(empty_body());
    *response.status_mut() = StatusCode::NO_CONTENT;
    with_cors(response.headers_mut());
    response
}

/// Route an `/api` request
pub async fn handle_api_request(state: &AppState, req: ApiRequest) -> Response<BoxBody> {
    let required = get_required_permission(&req.method, &req.path);
    if required > PermissionLevel::Public {
        let claims = match state.managers.authenticate(req.authorization()) {
            Ok(claims) => claims,
            Err(e) => {
                debug!(path = %req.path, error = %e, "Rejected unauthenticated request");
                return error_body(
                    StatusCode::UNAUTHORIZED,
                    "Authentication required",
                    "UNAUTHORIZED",
                );
            }
        };
        if claims.permission_level < required {
            warn!(
                path = %req.path,
                manager = %claims.email,
                level = %claims.permission_level,
                required = %required,
                "Insufficient permissions"
            );
            return error_body(
                StatusCode::FORBIDDEN,
                &format!("Requires {} permission", required),
                "FORBIDDEN",
            );
        }
    }

    let decoded: Vec<String> = req
        .path
        .trim_matches('/')
        .split('/')
        .map(|s| {
            urlencoding::decode(s)
                .map(|d| d.into_owned())
                .unwrap_or_else(|_| s.to_string())
        })
        .collect();
    let segments: Vec<&str> = decoded.iter().map(String::as_str).collect();

    let result = match (&req.method, segments.as_slice()) {
        (&Method::POST, ["api", "manager", "login"]) => manager::login(state, &req).await,
        (&Method::POST, ["api", "manager", "admin", "register"]) => {
            manager::register_admin(state, &req).await
        }

        (&Method::POST, ["api", "questions"]) => questions::create(state, &req).await,
        (&Method::GET, ["api", "questions"]) => questions::list(state, &req).await,
        (&Method::GET, ["api", "questions", id]) => questions::get(state, id).await,

        (&Method::GET, ["api", "skills"]) => skills::list(state).await,
        (&Method::POST, ["api", "skills"]) => skills::create(state, &req).await,
        (&Method::GET, ["api", "skills", name]) => skills::get(state, name).await,
        (&Method::PUT, ["api", "skills", name, "levels"]) => {
            skills::replace_levels(state, name, &req).await
        }
        (&Method::DELETE, ["api", "skills", name]) => skills::retire(state, name).await,

        (&Method::GET, ["api", "members", id]) => members::get(state, id).await,

        (&Method::POST, ["api", "collaborations", "reconcile"]) => {
            collaborations::reconcile(state).await
        }
        (&Method::GET, ["api", "collaborations", id]) => collaborations::get(state, id).await,
        (&Method::POST, ["api", "collaborations", id, "end"]) => {
            collaborations::end(state, id).await
        }

        _ => return not_found_response(&req.path),
    };

    result.unwrap_or_else(|e| error_response(&e))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::channels::LocalChannels;
    use crate::config::Args;
    use crate::db::Stores;
    use clap::Parser;
    use serde_json::Value;
    use std::sync::Arc;

    pub(crate) const ADMIN_EMAIL: &str = "root@example.com";
    pub(crate) const ADMIN_PASSWORD: &str = "root-password";

    /// Dev-mode state over memory stores, with a seeded superadmin
    pub(crate) async fn state() -> AppState {
        let args = Args::parse_from(["guild-mentor", "--dev-mode"]);
        let state = AppState::new(args, Stores::memory(), Arc::new(LocalChannels::new()), None)
            .unwrap();
        state
            .managers
            .seed_superadmin(ADMIN_EMAIL, ADMIN_PASSWORD)
            .await
            .unwrap();
        state
    }

    pub(crate) async fn admin_token(state: &AppState) -> String {
        state
            .managers
            .login(ADMIN_EMAIL, ADMIN_PASSWORD)
            .await
            .unwrap()
            .token
    }

    pub(crate) async fn call(state: &AppState, req: ApiRequest) -> (StatusCode, Value) {
        let response = handle_api_request(state, req).await;
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    pub(crate) fn authed(req: ApiRequest, token: &str) -> ApiRequest {
        req.with_header("authorization", &format!("Bearer {}", token))
    }

    #[test]
    fn test_request_query() {
        let req = ApiRequest::new(Method::GET, "/api/questions?skill=rust&x=1", Bytes::new());
        assert_eq!(req.path, "/api/questions");
        assert_eq!(req.query_param("skill").as_deref(), Some("rust"));
        assert_eq!(req.query_param("missing"), None);
    }

    #[test]
    fn test_empty_body_rejected() {
        let req = ApiRequest::new(Method::POST, "/api/questions", Bytes::new());
        let err = req.json::<Value>().unwrap_err();
        assert!(matches!(err, MentorError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_from_hyper_limits_body() {
        let big = vec![b'a'; MAX_BODY_BYTES + 1];
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/questions?skill=go")
            .body(Full::new(Bytes::from(big)))
            .unwrap();
        assert!(ApiRequest::from_hyper(req).await.is_err());

        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/questions?skill=go")
            .header("authorization", "Bearer abc")
            .body(Full::new(Bytes::from_static(b"{}")))
            .unwrap();
        let req = ApiRequest::from_hyper(req).await.unwrap();
        assert_eq!(req.path, "/api/questions");
        assert_eq!(req.query.as_deref(), Some("skill=go"));
        assert_eq!(req.authorization(), Some("Bearer abc"));
        assert_eq!(&req.body[..], b"{}");
    }

    #[tokio::test]
    async fn test_protected_route_requires_token() {
        let state = state().await;
        let (status, body) = call(
            &state,
            ApiRequest::new(Method::POST, "/api/skills", r#"{"name":"go","levels":[]}"#),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "UNAUTHORIZED");

        let (status, _) = call(
            &state,
            authed(
                ApiRequest::new(Method::POST, "/api/skills", r#"{"name":"go","levels":[]}"#),
                "garbage",
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let state = state().await;
        let (status, body) = call(&state, ApiRequest::new(Method::GET, "/api/nope", "")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_error_response_hides_upstream_text() {
        let response = error_response(&MentorError::Database("connection reset by cluster0".into()));
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(!text.contains("cluster0"));
        assert!(text.contains("UPSTREAM_FAILURE"));
    }
}
