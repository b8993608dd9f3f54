//! Health check endpoints
//!
//! `/health` reports liveness plus which backing services this instance
//! runs with. `/version` reports the build stamp.

use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::routes::{json_response, BoxBody};
use crate::server::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: &'static str,
    /// Uptime in seconds
    pub uptime: u64,
    pub timestamp: String,
    /// "development" or "production"
    pub mode: &'static str,
    pub node_id: String,
    pub services: ServiceStatus,
}

/// Which integrations are live
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub mongodb: bool,
    pub nats: bool,
    pub discord_interactions: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionResponse {
    pub version: &'static str,
    pub commit: &'static str,
    pub build_time: &'static str,
    pub service: &'static str,
}

/// GET /health
pub fn health_check(state: &AppState) -> Response<BoxBody> {
    let response = HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.started_at.elapsed().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        mode: if state.args.dev_mode {
            "development"
        } else {
            "production"
        },
        node_id: state.args.node_id.to_string(),
        services: ServiceStatus {
            mongodb: state.mongo.is_some(),
            nats: state.nats.is_some(),
            discord_interactions: state.verifier.is_some(),
        },
    };
    json_response(StatusCode::OK, &response)
}

/// GET /version
pub fn version_info() -> Response<BoxBody> {
    let response = VersionResponse {
        version: env!("CARGO_PKG_VERSION"),
        commit: option_env!("GIT_COMMIT_SHORT").unwrap_or("unknown"),
        build_time: option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
        service: "guild-mentor",
    };
    json_response(StatusCode::OK, &response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::tests::state;
    use http_body_util::BodyExt;
    use serde_json::Value;

    #[tokio::test]
    async fn test_health_in_dev_mode() {
        let state = state().await;
        let response = health_check(&state);
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["healthy"], true);
        assert_eq!(body["mode"], "development");
        assert_eq!(body["services"]["mongodb"], false);
    }

    #[tokio::test]
    async fn test_version() {
        let bytes = version_info().into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["service"], "guild-mentor");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }
}
