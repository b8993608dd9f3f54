//! Collaboration routes: lookup, ending a session, score reconciliation

use hyper::{Response, StatusCode};
use tracing::info;

use crate::db::parse_object_id;
use crate::routes::{json_response, BoxBody};
use crate::server::AppState;
use crate::types::Result;

/// GET /api/collaborations/{id}
pub async fn get(state: &AppState, id: &str) -> Result<Response<BoxBody>> {
    let collaboration = state
        .workflow
        .get(parse_object_id(id, "collaboration")?)
        .await?;
    Ok(json_response(StatusCode::OK, &collaboration.view()))
}

/// POST /api/collaborations/{id}/end
pub async fn end(state: &AppState, id: &str) -> Result<Response<BoxBody>> {
    let ended = state
        .workflow
        .end_session(parse_object_id(id, "collaboration")?)
        .await?;
    Ok(json_response(StatusCode::OK, &ended.view()))
}

/// POST /api/collaborations/reconcile
pub async fn reconcile(state: &AppState) -> Result<Response<BoxBody>> {
    let summary = state.workflow.reconcile_scores().await?;
    info!(
        examined = summary.examined,
        applied = summary.applied,
        failed = summary.failed,
        "Reconciliation requested through API"
    );
    Ok(json_response(StatusCode::OK, &summary))
}

#[cfg(test)]
mod tests {
    use crate::catalog::tests::go_skill;
    use crate::db::schemas::MemberProfile;
    use crate::routes::tests::{admin_token, authed, call, state};
    use crate::routes::ApiRequest;
    use crate::server::AppState;
    use hyper::{Method, StatusCode};

    /// Answer a fresh go question; returns the collaboration id
    async fn answered(state: &AppState) -> String {
        state.catalog.create(go_skill()).await.unwrap();
        state
            .members
            .get_or_create("mentor", MemberProfile::default())
            .await
            .unwrap();
        let question = state.questions.open("mentee", "why?", "go").await.unwrap();
        let outcome = state
            .workflow
            .answer(question._id.unwrap(), "mentor", 2)
            .await
            .unwrap();
        outcome.collaboration._id.unwrap().to_hex()
    }

    #[tokio::test]
    async fn test_get_and_end() {
        let state = state().await;
        let token = admin_token(&state).await;
        let id = answered(&state).await;

        let (status, body) = call(
            &state,
            ApiRequest::new(Method::GET, format!("/api/collaborations/{}", id), ""),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["mentorScoreIncrease"], 25);
        assert_eq!(body["scoreApplied"], true);
        assert!(body.get("endedAt").is_none());

        let end = || ApiRequest::new(Method::POST, format!("/api/collaborations/{}/end", id), "");

        let (status, _) = call(&state, end()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = call(&state, authed(end(), &token)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["endedAt"].is_string());

        let (status, body) = call(&state, authed(end(), &token)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn test_reconcile_with_nothing_pending() {
        let state = state().await;
        let token = admin_token(&state).await;
        answered(&state).await;

        let (status, body) = call(
            &state,
            authed(
                ApiRequest::new(Method::POST, "/api/collaborations/reconcile", ""),
                &token,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["examined"], 0);
        assert_eq!(body["applied"], 0);
    }

    #[tokio::test]
    async fn test_unknown_collaboration() {
        let state = state().await;
        let (status, body) = call(
            &state,
            ApiRequest::new(Method::GET, "/api/collaborations/65f000000000000000000000", ""),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "COLLABORATION_NOT_FOUND");
    }
}
