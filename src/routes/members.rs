//! Member routes

use hyper::{Response, StatusCode};

use crate::routes::{json_response, BoxBody};
use crate::server::AppState;
use crate::types::Result;

/// GET /api/members/{discord_id}
pub async fn get(state: &AppState, discord_id: &str) -> Result<Response<BoxBody>> {
    let member = state.members.get(discord_id).await?;
    Ok(json_response(StatusCode::OK, &member.view()))
}

#[cfg(test)]
mod tests {
    use crate::db::schemas::MemberProfile;
    use crate::routes::tests::{call, state};
    use crate::routes::ApiRequest;
    use hyper::{Method, StatusCode};

    #[tokio::test]
    async fn test_get_member() {
        let state = state().await;
        state
            .members
            .get_or_create(
                "42",
                MemberProfile {
                    username: Some("ada".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        state.members.apply_score_increase("42", 25).await.unwrap();

        let (status, body) = call(&state, ApiRequest::new(Method::GET, "/api/members/42", "")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["discordId"], "42");
        assert_eq!(body["mentorScore"], 25);

        let (status, body) = call(&state, ApiRequest::new(Method::GET, "/api/members/43", "")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "MEMBER_NOT_FOUND");
    }
}
