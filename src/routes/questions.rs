//! Question routes

use hyper::{Response, StatusCode};
use serde::Deserialize;

use crate::db::parse_object_id;
use crate::db::schemas::{MemberProfile, QuestionView};
use crate::routes::{json_response, ApiRequest, BoxBody};
use crate::server::AppState;
use crate::types::Result;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuestionRequest {
    /// Discord id of the member asking
    pub asker_id: String,
    pub body: String,
    pub skill: String,
    #[serde(default)]
    pub asker_username: Option<String>,
}

/// POST /api/questions
pub async fn create(state: &AppState, req: &ApiRequest) -> Result<Response<BoxBody>> {
    let body: CreateQuestionRequest = req.json()?;

    let profile = MemberProfile {
        username: body.asker_username,
        ..Default::default()
    };
    let asker = state.members.get_or_create(&body.asker_id, profile).await?;
    let question = state
        .questions
        .open(&asker.discord_id, &body.body, &body.skill)
        .await?;

    Ok(json_response(StatusCode::CREATED, &question.view()))
}

/// GET /api/questions?skill=
pub async fn list(state: &AppState, req: &ApiRequest) -> Result<Response<BoxBody>> {
    let skill = req.query_param("skill");
    let questions: Vec<QuestionView> = state
        .questions
        .list_open(skill.as_deref())
        .await?
        .iter()
        .map(|q| q.view())
        .collect();
    Ok(json_response(StatusCode::OK, &questions))
}

/// GET /api/questions/{id}
pub async fn get(state: &AppState, id: &str) -> Result<Response<BoxBody>> {
    let question = state.questions.find(parse_object_id(id, "question")?).await?;
    Ok(json_response(StatusCode::OK, &question.view()))
}
