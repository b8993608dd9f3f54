//! Skill catalog routes

use hyper::{Response, StatusCode};
use serde::Deserialize;

use crate::catalog::NewSkill;
use crate::db::schemas::{SkillLevel, SkillView};
use crate::routes::{json_response, ApiRequest, BoxBody, SuccessResponse};
use crate::server::AppState;
use crate::types::Result;

#[derive(Debug, Deserialize)]
pub struct ReplaceLevelsRequest {
    pub levels: Vec<SkillLevel>,
}

/// GET /api/skills
pub async fn list(state: &AppState) -> Result<Response<BoxBody>> {
    let skills: Vec<SkillView> = state.catalog.list().await?.iter().map(|s| s.view()).collect();
    Ok(json_response(StatusCode::OK, &skills))
}

/// GET /api/skills/{name}
pub async fn get(state: &AppState, name: &str) -> Result<Response<BoxBody>> {
    let skill = state.catalog.get(name).await?;
    Ok(json_response(StatusCode::OK, &skill.view()))
}

/// POST /api/skills
pub async fn create(state: &AppState, req: &ApiRequest) -> Result<Response<BoxBody>> {
    let skill: NewSkill = req.json()?;
    let created = state.catalog.create(skill).await?;
    Ok(json_response(StatusCode::CREATED, &created.view()))
}

/// PUT /api/skills/{name}/levels
pub async fn replace_levels(
    state: &AppState,
    name: &str,
    req: &ApiRequest,
) -> Result<Response<BoxBody>> {
    let body: ReplaceLevelsRequest = req.json()?;
    let updated = state.catalog.replace_levels(name, body.levels).await?;
    Ok(json_response(StatusCode::OK, &updated.view()))
}

/// DELETE /api/skills/{name}
pub async fn retire(state: &AppState, name: &str) -> Result<Response<BoxBody>> {
    state.catalog.retire(name).await?;
    Ok(json_response(
        StatusCode::OK,
        &SuccessResponse {
            success: true,
            message: format!("Skill `{}` retired", name.trim().to_lowercase()),
        },
    ))
}
