use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use specforge_core::prd::{PrdContentUpdate, PrdList, UserStory};
use specforge_core::types::PrdStatus;

use super::blocking;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Deserialize, Default)]
pub struct ListQuery {
    #[serde(default)]
    pub mvp: bool,
}

/// GET /projects/:id/prds: PRD references with counts. `?mvp=true` keeps v1 only.
pub async fn list_prds(
    State(app): State<AppState>,
    Path(project_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<PrdList>, AppError> {
    let ctl = app.prds.clone();
    let prds = blocking(move || {
        if query.mvp {
            ctl.list_mvp(&project_id)
        } else {
            ctl.list(&project_id)
        }
    })
    .await?;
    Ok(Json(PrdList::from_prds(&prds)))
}

/// POST /projects/:id/prds/generate: attempt every pending PRD with attempts left.
pub async fn generate_pending(
    State(app): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let ctl = app.prds.clone();
    let prds = blocking(move || ctl.generate_pending(&project_id)).await?;
    let views: Vec<_> = prds.iter().map(|p| p.view()).collect();
    Ok(Json(serde_json::json!({ "prds": views })))
}

/// GET /projects/:id/prds/next: lowest-priority-number ready PRD.
pub async fn next_prd(
    State(app): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let ctl = app.prds.clone();
    let prd = blocking(move || ctl.next_prd(&project_id)).await?;
    Ok(Json(serde_json::json!(prd.view())))
}

/// GET /projects/:id/active-prd: the project's in-progress PRD.
pub async fn get_active(
    State(app): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let ctl = app.prds.clone();
    let prd = blocking(move || ctl.get_active(&project_id)).await?;
    Ok(Json(serde_json::json!(prd.view())))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetActiveBody {
    #[serde(default)]
    pub prd_id: String,
}

/// PUT /projects/:id/active-prd: activate a ready PRD.
pub async fn set_active(
    State(app): State<AppState>,
    Path(project_id): Path<String>,
    Json(body): Json<SetActiveBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    if body.prd_id.trim().is_empty() {
        return Err(AppError::bad_request("prdId is required"));
    }
    let ctl = app.prds.clone();
    let prd = blocking(move || ctl.set_active_prd(&project_id, &body.prd_id)).await?;
    Ok(Json(serde_json::json!(prd.view())))
}

/// DELETE /projects/:id/active-prd: pause the active PRD, if any.
pub async fn clear_active(
    State(app): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let ctl = app.prds.clone();
    blocking(move || ctl.clear_active_prd(&project_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /prds/:id
pub async fn get_prd(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let ctl = app.prds.clone();
    let prd = blocking(move || ctl.get(&id)).await?;
    Ok(Json(serde_json::json!(prd.view())))
}

/// PATCH /prds/:id: edit draft content.
pub async fn update_content(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<PrdContentUpdate>,
) -> Result<Json<serde_json::Value>, AppError> {
    let ctl = app.prds.clone();
    let prd = blocking(move || ctl.update_content(&id, update)).await?;
    Ok(Json(serde_json::json!(prd.view())))
}

#[derive(Deserialize)]
pub struct StatusBody {
    #[serde(default)]
    pub status: String,
}

/// PUT /prds/:id/status: ready, in_progress or complete.
pub async fn update_status(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<StatusBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let target: PrdStatus = body.status.parse()?;
    let ctl = app.prds.clone();
    let prd = blocking(move || ctl.update_status(&id, target)).await?;
    Ok(Json(serde_json::json!(prd.view())))
}

/// POST /prds/:id/retry: one more generation attempt. A failed attempt is
/// reported on the PRD, not as an error.
pub async fn retry(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let ctl = app.prds.clone();
    let prd = blocking(move || ctl.retry_generation(&id)).await?;
    Ok(Json(serde_json::json!(prd.view())))
}

/// POST /prds/:id/generate: generate if still pending.
pub async fn generate(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let ctl = app.prds.clone();
    let prd = blocking(move || ctl.generate(&id)).await?;
    Ok(Json(serde_json::json!(prd.view())))
}

/// POST /prds/:id/user-stories
pub async fn add_user_story(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Json(story): Json<UserStory>,
) -> Result<(StatusCode, Json<UserStory>), AppError> {
    let ctl = app.prds.clone();
    let story = blocking(move || ctl.add_user_story(&id, story)).await?;
    Ok((StatusCode::CREATED, Json(story)))
}

/// PUT /prds/:id/user-stories/:story_id
pub async fn update_user_story(
    State(app): State<AppState>,
    Path((id, story_id)): Path<(String, String)>,
    Json(story): Json<UserStory>,
) -> Result<Json<UserStory>, AppError> {
    let ctl = app.prds.clone();
    let story = blocking(move || ctl.update_user_story(&id, &story_id, story)).await?;
    Ok(Json(story))
}

/// DELETE /prds/:id/user-stories/:story_id
pub async fn delete_user_story(
    State(app): State<AppState>,
    Path((id, story_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    let ctl = app.prds.clone();
    blocking(move || ctl.delete_user_story(&id, &story_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
