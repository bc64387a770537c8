use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use specforge_core::controller::DiscoveryController;
use specforge_core::discovery::{Discovery, DiscoveryUpdate, NewFeature, NewUser};
use specforge_core::metadata;
use specforge_core::types::Stage;

use super::blocking;
use crate::error::AppError;
use crate::state::AppState;

/// `{discovery, summary?}`; the summary is present from the summary stage on.
fn discovery_body(
    ctl: &DiscoveryController,
    discovery: &Discovery,
) -> specforge_core::Result<serde_json::Value> {
    let summary = match discovery.stage {
        Stage::Summary | Stage::Complete => Some(ctl.summary(&discovery.id)?),
        _ => None,
    };
    Ok(serde_json::json!({
        "discovery": discovery.view(),
        "summary": summary,
    }))
}

/// GET /projects/:id/discovery: get or create the project's discovery.
pub async fn get_discovery(
    State(app): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let ctl = app.discovery.clone();
    let body = blocking(move || {
        let discovery = ctl.get_or_create(&project_id)?;
        discovery_body(&ctl, &discovery)
    })
    .await?;
    Ok(Json(body))
}

/// GET /projects/:id/discovery/mode: whether the project is still in
/// intake. Never creates a discovery.
pub async fn discovery_mode(
    State(app): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let ctl = app.discovery.clone();
    let active = blocking(move || ctl.is_discovery_mode(&project_id)).await?;
    Ok(Json(serde_json::json!({ "discoveryMode": active })))
}

/// PUT /projects/:id/discovery/stage: advance one stage.
pub async fn advance_stage(
    State(app): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let ctl = app.discovery.clone();
    let body = blocking(move || {
        let id = ctl.find_for_project(&project_id)?.id;
        let discovery = ctl.advance_stage(&id)?;
        discovery_body(&ctl, &discovery)
    })
    .await?;
    Ok(Json(body))
}

/// PUT /projects/:id/discovery/data: merge free-form fields.
pub async fn update_data(
    State(app): State<AppState>,
    Path(project_id): Path<String>,
    Json(update): Json<DiscoveryUpdate>,
) -> Result<Json<serde_json::Value>, AppError> {
    let ctl = app.discovery.clone();
    let body = blocking(move || {
        let id = ctl.find_for_project(&project_id)?.id;
        let discovery = ctl.update_data(&id, &update)?;
        discovery_body(&ctl, &discovery)
    })
    .await?;
    Ok(Json(body))
}

/// POST /projects/:id/discovery/users: add a persona.
pub async fn add_user(
    State(app): State<AppState>,
    Path(project_id): Path<String>,
    Json(user): Json<NewUser>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let ctl = app.discovery.clone();
    let user = blocking(move || {
        let id = ctl.find_for_project(&project_id)?.id;
        ctl.add_user(&id, user)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(serde_json::json!(user))))
}

/// POST /projects/:id/discovery/features: add a feature.
pub async fn add_feature(
    State(app): State<AppState>,
    Path(project_id): Path<String>,
    Json(feature): Json<NewFeature>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let ctl = app.discovery.clone();
    let feature = blocking(move || {
        let id = ctl.find_for_project(&project_id)?.id;
        ctl.add_feature(&id, feature)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(serde_json::json!(feature))))
}

/// POST /projects/:id/discovery/confirm: confirm from summary, seeding PRDs.
pub async fn confirm(
    State(app): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let ctl = app.discovery.clone();
    let confirmation = blocking(move || {
        let id = ctl.find_for_project(&project_id)?.id;
        ctl.confirm(&id)
    })
    .await?;
    let seeded: Vec<_> = confirmation.seeded.iter().map(|p| p.reference()).collect();
    Ok(Json(serde_json::json!({
        "discovery": confirmation.discovery.view(),
        "summary": confirmation.summary,
        "seededPrds": seeded,
    })))
}

/// DELETE /projects/:id/discovery: start over at welcome.
pub async fn reset(
    State(app): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let ctl = app.discovery.clone();
    let body = blocking(move || {
        let id = ctl.find_for_project(&project_id)?.id;
        let discovery = ctl.reset(&id)?;
        discovery_body(&ctl, &discovery)
    })
    .await?;
    Ok(Json(body))
}

/// GET /projects/:id/discovery/history: field edits, newest first.
pub async fn history(
    State(app): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let ctl = app.discovery.clone();
    let entries = blocking(move || {
        let id = ctl.find_for_project(&project_id)?.id;
        ctl.history(&id)
    })
    .await?;
    Ok(Json(serde_json::json!(entries)))
}

#[derive(Deserialize)]
pub struct ExtractBody {
    pub response: String,
}

/// POST /projects/:id/discovery/extract: apply the data block of an
/// assistant reply and return the reply with the block removed.
pub async fn extract(
    State(app): State<AppState>,
    Path(project_id): Path<String>,
    Json(body): Json<ExtractBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let ctl = app.discovery.clone();
    let display_text = metadata::strip(&body.response);
    let body = blocking(move || {
        let id = ctl.get_or_create(&project_id)?.id;
        let discovery = ctl.apply_response(&id, &body.response)?;
        discovery_body(&ctl, &discovery)
    })
    .await?;
    Ok(Json(serde_json::json!({
        "discovery": body["discovery"],
        "summary": body["summary"],
        "displayText": display_text,
    })))
}
