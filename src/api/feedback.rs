use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;

use crate::auth::Identity;
use crate::error::AppError;
use crate::models::*;
use crate::state::AppState;

pub(super) async fn list_forms(
    State(state): State<AppState>,
    identity: Identity,
    Path(offering_id): Path<String>,
) -> Result<Json<Vec<FeedbackForm>>, AppError> {
    let forms = state.feedback().forms_for_offering(&identity, &offering_id).await?;
    Ok(Json(forms))
}

pub(super) async fn open_form(
    State(state): State<AppState>,
    identity: Identity,
    Path(offering_id): Path<String>,
    Json(req): Json<NewFeedbackFormRequest>,
) -> Result<(StatusCode, Json<FeedbackForm>), AppError> {
    let form = state.feedback().open_form(&identity, &offering_id, req).await?;
    Ok((StatusCode::CREATED, Json(form)))
}

pub(super) async fn close_form(
    State(state): State<AppState>,
    identity: Identity,
    Path(form_id): Path<String>,
) -> Result<Json<FeedbackForm>, AppError> {
    let form = state.feedback().close_form(&identity, &form_id).await?;
    Ok(Json(form))
}

pub(super) async fn submit(
    State(state): State<AppState>,
    identity: Identity,
    Path(form_id): Path<String>,
    Json(submission): Json<FeedbackSubmission>,
) -> Result<StatusCode, AppError> {
    state.feedback().submit(&identity, &form_id, submission).await?;
    Ok(StatusCode::CREATED)
}

pub(super) async fn summary(
    State(state): State<AppState>,
    identity: Identity,
    Path(form_id): Path<String>,
) -> Result<Json<FeedbackSummary>, AppError> {
    let summary = state.feedback().summary(&identity, &form_id).await?;
    Ok(Json(summary))
}
