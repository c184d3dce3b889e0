use axum::Json;
use axum::extract::{Path, State};

use crate::auth::Identity;
use crate::error::AppError;
use crate::models::{StudentRecord, Transcript};
use crate::state::AppState;

pub(super) async fn student_record(
    State(state): State<AppState>,
    identity: Identity,
    Path(student_id): Path<String>,
) -> Result<Json<StudentRecord>, AppError> {
    let record = state.transcripts().student_record(&identity, &student_id).await?;
    Ok(Json(record))
}

pub(super) async fn transcript(
    State(state): State<AppState>,
    identity: Identity,
    Path(student_id): Path<String>,
) -> Result<Json<Transcript>, AppError> {
    let transcript = state.transcripts().transcript(&identity, &student_id).await?;
    Ok(Json(transcript))
}
