use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;

use crate::auth::Identity;
use crate::error::AppError;
use crate::models::*;
use crate::state::AppState;

pub(super) async fn request_enrollment(
    State(state): State<AppState>,
    identity: Identity,
    Json(req): Json<EnrollmentRequest>,
) -> Result<(StatusCode, Json<Enrollment>), AppError> {
    let enrollment = state.enrollments().request_enrollment(&identity, req).await?;
    Ok((StatusCode::CREATED, Json(enrollment)))
}

pub(super) async fn my_enrollments(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<Vec<StudentEnrollmentView>>, AppError> {
    let list = state.enrollments().student_enrollments(&identity).await?;
    Ok(Json(list))
}

pub(super) async fn pending_approvals(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<Vec<RosterEntry>>, AppError> {
    let list = state.enrollments().pending_approvals(&identity).await?;
    Ok(Json(list))
}

pub(super) async fn approve(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<Enrollment>, AppError> {
    let enrollment = state.enrollments().approve_enrollment(&identity, &id).await?;
    Ok(Json(enrollment))
}

pub(super) async fn reject(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<Enrollment>, AppError> {
    let enrollment = state.enrollments().reject_enrollment(&identity, &id).await?;
    Ok(Json(enrollment))
}

pub(super) async fn drop_enrollment(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<Enrollment>, AppError> {
    let enrollment = state.enrollments().drop_enrollment(&identity, &id).await?;
    Ok(Json(enrollment))
}

pub(super) async fn audit_enrollment(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<Enrollment>, AppError> {
    let enrollment = state.enrollments().audit_enrollment(&identity, &id).await?;
    Ok(Json(enrollment))
}

pub(super) async fn bulk_enroll(
    State(state): State<AppState>,
    identity: Identity,
    Path(offering_id): Path<String>,
    Json(req): Json<BulkEnrollmentRequest>,
) -> Result<Json<BulkEnrollmentReport>, AppError> {
    let report = state
        .enrollments()
        .bulk_enroll(&identity, &offering_id, req)
        .await?;
    Ok(Json(report))
}

pub(super) async fn upload_grades(
    State(state): State<AppState>,
    identity: Identity,
    Path(offering_id): Path<String>,
    Json(entries): Json<Vec<GradeEntry>>,
) -> Result<Json<GradeUploadReport>, AppError> {
    let report = state
        .enrollments()
        .upload_grades(&identity, &offering_id, entries)
        .await?;
    Ok(Json(report))
}

pub(super) async fn unified_list(
    State(state): State<AppState>,
    identity: Identity,
    Path(offering_id): Path<String>,
) -> Result<Json<UnifiedEnrollmentList>, AppError> {
    let list = state
        .enrollments()
        .unified_enrollment_list(&identity, &offering_id)
        .await?;
    Ok(Json(list))
}
