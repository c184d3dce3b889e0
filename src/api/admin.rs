use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;

use crate::auth::Identity;
use crate::error::AppError;
use crate::models::*;
use crate::services::{BulkUserOutcome, CourseService};
use crate::state::AppState;

#[derive(Deserialize)]
pub(super) struct UserQueryParams {
    role: Option<Role>,
}

pub(super) async fn get_calendar(
    State(state): State<AppState>,
    _identity: Identity,
) -> Result<Json<AcademicCalendar>, AppError> {
    let calendar = state.calendar().get_calendar().await?;
    Ok(Json(calendar))
}

pub(super) async fn upsert_calendar(
    State(state): State<AppState>,
    identity: Identity,
    Json(update): Json<CalendarUpdate>,
) -> Result<Json<AcademicCalendar>, AppError> {
    let calendar = state.calendar().upsert_calendar(&identity, update).await?;
    Ok(Json(calendar))
}

pub(super) async fn me(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<User>, AppError> {
    let user = state.users().get_user(&identity, &identity.user_id).await?;
    Ok(Json(user))
}

pub(super) async fn get_user(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<User>, AppError> {
    let user = state.users().get_user(&identity, &id).await?;
    Ok(Json(user))
}

pub(super) async fn list_users(
    State(state): State<AppState>,
    identity: Identity,
    Query(params): Query<UserQueryParams>,
) -> Result<Json<Vec<User>>, AppError> {
    let users = state.users().list_users(&identity, params.role).await?;
    Ok(Json(users))
}

pub(super) async fn create_user(
    State(state): State<AppState>,
    identity: Identity,
    Json(req): Json<NewUserRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let user = state.users().create_user(&identity, req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub(super) async fn bulk_create_users(
    State(state): State<AppState>,
    identity: Identity,
    Json(reqs): Json<Vec<NewUserRequest>>,
) -> Result<Json<Vec<BulkUserOutcome>>, AppError> {
    let outcomes = state.users().bulk_create_users(&identity, reqs).await?;
    Ok(Json(outcomes))
}

pub(super) async fn deactivate_user(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<User>, AppError> {
    let user = state.users().set_active(&identity, &id, false).await?;
    Ok(Json(user))
}

pub(super) async fn reactivate_user(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<User>, AppError> {
    let user = state.users().set_active(&identity, &id, true).await?;
    Ok(Json(user))
}

pub(super) async fn list_courses(
    State(state): State<AppState>,
    _identity: Identity,
) -> Result<Json<Vec<Course>>, AppError> {
    let courses = CourseService::list_courses(&state.db).await?;
    Ok(Json(courses))
}

pub(super) async fn get_course(
    State(state): State<AppState>,
    _identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<Course>, AppError> {
    let course = CourseService::get_course(&state.db, &id).await?;
    Ok(Json(course))
}

pub(super) async fn create_course(
    State(state): State<AppState>,
    identity: Identity,
    Json(req): Json<NewCourseRequest>,
) -> Result<(StatusCode, Json<Course>), AppError> {
    let course = CourseService::create_course(&state.db, &state.clock, &identity, req).await?;
    Ok((StatusCode::CREATED, Json(course)))
}
