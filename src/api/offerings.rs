use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;

use crate::auth::Identity;
use crate::error::AppError;
use crate::models::*;
use crate::state::AppState;

pub(super) async fn list_offerings(
    State(state): State<AppState>,
    _identity: Identity,
    Query(filter): Query<OfferingFilter>,
) -> Result<Json<Vec<OfferingView>>, AppError> {
    let offerings = state.offerings().list_offerings(&filter).await?;
    Ok(Json(offerings))
}

pub(super) async fn get_offering(
    State(state): State<AppState>,
    _identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<OfferingView>, AppError> {
    let offering = state.offerings().get_offering(&id).await?;
    Ok(Json(offering))
}

pub(super) async fn propose_offering(
    State(state): State<AppState>,
    identity: Identity,
    Json(req): Json<NewOfferingRequest>,
) -> Result<(StatusCode, Json<CourseOffering>), AppError> {
    let offering = state.offerings().propose_offering(&identity, req).await?;
    Ok((StatusCode::CREATED, Json(offering)))
}

pub(super) async fn approve_offering(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<CourseOffering>, AppError> {
    let offering = state.offerings().approve_offering(&identity, &id).await?;
    Ok(Json(offering))
}

pub(super) async fn reject_offering(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<CourseOffering>, AppError> {
    let offering = state.offerings().reject_offering(&identity, &id).await?;
    Ok(Json(offering))
}

pub(super) async fn withdraw_offering(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<CourseOffering>, AppError> {
    let offering = state.offerings().withdraw_offering(&identity, &id).await?;
    Ok(Json(offering))
}

pub(super) async fn finalize_offering(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<CourseOffering>, AppError> {
    let offering = state.offerings().finalize_offering(&identity, &id).await?;
    Ok(Json(offering))
}
