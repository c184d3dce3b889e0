mod admin;
mod enrollments;
mod feedback;
mod offerings;
mod records;

use axum::routing::{get, patch, post, put};
use axum::{Router, extract::State, http::StatusCode};

use crate::error::AppError;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/calendar", get(admin::get_calendar))
        .route("/me", get(admin::me))
        .route("/users/{id}", get(admin::get_user))
        .route("/courses", get(admin::list_courses))
        .route("/courses/{id}", get(admin::get_course))
        .route("/admin/calendar", put(admin::upsert_calendar))
        .route("/admin/users", get(admin::list_users).post(admin::create_user))
        .route("/admin/users/bulk", post(admin::bulk_create_users))
        .route("/admin/users/{id}/deactivate", patch(admin::deactivate_user))
        .route("/admin/users/{id}/reactivate", patch(admin::reactivate_user))
        .route("/admin/courses", post(admin::create_course))
        .route("/offerings", get(offerings::list_offerings).post(offerings::propose_offering))
        .route("/offerings/{id}", get(offerings::get_offering))
        .route("/offerings/{id}/approve", patch(offerings::approve_offering))
        .route("/offerings/{id}/reject", patch(offerings::reject_offering))
        .route("/offerings/{id}/withdraw", patch(offerings::withdraw_offering))
        .route("/offerings/{id}/finalize", patch(offerings::finalize_offering))
        .route("/offerings/{id}/enrollments", get(enrollments::unified_list))
        .route("/offerings/{id}/triggers", post(enrollments::bulk_enroll))
        .route("/offerings/{id}/grades", post(enrollments::upload_grades))
        .route(
            "/offerings/{id}/feedback-forms",
            get(feedback::list_forms).post(feedback::open_form),
        )
        .route("/enrollments", post(enrollments::request_enrollment))
        .route("/enrollments/me", get(enrollments::my_enrollments))
        .route("/enrollments/pending", get(enrollments::pending_approvals))
        .route("/enrollments/{id}/approve", patch(enrollments::approve))
        .route("/enrollments/{id}/reject", patch(enrollments::reject))
        .route("/enrollments/{id}/drop", patch(enrollments::drop_enrollment))
        .route("/enrollments/{id}/audit", patch(enrollments::audit_enrollment))
        .route("/students/{id}/record", get(records::student_record))
        .route("/students/{id}/transcript", get(records::transcript))
        .route("/feedback-forms/{id}/close", patch(feedback::close_form))
        .route("/feedback-forms/{id}/responses", post(feedback::submit))
        .route("/feedback-forms/{id}/summary", get(feedback::summary))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(StatusCode::OK)
}
