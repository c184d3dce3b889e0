use chrono::{DateTime, Utc};
use sqlx::{SqliteExecutor, types::Json};
use uuid::Uuid;

use crate::models::{CourseFeedback, FeedbackForm};

pub async fn find_form(
    ex: impl SqliteExecutor<'_>,
    id: &str,
) -> Result<Option<FeedbackForm>, sqlx::Error> {
    sqlx::query_as::<_, FeedbackForm>("SELECT * FROM feedback_forms WHERE id = ?")
        .bind(id)
        .fetch_optional(ex)
        .await
}

pub async fn fetch_forms_for_offering(
    ex: impl SqliteExecutor<'_>,
    offering_id: &str,
) -> Result<Vec<FeedbackForm>, sqlx::Error> {
    sqlx::query_as::<_, FeedbackForm>(
        "SELECT * FROM feedback_forms WHERE offering_id = ? ORDER BY opened_at DESC",
    )
    .bind(offering_id)
    .fetch_all(ex)
    .await
}

pub async fn insert_form(
    ex: impl SqliteExecutor<'_>,
    offering_id: &str,
    title: &str,
    questions: Vec<String>,
    now: DateTime<Utc>,
) -> Result<FeedbackForm, sqlx::Error> {
    let id = Uuid::new_v4().to_string();

    sqlx::query_as::<_, FeedbackForm>(
        r#"
        INSERT INTO feedback_forms (id, offering_id, title, questions, status, opened_at, closed_at)
        VALUES (?1, ?2, ?3, ?4, 'OPEN', ?5, NULL)
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(offering_id)
    .bind(title)
    .bind(Json(questions))
    .bind(now)
    .fetch_one(ex)
    .await
}

pub async fn close_form(
    ex: impl SqliteExecutor<'_>,
    id: &str,
    now: DateTime<Utc>,
) -> Result<Option<FeedbackForm>, sqlx::Error> {
    sqlx::query_as::<_, FeedbackForm>(
        r#"
        UPDATE feedback_forms SET status = 'CLOSED', closed_at = ?1
        WHERE id = ?2 AND status = 'OPEN'
        RETURNING *
        "#,
    )
    .bind(now)
    .bind(id)
    .fetch_optional(ex)
    .await
}

pub async fn insert_response(
    ex: impl SqliteExecutor<'_>,
    form_id: &str,
    student_id: &str,
    ratings: Vec<u8>,
    comment: Option<&str>,
    now: DateTime<Utc>,
) -> Result<CourseFeedback, sqlx::Error> {
    let id = Uuid::new_v4().to_string();

    sqlx::query_as::<_, CourseFeedback>(
        r#"
        INSERT INTO course_feedback (id, form_id, student_id, ratings, comment, submitted_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(form_id)
    .bind(student_id)
    .bind(Json(ratings))
    .bind(comment)
    .bind(now)
    .fetch_one(ex)
    .await
}

pub async fn fetch_responses(
    ex: impl SqliteExecutor<'_>,
    form_id: &str,
) -> Result<Vec<CourseFeedback>, sqlx::Error> {
    sqlx::query_as::<_, CourseFeedback>(
        "SELECT * FROM course_feedback WHERE form_id = ? ORDER BY submitted_at",
    )
    .bind(form_id)
    .fetch_all(ex)
    .await
}
