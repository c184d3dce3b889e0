use chrono::{DateTime, Utc};
use sqlx::SqliteExecutor;
use uuid::Uuid;

use crate::models::{Course, NewCourseRequest};

pub async fn fetch_courses(ex: impl SqliteExecutor<'_>) -> Result<Vec<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>("SELECT * FROM courses ORDER BY code")
        .fetch_all(ex)
        .await
}

pub async fn find_course(
    ex: impl SqliteExecutor<'_>,
    id: &str,
) -> Result<Option<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>("SELECT * FROM courses WHERE id = ?")
        .bind(id)
        .fetch_optional(ex)
        .await
}

pub async fn insert_course(
    ex: impl SqliteExecutor<'_>,
    req: &NewCourseRequest,
    now: DateTime<Utc>,
) -> Result<Course, sqlx::Error> {
    let id = Uuid::new_v4().to_string();

    sqlx::query_as::<_, Course>(
        r#"
        INSERT INTO courses (id, code, name, credits, ltpsc, description, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&req.code)
    .bind(req.name.trim())
    .bind(req.credits)
    .bind(&req.ltpsc)
    .bind(&req.description)
    .bind(now)
    .fetch_one(ex)
    .await
}
