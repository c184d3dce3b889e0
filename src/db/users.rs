use chrono::{DateTime, Utc};
use sqlx::SqliteExecutor;
use uuid::Uuid;

use crate::models::{Role, UserProfile, UserRow};

pub async fn find_user(
    ex: impl SqliteExecutor<'_>,
    id: &str,
) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(ex)
        .await
}

pub async fn fetch_users(
    ex: impl SqliteExecutor<'_>,
    role: Option<Role>,
) -> Result<Vec<UserRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>(
        r#"
        SELECT * FROM users
        WHERE (?1 IS NULL OR role = ?1)
        ORDER BY role, name
        "#,
    )
    .bind(role)
    .fetch_all(ex)
    .await
}

/// Active students whose entry number starts with `prefix`.
pub async fn fetch_students_with_prefix(
    ex: impl SqliteExecutor<'_>,
    prefix: &str,
) -> Result<Vec<UserRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>(
        r#"
        SELECT * FROM users
        WHERE role = 'STUDENT'
          AND is_active = 1
          AND substr(entry_number, 1, length(?1)) = ?1
        ORDER BY entry_number
        "#,
    )
    .bind(prefix)
    .fetch_all(ex)
    .await
}

pub async fn insert_user(
    ex: impl SqliteExecutor<'_>,
    name: &str,
    email: &str,
    profile: &UserProfile,
    now: DateTime<Utc>,
) -> Result<UserRow, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let (role, entry_number, department, is_faculty_advisor) = match profile {
        UserProfile::Student { entry_number } => {
            (Role::Student, Some(entry_number.as_str()), None, false)
        }
        UserProfile::Instructor {
            department,
            is_faculty_advisor,
        } => (Role::Instructor, None, Some(department.clone()), *is_faculty_advisor),
        UserProfile::Admin => (Role::Admin, None, None, false),
    };

    sqlx::query_as::<_, UserRow>(
        r#"
        INSERT INTO users
            (id, name, email, role, entry_number, department,
            is_faculty_advisor, is_active, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?8)
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(name.trim())
    .bind(email.trim().to_ascii_lowercase())
    .bind(role)
    .bind(entry_number)
    .bind(department)
    .bind(is_faculty_advisor)
    .bind(now)
    .fetch_one(ex)
    .await
}

pub async fn set_active(
    ex: impl SqliteExecutor<'_>,
    id: &str,
    active: bool,
    now: DateTime<Utc>,
) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>(
        "UPDATE users SET is_active = ?1, updated_at = ?2 WHERE id = ?3 RETURNING *",
    )
    .bind(active)
    .bind(now)
    .bind(id)
    .fetch_optional(ex)
    .await
}
