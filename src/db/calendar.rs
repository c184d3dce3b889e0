use chrono::{DateTime, Utc};
use sqlx::SqliteExecutor;

use crate::models::{AcademicCalendar, CalendarUpdate};

pub async fn fetch_calendar(
    ex: impl SqliteExecutor<'_>,
) -> Result<Option<AcademicCalendar>, sqlx::Error> {
    sqlx::query_as::<_, AcademicCalendar>(
        r#"
        SELECT semester, start_date, end_date, enrollment_start, enrollment_end,
            drop_deadline, audit_deadline, updated_at
        FROM academic_calendar
        WHERE id = 1
        "#,
    )
    .fetch_optional(ex)
    .await
}

/// Writes the singleton row, creating it on first use.
pub async fn upsert_calendar(
    ex: impl SqliteExecutor<'_>,
    update: &CalendarUpdate,
    now: DateTime<Utc>,
) -> Result<AcademicCalendar, sqlx::Error> {
    sqlx::query_as::<_, AcademicCalendar>(
        r#"
        INSERT INTO academic_calendar
            (id, semester, start_date, end_date, enrollment_start, enrollment_end,
            drop_deadline, audit_deadline, updated_at)
        VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT(id) DO UPDATE SET
            semester = excluded.semester,
            start_date = excluded.start_date,
            end_date = excluded.end_date,
            enrollment_start = excluded.enrollment_start,
            enrollment_end = excluded.enrollment_end,
            drop_deadline = excluded.drop_deadline,
            audit_deadline = excluded.audit_deadline,
            updated_at = excluded.updated_at
        RETURNING semester, start_date, end_date, enrollment_start, enrollment_end,
            drop_deadline, audit_deadline, updated_at
        "#,
    )
    .bind(update.semester.trim())
    .bind(update.start_date)
    .bind(update.end_date)
    .bind(update.enrollment_start)
    .bind(update.enrollment_end)
    .bind(update.drop_deadline)
    .bind(update.audit_deadline)
    .bind(now)
    .fetch_one(ex)
    .await
}
