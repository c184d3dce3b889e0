use chrono::{DateTime, Utc};
use sqlx::{SqliteExecutor, types::Json};
use uuid::Uuid;

use crate::models::{CourseOffering, OfferingFilter, OfferingStatus, OfferingView};

const VIEW_SELECT: &str = r#"
    SELECT o.*, c.code AS course_code, c.name AS course_name, c.credits AS credits,
        u.name AS instructor_name
    FROM course_offerings o
    JOIN courses c ON c.id = o.course_id
    JOIN users u ON u.id = o.instructor_id
"#;

pub async fn find_offering(
    ex: impl SqliteExecutor<'_>,
    id: &str,
) -> Result<Option<CourseOffering>, sqlx::Error> {
    sqlx::query_as::<_, CourseOffering>("SELECT * FROM course_offerings WHERE id = ?")
        .bind(id)
        .fetch_optional(ex)
        .await
}

pub async fn find_offering_view(
    ex: impl SqliteExecutor<'_>,
    id: &str,
) -> Result<Option<OfferingView>, sqlx::Error> {
    let sql = format!("{VIEW_SELECT} WHERE o.id = ?");
    sqlx::query_as::<_, OfferingView>(&sql)
        .bind(id)
        .fetch_optional(ex)
        .await
}

pub async fn fetch_offering_views(
    ex: impl SqliteExecutor<'_>,
    filter: &OfferingFilter,
) -> Result<Vec<OfferingView>, sqlx::Error> {
    let sql = format!(
        r#"{VIEW_SELECT}
        WHERE (?1 IS NULL OR o.status = ?1)
          AND (?2 IS NULL OR o.semester = ?2)
          AND (?3 IS NULL OR o.instructor_id = ?3)
        ORDER BY o.semester DESC, c.code
        "#
    );
    sqlx::query_as::<_, OfferingView>(&sql)
        .bind(filter.status)
        .bind(&filter.semester)
        .bind(&filter.instructor_id)
        .fetch_all(ex)
        .await
}

pub async fn insert_offering(
    ex: impl SqliteExecutor<'_>,
    course_id: &str,
    instructor_id: &str,
    semester: &str,
    time_slot: Option<&str>,
    allowed_branches: Vec<String>,
    now: DateTime<Utc>,
) -> Result<CourseOffering, sqlx::Error> {
    let id = Uuid::new_v4().to_string();

    sqlx::query_as::<_, CourseOffering>(
        r#"
        INSERT INTO course_offerings
            (id, course_id, instructor_id, semester, time_slot, allowed_branches,
            status, created_at, approved_at, completed_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'PENDING', ?7, NULL, NULL)
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(course_id)
    .bind(instructor_id)
    .bind(semester)
    .bind(time_slot)
    .bind(Json(allowed_branches))
    .bind(now)
    .fetch_one(ex)
    .await
}

/// Moves an offering from `from` to `to`, stamping approval/completion times.
/// Returns the number of rows changed, zero when the offering was not in `from`.
pub async fn transition(
    ex: impl SqliteExecutor<'_>,
    id: &str,
    from: OfferingStatus,
    to: OfferingStatus,
    now: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE course_offerings
        SET status = ?1,
            approved_at = CASE WHEN ?1 = 'ENROLLING' THEN ?2 ELSE approved_at END,
            completed_at = CASE WHEN ?1 = 'COMPLETED' THEN ?2 ELSE completed_at END
        WHERE id = ?3 AND status = ?4
        "#,
    )
    .bind(to)
    .bind(now)
    .bind(id)
    .bind(from)
    .execute(ex)
    .await?;
    Ok(result.rows_affected())
}

/// Rejects every other PENDING offering of the same course and semester.
pub async fn reject_pending_siblings(
    ex: impl SqliteExecutor<'_>,
    offering: &CourseOffering,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE course_offerings
        SET status = 'REJECTED'
        WHERE course_id = ?1 AND semester = ?2 AND id != ?3 AND status = 'PENDING'
        "#,
    )
    .bind(&offering.course_id)
    .bind(&offering.semester)
    .bind(&offering.id)
    .execute(ex)
    .await?;
    Ok(result.rows_affected())
}

pub async fn has_live_sibling(
    ex: impl SqliteExecutor<'_>,
    offering: &CourseOffering,
) -> Result<bool, sqlx::Error> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM course_offerings
        WHERE course_id = ?1 AND semester = ?2 AND id != ?3
          AND status IN ('ENROLLING', 'COMPLETED')
        "#,
    )
    .bind(&offering.course_id)
    .bind(&offering.semester)
    .bind(&offering.id)
    .fetch_one(ex)
    .await?;
    Ok(count > 0)
}
