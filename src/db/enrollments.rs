use chrono::{DateTime, Utc};
use sqlx::SqliteExecutor;
use uuid::Uuid;

use crate::models::{
    CourseRecordRow, Enrollment, EnrollmentSource, EnrollmentStatus, EnrollmentTrigger,
    EnrollmentType, Grade, RosterEntry, StudentEnrollmentView,
};

pub async fn find_enrollment(
    ex: impl SqliteExecutor<'_>,
    id: &str,
) -> Result<Option<Enrollment>, sqlx::Error> {
    sqlx::query_as::<_, Enrollment>("SELECT * FROM enrollments WHERE id = ?")
        .bind(id)
        .fetch_optional(ex)
        .await
}

pub async fn find_for_student(
    ex: impl SqliteExecutor<'_>,
    student_id: &str,
    offering_id: &str,
) -> Result<Option<Enrollment>, sqlx::Error> {
    sqlx::query_as::<_, Enrollment>(
        "SELECT * FROM enrollments WHERE student_id = ? AND offering_id = ?",
    )
    .bind(student_id)
    .bind(offering_id)
    .fetch_optional(ex)
    .await
}

pub struct NewEnrollment<'a> {
    pub student_id: &'a str,
    pub offering_id: &'a str,
    pub enrollment_type: EnrollmentType,
    pub status: EnrollmentStatus,
    pub source: EnrollmentSource,
}

pub async fn insert_enrollment(
    ex: impl SqliteExecutor<'_>,
    new: NewEnrollment<'_>,
    now: DateTime<Utc>,
) -> Result<Enrollment, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let approved_at = (new.status == EnrollmentStatus::Enrolled).then_some(now);

    sqlx::query_as::<_, Enrollment>(
        r#"
        INSERT INTO enrollments
            (id, student_id, offering_id, enrollment_type, status, source,
            grade, requested_at, approved_at, completed_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7, ?8, NULL, ?7)
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(new.student_id)
    .bind(new.offering_id)
    .bind(new.enrollment_type)
    .bind(new.status)
    .bind(new.source)
    .bind(now)
    .bind(approved_at)
    .fetch_one(ex)
    .await
}

/// Credits the student currently holds as ENROLLED in `semester`.
pub async fn enrolled_credits(
    ex: impl SqliteExecutor<'_>,
    student_id: &str,
    semester: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(c.credits), 0)
        FROM enrollments e
        JOIN course_offerings o ON o.id = e.offering_id
        JOIN courses c ON c.id = o.course_id
        WHERE e.student_id = ?1 AND o.semester = ?2 AND e.status = 'ENROLLED'
        "#,
    )
    .bind(student_id)
    .bind(semester)
    .fetch_one(ex)
    .await
}

/// Conditional status change; zero rows means the enrollment was no longer in `from`.
pub async fn transition(
    ex: impl SqliteExecutor<'_>,
    id: &str,
    from: EnrollmentStatus,
    to: EnrollmentStatus,
    now: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE enrollments
        SET status = ?1,
            approved_at = CASE WHEN ?1 = 'ENROLLED' THEN ?2 ELSE approved_at END,
            updated_at = ?2
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

/// Puts a dropped enrollment back as an instructor-assigned one.
pub async fn reassign_dropped(
    ex: impl SqliteExecutor<'_>,
    id: &str,
    enrollment_type: EnrollmentType,
    now: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE enrollments
        SET status = 'ENROLLED', source = 'INSTRUCTOR_ASSIGNED', enrollment_type = ?1,
            approved_at = ?2, updated_at = ?2
        WHERE id = ?3 AND status = 'DROPPED'
        "#,
    )
    .bind(enrollment_type)
    .bind(now)
    .bind(id)
    .execute(ex)
    .await?;
    Ok(result.rows_affected())
}

/// Sets the grade once. Zero rows when the enrollment is no longer ENROLLED
/// or already carries a grade.
pub async fn apply_grade(
    ex: impl SqliteExecutor<'_>,
    id: &str,
    grade: Grade,
    now: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE enrollments
        SET status = 'COMPLETED', grade = ?1, completed_at = ?2, updated_at = ?2
        WHERE id = ?3 AND status = 'ENROLLED' AND grade IS NULL
        "#,
    )
    .bind(grade)
    .bind(now)
    .bind(id)
    .execute(ex)
    .await?;
    Ok(result.rows_affected())
}

pub async fn count_active(
    ex: impl SqliteExecutor<'_>,
    offering_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM enrollments
        WHERE offering_id = ? AND status IN ('ENROLLED', 'PENDING_INSTRUCTOR')
        "#,
    )
    .bind(offering_id)
    .fetch_one(ex)
    .await
}

pub async fn fetch_roster(
    ex: impl SqliteExecutor<'_>,
    offering_id: &str,
) -> Result<Vec<RosterEntry>, sqlx::Error> {
    sqlx::query_as::<_, RosterEntry>(
        r#"
        SELECT e.*, u.name AS student_name, u.email AS student_email,
            u.entry_number AS entry_number
        FROM enrollments e
        JOIN users u ON u.id = e.student_id
        WHERE e.offering_id = ?
        ORDER BY u.entry_number
        "#,
    )
    .bind(offering_id)
    .fetch_all(ex)
    .await
}

pub async fn fetch_pending_for_instructor(
    ex: impl SqliteExecutor<'_>,
    instructor_id: &str,
) -> Result<Vec<RosterEntry>, sqlx::Error> {
    sqlx::query_as::<_, RosterEntry>(
        r#"
        SELECT e.*, u.name AS student_name, u.email AS student_email,
            u.entry_number AS entry_number
        FROM enrollments e
        JOIN users u ON u.id = e.student_id
        JOIN course_offerings o ON o.id = e.offering_id
        WHERE o.instructor_id = ? AND e.status = 'PENDING_INSTRUCTOR'
        ORDER BY e.requested_at
        "#,
    )
    .bind(instructor_id)
    .fetch_all(ex)
    .await
}

pub async fn fetch_student_enrollments(
    ex: impl SqliteExecutor<'_>,
    student_id: &str,
) -> Result<Vec<StudentEnrollmentView>, sqlx::Error> {
    sqlx::query_as::<_, StudentEnrollmentView>(
        r#"
        SELECT e.*, o.semester AS semester, c.code AS course_code,
            c.name AS course_name, c.credits AS credits
        FROM enrollments e
        JOIN course_offerings o ON o.id = e.offering_id
        JOIN courses c ON c.id = o.course_id
        WHERE e.student_id = ?
        ORDER BY o.semester, c.code
        "#,
    )
    .bind(student_id)
    .fetch_all(ex)
    .await
}

pub async fn fetch_course_records(
    ex: impl SqliteExecutor<'_>,
    student_id: &str,
) -> Result<Vec<CourseRecordRow>, sqlx::Error> {
    sqlx::query_as::<_, CourseRecordRow>(
        r#"
        SELECT e.id AS enrollment_id, e.offering_id, o.semester, c.code AS course_code,
            c.name AS course_name, c.credits, e.enrollment_type, e.status, e.grade
        FROM enrollments e
        JOIN course_offerings o ON o.id = e.offering_id
        JOIN courses c ON c.id = o.course_id
        WHERE e.student_id = ?
        ORDER BY o.semester, c.code
        "#,
    )
    .bind(student_id)
    .fetch_all(ex)
    .await
}

/// Records that a cohort was bulk-enrolled; re-running refreshes the marker.
pub async fn upsert_trigger(
    ex: impl SqliteExecutor<'_>,
    offering_id: &str,
    branch: &str,
    batch_year: &str,
    enrollment_type: EnrollmentType,
    created_by: &str,
    now: DateTime<Utc>,
) -> Result<EnrollmentTrigger, sqlx::Error> {
    let id = Uuid::new_v4().to_string();

    sqlx::query_as::<_, EnrollmentTrigger>(
        r#"
        INSERT INTO enrollment_triggers
            (id, offering_id, branch, batch_year, enrollment_type, created_by,
            created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
        ON CONFLICT(offering_id, branch, batch_year) DO UPDATE SET
            enrollment_type = excluded.enrollment_type,
            updated_at = excluded.updated_at
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(offering_id)
    .bind(branch)
    .bind(batch_year)
    .bind(enrollment_type)
    .bind(created_by)
    .bind(now)
    .fetch_one(ex)
    .await
}
