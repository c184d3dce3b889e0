use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::AppError;

/// `PENDING_INSTRUCTOR -> {ENROLLED, REJECTED}`,
/// `ENROLLED -> {DROPPED, AUDIT, COMPLETED}`. Everything else is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentStatus {
    PendingInstructor,
    Enrolled,
    Rejected,
    Dropped,
    Audit,
    Completed,
}

impl EnrollmentStatus {
    pub fn can_transition_to(self, next: EnrollmentStatus) -> bool {
        use EnrollmentStatus::*;
        matches!(
            (self, next),
            (PendingInstructor, Enrolled)
                | (PendingInstructor, Rejected)
                | (Enrolled, Dropped)
                | (Enrolled, Audit)
                | (Enrolled, Completed)
        )
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EnrollmentStatus::PendingInstructor => "PENDING_INSTRUCTOR",
            EnrollmentStatus::Enrolled => "ENROLLED",
            EnrollmentStatus::Rejected => "REJECTED",
            EnrollmentStatus::Dropped => "DROPPED",
            EnrollmentStatus::Audit => "AUDIT",
            EnrollmentStatus::Completed => "COMPLETED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentSource {
    StudentRequest,
    InstructorAssigned,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentType {
    #[default]
    Credit,
    Audit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
pub enum Grade {
    #[serde(rename = "A")]
    #[sqlx(rename = "A")]
    A,
    #[serde(rename = "A-")]
    #[sqlx(rename = "A-")]
    AMinus,
    #[serde(rename = "B")]
    #[sqlx(rename = "B")]
    B,
    #[serde(rename = "B-")]
    #[sqlx(rename = "B-")]
    BMinus,
    #[serde(rename = "C")]
    #[sqlx(rename = "C")]
    C,
    #[serde(rename = "C-")]
    #[sqlx(rename = "C-")]
    CMinus,
    #[serde(rename = "D")]
    #[sqlx(rename = "D")]
    D,
    #[serde(rename = "E")]
    #[sqlx(rename = "E")]
    E,
    #[serde(rename = "F")]
    #[sqlx(rename = "F")]
    F,
}

impl Grade {
    pub fn points(self) -> u32 {
        match self {
            Grade::A => 10,
            Grade::AMinus => 9,
            Grade::B => 8,
            Grade::BMinus => 7,
            Grade::C => 6,
            Grade::CMinus => 5,
            Grade::D => 4,
            Grade::E | Grade::F => 0,
        }
    }

    /// D and above earn the course's credits.
    pub fn earns_credit(self) -> bool {
        self.points() > 0
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::AMinus => "A-",
            Grade::B => "B",
            Grade::BMinus => "B-",
            Grade::C => "C",
            Grade::CMinus => "C-",
            Grade::D => "D",
            Grade::E => "E",
            Grade::F => "F",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Grade {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let grade = match s.trim().to_ascii_uppercase().as_str() {
            "A" => Grade::A,
            "A-" => Grade::AMinus,
            "B" => Grade::B,
            "B-" => Grade::BMinus,
            "C" => Grade::C,
            "C-" => Grade::CMinus,
            "D" => Grade::D,
            "E" => Grade::E,
            "F" => Grade::F,
            other => return Err(AppError::BadRequest(format!("invalid grade: {other}"))),
        };
        Ok(grade)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Enrollment {
    pub id: String,
    pub student_id: String,
    pub offering_id: String,
    pub enrollment_type: EnrollmentType,
    pub status: EnrollmentStatus,
    pub source: EnrollmentSource,
    pub grade: Option<Grade>,
    pub requested_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// An enrollment as the student sees it, with course context.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StudentEnrollmentView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub enrollment: Enrollment,
    pub semester: String,
    pub course_code: String,
    pub course_name: String,
    pub credits: i32,
}

/// An enrollment as the instructor sees it, with student context.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RosterEntry {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub enrollment: Enrollment,
    pub student_name: String,
    pub student_email: String,
    pub entry_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentRequest {
    pub offering_id: String,
    #[serde(default)]
    pub enrollment_type: EnrollmentType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkEnrollmentRequest {
    pub branch: String,
    pub batch_year: String,
    #[serde(default)]
    pub enrollment_type: EnrollmentType,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EnrollmentTrigger {
    pub id: String,
    pub offering_id: String,
    pub branch: String,
    pub batch_year: String,
    pub enrollment_type: EnrollmentType,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize)]
pub struct BulkEnrollmentReport {
    pub trigger_id: String,
    /// Newly enrolled plus re-enrolled.
    pub enrolled_count: usize,
    pub newly_enrolled: Vec<String>,
    pub re_enrolled: Vec<String>,
    pub already_enrolled: Vec<String>,
    pub skipped_credit_limit: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeEntry {
    pub enrollment_id: String,
    pub grade: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GradeOutcome {
    Applied,
    SkippedNotFound,
    SkippedNotEnrolled,
    SkippedAlreadyGraded,
}

#[derive(Debug, Clone, Serialize)]
pub struct GradeItemResult {
    pub enrollment_id: String,
    pub outcome: GradeOutcome,
}

#[derive(Debug, Default, Serialize)]
pub struct GradeUploadReport {
    pub updated_count: usize,
    pub updated_ids: Vec<String>,
    pub items: Vec<GradeItemResult>,
}

#[derive(Debug, Default, Serialize)]
pub struct EnrollmentCounts {
    pub pending: usize,
    pub enrolled: usize,
    pub audit: usize,
    pub dropped: usize,
    pub completed: usize,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct Capabilities {
    pub can_edit: bool,
    pub can_approve: bool,
    pub can_trigger: bool,
}

#[derive(Debug, Serialize)]
pub struct UnifiedEnrollmentList {
    pub offering_id: String,
    pub pending: Vec<RosterEntry>,
    pub enrolled: Vec<RosterEntry>,
    pub audit: Vec<RosterEntry>,
    pub dropped: Vec<RosterEntry>,
    pub completed: Vec<RosterEntry>,
    pub counts: EnrollmentCounts,
    pub capabilities: Capabilities,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_table() {
        let table = [
            ("A", 10),
            ("A-", 9),
            ("B", 8),
            ("B-", 7),
            ("C", 6),
            ("C-", 5),
            ("D", 4),
            ("E", 0),
            ("F", 0),
        ];
        for (letter, points) in table {
            let grade: Grade = letter.parse().unwrap();
            assert_eq!(grade.points(), points, "{letter}");
            assert_eq!(grade.as_str(), letter);
        }
        assert!(Grade::D.earns_credit());
        assert!(!Grade::E.earns_credit());
        assert!("B+".parse::<Grade>().is_err());
    }

    #[test]
    fn terminal_states_have_no_exits() {
        use EnrollmentStatus::*;
        let all = [PendingInstructor, Enrolled, Rejected, Dropped, Audit, Completed];
        for from in [Rejected, Dropped, Audit, Completed] {
            for to in all {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
        assert!(PendingInstructor.can_transition_to(Enrolled));
        assert!(Enrolled.can_transition_to(Audit));
        assert!(!PendingInstructor.can_transition_to(Dropped));
    }
}
