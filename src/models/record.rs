use serde::Serialize;
use sqlx::FromRow;

use super::enrollment::{EnrollmentStatus, EnrollmentType, Grade};

/// One enrollment flattened with the course facts a transcript needs.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CourseRecordRow {
    pub enrollment_id: String,
    pub offering_id: String,
    pub semester: String,
    pub course_code: String,
    pub course_name: String,
    pub credits: i32,
    pub enrollment_type: EnrollmentType,
    pub status: EnrollmentStatus,
    pub grade: Option<Grade>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SemesterRecord {
    pub semester: String,
    pub ongoing: Vec<CourseRecordRow>,
    pub completed: Vec<CourseRecordRow>,
    pub dropped: Vec<CourseRecordRow>,
    pub credits_registered: i64,
    pub credits_earned: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentRecord {
    pub student_id: String,
    pub name: String,
    pub entry_number: String,
    pub branch: String,
    pub admission_year: String,
    pub semesters: Vec<SemesterRecord>,
    pub total_credits_registered: i64,
    pub total_credits_earned: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptCourse {
    pub course_code: String,
    pub course_name: String,
    pub credits: i32,
    pub grade: Grade,
    pub grade_points: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SemesterTranscript {
    pub semester: String,
    pub courses: Vec<TranscriptCourse>,
    pub credits_attempted: i64,
    pub credits_earned: i64,
    pub sgpa: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Transcript {
    pub student_id: String,
    pub name: String,
    pub entry_number: String,
    pub branch: String,
    pub admission_year: String,
    pub semesters: Vec<SemesterTranscript>,
    pub credits_attempted: i64,
    pub credits_earned: i64,
    pub cgpa: String,
}
