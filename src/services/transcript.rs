use std::collections::BTreeMap;

use sqlx::SqlitePool;

use crate::auth::Identity;
use crate::db::{enrollments, users};
use crate::error::AppError;
use crate::models::{
    CourseRecordRow, EnrollmentStatus, EntryNumber, Role, SemesterRecord, SemesterTranscript,
    StudentRecord, Transcript, TranscriptCourse, User,
};

pub struct TranscriptService {
    db: SqlitePool,
}

impl TranscriptService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Everything the student has taken or is taking, bucketed by semester.
    pub async fn student_record(
        &self,
        viewer: &Identity,
        student_id: &str,
    ) -> Result<StudentRecord, AppError> {
        let (student, entry_number) = self.load_student(viewer, student_id).await?;
        let rows = enrollments::fetch_course_records(&self.db, &student.id).await?;

        let mut semesters: BTreeMap<String, SemesterRecord> = BTreeMap::new();
        for row in rows {
            let credits = i64::from(row.credits);
            let earned = row.grade.is_some_and(|g| g.earns_credit());
            let sem = semesters
                .entry(row.semester.clone())
                .or_insert_with(|| SemesterRecord {
                    semester: row.semester.clone(),
                    ..Default::default()
                });

            match row.status {
                EnrollmentStatus::Enrolled => {
                    sem.credits_registered += credits;
                    sem.ongoing.push(row);
                }
                EnrollmentStatus::Audit => sem.ongoing.push(row),
                EnrollmentStatus::Completed => {
                    sem.credits_registered += credits;
                    if earned {
                        sem.credits_earned += credits;
                    }
                    sem.completed.push(row);
                }
                EnrollmentStatus::Dropped => sem.dropped.push(row),
                EnrollmentStatus::PendingInstructor | EnrollmentStatus::Rejected => {}
            }
        }

        let semesters: Vec<SemesterRecord> = semesters.into_values().collect();
        Ok(StudentRecord {
            student_id: student.id,
            name: student.name,
            entry_number: entry_number.to_string(),
            branch: entry_number.branch().to_string(),
            admission_year: entry_number.admission_year().to_string(),
            total_credits_registered: semesters.iter().map(|s| s.credits_registered).sum(),
            total_credits_earned: semesters.iter().map(|s| s.credits_earned).sum(),
            semesters,
        })
    }

    /// Graded courses only, with SGPA per semester and the overall CGPA.
    pub async fn transcript(
        &self,
        viewer: &Identity,
        student_id: &str,
    ) -> Result<Transcript, AppError> {
        let (student, entry_number) = self.load_student(viewer, student_id).await?;
        let rows = enrollments::fetch_course_records(&self.db, &student.id).await?;
        let (semesters, totals) = build_transcript(rows);

        Ok(Transcript {
            student_id: student.id,
            name: student.name,
            entry_number: entry_number.to_string(),
            branch: entry_number.branch().to_string(),
            admission_year: entry_number.admission_year().to_string(),
            semesters,
            credits_attempted: totals.credits_attempted,
            credits_earned: totals.credits_earned,
            cgpa: format_gpa(totals.grade_points, totals.credits_attempted),
        })
    }

    async fn load_student(
        &self,
        viewer: &Identity,
        student_id: &str,
    ) -> Result<(User, EntryNumber), AppError> {
        if viewer.role == Role::Student && !viewer.is_user(student_id) {
            return Err(AppError::forbidden("students can only view their own record"));
        }

        let row = users::find_user(&self.db, student_id)
            .await?
            .ok_or_else(|| AppError::not_found("student"))?;
        if row.role != Role::Student {
            return Err(AppError::not_found("student record"));
        }
        let user = User::try_from(row)?;
        let entry_number = user
            .entry_number()
            .cloned()
            .ok_or_else(|| AppError::not_found("student record"))?;
        Ok((user, entry_number))
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct Totals {
    credits_attempted: i64,
    credits_earned: i64,
    grade_points: i64,
}

fn build_transcript(rows: Vec<CourseRecordRow>) -> (Vec<SemesterTranscript>, Totals) {
    let mut by_semester: BTreeMap<String, (Vec<TranscriptCourse>, Totals)> = BTreeMap::new();

    for row in rows {
        if row.status != EnrollmentStatus::Completed {
            continue;
        }
        let Some(grade) = row.grade else {
            continue;
        };

        let credits = i64::from(row.credits);
        let (courses, totals) = by_semester.entry(row.semester).or_default();
        totals.credits_attempted += credits;
        totals.grade_points += i64::from(grade.points()) * credits;
        if grade.earns_credit() {
            totals.credits_earned += credits;
        }
        courses.push(TranscriptCourse {
            course_code: row.course_code,
            course_name: row.course_name,
            credits: row.credits,
            grade,
            grade_points: grade.points(),
        });
    }

    let mut overall = Totals::default();
    let semesters = by_semester
        .into_iter()
        .map(|(semester, (courses, t))| {
            overall.credits_attempted += t.credits_attempted;
            overall.credits_earned += t.credits_earned;
            overall.grade_points += t.grade_points;
            SemesterTranscript {
                semester,
                courses,
                credits_attempted: t.credits_attempted,
                credits_earned: t.credits_earned,
                sgpa: format_gpa(t.grade_points, t.credits_attempted),
            }
        })
        .collect();

    (semesters, overall)
}

/// `points / credits` to two decimals, rounding half up; "0.00" for no credits.
pub fn format_gpa(grade_points: i64, credits: i64) -> String {
    if credits <= 0 {
        return "0.00".to_string();
    }
    let hundredths = (grade_points * 200 + credits) / (2 * credits);
    format!("{}.{:02}", hundredths / 100, hundredths % 100)
}
