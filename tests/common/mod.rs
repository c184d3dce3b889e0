#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use registrar::auth::{HeaderIdentityResolver, Identity};
use registrar::clock::FixedClock;
use registrar::db;
use registrar::models::*;
use registrar::services::CourseService;
use registrar::state::{AppState, PolicyConfig};
use sqlx::SqlitePool;
use uuid::Uuid;

pub const SEMESTER: &str = "2025-I";

pub fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, day, hour, 0, 0).unwrap()
}

pub struct Fixture {
    pub db: SqlitePool,
    pub clock: Arc<FixedClock>,
    pub state: AppState,
    pub admin: Identity,
    file: Option<PathBuf>,
}

impl Drop for Fixture {
    fn drop(&mut self) {
        if let Some(path) = &self.file {
            for suffix in ["", "-wal", "-shm", "-journal"] {
                let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
            }
        }
    }
}

impl Fixture {
    /// Fresh database, clock inside the enrollment window, calendar set.
    pub async fn new() -> Self {
        Self::with_max_credits(24).await
    }

    pub async fn with_max_credits(max: i64) -> Self {
        let db = db::connect_in_memory().await.expect("Failed to create database");
        Self::build(db, max, None).await
    }

    /// A file-backed database behind a pool of several connections, for
    /// requests that really run side by side.
    pub async fn on_disk(max_connections: u32, max_credits: i64) -> Self {
        let path = std::env::temp_dir().join(format!("registrar-{}.db", Uuid::new_v4()));
        let url = format!("sqlite://{}", path.display());
        let db = db::connect(&url, max_connections)
            .await
            .expect("Failed to create database");
        Self::build(db, max_credits, Some(path)).await
    }

    async fn build(db: SqlitePool, max: i64, file: Option<PathBuf>) -> Self {
        let clock = Arc::new(FixedClock::new(at(7, 12)));
        let state = AppState::new(
            db.clone(),
            clock.clone(),
            Arc::new(HeaderIdentityResolver::new(db.clone())),
        )
        .with_policy(PolicyConfig {
            max_credits_per_semester: max,
        });

        let profile = UserProfile::Admin;
        let admin_row = db::users::insert_user(&db, "Registrar", "admin@uni.edu", &profile, at(1, 0))
            .await
            .expect("Failed to seed admin");
        let admin = Identity::new(admin_row.id, Role::Admin);

        let fixture = Self {
            db,
            clock,
            state,
            admin,
            file,
        };
        fixture.set_calendar().await;
        fixture
    }

    pub fn calendar_update() -> CalendarUpdate {
        CalendarUpdate {
            semester: SEMESTER.to_string(),
            start_date: at(1, 0),
            end_date: at(31, 0),
            enrollment_start: at(5, 0),
            enrollment_end: at(10, 0),
            drop_deadline: at(20, 0),
            audit_deadline: at(25, 0),
        }
    }

    pub async fn set_calendar(&self) {
        self.state
            .calendar()
            .upsert_calendar(&self.admin, Self::calendar_update())
            .await
            .expect("Failed to set calendar");
    }

    pub async fn student(&self, entry_number: &str) -> Identity {
        let req = NewUserRequest {
            name: format!("Student {entry_number}"),
            email: format!("{}@uni.edu", entry_number.to_lowercase()),
            profile: NewUserProfile::Student {
                entry_number: entry_number.to_string(),
            },
        };
        let user = self
            .state
            .users()
            .create_user(&self.admin, req)
            .await
            .expect("Failed to create student");
        Identity::new(user.id, Role::Student)
    }

    pub async fn instructor(&self, name: &str) -> Identity {
        let req = NewUserRequest {
            name: name.to_string(),
            email: format!("{}@uni.edu", name.to_lowercase()),
            profile: NewUserProfile::Instructor {
                department: "CSE".to_string(),
                is_faculty_advisor: false,
            },
        };
        let user = self
            .state
            .users()
            .create_user(&self.admin, req)
            .await
            .expect("Failed to create instructor");
        Identity::new(user.id, Role::Instructor)
    }

    pub async fn course(&self, code: &str, credits: i32) -> Course {
        let req = NewCourseRequest {
            code: code.to_string(),
            name: format!("Course {code}"),
            credits,
            ltpsc: None,
            description: None,
        };
        CourseService::create_course(&self.db, &self.state.clock, &self.admin, req)
            .await
            .expect("Failed to create course")
    }

    /// A PENDING offering proposed by `instructor`.
    pub async fn proposal(
        &self,
        instructor: &Identity,
        course: &Course,
        semester: &str,
        branches: &[&str],
    ) -> CourseOffering {
        let req = NewOfferingRequest {
            course_id: course.id.clone(),
            semester: semester.to_string(),
            time_slot: Some("Mon 10:00".to_string()),
            allowed_branches: branches.iter().map(|b| b.to_string()).collect(),
        };
        self.state
            .offerings()
            .propose_offering(instructor, req)
            .await
            .expect("Failed to propose offering")
    }

    /// An ENROLLING offering of a fresh course.
    pub async fn open_offering(
        &self,
        instructor: &Identity,
        code: &str,
        credits: i32,
        branches: &[&str],
    ) -> CourseOffering {
        let course = self.course(code, credits).await;
        let offering = self.proposal(instructor, &course, SEMESTER, branches).await;
        self.state
            .offerings()
            .approve_offering(&self.admin, &offering.id)
            .await
            .expect("Failed to approve offering")
    }

    pub async fn request(&self, student: &Identity, offering: &CourseOffering) -> Result<Enrollment, registrar::error::AppError> {
        self.state
            .enrollments()
            .request_enrollment(
                student,
                EnrollmentRequest {
                    offering_id: offering.id.clone(),
                    enrollment_type: EnrollmentType::Credit,
                },
            )
            .await
    }

    /// Requested and approved.
    pub async fn enrolled(
        &self,
        student: &Identity,
        instructor: &Identity,
        offering: &CourseOffering,
    ) -> Enrollment {
        let pending = self.request(student, offering).await.expect("Failed to request");
        self.state
            .enrollments()
            .approve_enrollment(instructor, &pending.id)
            .await
            .expect("Failed to approve")
    }

    pub async fn enrollment_count(&self, offering_id: &str) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM enrollments WHERE offering_id = ?")
            .bind(offering_id)
            .fetch_one(&self.db)
            .await
            .expect("Failed to count enrollments")
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }
}

pub fn grade(enrollment_id: &str, grade: &str) -> GradeEntry {
    GradeEntry {
        enrollment_id: enrollment_id.to_string(),
        grade: grade.to_string(),
    }
}
