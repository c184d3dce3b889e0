use std::sync::Arc;

use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::auth::Identity;
use crate::clock::Clock;
use crate::db::{self, courses, enrollments, offerings, users};
use crate::db::enrollments::NewEnrollment;
use crate::error::{AppError, Policy, is_unique_violation};
use crate::models::user::{normalize_batch_year, normalize_branch};
use crate::models::{
    BulkEnrollmentReport, BulkEnrollmentRequest, Capabilities, CourseOffering, Enrollment,
    EnrollmentCounts, EnrollmentRequest, EnrollmentSource, EnrollmentStatus, EntryNumber,
    Grade, GradeEntry, GradeItemResult, GradeOutcome, GradeUploadReport, OfferingStatus, Role,
    RosterEntry, StudentEnrollmentView, UnifiedEnrollmentList, User,
};
use crate::services::calendar;
use crate::state::PolicyConfig;

/// Validates and applies every enrollment state change. Each operation runs
/// in one transaction: the checks read the same snapshot the write commits
/// against, and single-row transitions are conditional updates.
pub struct EnrollmentService {
    db: SqlitePool,
    clock: Arc<dyn Clock>,
    policy: PolicyConfig,
}

impl EnrollmentService {
    pub fn new(db: SqlitePool, clock: Arc<dyn Clock>, policy: PolicyConfig) -> Self {
        Self { db, clock, policy }
    }

    pub async fn request_enrollment(
        &self,
        actor: &Identity,
        req: EnrollmentRequest,
    ) -> Result<Enrollment, AppError> {
        actor.require(Role::Student)?;
        let mut tx = db::begin_write(&self.db).await?;

        let cal = calendar::load(&mut *tx).await?;
        calendar::check_enrollment_open(&cal, self.clock.as_ref())?;

        let offering = load_offering(&mut tx, &req.offering_id).await?;
        if offering.status != OfferingStatus::Enrolling {
            return Err(AppError::invalid_state(format!(
                "offering is {}, not open for enrollment",
                offering.status
            )));
        }

        let student = load_user(&mut tx, &actor.user_id).await?;
        let entry_number = student
            .entry_number()
            .ok_or_else(|| AppError::not_found("student record"))?;
        if !offering.allows_branch(entry_number.branch()) {
            return Err(Policy::BranchNotAllowed {
                branch: entry_number.branch().to_string(),
            }
            .into());
        }

        if enrollments::find_for_student(&mut *tx, &student.id, &offering.id)
            .await?
            .is_some()
        {
            return Err(Policy::DuplicateEnrollment.into());
        }

        self.check_credit_limit(&mut tx, &student.id, &offering).await?;

        let enrollment = enrollments::insert_enrollment(
            &mut *tx,
            NewEnrollment {
                student_id: &student.id,
                offering_id: &offering.id,
                enrollment_type: req.enrollment_type,
                status: EnrollmentStatus::PendingInstructor,
                source: EnrollmentSource::StudentRequest,
            },
            self.clock.now(),
        )
        .await
        .map_err(duplicate_enrollment)?;

        tx.commit().await?;
        info!(
            "student {} requested offering {} ({:?})",
            student.id, offering.id, enrollment.enrollment_type
        );
        Ok(enrollment)
    }

    pub async fn approve_enrollment(
        &self,
        actor: &Identity,
        enrollment_id: &str,
    ) -> Result<Enrollment, AppError> {
        self.decide(actor, enrollment_id, EnrollmentStatus::Enrolled)
            .await
    }

    pub async fn reject_enrollment(
        &self,
        actor: &Identity,
        enrollment_id: &str,
    ) -> Result<Enrollment, AppError> {
        self.decide(actor, enrollment_id, EnrollmentStatus::Rejected)
            .await
    }

    async fn decide(
        &self,
        actor: &Identity,
        enrollment_id: &str,
        to: EnrollmentStatus,
    ) -> Result<Enrollment, AppError> {
        actor.require(Role::Instructor)?;
        let mut tx = db::begin_write(&self.db).await?;

        let enrollment = load_enrollment(&mut tx, enrollment_id).await?;
        let offering = load_offering(&mut tx, &enrollment.offering_id).await?;
        if !offering.is_owned_by(&actor.user_id) {
            return Err(AppError::forbidden("only the offering's instructor can decide"));
        }
        if enrollment.status != EnrollmentStatus::PendingInstructor {
            return Err(AppError::invalid_state(format!(
                "enrollment is {}, not PENDING_INSTRUCTOR",
                enrollment.status
            )));
        }

        if to == EnrollmentStatus::Enrolled {
            if offering.status != OfferingStatus::Enrolling {
                return Err(AppError::invalid_state(format!(
                    "offering is {}, not ENROLLING",
                    offering.status
                )));
            }
            self.check_credit_limit(&mut tx, &enrollment.student_id, &offering)
                .await?;
        }

        let changed = enrollments::transition(
            &mut *tx,
            &enrollment.id,
            EnrollmentStatus::PendingInstructor,
            to,
            self.clock.now(),
        )
        .await?;
        if changed == 0 {
            return Err(AppError::invalid_state("enrollment changed concurrently"));
        }

        let updated = load_enrollment(&mut tx, &enrollment.id).await?;
        tx.commit().await?;
        info!("enrollment {} -> {} by {}", updated.id, to, actor.user_id);
        Ok(updated)
    }

    pub async fn drop_enrollment(
        &self,
        actor: &Identity,
        enrollment_id: &str,
    ) -> Result<Enrollment, AppError> {
        self.leave(actor, enrollment_id, EnrollmentStatus::Dropped)
            .await
    }

    pub async fn audit_enrollment(
        &self,
        actor: &Identity,
        enrollment_id: &str,
    ) -> Result<Enrollment, AppError> {
        self.leave(actor, enrollment_id, EnrollmentStatus::Audit)
            .await
    }

    /// Student-initiated ENROLLED -> DROPPED / AUDIT.
    async fn leave(
        &self,
        actor: &Identity,
        enrollment_id: &str,
        to: EnrollmentStatus,
    ) -> Result<Enrollment, AppError> {
        actor.require(Role::Student)?;
        let mut tx = db::begin_write(&self.db).await?;

        let cal = calendar::load(&mut *tx).await?;
        if to == EnrollmentStatus::Audit {
            calendar::check_audit_allowed(&cal, self.clock.as_ref())?;
        } else {
            calendar::check_drop_allowed(&cal, self.clock.as_ref())?;
        }

        let enrollment = load_enrollment(&mut tx, enrollment_id).await?;
        if !actor.is_user(&enrollment.student_id) {
            return Err(AppError::forbidden("enrollment belongs to another student"));
        }
        if enrollment.source == EnrollmentSource::InstructorAssigned {
            return Err(Policy::InstructorAssigned.into());
        }
        if !enrollment.status.can_transition_to(to) {
            return Err(AppError::invalid_state(format!(
                "enrollment is {}, not ENROLLED",
                enrollment.status
            )));
        }

        let changed = enrollments::transition(
            &mut *tx,
            &enrollment.id,
            EnrollmentStatus::Enrolled,
            to,
            self.clock.now(),
        )
        .await?;
        if changed == 0 {
            return Err(AppError::invalid_state("enrollment changed concurrently"));
        }

        let updated = load_enrollment(&mut tx, &enrollment.id).await?;
        tx.commit().await?;
        info!("student {} moved enrollment {} to {}", actor.user_id, updated.id, to);
        Ok(updated)
    }

    /// Enrolls a whole (batch year, branch) cohort into an offering.
    ///
    /// The trigger marker and all enrollments commit together, so a failure
    /// leaves nothing behind and a rerun only picks up students who are
    /// still missing.
    pub async fn bulk_enroll(
        &self,
        actor: &Identity,
        offering_id: &str,
        req: BulkEnrollmentRequest,
    ) -> Result<BulkEnrollmentReport, AppError> {
        actor.require(Role::Instructor)?;
        let branch = normalize_branch(&req.branch)?;
        let batch_year = normalize_batch_year(&req.batch_year)?;
        let mut tx = db::begin_write(&self.db).await?;

        let offering = load_offering(&mut tx, offering_id).await?;
        if !offering.is_owned_by(&actor.user_id) {
            return Err(AppError::forbidden("only the offering's instructor can assign"));
        }
        if offering.status != OfferingStatus::Enrolling {
            return Err(AppError::invalid_state(format!(
                "offering is {}, not ENROLLING",
                offering.status
            )));
        }
        if !offering.allows_branch(&branch) {
            return Err(Policy::BranchNotAllowed { branch }.into());
        }

        let now = self.clock.now();
        let trigger = enrollments::upsert_trigger(
            &mut *tx,
            &offering.id,
            &branch,
            &batch_year,
            req.enrollment_type,
            &actor.user_id,
            now,
        )
        .await?;

        let mut report = BulkEnrollmentReport {
            trigger_id: trigger.id,
            ..Default::default()
        };

        let prefix = format!("{batch_year}{branch}");
        let candidates = users::fetch_students_with_prefix(&mut *tx, &prefix).await?;
        debug!("{} candidate(s) for cohort {}", candidates.len(), prefix);

        for row in candidates {
            let in_cohort = row
                .entry_number
                .as_deref()
                .map(EntryNumber::parse)
                .and_then(Result::ok)
                .is_some_and(|e| e.in_cohort(&batch_year, &branch));
            if !in_cohort {
                continue;
            }

            let existing = enrollments::find_for_student(&mut *tx, &row.id, &offering.id).await?;
            match existing {
                None => {
                    if !self.within_credit_limit(&mut tx, &row.id, &offering).await? {
                        report.skipped_credit_limit.push(row.id);
                        continue;
                    }
                    enrollments::insert_enrollment(
                        &mut *tx,
                        NewEnrollment {
                            student_id: &row.id,
                            offering_id: &offering.id,
                            enrollment_type: req.enrollment_type,
                            status: EnrollmentStatus::Enrolled,
                            source: EnrollmentSource::InstructorAssigned,
                        },
                        now,
                    )
                    .await
                    .map_err(duplicate_enrollment)?;
                    report.newly_enrolled.push(row.id);
                }
                Some(e) if e.status == EnrollmentStatus::Dropped => {
                    if !self.within_credit_limit(&mut tx, &row.id, &offering).await? {
                        report.skipped_credit_limit.push(row.id);
                        continue;
                    }
                    enrollments::reassign_dropped(&mut *tx, &e.id, req.enrollment_type, now)
                        .await?;
                    report.re_enrolled.push(row.id);
                }
                Some(_) => report.already_enrolled.push(row.id),
            }
        }

        tx.commit().await?;
        report.enrolled_count = report.newly_enrolled.len() + report.re_enrolled.len();
        if !report.skipped_credit_limit.is_empty() {
            warn!(
                "{} student(s) of {} skipped: credit limit",
                report.skipped_credit_limit.len(),
                prefix
            );
        }
        info!(
            "bulk enrollment {} into {}: {} enrolled",
            prefix, offering.id, report.enrolled_count
        );
        Ok(report)
    }

    /// Applies grades to ENROLLED rows of one offering. Unknown, ungradable
    /// and already-graded rows are skipped and reported; a row from another
    /// offering aborts the whole upload.
    pub async fn upload_grades(
        &self,
        actor: &Identity,
        offering_id: &str,
        entries: Vec<GradeEntry>,
    ) -> Result<GradeUploadReport, AppError> {
        actor.require(Role::Instructor)?;
        let parsed = entries
            .iter()
            .map(|e| e.grade.parse::<Grade>().map(|g| (e.enrollment_id.as_str(), g)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut tx = db::begin_write(&self.db).await?;
        let offering = load_offering(&mut tx, offering_id).await?;
        if !offering.is_owned_by(&actor.user_id) {
            return Err(AppError::forbidden("only the offering's instructor can grade"));
        }
        if offering.status != OfferingStatus::Enrolling {
            return Err(AppError::invalid_state(format!(
                "offering is {}, grades are closed",
                offering.status
            )));
        }

        let now = self.clock.now();
        let mut report = GradeUploadReport::default();
        for (enrollment_id, grade) in parsed {
            let outcome = match enrollments::find_enrollment(&mut *tx, enrollment_id).await? {
                None => GradeOutcome::SkippedNotFound,
                Some(e) if e.offering_id != offering.id => {
                    return Err(AppError::BadRequest(format!(
                        "enrollment {} does not belong to offering {}",
                        e.id, offering.id
                    )));
                }
                Some(e) if e.grade.is_some() => GradeOutcome::SkippedAlreadyGraded,
                Some(e) if e.status != EnrollmentStatus::Enrolled => {
                    GradeOutcome::SkippedNotEnrolled
                }
                Some(e) => {
                    if enrollments::apply_grade(&mut *tx, &e.id, grade, now).await? == 1 {
                        GradeOutcome::Applied
                    } else {
                        GradeOutcome::SkippedAlreadyGraded
                    }
                }
            };

            if outcome == GradeOutcome::Applied {
                report.updated_ids.push(enrollment_id.to_string());
            }
            report.items.push(GradeItemResult {
                enrollment_id: enrollment_id.to_string(),
                outcome,
            });
        }

        tx.commit().await?;
        report.updated_count = report.updated_ids.len();
        info!(
            "graded {}/{} enrollment(s) in offering {}",
            report.updated_count,
            report.items.len(),
            offering.id
        );
        Ok(report)
    }

    pub async fn unified_enrollment_list(
        &self,
        viewer: &Identity,
        offering_id: &str,
    ) -> Result<UnifiedEnrollmentList, AppError> {
        viewer.require_any(&[Role::Instructor, Role::Admin])?;

        let offering = offerings::find_offering(&self.db, offering_id)
            .await?
            .ok_or_else(|| AppError::not_found("offering"))?;
        let roster = enrollments::fetch_roster(&self.db, offering_id).await?;

        let owner = viewer.role == Role::Instructor && offering.is_owned_by(&viewer.user_id);
        Ok(group_roster(&offering.id, roster, owner))
    }

    pub async fn student_enrollments(
        &self,
        actor: &Identity,
    ) -> Result<Vec<StudentEnrollmentView>, AppError> {
        actor.require(Role::Student)?;
        Ok(enrollments::fetch_student_enrollments(&self.db, &actor.user_id).await?)
    }

    pub async fn pending_approvals(&self, actor: &Identity) -> Result<Vec<RosterEntry>, AppError> {
        actor.require(Role::Instructor)?;
        Ok(enrollments::fetch_pending_for_instructor(&self.db, &actor.user_id).await?)
    }

    async fn within_credit_limit(
        &self,
        conn: &mut SqliteConnection,
        student_id: &str,
        offering: &CourseOffering,
    ) -> Result<bool, AppError> {
        match self.check_credit_limit(conn, student_id, offering).await {
            Ok(()) => Ok(true),
            Err(AppError::PolicyViolation(Policy::CreditLimitExceeded { .. })) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn check_credit_limit(
        &self,
        conn: &mut SqliteConnection,
        student_id: &str,
        offering: &CourseOffering,
    ) -> Result<(), AppError> {
        let course = courses::find_course(&mut *conn, &offering.course_id)
            .await?
            .ok_or_else(|| AppError::not_found("course"))?;
        let current = enrollments::enrolled_credits(&mut *conn, student_id, &offering.semester).await?;
        let requested = i64::from(course.credits);
        let limit = self.policy.max_credits_per_semester;

        if current + requested > limit {
            return Err(Policy::CreditLimitExceeded {
                current,
                requested,
                limit,
            }
            .into());
        }
        Ok(())
    }
}

fn group_roster(offering_id: &str, roster: Vec<RosterEntry>, owner: bool) -> UnifiedEnrollmentList {
    let mut list = UnifiedEnrollmentList {
        offering_id: offering_id.to_string(),
        pending: Vec::new(),
        enrolled: Vec::new(),
        audit: Vec::new(),
        dropped: Vec::new(),
        completed: Vec::new(),
        counts: EnrollmentCounts::default(),
        capabilities: Capabilities {
            can_edit: owner,
            can_approve: owner,
            can_trigger: owner,
        },
    };

    for entry in roster {
        match entry.enrollment.status {
            EnrollmentStatus::PendingInstructor => list.pending.push(entry),
            EnrollmentStatus::Enrolled => list.enrolled.push(entry),
            EnrollmentStatus::Audit => list.audit.push(entry),
            EnrollmentStatus::Dropped => list.dropped.push(entry),
            EnrollmentStatus::Completed => list.completed.push(entry),
            EnrollmentStatus::Rejected => {}
        }
    }

    list.counts = EnrollmentCounts {
        pending: list.pending.len(),
        enrolled: list.enrolled.len(),
        audit: list.audit.len(),
        dropped: list.dropped.len(),
        completed: list.completed.len(),
        total: list.pending.len()
            + list.enrolled.len()
            + list.audit.len()
            + list.dropped.len()
            + list.completed.len(),
    };
    list
}

fn duplicate_enrollment(err: sqlx::Error) -> AppError {
    if is_unique_violation(&err) {
        Policy::DuplicateEnrollment.into()
    } else {
        err.into()
    }
}

async fn load_offering(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<CourseOffering, AppError> {
    offerings::find_offering(conn, id)
        .await?
        .ok_or_else(|| AppError::not_found("offering"))
}

async fn load_enrollment(conn: &mut SqliteConnection, id: &str) -> Result<Enrollment, AppError> {
    enrollments::find_enrollment(conn, id)
        .await?
        .ok_or_else(|| AppError::not_found("enrollment"))
}

async fn load_user(conn: &mut SqliteConnection, id: &str) -> Result<User, AppError> {
    let row = users::find_user(conn, id)
        .await?
        .ok_or_else(|| AppError::not_found("user"))?;
    User::try_from(row)
}
