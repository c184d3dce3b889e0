use std::sync::Arc;

use sqlx::{SqliteExecutor, SqlitePool};
use tracing::info;

use crate::auth::Identity;
use crate::clock::Clock;
use crate::db::calendar as repo;
use crate::error::{AppError, Policy};
use crate::models::{AcademicCalendar, CalendarUpdate, Role};

/// Reads the current calendar and answers "is this allowed right now".
/// Every check re-reads the row; nothing is cached between requests.
#[derive(Clone)]
pub struct CalendarGate {
    db: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl CalendarGate {
    pub fn new(db: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    pub async fn get_calendar(&self) -> Result<AcademicCalendar, AppError> {
        load(&self.db).await
    }

    pub async fn assert_enrollment_open(&self) -> Result<(), AppError> {
        let calendar = self.get_calendar().await?;
        check_enrollment_open(&calendar, self.clock.as_ref())
    }

    pub async fn assert_drop_allowed(&self) -> Result<(), AppError> {
        let calendar = self.get_calendar().await?;
        check_drop_allowed(&calendar, self.clock.as_ref())
    }

    pub async fn assert_audit_allowed(&self) -> Result<(), AppError> {
        let calendar = self.get_calendar().await?;
        check_audit_allowed(&calendar, self.clock.as_ref())
    }

    pub async fn upsert_calendar(
        &self,
        actor: &Identity,
        update: CalendarUpdate,
    ) -> Result<AcademicCalendar, AppError> {
        actor.require(Role::Admin)?;
        update.validate()?;

        let calendar = repo::upsert_calendar(&self.db, &update, self.clock.now()).await?;
        info!(
            "calendar set for {} (enrollment {} .. {})",
            calendar.semester, calendar.enrollment_start, calendar.enrollment_end
        );
        Ok(calendar)
    }
}

/// Loads the calendar through any executor, so policy code can read it
/// inside its own transaction.
pub(crate) async fn load(ex: impl SqliteExecutor<'_>) -> Result<AcademicCalendar, AppError> {
    repo::fetch_calendar(ex)
        .await?
        .ok_or_else(|| AppError::NotConfigured("academic calendar".to_string()))
}

pub(crate) fn check_enrollment_open(
    calendar: &AcademicCalendar,
    clock: &dyn Clock,
) -> Result<(), AppError> {
    if calendar.enrollment_open_at(clock.now()) {
        Ok(())
    } else {
        Err(Policy::EnrollmentClosed.into())
    }
}

pub(crate) fn check_drop_allowed(
    calendar: &AcademicCalendar,
    clock: &dyn Clock,
) -> Result<(), AppError> {
    if calendar.drop_allowed_at(clock.now()) {
        Ok(())
    } else {
        Err(Policy::DropDeadlinePassed.into())
    }
}

pub(crate) fn check_audit_allowed(
    calendar: &AcademicCalendar,
    clock: &dyn Clock,
) -> Result<(), AppError> {
    if calendar.audit_allowed_at(clock.now()) {
        Ok(())
    } else {
        Err(Policy::AuditDeadlinePassed.into())
    }
}
