use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::info;

use crate::auth::Identity;
use crate::clock::Clock;
use crate::db::{self, courses, enrollments, offerings, users};
use crate::error::{AppError, Policy, is_unique_violation};
use crate::models::user::normalize_branch;
use crate::models::{
    CourseOffering, NewOfferingRequest, OfferingFilter, OfferingStatus, OfferingView, Role,
};

/// PENDING -> {ENROLLING, REJECTED} by an admin,
/// ENROLLING -> {WITHDRAWN, COMPLETED} by the owning instructor.
pub struct OfferingService {
    db: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl OfferingService {
    pub fn new(db: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    pub async fn propose_offering(
        &self,
        actor: &Identity,
        req: NewOfferingRequest,
    ) -> Result<CourseOffering, AppError> {
        actor.require(Role::Instructor)?;

        let semester = req.semester.trim();
        if semester.is_empty() {
            return Err(AppError::BadRequest("semester must not be empty".to_string()));
        }
        let mut branches = req
            .allowed_branches
            .iter()
            .map(|b| normalize_branch(b))
            .collect::<Result<Vec<_>, _>>()?;
        branches.sort();
        branches.dedup();
        if branches.is_empty() {
            return Err(AppError::BadRequest(
                "an offering needs at least one allowed branch".to_string(),
            ));
        }

        courses::find_course(&self.db, &req.course_id)
            .await?
            .ok_or_else(|| AppError::not_found("course"))?;
        let instructor = users::find_user(&self.db, &actor.user_id)
            .await?
            .ok_or_else(|| AppError::not_found("instructor"))?;
        if !instructor.is_active {
            return Err(AppError::forbidden("account is deactivated"));
        }

        let time_slot = req.time_slot.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let offering = offerings::insert_offering(
            &self.db,
            &req.course_id,
            &actor.user_id,
            semester,
            time_slot,
            branches,
            self.clock.now(),
        )
        .await?;

        info!(
            "offering {} proposed for course {} in {}",
            offering.id, offering.course_id, offering.semester
        );
        Ok(offering)
    }

    /// Opens the offering for enrollment and rejects every competing
    /// PENDING proposal for the same course and semester.
    pub async fn approve_offering(
        &self,
        actor: &Identity,
        offering_id: &str,
    ) -> Result<CourseOffering, AppError> {
        actor.require(Role::Admin)?;
        let mut tx = db::begin_write(&self.db).await?;

        let offering = offerings::find_offering(&mut *tx, offering_id)
            .await?
            .ok_or_else(|| AppError::not_found("offering"))?;
        if offering.status != OfferingStatus::Pending {
            return Err(AppError::invalid_state(format!(
                "offering is {}, not PENDING",
                offering.status
            )));
        }
        if offerings::has_live_sibling(&mut *tx, &offering).await? {
            return Err(Policy::OfferingAlreadyActive {
                semester: offering.semester.clone(),
            }
            .into());
        }

        let changed = offerings::transition(
            &mut *tx,
            &offering.id,
            OfferingStatus::Pending,
            OfferingStatus::Enrolling,
            self.clock.now(),
        )
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::from(Policy::OfferingAlreadyActive {
                    semester: offering.semester.clone(),
                })
            } else {
                e.into()
            }
        })?;
        if changed == 0 {
            return Err(AppError::invalid_state("offering changed concurrently"));
        }

        let rejected = offerings::reject_pending_siblings(&mut *tx, &offering).await?;
        let updated = offerings::find_offering(&mut *tx, &offering.id)
            .await?
            .ok_or_else(|| AppError::not_found("offering"))?;
        tx.commit().await?;

        info!(
            "offering {} approved, {} competing proposal(s) rejected",
            updated.id, rejected
        );
        Ok(updated)
    }

    pub async fn reject_offering(
        &self,
        actor: &Identity,
        offering_id: &str,
    ) -> Result<CourseOffering, AppError> {
        actor.require(Role::Admin)?;
        self.transition(offering_id, OfferingStatus::Pending, OfferingStatus::Rejected)
            .await
    }

    /// ENROLLING -> WITHDRAWN, once no enrollment is left ENROLLED or
    /// PENDING_INSTRUCTOR.
    pub async fn withdraw_offering(
        &self,
        actor: &Identity,
        offering_id: &str,
    ) -> Result<CourseOffering, AppError> {
        self.close(actor, offering_id, OfferingStatus::Withdrawn).await
    }

    /// Marks the offering COMPLETED once no enrollment is left ENROLLED or
    /// PENDING_INSTRUCTOR.
    pub async fn finalize_offering(
        &self,
        actor: &Identity,
        offering_id: &str,
    ) -> Result<CourseOffering, AppError> {
        self.close(actor, offering_id, OfferingStatus::Completed).await
    }

    pub async fn get_offering(&self, offering_id: &str) -> Result<OfferingView, AppError> {
        offerings::find_offering_view(&self.db, offering_id)
            .await?
            .ok_or_else(|| AppError::not_found("offering"))
    }

    pub async fn list_offerings(&self, filter: &OfferingFilter) -> Result<Vec<OfferingView>, AppError> {
        Ok(offerings::fetch_offering_views(&self.db, filter).await?)
    }

    /// Owner-only ENROLLING -> `to`, guarded by the active-enrollment count.
    async fn close(
        &self,
        actor: &Identity,
        offering_id: &str,
        to: OfferingStatus,
    ) -> Result<CourseOffering, AppError> {
        actor.require(Role::Instructor)?;
        let mut tx = db::begin_write(&self.db).await?;

        let offering = offerings::find_offering(&mut *tx, offering_id)
            .await?
            .ok_or_else(|| AppError::not_found("offering"))?;
        if !offering.is_owned_by(&actor.user_id) {
            return Err(AppError::forbidden("only the offering's instructor can do this"));
        }
        if offering.status != OfferingStatus::Enrolling {
            return Err(AppError::invalid_state(format!(
                "offering is {}, not ENROLLING",
                offering.status
            )));
        }

        let active = enrollments::count_active(&mut *tx, &offering.id).await?;
        if active > 0 {
            return Err(Policy::ActiveEnrollmentsRemain(active).into());
        }

        let changed = offerings::transition(
            &mut *tx,
            &offering.id,
            OfferingStatus::Enrolling,
            to,
            self.clock.now(),
        )
        .await?;
        if changed == 0 {
            return Err(AppError::invalid_state("offering changed concurrently"));
        }

        let updated = offerings::find_offering(&mut *tx, &offering.id)
            .await?
            .ok_or_else(|| AppError::not_found("offering"))?;
        tx.commit().await?;
        info!("offering {} -> {}", updated.id, to);
        Ok(updated)
    }

    async fn transition(
        &self,
        offering_id: &str,
        from: OfferingStatus,
        to: OfferingStatus,
    ) -> Result<CourseOffering, AppError> {
        let mut tx = db::begin_write(&self.db).await?;
        let offering = offerings::find_offering(&mut *tx, offering_id)
            .await?
            .ok_or_else(|| AppError::not_found("offering"))?;

        let changed =
            offerings::transition(&mut *tx, &offering.id, from, to, self.clock.now()).await?;
        if changed == 0 {
            return Err(AppError::invalid_state(format!(
                "offering is {}, not {}",
                offering.status, from
            )));
        }

        let updated = offerings::find_offering(&mut *tx, &offering.id)
            .await?
            .ok_or_else(|| AppError::not_found("offering"))?;
        tx.commit().await?;
        info!("offering {} -> {}", updated.id, to);
        Ok(updated)
    }
}
