use std::sync::Arc;

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::auth::Identity;
use crate::clock::Clock;
use crate::db::users;
use crate::error::{AppError, Policy, is_unique_violation};
use crate::models::{NewUserRequest, Role, User};

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BulkUserOutcome {
    Created { user: User },
    Failed { email: String, error: String },
}

/// Admin-only account management. Accounts are deactivated, never deleted.
pub struct UserService {
    db: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl UserService {
    pub fn new(db: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    pub async fn create_user(&self, actor: &Identity, req: NewUserRequest) -> Result<User, AppError> {
        actor.require(Role::Admin)?;
        self.insert(req).await
    }

    /// Creates each row independently; a bad row is reported, not fatal.
    pub async fn bulk_create_users(
        &self,
        actor: &Identity,
        reqs: Vec<NewUserRequest>,
    ) -> Result<Vec<BulkUserOutcome>, AppError> {
        actor.require(Role::Admin)?;

        let mut outcomes = Vec::with_capacity(reqs.len());
        for req in reqs {
            let email = req.email.clone();
            match self.insert(req).await {
                Ok(user) => outcomes.push(BulkUserOutcome::Created { user }),
                Err(AppError::Database(e)) => return Err(AppError::Database(e)),
                Err(e) => {
                    warn!("bulk user row {} rejected: {}", email, e);
                    outcomes.push(BulkUserOutcome::Failed {
                        email,
                        error: e.to_string(),
                    });
                }
            }
        }

        let created = outcomes
            .iter()
            .filter(|o| matches!(o, BulkUserOutcome::Created { .. }))
            .count();
        info!("bulk upload created {}/{} user(s)", created, outcomes.len());
        Ok(outcomes)
    }

    pub async fn set_active(
        &self,
        actor: &Identity,
        user_id: &str,
        active: bool,
    ) -> Result<User, AppError> {
        actor.require(Role::Admin)?;
        if actor.is_user(user_id) && !active {
            return Err(AppError::invalid_state("admins cannot deactivate themselves"));
        }

        let row = users::set_active(&self.db, user_id, active, self.clock.now())
            .await?
            .ok_or_else(|| AppError::not_found("user"))?;
        info!("user {} active={}", row.id, active);
        User::try_from(row)
    }

    pub async fn get_user(&self, actor: &Identity, user_id: &str) -> Result<User, AppError> {
        if actor.role != Role::Admin && !actor.is_user(user_id) {
            return Err(AppError::forbidden("cannot view other accounts"));
        }
        let row = users::find_user(&self.db, user_id)
            .await?
            .ok_or_else(|| AppError::not_found("user"))?;
        User::try_from(row)
    }

    pub async fn list_users(&self, actor: &Identity, role: Option<Role>) -> Result<Vec<User>, AppError> {
        actor.require(Role::Admin)?;
        users::fetch_users(&self.db, role)
            .await?
            .into_iter()
            .map(User::try_from)
            .collect()
    }

    async fn insert(&self, req: NewUserRequest) -> Result<User, AppError> {
        let profile = req.validate()?;
        let row = users::insert_user(&self.db, &req.name, &req.email, &profile, self.clock.now())
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    Policy::AlreadyTaken("email or entry number".to_string()).into()
                } else {
                    AppError::from(e)
                }
            })?;
        info!("created {} {}", row.role, row.id);
        User::try_from(row)
    }
}
