use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, request::Parts};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::warn;

use crate::db::users;
use crate::error::AppError;
use crate::models::Role;
use crate::state::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller. Produced upstream (token verification lives in
/// the gateway); the policy code only ever sees this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub user_id: String,
    pub role: Role,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    pub fn require(&self, role: Role) -> Result<(), AppError> {
        if self.role == role {
            Ok(())
        } else {
            Err(AppError::forbidden(format!("requires role {role}")))
        }
    }

    pub fn require_any(&self, roles: &[Role]) -> Result<(), AppError> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::forbidden(format!("role {} may not do this", self.role)))
        }
    }

    pub fn is_user(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}

#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, headers: &HeaderMap) -> Result<Identity, AppError>;
}

/// Trusts the gateway's `x-user-id` header and checks the account is live.
pub struct HeaderIdentityResolver {
    db: SqlitePool,
}

impl HeaderIdentityResolver {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl IdentityResolver for HeaderIdentityResolver {
    async fn resolve(&self, headers: &HeaderMap) -> Result<Identity, AppError> {
        let user_id = headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(AppError::Unauthorized)?;

        let user = users::find_user(&self.db, user_id)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !user.is_active {
            warn!("rejected request from deactivated user {}", user.id);
            return Err(AppError::forbidden("account is deactivated"));
        }

        Ok(Identity::new(user.id, user.role))
    }
}

impl FromRequestParts<AppState> for Identity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        state.identity.resolve(&parts.headers).await
    }
}
