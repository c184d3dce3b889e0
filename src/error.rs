use axum::{Json, http::StatusCode, response::{IntoResponse, Response}};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Business rules that can reject an otherwise well-formed request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Policy {
    #[error("enrollment window is closed")]
    EnrollmentClosed,

    #[error("drop deadline has passed")]
    DropDeadlinePassed,

    #[error("audit deadline has passed")]
    AuditDeadlinePassed,

    #[error("credit limit exceeded: {current} enrolled + {requested} requested > {limit}")]
    CreditLimitExceeded { current: i64, requested: i64, limit: i64 },

    #[error("branch {branch} is not allowed in this offering")]
    BranchNotAllowed { branch: String },

    #[error("an enrollment for this course offering already exists")]
    DuplicateEnrollment,

    #[error("instructor-assigned enrollments cannot be dropped or audited")]
    InstructorAssigned,

    #[error("offering still has {0} active enrollment(s)")]
    ActiveEnrollmentsRemain(i64),

    #[error("another offering of this course is already active for {semester}")]
    OfferingAlreadyActive { semester: String },

    #[error("a feedback form is already open for this offering")]
    FeedbackFormAlreadyOpen,

    #[error("feedback already submitted")]
    FeedbackAlreadySubmitted,

    #[error("student is not enrolled in this offering")]
    NotEnrolled,

    #[error("{0} is already taken")]
    AlreadyTaken(String),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Policy violation: {0}")]
    PolicyViolation(#[from] Policy),

    #[error("Not configured: {0}")]
    NotConfigured(String),

    #[error("Malformed entry number: {0}")]
    MalformedEntryNumber(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound(what.into())
    }

    pub fn forbidden(why: impl Into<String>) -> Self {
        AppError::Forbidden(why.into())
    }

    pub fn invalid_state(why: impl Into<String>) -> Self {
        AppError::InvalidState(why.into())
    }

    /// Returns the violated rule, if this is a policy violation.
    pub fn policy(&self) -> Option<&Policy> {
        match self {
            AppError::PolicyViolation(p) => Some(p),
            _ => None,
        }
    }
}

/// True when a write was rejected by a UNIQUE index.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|e| e.is_unique_violation())
        .unwrap_or(false)
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{what} not found")),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::InvalidState(msg) => (StatusCode::CONFLICT, msg),
            AppError::PolicyViolation(policy) => (StatusCode::UNPROCESSABLE_ENTITY, policy.to_string()),
            AppError::NotConfigured(what) => (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("{what} is not configured"),
            ),
            AppError::MalformedEntryNumber(value) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("malformed entry number: {value}"),
            ),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Database(e) => {
                error!("database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error occurred".to_string(),
                )
            }
            AppError::Migration(e) => {
                error!("migration error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Config(msg) => {
                error!("configuration error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: status.to_string(),
            message: error_message,
        });

        (status, body).into_response()
    }
}
