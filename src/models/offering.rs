use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferingStatus {
    Pending,
    Enrolling,
    Rejected,
    Withdrawn,
    Completed,
}

impl fmt::Display for OfferingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OfferingStatus::Pending => "PENDING",
            OfferingStatus::Enrolling => "ENROLLING",
            OfferingStatus::Rejected => "REJECTED",
            OfferingStatus::Withdrawn => "WITHDRAWN",
            OfferingStatus::Completed => "COMPLETED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CourseOffering {
    pub id: String,
    pub course_id: String,
    pub instructor_id: String,
    pub semester: String,
    pub time_slot: Option<String>,
    pub allowed_branches: Json<Vec<String>>,
    pub status: OfferingStatus,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl CourseOffering {
    pub fn allows_branch(&self, branch: &str) -> bool {
        self.allowed_branches.iter().any(|b| b == branch)
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.instructor_id == user_id
    }
}

/// An offering joined with its catalog entry and instructor name.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OfferingView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub offering: CourseOffering,
    pub course_code: String,
    pub course_name: String,
    pub credits: i32,
    pub instructor_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOfferingRequest {
    pub course_id: String,
    pub semester: String,
    pub time_slot: Option<String>,
    pub allowed_branches: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OfferingFilter {
    pub status: Option<OfferingStatus>,
    pub semester: Option<String>,
    pub instructor_id: Option<String>,
}
