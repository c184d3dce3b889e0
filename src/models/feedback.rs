use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FormStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FeedbackForm {
    pub id: String,
    pub offering_id: String,
    pub title: String,
    pub questions: Json<Vec<String>>,
    pub status: FormStatus,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CourseFeedback {
    pub id: String,
    pub form_id: String,
    pub student_id: String,
    pub ratings: Json<Vec<u8>>,
    pub comment: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFeedbackFormRequest {
    pub title: String,
    pub questions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackSubmission {
    pub ratings: Vec<u8>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionScore {
    pub question: String,
    pub average: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackSummary {
    pub form_id: String,
    pub offering_id: String,
    pub status: FormStatus,
    pub responses: usize,
    pub questions: Vec<QuestionScore>,
    pub overall_average: Option<f64>,
    pub comments: Vec<String>,
}

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;
