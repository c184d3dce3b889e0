use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Course {
    pub id: String,
    pub code: String,
    pub name: String,
    pub credits: i32,
    pub ltpsc: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCourseRequest {
    pub code: String,
    pub name: String,
    pub credits: i32,
    pub ltpsc: Option<String>,
    pub description: Option<String>,
}

impl NewCourseRequest {
    /// Returns the request with the code and LTPSC normalised.
    pub fn validate(mut self) -> Result<Self, AppError> {
        self.code = normalize_course_code(&self.code)?;
        if self.name.trim().is_empty() {
            return Err(AppError::BadRequest("course name must not be empty".to_string()));
        }
        if self.credits <= 0 {
            return Err(AppError::BadRequest("credits must be positive".to_string()));
        }
        if let Some(ltpsc) = self.ltpsc.take() {
            self.ltpsc = Some(validate_ltpsc(&ltpsc, self.credits)?);
        }
        Ok(self)
    }
}

/// Course codes are two letters followed by three digits, e.g. `CS301`.
pub fn normalize_course_code(code: &str) -> Result<String, AppError> {
    let code = code.trim().to_ascii_uppercase();
    let b = code.as_bytes();
    let ok = b.len() == 5
        && b[..2].iter().all(u8::is_ascii_uppercase)
        && b[2..].iter().all(u8::is_ascii_digit);
    if ok {
        Ok(code)
    } else {
        Err(AppError::BadRequest(format!("invalid course code: {code}")))
    }
}

/// `L-T-P-S-C`: five non-negative integers whose last part is the credit count.
pub fn validate_ltpsc(ltpsc: &str, credits: i32) -> Result<String, AppError> {
    let ltpsc = ltpsc.trim();
    let invalid = || AppError::BadRequest(format!("invalid LTPSC: {ltpsc}"));

    let parts = ltpsc
        .split('-')
        .map(|p| p.trim().parse::<u32>().map_err(|_| invalid()))
        .collect::<Result<Vec<_>, _>>()?;
    if parts.len() != 5 {
        return Err(invalid());
    }
    if i64::from(parts[4]) != i64::from(credits) {
        return Err(AppError::BadRequest(format!(
            "LTPSC credit component {} does not match credits {}",
            parts[4], credits
        )));
    }
    Ok(ltpsc.to_string())
}
