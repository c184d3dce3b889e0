use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::AppError;

/// The single academic calendar governing the current semester.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct AcademicCalendar {
    pub semester: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub enrollment_start: DateTime<Utc>,
    pub enrollment_end: DateTime<Utc>,
    pub drop_deadline: DateTime<Utc>,
    pub audit_deadline: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AcademicCalendar {
    /// Closed interval: both boundary instants are inside the window.
    pub fn enrollment_open_at(&self, now: DateTime<Utc>) -> bool {
        self.enrollment_start <= now && now <= self.enrollment_end
    }

    pub fn drop_allowed_at(&self, now: DateTime<Utc>) -> bool {
        now <= self.drop_deadline
    }

    pub fn audit_allowed_at(&self, now: DateTime<Utc>) -> bool {
        now <= self.audit_deadline
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarUpdate {
    pub semester: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub enrollment_start: DateTime<Utc>,
    pub enrollment_end: DateTime<Utc>,
    pub drop_deadline: DateTime<Utc>,
    pub audit_deadline: DateTime<Utc>,
}

impl CalendarUpdate {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.semester.trim().is_empty() {
            return Err(AppError::BadRequest("semester must not be empty".to_string()));
        }
        if self.start_date > self.end_date {
            return Err(AppError::BadRequest(
                "semester start is after its end".to_string(),
            ));
        }
        if self.enrollment_start > self.enrollment_end {
            return Err(AppError::BadRequest(
                "enrollment start is after enrollment end".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn calendar() -> AcademicCalendar {
        let t = |d: u32| Utc.with_ymd_and_hms(2025, 1, d, 0, 0, 0).unwrap();
        AcademicCalendar {
            semester: "2025-I".to_string(),
            start_date: t(1),
            end_date: t(31),
            enrollment_start: t(5),
            enrollment_end: t(10),
            drop_deadline: t(15),
            audit_deadline: t(20),
            updated_at: t(1),
        }
    }

    #[test]
    fn enrollment_window_is_closed_interval() {
        let cal = calendar();
        let one = Duration::seconds(1);
        assert!(cal.enrollment_open_at(cal.enrollment_start));
        assert!(cal.enrollment_open_at(cal.enrollment_end));
        assert!(!cal.enrollment_open_at(cal.enrollment_start - one));
        assert!(!cal.enrollment_open_at(cal.enrollment_end + one));
    }

    #[test]
    fn deadlines_only_bound_from_above() {
        let cal = calendar();
        let one = Duration::seconds(1);
        assert!(cal.drop_allowed_at(cal.start_date - Duration::days(30)));
        assert!(cal.drop_allowed_at(cal.drop_deadline));
        assert!(!cal.drop_allowed_at(cal.drop_deadline + one));
        assert!(cal.audit_allowed_at(cal.audit_deadline));
        assert!(!cal.audit_allowed_at(cal.audit_deadline + one));
    }
}
