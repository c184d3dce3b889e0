use std::sync::Arc;

use sqlx::SqlitePool;

use crate::auth::IdentityResolver;
use crate::clock::Clock;
use crate::services::{
    CalendarGate, EnrollmentService, FeedbackService, OfferingService, TranscriptService,
    UserService,
};

#[derive(Debug, Clone, Copy)]
pub struct PolicyConfig {
    pub max_credits_per_semester: i64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            max_credits_per_semester: crate::config::DEFAULT_MAX_CREDITS,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub clock: Arc<dyn Clock>,
    pub identity: Arc<dyn IdentityResolver>,
    pub policy: PolicyConfig,
}

impl AppState {
    pub fn new(db: SqlitePool, clock: Arc<dyn Clock>, identity: Arc<dyn IdentityResolver>) -> Self {
        Self {
            db,
            clock,
            identity,
            policy: PolicyConfig::default(),
        }
    }

    pub fn with_policy(mut self, policy: PolicyConfig) -> Self {
        self.policy = policy;
        self
    }

    pub fn calendar(&self) -> CalendarGate {
        CalendarGate::new(self.db.clone(), self.clock.clone())
    }

    pub fn enrollments(&self) -> EnrollmentService {
        EnrollmentService::new(self.db.clone(), self.clock.clone(), self.policy)
    }

    pub fn offerings(&self) -> OfferingService {
        OfferingService::new(self.db.clone(), self.clock.clone())
    }

    pub fn transcripts(&self) -> TranscriptService {
        TranscriptService::new(self.db.clone())
    }

    pub fn feedback(&self) -> FeedbackService {
        FeedbackService::new(self.db.clone(), self.clock.clone())
    }

    pub fn users(&self) -> UserService {
        UserService::new(self.db.clone(), self.clock.clone())
    }
}
