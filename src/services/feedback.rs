use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::info;

use crate::auth::Identity;
use crate::clock::Clock;
use crate::db::{enrollments, feedback, offerings};
use crate::error::{AppError, Policy, is_unique_violation};
use crate::models::feedback::{MAX_RATING, MIN_RATING};
use crate::models::{
    CourseFeedback, EnrollmentStatus, FeedbackForm, FeedbackSubmission, FeedbackSummary,
    FormStatus, NewFeedbackFormRequest, OfferingStatus, QuestionScore, Role,
};

pub struct FeedbackService {
    db: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl FeedbackService {
    pub fn new(db: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    pub async fn open_form(
        &self,
        actor: &Identity,
        offering_id: &str,
        req: NewFeedbackFormRequest,
    ) -> Result<FeedbackForm, AppError> {
        actor.require(Role::Instructor)?;
        let title = req.title.trim();
        if title.is_empty() {
            return Err(AppError::BadRequest("form title must not be empty".to_string()));
        }
        let questions: Vec<String> = req
            .questions
            .iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .collect();
        if questions.is_empty() {
            return Err(AppError::BadRequest("a form needs at least one question".to_string()));
        }

        let offering = offerings::find_offering(&self.db, offering_id)
            .await?
            .ok_or_else(|| AppError::not_found("offering"))?;
        if !offering.is_owned_by(&actor.user_id) {
            return Err(AppError::forbidden("only the offering's instructor can open feedback"));
        }
        if !matches!(
            offering.status,
            OfferingStatus::Enrolling | OfferingStatus::Completed
        ) {
            return Err(AppError::invalid_state(format!(
                "offering is {}, feedback cannot be collected",
                offering.status
            )));
        }

        let form = feedback::insert_form(&self.db, &offering.id, title, questions, self.clock.now())
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    Policy::FeedbackFormAlreadyOpen.into()
                } else {
                    AppError::from(e)
                }
            })?;
        info!("feedback form {} opened for offering {}", form.id, offering.id);
        Ok(form)
    }

    pub async fn close_form(&self, actor: &Identity, form_id: &str) -> Result<FeedbackForm, AppError> {
        actor.require(Role::Instructor)?;
        let form = self.load_owned_form(actor, form_id).await?;

        let closed = feedback::close_form(&self.db, &form.id, self.clock.now())
            .await?
            .ok_or_else(|| AppError::invalid_state("form is already CLOSED"))?;
        info!("feedback form {} closed", closed.id);
        Ok(closed)
    }

    pub async fn submit(
        &self,
        actor: &Identity,
        form_id: &str,
        submission: FeedbackSubmission,
    ) -> Result<CourseFeedback, AppError> {
        actor.require(Role::Student)?;
        let form = feedback::find_form(&self.db, form_id)
            .await?
            .ok_or_else(|| AppError::not_found("feedback form"))?;
        if form.status != FormStatus::Open {
            return Err(AppError::invalid_state("form is CLOSED"));
        }

        if submission.ratings.len() != form.questions.len() {
            return Err(AppError::BadRequest(format!(
                "expected {} rating(s), got {}",
                form.questions.len(),
                submission.ratings.len()
            )));
        }
        if let Some(r) = submission
            .ratings
            .iter()
            .find(|r| !(MIN_RATING..=MAX_RATING).contains(*r))
        {
            return Err(AppError::BadRequest(format!(
                "rating {r} is outside {MIN_RATING}..={MAX_RATING}"
            )));
        }

        let enrolled = enrollments::find_for_student(&self.db, &actor.user_id, &form.offering_id)
            .await?
            .is_some_and(|e| {
                matches!(
                    e.status,
                    EnrollmentStatus::Enrolled | EnrollmentStatus::Completed
                )
            });
        if !enrolled {
            return Err(Policy::NotEnrolled.into());
        }

        let comment = submission
            .comment
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());
        let response = feedback::insert_response(
            &self.db,
            &form.id,
            &actor.user_id,
            submission.ratings,
            comment,
            self.clock.now(),
        )
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Policy::FeedbackAlreadySubmitted.into()
            } else {
                AppError::from(e)
            }
        })?;
        Ok(response)
    }

    pub async fn summary(&self, viewer: &Identity, form_id: &str) -> Result<FeedbackSummary, AppError> {
        viewer.require_any(&[Role::Instructor, Role::Admin])?;
        let form = if viewer.role == Role::Admin {
            feedback::find_form(&self.db, form_id)
                .await?
                .ok_or_else(|| AppError::not_found("feedback form"))?
        } else {
            self.load_owned_form(viewer, form_id).await?
        };

        let responses = feedback::fetch_responses(&self.db, &form.id).await?;
        Ok(summarize(&form, &responses))
    }

    pub async fn forms_for_offering(
        &self,
        viewer: &Identity,
        offering_id: &str,
    ) -> Result<Vec<FeedbackForm>, AppError> {
        offerings::find_offering(&self.db, offering_id)
            .await?
            .ok_or_else(|| AppError::not_found("offering"))?;
        let forms = feedback::fetch_forms_for_offering(&self.db, offering_id).await?;
        if viewer.role == Role::Student {
            return Ok(forms.into_iter().filter(|f| f.status == FormStatus::Open).collect());
        }
        Ok(forms)
    }

    async fn load_owned_form(&self, actor: &Identity, form_id: &str) -> Result<FeedbackForm, AppError> {
        let form = feedback::find_form(&self.db, form_id)
            .await?
            .ok_or_else(|| AppError::not_found("feedback form"))?;
        let offering = offerings::find_offering(&self.db, &form.offering_id)
            .await?
            .ok_or_else(|| AppError::not_found("offering"))?;
        if !offering.is_owned_by(&actor.user_id) {
            return Err(AppError::forbidden("form belongs to another instructor's offering"));
        }
        Ok(form)
    }
}

fn summarize(form: &FeedbackForm, responses: &[CourseFeedback]) -> FeedbackSummary {
    let mut sums = vec![0u32; form.questions.len()];
    let mut counts = vec![0u32; form.questions.len()];
    for response in responses {
        for (i, rating) in response.ratings.iter().enumerate().take(sums.len()) {
            sums[i] += u32::from(*rating);
            counts[i] += 1;
        }
    }

    let mean = |sum: u32, n: u32| (n > 0).then(|| f64::from(sum) / f64::from(n));
    let questions = form
        .questions
        .iter()
        .enumerate()
        .map(|(i, q)| QuestionScore {
            question: q.clone(),
            average: mean(sums[i], counts[i]),
        })
        .collect();

    FeedbackSummary {
        form_id: form.id.clone(),
        offering_id: form.offering_id.clone(),
        status: form.status,
        responses: responses.len(),
        questions,
        overall_average: mean(sums.iter().sum(), counts.iter().sum()),
        comments: responses.iter().filter_map(|r| r.comment.clone()).collect(),
    }
}
