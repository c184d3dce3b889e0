use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::info;

use crate::auth::Identity;
use crate::clock::Clock;
use crate::db::courses;
use crate::error::{AppError, Policy, is_unique_violation};
use crate::models::{Course, NewCourseRequest, Role};

pub struct CourseService;

impl CourseService {
    pub async fn create_course(
        db: &SqlitePool,
        clock: &Arc<dyn Clock>,
        actor: &Identity,
        req: NewCourseRequest,
    ) -> Result<Course, AppError> {
        actor.require(Role::Admin)?;
        let req = req.validate()?;

        let course = courses::insert_course(db, &req, clock.now())
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    Policy::AlreadyTaken(format!("course code {}", req.code)).into()
                } else {
                    AppError::from(e)
                }
            })?;
        info!("course {} created ({} credits)", course.code, course.credits);
        Ok(course)
    }

    pub async fn list_courses(db: &SqlitePool) -> Result<Vec<Course>, AppError> {
        Ok(courses::fetch_courses(db).await?)
    }

    pub async fn get_course(db: &SqlitePool, id: &str) -> Result<Course, AppError> {
        courses::find_course(db, id)
            .await?
            .ok_or_else(|| AppError::not_found("course"))
    }
}
