mod common;

use chrono::Duration;
use common::{Fixture, at, grade};
use registrar::error::{AppError, Policy};
use registrar::models::*;

#[tokio::test]
async fn test_request_creates_pending_student_request() {
    let fx = Fixture::new().await;
    let prof = fx.instructor("Rao").await;
    let student = fx.student("2023CSB1042").await;
    let offering = fx.open_offering(&prof, "CS301", 4, &["CSB", "CSE"]).await;

    let enrollment = fx.request(&student, &offering).await.unwrap();

    assert_eq!(enrollment.status, EnrollmentStatus::PendingInstructor);
    assert_eq!(enrollment.source, EnrollmentSource::StudentRequest);
    assert_eq!(enrollment.student_id, student.user_id);
    assert!(enrollment.grade.is_none());
    assert!(enrollment.approved_at.is_none());
}

#[tokio::test]
async fn test_branch_gate() {
    let fx = Fixture::new().await;
    let prof = fx.instructor("Rao").await;
    let csb = fx.student("2023CSB1042").await;
    let mec = fx.student("2023MEB1001").await;
    let offering = fx.open_offering(&prof, "CS301", 4, &["CSB", "CSE"]).await;

    assert!(fx.request(&csb, &offering).await.is_ok());

    let err = fx.request(&mec, &offering).await.unwrap_err();
    assert_eq!(
        err.policy(),
        Some(&Policy::BranchNotAllowed {
            branch: "MEB".to_string()
        })
    );
    assert_eq!(fx.enrollment_count(&offering.id).await, 1);
}

#[tokio::test]
async fn test_duplicate_request_is_rejected_and_leaves_one_row() {
    let fx = Fixture::new().await;
    let prof = fx.instructor("Rao").await;
    let student = fx.student("2023CSB1042").await;
    let offering = fx.open_offering(&prof, "CS301", 4, &["CSB"]).await;

    fx.request(&student, &offering).await.unwrap();
    let err = fx.request(&student, &offering).await.unwrap_err();
    assert_eq!(err.policy(), Some(&Policy::DuplicateEnrollment));

    let (a, b) = tokio::join!(fx.request(&student, &offering), fx.request(&student, &offering));
    assert!(a.is_err() && b.is_err());
    assert_eq!(fx.enrollment_count(&offering.id).await, 1);
}

#[tokio::test]
async fn test_credit_limit_counts_only_enrolled_rows_in_the_same_semester() {
    let fx = Fixture::with_max_credits(8).await;
    let prof = fx.instructor("Rao").await;
    let student = fx.student("2023CSB1042").await;

    let first = fx.open_offering(&prof, "CS101", 4, &["CSB"]).await;
    let second = fx.open_offering(&prof, "CS102", 3, &["CSB"]).await;
    let third = fx.open_offering(&prof, "CS103", 2, &["CSB"]).await;

    fx.enrolled(&student, &prof, &first).await;
    fx.enrolled(&student, &prof, &second).await;

    // 4 + 3 + 2 > 8
    let err = fx.request(&student, &third).await.unwrap_err();
    assert!(matches!(
        err.policy(),
        Some(Policy::CreditLimitExceeded {
            current: 7,
            requested: 2,
            limit: 8
        })
    ));
    assert_eq!(fx.enrollment_count(&third.id).await, 0);

    // an offering of another semester is not counted against this one
    let other_course = fx.course("CS104", 4).await;
    let later = fx.proposal(&prof, &other_course, "2025-II", &["CSB"]).await;
    let later = fx
        .state
        .offerings()
        .approve_offering(&fx.admin, &later.id)
        .await
        .unwrap();
    assert!(fx.request(&student, &later).await.is_ok());
}

#[tokio::test]
async fn test_approval_rechecks_credit_limit() {
    let fx = Fixture::with_max_credits(6).await;
    let prof = fx.instructor("Rao").await;
    let student = fx.student("2023CSB1042").await;
    let a = fx.open_offering(&prof, "CS101", 4, &["CSB"]).await;
    let b = fx.open_offering(&prof, "CS102", 4, &["CSB"]).await;

    let ea = fx.request(&student, &a).await.unwrap();
    let eb = fx.request(&student, &b).await.unwrap();

    fx.state.enrollments().approve_enrollment(&prof, &ea.id).await.unwrap();
    let err = fx
        .state
        .enrollments()
        .approve_enrollment(&prof, &eb.id)
        .await
        .unwrap_err();
    assert!(matches!(err.policy(), Some(Policy::CreditLimitExceeded { .. })));
}

#[tokio::test]
async fn test_request_outside_window_is_closed() {
    let fx = Fixture::new().await;
    let prof = fx.instructor("Rao").await;
    let student = fx.student("2023CSB1042").await;
    let offering = fx.open_offering(&prof, "CS301", 4, &["CSB"]).await;

    fx.clock.set(at(10, 0));
    assert!(fx.request(&student, &offering).await.is_ok());

    let late = fx.student("2023CSB1043").await;
    fx.advance(Duration::seconds(1));
    let err = fx.request(&late, &offering).await.unwrap_err();
    assert_eq!(err.policy(), Some(&Policy::EnrollmentClosed));
}

#[tokio::test]
async fn test_request_requires_enrolling_offering() {
    let fx = Fixture::new().await;
    let prof = fx.instructor("Rao").await;
    let student = fx.student("2023CSB1042").await;
    let course = fx.course("CS301", 4).await;
    let pending = fx.proposal(&prof, &course, common::SEMESTER, &["CSB"]).await;

    let err = fx.request(&student, &pending).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    let err = fx
        .state
        .enrollments()
        .request_enrollment(
            &student,
            EnrollmentRequest {
                offering_id: "missing".to_string(),
                enrollment_type: EnrollmentType::Credit,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_only_owner_can_decide_and_only_once() {
    let fx = Fixture::new().await;
    let owner = fx.instructor("Rao").await;
    let other = fx.instructor("Iyer").await;
    let student = fx.student("2023CSB1042").await;
    let offering = fx.open_offering(&owner, "CS301", 4, &["CSB"]).await;
    let pending = fx.request(&student, &offering).await.unwrap();

    let err = fx
        .state
        .enrollments()
        .approve_enrollment(&other, &pending.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = fx
        .state
        .enrollments()
        .approve_enrollment(&student, &pending.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let approved = fx
        .state
        .enrollments()
        .approve_enrollment(&owner, &pending.id)
        .await
        .unwrap();
    assert_eq!(approved.status, EnrollmentStatus::Enrolled);
    assert!(approved.approved_at.is_some());

    let err = fx
        .state
        .enrollments()
        .reject_enrollment(&owner, &pending.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
}

#[tokio::test]
async fn test_reject_is_terminal() {
    let fx = Fixture::new().await;
    let prof = fx.instructor("Rao").await;
    let student = fx.student("2023CSB1042").await;
    let offering = fx.open_offering(&prof, "CS301", 4, &["CSB"]).await;
    let pending = fx.request(&student, &offering).await.unwrap();

    let rejected = fx
        .state
        .enrollments()
        .reject_enrollment(&prof, &pending.id)
        .await
        .unwrap();
    assert_eq!(rejected.status, EnrollmentStatus::Rejected);

    let err = fx
        .state
        .enrollments()
        .approve_enrollment(&prof, &pending.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
}

#[tokio::test]
async fn test_drop_rules() {
    let fx = Fixture::new().await;
    let prof = fx.instructor("Rao").await;
    let student = fx.student("2023CSB1042").await;
    let classmate = fx.student("2023CSB1043").await;
    let offering = fx.open_offering(&prof, "CS301", 4, &["CSB"]).await;

    let pending = fx.request(&student, &offering).await.unwrap();
    let err = fx
        .state
        .enrollments()
        .drop_enrollment(&student, &pending.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    let enrolled = fx
        .state
        .enrollments()
        .approve_enrollment(&prof, &pending.id)
        .await
        .unwrap();

    let err = fx
        .state
        .enrollments()
        .drop_enrollment(&classmate, &enrolled.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let dropped = fx
        .state
        .enrollments()
        .drop_enrollment(&student, &enrolled.id)
        .await
        .unwrap();
    assert_eq!(dropped.status, EnrollmentStatus::Dropped);

    let err = fx
        .state
        .enrollments()
        .audit_enrollment(&student, &enrolled.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
}

#[tokio::test]
async fn test_drop_deadline_and_audit_deadline() {
    let fx = Fixture::new().await;
    let prof = fx.instructor("Rao").await;
    let student = fx.student("2023CSB1042").await;
    let a = fx.open_offering(&prof, "CS301", 4, &["CSB"]).await;
    let b = fx.open_offering(&prof, "CS302", 4, &["CSB"]).await;
    let ea = fx.enrolled(&student, &prof, &a).await;
    let eb = fx.enrolled(&student, &prof, &b).await;

    // past the drop deadline, before the audit deadline
    fx.clock.set(at(22, 0));
    let err = fx
        .state
        .enrollments()
        .drop_enrollment(&student, &ea.id)
        .await
        .unwrap_err();
    assert_eq!(err.policy(), Some(&Policy::DropDeadlinePassed));

    let audited = fx
        .state
        .enrollments()
        .audit_enrollment(&student, &ea.id)
        .await
        .unwrap();
    assert_eq!(audited.status, EnrollmentStatus::Audit);

    fx.clock.set(at(25, 0) + Duration::seconds(1));
    let err = fx
        .state
        .enrollments()
        .audit_enrollment(&student, &eb.id)
        .await
        .unwrap_err();
    assert_eq!(err.policy(), Some(&Policy::AuditDeadlinePassed));
}

#[tokio::test]
async fn test_bulk_enroll_cohort() {
    let fx = Fixture::new().await;
    let prof = fx.instructor("Rao").await;
    let s1 = fx.student("2023CSB1001").await;
    let s2 = fx.student("2023CSB1002").await;
    let _other_year = fx.student("2022CSB1003").await;
    let _other_branch = fx.student("2023CSE1004").await;
    let offering = fx.open_offering(&prof, "CS201", 4, &["CSB", "CSE"]).await;

    let req = BulkEnrollmentRequest {
        branch: "csb".to_string(),
        batch_year: "2023".to_string(),
        enrollment_type: EnrollmentType::Credit,
    };
    let report = fx
        .state
        .enrollments()
        .bulk_enroll(&prof, &offering.id, req.clone())
        .await
        .unwrap();
    assert_eq!(report.enrolled_count, 2);
    assert_eq!(report.newly_enrolled.len(), 2);

    let roster = fx
        .state
        .enrollments()
        .unified_enrollment_list(&prof, &offering.id)
        .await
        .unwrap();
    assert_eq!(roster.counts.enrolled, 2);
    for entry in &roster.enrolled {
        assert_eq!(entry.enrollment.source, EnrollmentSource::InstructorAssigned);
        assert!([s1.user_id.as_str(), s2.user_id.as_str()].contains(&entry.enrollment.student_id.as_str()));
    }

    // the trigger is idempotent
    let again = fx
        .state
        .enrollments()
        .bulk_enroll(&prof, &offering.id, req)
        .await
        .unwrap();
    assert_eq!(again.enrolled_count, 0);
    assert_eq!(again.already_enrolled.len(), 2);
    assert_eq!(again.trigger_id, report.trigger_id);

    let triggers: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM enrollment_triggers")
        .fetch_one(&fx.db)
        .await
        .unwrap();
    assert_eq!(triggers, 1);

    // assigned enrollments cannot be dropped or audited by the student
    let own = roster
        .enrolled
        .iter()
        .find(|e| e.enrollment.student_id == s1.user_id)
        .unwrap();
    let err = fx
        .state
        .enrollments()
        .drop_enrollment(&s1, &own.enrollment.id)
        .await
        .unwrap_err();
    assert_eq!(err.policy(), Some(&Policy::InstructorAssigned));
    let err = fx
        .state
        .enrollments()
        .audit_enrollment(&s1, &own.enrollment.id)
        .await
        .unwrap_err();
    assert_eq!(err.policy(), Some(&Policy::InstructorAssigned));
}

#[tokio::test]
async fn test_bulk_enroll_reenrolls_dropped_students() {
    let fx = Fixture::new().await;
    let prof = fx.instructor("Rao").await;
    let student = fx.student("2023CSB1001").await;
    let offering = fx.open_offering(&prof, "CS201", 4, &["CSB"]).await;

    let enrolled = fx.enrolled(&student, &prof, &offering).await;
    fx.state
        .enrollments()
        .drop_enrollment(&student, &enrolled.id)
        .await
        .unwrap();

    let report = fx
        .state
        .enrollments()
        .bulk_enroll(
            &prof,
            &offering.id,
            BulkEnrollmentRequest {
                branch: "CSB".to_string(),
                batch_year: "2023".to_string(),
                enrollment_type: EnrollmentType::Credit,
            },
        )
        .await
        .unwrap();
    assert_eq!(report.re_enrolled, vec![student.user_id.clone()]);
    assert_eq!(report.enrolled_count, 1);
    assert_eq!(fx.enrollment_count(&offering.id).await, 1);

    let mine = fx.state.enrollments().student_enrollments(&student).await.unwrap();
    assert_eq!(mine[0].enrollment.status, EnrollmentStatus::Enrolled);
    assert_eq!(mine[0].enrollment.source, EnrollmentSource::InstructorAssigned);
}

#[tokio::test]
async fn test_bulk_enroll_guards() {
    let fx = Fixture::new().await;
    let prof = fx.instructor("Rao").await;
    let other = fx.instructor("Iyer").await;
    fx.student("2023CSB1001").await;
    let offering = fx.open_offering(&prof, "CS201", 4, &["CSB"]).await;

    let req = |branch: &str| BulkEnrollmentRequest {
        branch: branch.to_string(),
        batch_year: "2023".to_string(),
        enrollment_type: EnrollmentType::Credit,
    };

    let err = fx
        .state
        .enrollments()
        .bulk_enroll(&other, &offering.id, req("CSB"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = fx
        .state
        .enrollments()
        .bulk_enroll(&prof, &offering.id, req("EEB"))
        .await
        .unwrap_err();
    assert!(matches!(err.policy(), Some(Policy::BranchNotAllowed { .. })));
    assert_eq!(fx.enrollment_count(&offering.id).await, 0);
}

#[tokio::test]
async fn test_bulk_enroll_skips_students_over_the_credit_limit() {
    let fx = Fixture::with_max_credits(6).await;
    let prof = fx.instructor("Rao").await;
    let busy = fx.student("2023CSB1001").await;
    let free = fx.student("2023CSB1002").await;
    let heavy = fx.open_offering(&prof, "CS101", 4, &["CSB"]).await;
    let core = fx.open_offering(&prof, "CS201", 4, &["CSB"]).await;
    fx.enrolled(&busy, &prof, &heavy).await;

    let report = fx
        .state
        .enrollments()
        .bulk_enroll(
            &prof,
            &core.id,
            BulkEnrollmentRequest {
                branch: "CSB".to_string(),
                batch_year: "2023".to_string(),
                enrollment_type: EnrollmentType::Credit,
            },
        )
        .await
        .unwrap();
    assert_eq!(report.newly_enrolled, vec![free.user_id.clone()]);
    assert_eq!(report.skipped_credit_limit, vec![busy.user_id.clone()]);
}

#[tokio::test]
async fn test_grades_are_write_once() {
    let fx = Fixture::new().await;
    let prof = fx.instructor("Rao").await;
    let student = fx.student("2023CSB1042").await;
    let offering = fx.open_offering(&prof, "CS301", 4, &["CSB"]).await;
    let enrollment = fx.enrolled(&student, &prof, &offering).await;

    let first = fx
        .state
        .enrollments()
        .upload_grades(&prof, &offering.id, vec![grade(&enrollment.id, "B")])
        .await
        .unwrap();
    assert_eq!(first.updated_count, 1);
    assert_eq!(first.updated_ids, vec![enrollment.id.clone()]);

    let second = fx
        .state
        .enrollments()
        .upload_grades(
            &prof,
            &offering.id,
            vec![grade(&enrollment.id, "A"), grade("no-such-enrollment", "A")],
        )
        .await
        .unwrap();
    assert_eq!(second.updated_count, 0);
    assert_eq!(second.items[0].outcome, GradeOutcome::SkippedAlreadyGraded);
    assert_eq!(second.items[1].outcome, GradeOutcome::SkippedNotFound);

    let mine = fx.state.enrollments().student_enrollments(&student).await.unwrap();
    assert_eq!(mine[0].enrollment.status, EnrollmentStatus::Completed);
    assert_eq!(mine[0].enrollment.grade, Some(Grade::B));
    assert!(mine[0].enrollment.completed_at.is_some());
}

#[tokio::test]
async fn test_grade_upload_skips_non_enrolled_and_aborts_on_foreign_rows() {
    let fx = Fixture::new().await;
    let prof = fx.instructor("Rao").await;
    let s1 = fx.student("2023CSB1001").await;
    let s2 = fx.student("2023CSB1002").await;
    let offering = fx.open_offering(&prof, "CS301", 4, &["CSB"]).await;
    let elsewhere = fx.open_offering(&prof, "CS302", 4, &["CSB"]).await;

    let enrolled = fx.enrolled(&s1, &prof, &offering).await;
    let pending = fx.request(&s2, &offering).await.unwrap();
    let foreign = fx.enrolled(&s2, &prof, &elsewhere).await;

    let report = fx
        .state
        .enrollments()
        .upload_grades(
            &prof,
            &offering.id,
            vec![grade(&pending.id, "A"), grade(&enrolled.id, "A-")],
        )
        .await
        .unwrap();
    assert_eq!(report.items[0].outcome, GradeOutcome::SkippedNotEnrolled);
    assert_eq!(report.items[1].outcome, GradeOutcome::Applied);
    assert_eq!(report.updated_count, 1);

    // a row from another offering fails the upload and nothing is applied
    let other = fx.student("2023CSB1003").await;
    let fresh = fx.enrolled(&other, &prof, &offering).await;
    let err = fx
        .state
        .enrollments()
        .upload_grades(
            &prof,
            &offering.id,
            vec![grade(&fresh.id, "C"), grade(&foreign.id, "C")],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let mine = fx.state.enrollments().student_enrollments(&other).await.unwrap();
    assert_eq!(mine[0].enrollment.status, EnrollmentStatus::Enrolled);
    assert!(mine[0].enrollment.grade.is_none());
}

#[tokio::test]
async fn test_grade_upload_rejects_bad_input_and_completed_offerings() {
    let fx = Fixture::new().await;
    let prof = fx.instructor("Rao").await;
    let other = fx.instructor("Iyer").await;
    let student = fx.student("2023CSB1042").await;
    let offering = fx.open_offering(&prof, "CS301", 4, &["CSB"]).await;
    let enrollment = fx.enrolled(&student, &prof, &offering).await;

    let err = fx
        .state
        .enrollments()
        .upload_grades(&prof, &offering.id, vec![grade(&enrollment.id, "A+")])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = fx
        .state
        .enrollments()
        .upload_grades(&other, &offering.id, vec![grade(&enrollment.id, "A")])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    fx.state
        .enrollments()
        .upload_grades(&prof, &offering.id, vec![grade(&enrollment.id, "A")])
        .await
        .unwrap();
    fx.state
        .offerings()
        .finalize_offering(&prof, &offering.id)
        .await
        .unwrap();

    let err = fx
        .state
        .enrollments()
        .upload_grades(&prof, &offering.id, vec![grade(&enrollment.id, "A")])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
}

#[tokio::test]
async fn test_unified_list_groups_and_capabilities() {
    let fx = Fixture::new().await;
    let owner = fx.instructor("Rao").await;
    let other = fx.instructor("Iyer").await;
    let s1 = fx.student("2023CSB1001").await;
    let s2 = fx.student("2023CSB1002").await;
    let s3 = fx.student("2023CSB1003").await;
    let offering = fx.open_offering(&owner, "CS301", 4, &["CSB"]).await;

    fx.request(&s1, &offering).await.unwrap();
    fx.enrolled(&s2, &owner, &offering).await;
    let e3 = fx.enrolled(&s3, &owner, &offering).await;
    fx.state.enrollments().drop_enrollment(&s3, &e3.id).await.unwrap();

    let list = fx
        .state
        .enrollments()
        .unified_enrollment_list(&owner, &offering.id)
        .await
        .unwrap();
    assert_eq!(list.counts.pending, 1);
    assert_eq!(list.counts.enrolled, 1);
    assert_eq!(list.counts.dropped, 1);
    assert_eq!(list.counts.audit, 0);
    assert_eq!(list.counts.total, 3);
    assert!(list.capabilities.can_approve && list.capabilities.can_edit && list.capabilities.can_trigger);

    let as_other = fx
        .state
        .enrollments()
        .unified_enrollment_list(&other, &offering.id)
        .await
        .unwrap();
    assert!(!as_other.capabilities.can_approve);

    let as_admin = fx
        .state
        .enrollments()
        .unified_enrollment_list(&fx.admin, &offering.id)
        .await
        .unwrap();
    assert!(!as_admin.capabilities.can_edit);

    let err = fx
        .state
        .enrollments()
        .unified_enrollment_list(&s1, &offering.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let pending = fx.state.enrollments().pending_approvals(&owner).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].enrollment.student_id, s1.user_id);
}
