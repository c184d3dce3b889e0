pub mod calendar;
pub mod course;
pub mod enrollment;
pub mod feedback;
pub mod offering;
pub mod record;
pub mod user;

pub use calendar::{AcademicCalendar, CalendarUpdate};
pub use course::{Course, NewCourseRequest};
pub use enrollment::{
    BulkEnrollmentReport, BulkEnrollmentRequest, Capabilities, Enrollment, EnrollmentCounts,
    EnrollmentRequest, EnrollmentSource, EnrollmentStatus, EnrollmentTrigger, EnrollmentType,
    Grade, GradeEntry, GradeItemResult, GradeOutcome, GradeUploadReport, RosterEntry,
    StudentEnrollmentView, UnifiedEnrollmentList,
};
pub use feedback::{
    CourseFeedback, FeedbackForm, FeedbackSubmission, FeedbackSummary, FormStatus,
    NewFeedbackFormRequest, QuestionScore,
};
pub use offering::{CourseOffering, NewOfferingRequest, OfferingFilter, OfferingStatus, OfferingView};
pub use record::{
    CourseRecordRow, SemesterRecord, SemesterTranscript, StudentRecord, Transcript,
    TranscriptCourse,
};
pub use user::{EntryNumber, NewUserProfile, NewUserRequest, Role, User, UserProfile, UserRow};
