pub mod calendar;
pub mod catalog;
pub mod enrollment;
pub mod feedback;
pub mod offering;
pub mod transcript;
pub mod users;

pub use calendar::CalendarGate;
pub use catalog::CourseService;
pub use enrollment::EnrollmentService;
pub use feedback::FeedbackService;
pub use offering::OfferingService;
pub use transcript::TranscriptService;
pub use users::{BulkUserOutcome, UserService};
