pub mod event;
pub mod language;
pub mod submission_status;

pub use event::{EventType, JudgeStatus, RoomEvent, SolutionResult, SolutionSubmitted, SseEvent};
pub use language::{LanguageSpec, TestCaseData};
pub use submission_status::SubmissionStatus;
