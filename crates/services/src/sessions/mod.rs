mod progress;
mod service;
mod view;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use progress::SessionProgress;
pub use service::{ActiveSession, AnswerReveal};
pub use view::{CompletedSession, ProgressSummaryService, TopicProgressItem};
pub use workflow::{SessionController, SessionStage};
