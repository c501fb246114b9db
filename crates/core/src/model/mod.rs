mod answer;
mod ids;
mod progress;
pub(crate) mod quiz;
mod session;

pub use answer::{AnswerEntry, AnswerRecord, SubmitOutcome};
pub use ids::{DocumentId, ParseIdError, TopicError, TopicIdentity, TopicName};
pub use progress::{ProgressAggregate, ProgressOverview};
pub use quiz::{OPTIONS_PER_QUESTION, Question, Quiz, QuizError, QuizOption};
pub use session::SessionResult;
