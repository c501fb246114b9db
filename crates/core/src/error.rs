use thiserror::Error;

use crate::model::{QuizError, TopicError};
use crate::scoring::ScoringError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    Topic(#[from] TopicError),
    #[error(transparent)]
    Scoring(#[from] ScoringError),
}
