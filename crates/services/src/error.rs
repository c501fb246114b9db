//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::QuizError;
use quiz_core::scoring::ScoringError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by the session controller.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("starting a session is not allowed right now")]
    NotAllowed,
    #[error(transparent)]
    InvalidQuiz(#[from] QuizError),
    #[error("no session in progress")]
    NotInProgress,
    #[error("question {index} is out of range (quiz has {total})")]
    QuestionOutOfRange { index: usize, total: usize },
    #[error("option {option} is out of range for question {question} ({options} options)")]
    OptionOutOfRange {
        question: usize,
        option: usize,
        options: usize,
    },
    #[error("session incomplete: {answered} of {total} questions answered")]
    IncompleteSession { answered: usize, total: usize },
    #[error(transparent)]
    Scoring(#[from] ScoringError),
    #[error("an earlier completion was abandoned while saving; the session was dropped")]
    MergeAbandoned,
    #[error("progress could not be saved: {0}")]
    Persistence(#[from] StorageError),
}

/// Errors emitted by progress gateways.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GatewayError {
    #[error("progress gateway is not configured")]
    Disabled,
    #[error("progress request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("progress server rejected the request")]
    Rejected,
    #[error("unexpected progress payload: {0}")]
    Decode(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<GatewayError> for StorageError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Storage(inner) => inner,
            GatewayError::Decode(msg) => StorageError::Serialization(msg),
            other => StorageError::Connection(other.to_string()),
        }
    }
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}
