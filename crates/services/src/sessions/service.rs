use chrono::{DateTime, Utc};
use std::fmt;

use quiz_core::model::{AnswerRecord, Quiz, SessionResult, SubmitOutcome, TopicIdentity};
use quiz_core::scoring::{self, QuestionBreakdown};

use super::progress::SessionProgress;
use crate::error::SessionError;

//
// ─── ANSWER REVEAL ─────────────────────────────────────────────────────────────
//

/// What the player sees after picking an option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerReveal {
    pub question_index: usize,
    pub outcome: SubmitOutcome,
    pub correct_option: Option<usize>,
    /// Explanation attached to the option that is on record.
    pub explanation: String,
    pub concept_summary: Option<String>,
}

impl AnswerReveal {
    #[must_use]
    pub fn is_correct(&self) -> bool {
        self.outcome.entry().is_correct
    }
}

//
// ─── ACTIVE SESSION ────────────────────────────────────────────────────────────
//

/// In-memory state of one quiz being played: the quiz, its topic and the
/// answers collected so far.
///
/// A `Quiz` is only constructible with at least one question, so starting a
/// session needs no further validation.
pub struct ActiveSession {
    quiz: Quiz,
    topic: TopicIdentity,
    answers: AnswerRecord,
    started_at: DateTime<Utc>,
    // set while a merge of this session is awaited
    merge_pending: bool,
}

impl ActiveSession {
    #[must_use]
    pub fn new(quiz: Quiz, topic: TopicIdentity, started_at: DateTime<Utc>) -> Self {
        Self {
            quiz,
            topic,
            answers: AnswerRecord::new(),
            started_at,
            merge_pending: false,
        }
    }

    #[must_use]
    pub fn quiz(&self) -> &Quiz {
        &self.quiz
    }

    #[must_use]
    pub fn topic(&self) -> &TopicIdentity {
        &self.topic
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerRecord {
        &self.answers
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.quiz.len()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.answers.is_complete(self.quiz.len())
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        SessionProgress::new(
            self.quiz.len(),
            self.answers.answered_count(),
            self.answers.correct_count(),
        )
    }

    /// Record `option_index` for `question_index`. A second answer for the
    /// same question is ignored and the original one is revealed again.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::QuestionOutOfRange` / `OptionOutOfRange` for
    /// indexes the quiz does not have.
    pub fn answer(
        &mut self,
        question_index: usize,
        option_index: usize,
    ) -> Result<AnswerReveal, SessionError> {
        let total = self.quiz.len();
        let question = self
            .quiz
            .question(question_index)
            .ok_or(SessionError::QuestionOutOfRange {
                index: question_index,
                total,
            })?;
        let option = question
            .option(option_index)
            .ok_or(SessionError::OptionOutOfRange {
                question: question_index,
                option: option_index,
                options: question.options.len(),
            })?;

        let outcome = self
            .answers
            .submit(question_index, option_index, option.is_correct);
        let on_record = outcome.entry().option_index;
        let explanation = question
            .option(on_record)
            .map(|o| o.explanation.clone())
            .unwrap_or_default();

        Ok(AnswerReveal {
            question_index,
            outcome,
            correct_option: question.first_correct_index(),
            explanation,
            concept_summary: question.concept_summary.clone(),
        })
    }

    /// True when a merge was started and neither succeeded nor failed,
    /// i.e. the completing call was dropped mid-flight.
    #[must_use]
    pub fn merge_pending(&self) -> bool {
        self.merge_pending
    }

    pub(crate) fn set_merge_pending(&mut self, pending: bool) {
        self.merge_pending = pending;
    }

    pub(crate) fn into_parts(self) -> (Quiz, TopicIdentity, AnswerRecord) {
        (self.quiz, self.topic, self.answers)
    }

    /// Score the session and build its result plus the per-question rows.
    pub(crate) fn build_result(
        &self,
        completed_at: DateTime<Utc>,
    ) -> Result<(SessionResult, Vec<QuestionBreakdown>), SessionError> {
        let score = scoring::score(&self.answers, self.quiz.len())?;
        let result = SessionResult::from_score(self.topic.clone(), &score, completed_at);
        Ok((result, scoring::breakdown(&self.quiz, &self.answers)))
    }
}

impl fmt::Debug for ActiveSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveSession")
            .field("topic", &self.topic)
            .field("questions", &self.quiz.len())
            .field("answered", &self.answers.answered_count())
            .field("started_at", &self.started_at)
            .field("merge_pending", &self.merge_pending)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
