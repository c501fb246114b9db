use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Every generated question carries exactly this many options (A-D).
pub const OPTIONS_PER_QUESTION: usize = 4;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

/// Hard failures when accepting a generated quiz.
///
/// A question whose correct-option count is not exactly one is *not* an
/// error here; scoring resolves it best-effort and flags it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QuizError {
    #[error("quiz has no questions")]
    NoQuestions,
    #[error("question {index} has an empty prompt")]
    EmptyPrompt { index: usize },
    #[error("question {index} has {found} options, expected {OPTIONS_PER_QUESTION}")]
    OptionCount { index: usize, found: usize },
    #[error("quiz payload is malformed: {0}")]
    Malformed(String),
}

//
// ─── OPTION ───────────────────────────────────────────────────────────────────
//

/// One selectable answer with its explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizOption {
    pub text: String,
    pub is_correct: bool,
    #[serde(default)]
    pub explanation: String,
}

impl QuizOption {
    #[must_use]
    pub fn new(text: impl Into<String>, is_correct: bool, explanation: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_correct,
            explanation: explanation.into(),
        }
    }
}

//
// ─── QUESTION ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "question")]
    pub prompt: String,
    pub options: Vec<QuizOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concept_summary: Option<String>,
}

impl Question {
    #[must_use]
    pub fn new(prompt: impl Into<String>, options: Vec<QuizOption>) -> Self {
        Self {
            prompt: prompt.into(),
            options,
            concept_summary: None,
        }
    }

    #[must_use]
    pub fn with_concept_summary(mut self, summary: impl Into<String>) -> Self {
        self.concept_summary = Some(summary.into());
        self
    }

    #[must_use]
    pub fn option(&self, index: usize) -> Option<&QuizOption> {
        self.options.get(index)
    }

    /// Index of the first option flagged correct, if any.
    #[must_use]
    pub fn first_correct_index(&self) -> Option<usize> {
        self.options.iter().position(|o| o.is_correct)
    }

    #[must_use]
    pub fn correct_count(&self) -> usize {
        self.options.iter().filter(|o| o.is_correct).count()
    }

    /// True when exactly one option is marked correct.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.correct_count() == 1
    }
}

//
// ─── QUIZ ─────────────────────────────────────────────────────────────────────
//

/// Immutable, externally generated quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quiz {
    questions: Vec<Question>,
}

#[derive(Deserialize)]
struct QuizPayload {
    questions: Vec<Question>,
}

impl Quiz {
    /// # Errors
    ///
    /// Returns `QuizError` if there are no questions, a prompt is blank, or a
    /// question does not have exactly four options.
    pub fn new(questions: Vec<Question>) -> Result<Self, QuizError> {
        if questions.is_empty() {
            return Err(QuizError::NoQuestions);
        }
        for (index, question) in questions.iter().enumerate() {
            if question.prompt.trim().is_empty() {
                return Err(QuizError::EmptyPrompt { index });
            }
            if question.options.len() != OPTIONS_PER_QUESTION {
                return Err(QuizError::OptionCount {
                    index,
                    found: question.options.len(),
                });
            }
        }
        Ok(Self { questions })
    }

    /// Parse the generator's `{"questions": [...]}` payload.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Malformed` for invalid JSON, otherwise the same
    /// validation errors as [`Quiz::new`].
    pub fn from_json(raw: &str) -> Result<Self, QuizError> {
        let payload: QuizPayload =
            serde_json::from_str(raw).map_err(|e| QuizError::Malformed(e.to_string()))?;
        Self::new(payload.questions)
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Always false for a constructed quiz.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

impl<'de> Deserialize<'de> for Quiz {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let payload = QuizPayload::deserialize(deserializer)?;
        Self::new(payload.questions).map_err(serde::de::Error::custom)
    }
}
