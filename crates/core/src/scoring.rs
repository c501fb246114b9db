//! Pure scoring of a finished answer set against its quiz.

use thiserror::Error;

use crate::model::{AnswerRecord, Quiz};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScoringError {
    #[error("cannot score a session with zero questions")]
    NoQuestions,
    #[error("question count {len} does not fit in u32")]
    TooManyQuestions { len: usize },
}

/// Final tally of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Score {
    pub correct: u32,
    pub total: u32,
    pub percent: u8,
}

/// `round(part / whole * 100)` with halves rounded up.
///
/// Returns `None` when `whole` is zero. `part` is clamped to `whole`.
#[must_use]
pub fn percent_of(part: u64, whole: u64) -> Option<u8> {
    if whole == 0 {
        return None;
    }
    let part = u128::from(part.min(whole));
    let whole = u128::from(whole);
    let pct = (part * 200 + whole) / (whole * 2);
    u8::try_from(pct).ok()
}

/// Score the answers recorded for a quiz of `total_questions` questions.
///
/// Answers for indexes outside `0..total_questions` are ignored.
///
/// # Errors
///
/// Returns `ScoringError::NoQuestions` when `total_questions` is zero.
pub fn score(record: &AnswerRecord, total_questions: usize) -> Result<Score, ScoringError> {
    if total_questions == 0 {
        return Err(ScoringError::NoQuestions);
    }
    let total = u32::try_from(total_questions).map_err(|_| ScoringError::TooManyQuestions {
        len: total_questions,
    })?;
    let correct = record
        .iter()
        .filter(|(index, entry)| *index < total_questions && entry.is_correct)
        .count();
    // bounded by total_questions, which fits in u32
    let correct = u32::try_from(correct).unwrap_or(total);
    let percent = percent_of(u64::from(correct), u64::from(total)).unwrap_or(0);

    Ok(Score {
        correct,
        total,
        percent,
    })
}

//
// ─── BREAKDOWN ────────────────────────────────────────────────────────────────
//

/// Per-question row for the results view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionBreakdown {
    pub index: usize,
    pub chosen: Option<usize>,
    /// First option flagged correct; `None` only for ill-formed questions
    /// with no correct option at all.
    pub correct: Option<usize>,
    pub is_correct: bool,
    pub ill_formed: bool,
}

/// Build the breakdown rows for every question of `quiz`.
///
/// Questions without exactly one correct option are resolved to their first
/// correct option and reported through `tracing`, never as an error.
#[must_use]
pub fn breakdown(quiz: &Quiz, record: &AnswerRecord) -> Vec<QuestionBreakdown> {
    quiz.questions()
        .iter()
        .enumerate()
        .map(|(index, question)| {
            let ill_formed = !question.is_well_formed();
            if ill_formed {
                tracing::warn!(
                    question = index,
                    correct_options = question.correct_count(),
                    "ill-formed question: expected exactly one correct option"
                );
            }
            let entry = record.get(index);
            QuestionBreakdown {
                index,
                chosen: entry.map(|e| e.option_index),
                correct: question.first_correct_index(),
                is_correct: entry.is_some_and(|e| e.is_correct),
                ill_formed,
            }
        })
        .collect()
}

//
// ─── GRADE ────────────────────────────────────────────────────────────────────
//

/// Coarse verdict shown next to the final percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grade {
    Outstanding,
    Great,
    KeepGoing,
    NeedsReview,
}

impl Grade {
    #[must_use]
    pub fn from_percent(percent: u8) -> Self {
        match percent {
            90.. => Self::Outstanding,
            70..=89 => Self::Great,
            50..=69 => Self::KeepGoing,
            _ => Self::NeedsReview,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Outstanding => "Outstanding!",
            Self::Great => "Great work!",
            Self::KeepGoing => "Keep going!",
            Self::NeedsReview => "Needs review",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::quiz::fixtures;

    #[test]
    fn percent_rounds_half_up() {
        assert_eq!(percent_of(3, 4), Some(75));
        assert_eq!(percent_of(1, 3), Some(33));
        assert_eq!(percent_of(2, 3), Some(67));
        assert_eq!(percent_of(1, 8), Some(13));
        assert_eq!(percent_of(0, 5), Some(0));
        assert_eq!(percent_of(5, 5), Some(100));
        assert_eq!(percent_of(1, 0), None);
    }

    #[test]
    fn score_is_deterministic() {
        let mut record = AnswerRecord::new();
        record.submit(0, 0, true);
        record.submit(1, 1, false);

        let first = score(&record, 2).unwrap();
        assert_eq!(
            first,
            Score {
                correct: 1,
                total: 2,
                percent: 50
            }
        );
        assert_eq!(score(&record, 2).unwrap(), first);
    }

    #[test]
    fn zero_total_is_rejected() {
        assert_eq!(
            score(&AnswerRecord::new(), 0),
            Err(ScoringError::NoQuestions)
        );
    }

    #[test]
    fn breakdown_resolves_chosen_and_correct() {
        let quiz = fixtures::quiz(&[0, 2]);
        let mut record = AnswerRecord::new();
        record.submit(0, 0, true);
        record.submit(1, 3, false);

        let rows = breakdown(&quiz, &record);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].chosen, Some(0));
        assert_eq!(rows[0].correct, Some(0));
        assert!(rows[0].is_correct);
        assert_eq!(rows[1].chosen, Some(3));
        assert_eq!(rows[1].correct, Some(2));
        assert!(!rows[1].is_correct);
        assert!(rows.iter().all(|r| !r.ill_formed));
    }

    #[test]
    fn ill_formed_question_resolves_to_first_correct() {
        let mut q = fixtures::question("Q", 3);
        q.options[1].is_correct = true;
        let mut none_correct = fixtures::question("R", 0);
        none_correct.options[0].is_correct = false;
        let quiz = Quiz::new(vec![q, none_correct]).unwrap();

        let rows = breakdown(&quiz, &AnswerRecord::new());
        assert!(rows[0].ill_formed);
        assert_eq!(rows[0].correct, Some(1));
        assert!(rows[1].ill_formed);
        assert_eq!(rows[1].correct, None);
    }

    #[test]
    fn grade_bands() {
        assert_eq!(Grade::from_percent(100), Grade::Outstanding);
        assert_eq!(Grade::from_percent(90), Grade::Outstanding);
        assert_eq!(Grade::from_percent(89), Grade::Great);
        assert_eq!(Grade::from_percent(50), Grade::KeepGoing);
        assert_eq!(Grade::from_percent(49), Grade::NeedsReview);
    }
}
