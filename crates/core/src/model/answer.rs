use std::collections::BTreeMap;

/// Selection recorded for a single question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerEntry {
    pub option_index: usize,
    pub is_correct: bool,
}

/// Result of a `submit` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Recorded(AnswerEntry),
    /// The question was already answered; the existing entry is kept.
    AlreadyAnswered(AnswerEntry),
}

impl SubmitOutcome {
    #[must_use]
    pub fn entry(&self) -> AnswerEntry {
        match self {
            Self::Recorded(entry) | Self::AlreadyAnswered(entry) => *entry,
        }
    }

    #[must_use]
    pub fn is_new(&self) -> bool {
        matches!(self, Self::Recorded(_))
    }
}

/// Write-once accumulator of answers keyed by question index.
///
/// Correctness is supplied by the caller; the record never looks at quiz
/// content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerRecord {
    entries: BTreeMap<usize, AnswerEntry>,
}

impl AnswerRecord {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an answer unless the question already has one.
    pub fn submit(
        &mut self,
        question_index: usize,
        option_index: usize,
        is_correct: bool,
    ) -> SubmitOutcome {
        if let Some(existing) = self.entries.get(&question_index) {
            return SubmitOutcome::AlreadyAnswered(*existing);
        }
        let entry = AnswerEntry {
            option_index,
            is_correct,
        };
        self.entries.insert(question_index, entry);
        SubmitOutcome::Recorded(entry)
    }

    #[must_use]
    pub fn get(&self, question_index: usize) -> Option<AnswerEntry> {
        self.entries.get(&question_index).copied()
    }

    #[must_use]
    pub fn is_answered(&self, question_index: usize) -> bool {
        self.entries.contains_key(&question_index)
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn correct_count(&self) -> usize {
        self.entries.values().filter(|e| e.is_correct).count()
    }

    #[must_use]
    pub fn is_complete(&self, total_questions: usize) -> bool {
        self.answered_count() == total_questions
    }

    /// Entries in ascending question order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, AnswerEntry)> + '_ {
        self.entries.iter().map(|(i, e)| (*i, *e))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
