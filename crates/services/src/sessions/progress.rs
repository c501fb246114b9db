use quiz_core::scoring::percent_of;

/// Live view of an in-progress session, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub total: usize,
    pub answered: usize,
    pub correct: usize,
    pub remaining: usize,
    pub percent_answered: u8,
    /// Every question answered; completion may be offered.
    pub can_complete: bool,
}

impl SessionProgress {
    #[must_use]
    pub fn new(total: usize, answered: usize, correct: usize) -> Self {
        let answered = answered.min(total);
        let percent_answered = percent_of(answered as u64, total as u64).unwrap_or(0);
        Self {
            total,
            answered,
            correct: correct.min(answered),
            remaining: total - answered,
            percent_answered,
            can_complete: total > 0 && answered == total,
        }
    }
}
