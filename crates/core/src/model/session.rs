use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::TopicIdentity;
use crate::scoring::Score;

/// Outcome of one completed session, computed once at completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionResult {
    pub topic: TopicIdentity,
    pub questions_answered: u32,
    pub questions_correct: u32,
    pub score_percent: u8,
    pub completed_at: DateTime<Utc>,
}

impl SessionResult {
    #[must_use]
    pub fn from_score(topic: TopicIdentity, score: &Score, completed_at: DateTime<Utc>) -> Self {
        Self {
            topic,
            questions_answered: score.total,
            questions_correct: score.correct,
            score_percent: score.percent,
            completed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DocumentId;
    use crate::scoring::percent_of;
    use crate::time::fixed_now;

    #[test]
    fn carries_score_fields() {
        let score = Score {
            correct: 3,
            total: 4,
            percent: percent_of(3, 4).unwrap(),
        };
        let result = SessionResult::from_score(
            TopicIdentity::document(DocumentId::new(9)),
            &score,
            fixed_now(),
        );
        assert_eq!(result.questions_answered, 4);
        assert_eq!(result.questions_correct, 3);
        assert_eq!(result.score_percent, 75);
        assert_eq!(result.completed_at, fixed_now());
    }
}
