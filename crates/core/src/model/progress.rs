use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::TopicIdentity;
use crate::model::session::SessionResult;
use crate::scoring::percent_of;

/// Sessions needed for a topic to show full coverage.
const SESSIONS_FOR_FULL_COVERAGE: u32 = 10;

/// Cumulative statistics for one topic identity.
///
/// Only ever grows through [`ProgressAggregate::merged`]; `total_correct`
/// never exceeds `total_answered`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressAggregate {
    pub total_answered: u64,
    pub total_correct: u64,
    pub session_count: u32,
    #[serde(default)]
    pub last_score_percent: Option<u8>,
    #[serde(default)]
    pub last_session_at: Option<DateTime<Utc>>,
}

impl ProgressAggregate {
    /// Fold one session result into this aggregate.
    #[must_use]
    pub fn merged(&self, result: &SessionResult) -> Self {
        let answered = u64::from(result.questions_answered);
        let correct = u64::from(result.questions_correct.min(result.questions_answered));
        Self {
            total_answered: self.total_answered.saturating_add(answered),
            total_correct: self.total_correct.saturating_add(correct),
            session_count: self.session_count.saturating_add(1),
            last_score_percent: Some(result.score_percent),
            last_session_at: Some(result.completed_at),
        }
    }

    /// All-time accuracy, `None` until something was answered.
    #[must_use]
    pub fn accuracy_percent(&self) -> Option<u8> {
        percent_of(self.total_correct, self.total_answered)
    }

    /// Session-count driven coverage, capped at 100.
    #[must_use]
    pub fn coverage_percent(&self) -> u8 {
        let pct = self.session_count.min(SESSIONS_FOR_FULL_COVERAGE) * 100
            / SESSIONS_FOR_FULL_COVERAGE;
        u8::try_from(pct).unwrap_or(100)
    }

    #[must_use]
    pub fn is_covered(&self) -> bool {
        self.session_count > 0
    }
}

/// Cross-topic summary for the selection screen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressOverview {
    pub total_answered: u64,
    pub total_correct: u64,
    pub topics_covered: usize,
    pub topic_count: usize,
}

impl ProgressOverview {
    /// Summarize aggregates; `extra_topics` counts known topics without any
    /// aggregate yet (e.g. freshly uploaded documents).
    #[must_use]
    pub fn from_aggregates<'a, I>(aggregates: I, extra_topics: usize) -> Self
    where
        I: IntoIterator<Item = &'a ProgressAggregate>,
    {
        let mut overview = Self {
            topic_count: extra_topics,
            ..Self::default()
        };
        for aggregate in aggregates {
            overview.total_answered = overview
                .total_answered
                .saturating_add(aggregate.total_answered);
            overview.total_correct = overview
                .total_correct
                .saturating_add(aggregate.total_correct);
            overview.topic_count += 1;
            if aggregate.is_covered() {
                overview.topics_covered += 1;
            }
        }
        overview
    }

    #[must_use]
    pub fn from_entries(entries: &[(TopicIdentity, ProgressAggregate)]) -> Self {
        Self::from_aggregates(entries.iter().map(|(_, a)| a), 0)
    }

    /// Average score across all topics, 0 when nothing was answered.
    #[must_use]
    pub fn average_percent(&self) -> u8 {
        percent_of(self.total_correct, self.total_answered).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DocumentId;
    use crate::time::fixed_now;

    fn result(answered: u32, correct: u32, pct: u8) -> SessionResult {
        SessionResult {
            topic: TopicIdentity::document(DocumentId::new(1)),
            questions_answered: answered,
            questions_correct: correct,
            score_percent: pct,
            completed_at: fixed_now(),
        }
    }

    #[test]
    fn sequential_merges_accumulate() {
        let first = ProgressAggregate::default().merged(&result(5, 4, 80));
        let second = first.merged(&result(5, 3, 60));

        assert_eq!(second.total_answered, 10);
        assert_eq!(second.total_correct, 7);
        assert_eq!(second.session_count, 2);
        assert_eq!(second.last_score_percent, Some(60));
        assert_eq!(second.last_session_at, Some(fixed_now()));
    }

    #[test]
    fn merge_never_decreases_totals() {
        let mut agg = ProgressAggregate::default();
        for (answered, correct) in [(2, 2), (3, 0), (1, 1), (4, 2)] {
            let next = agg.merged(&result(answered, correct, 0));
            assert!(next.total_answered >= agg.total_answered);
            assert!(next.total_correct >= agg.total_correct);
            assert_eq!(next.session_count, agg.session_count + 1);
            assert!(next.total_correct <= next.total_answered);
            agg = next;
        }
    }

    #[test]
    fn derived_metrics() {
        let empty = ProgressAggregate::default();
        assert_eq!(empty.accuracy_percent(), None);
        assert_eq!(empty.coverage_percent(), 0);

        let mut agg = empty;
        for _ in 0..12 {
            agg = agg.merged(&result(3, 1, 33));
        }
        assert_eq!(agg.accuracy_percent(), Some(33));
        assert_eq!(agg.coverage_percent(), 100);
    }

    #[test]
    fn overview_counts_covered_topics() {
        let covered = ProgressAggregate::default().merged(&result(4, 3, 75));
        let untouched = ProgressAggregate::default();
        let overview = ProgressOverview::from_aggregates([&covered, &untouched], 2);

        assert_eq!(overview.total_answered, 4);
        assert_eq!(overview.total_correct, 3);
        assert_eq!(overview.topics_covered, 1);
        assert_eq!(overview.topic_count, 4);
        assert_eq!(overview.average_percent(), 75);
    }
}
