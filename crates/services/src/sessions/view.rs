use std::sync::Arc;

use quiz_core::model::{
    AnswerRecord, ProgressAggregate, ProgressOverview, Quiz, SessionResult, TopicIdentity,
};
use quiz_core::scoring::{Grade, QuestionBreakdown};
use storage::repository::{ProgressStore, StorageError};

use super::service::ActiveSession;
use crate::progress::ProgressGateway;

//
// ─── RESULTS ───────────────────────────────────────────────────────────────────
//

/// A session whose result was merged into its topic's aggregate.
///
/// Only exists after a successful merge, so the score shown from it is
/// always backed by the store.
#[derive(Debug, Clone)]
pub struct CompletedSession {
    quiz: Quiz,
    topic: TopicIdentity,
    answers: AnswerRecord,
    result: SessionResult,
    aggregate: ProgressAggregate,
    breakdown: Vec<QuestionBreakdown>,
}

impl CompletedSession {
    pub(crate) fn new(
        active: ActiveSession,
        result: SessionResult,
        aggregate: ProgressAggregate,
        breakdown: Vec<QuestionBreakdown>,
    ) -> Self {
        let (quiz, topic, answers) = active.into_parts();
        Self {
            quiz,
            topic,
            answers,
            result,
            aggregate,
            breakdown,
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
    pub fn result(&self) -> &SessionResult {
        &self.result
    }

    /// Aggregate returned by the merge.
    #[must_use]
    pub fn aggregate(&self) -> &ProgressAggregate {
        &self.aggregate
    }

    #[must_use]
    pub fn breakdown(&self) -> &[QuestionBreakdown] {
        &self.breakdown
    }

    #[must_use]
    pub fn grade(&self) -> Grade {
        Grade::from_percent(self.result.score_percent)
    }
}

//
// ─── SUMMARIES ─────────────────────────────────────────────────────────────────
//

/// One row of the topic selection screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicProgressItem {
    pub topic: TopicIdentity,
    pub label: String,
    /// `None` for a known document that was never quizzed.
    pub aggregate: Option<ProgressAggregate>,
    pub accuracy: Option<u8>,
    pub coverage: u8,
}

impl TopicProgressItem {
    fn new(topic: TopicIdentity, label: String, aggregate: Option<ProgressAggregate>) -> Self {
        let accuracy = aggregate.as_ref().and_then(ProgressAggregate::accuracy_percent);
        let coverage = aggregate.as_ref().map_or(0, ProgressAggregate::coverage_percent);
        Self {
            topic,
            label,
            aggregate,
            accuracy,
            coverage,
        }
    }
}

fn label_for(topic: &TopicIdentity) -> String {
    match topic {
        TopicIdentity::Topic(name) => name.as_str().to_owned(),
        TopicIdentity::Document(id) => format!("Document {id}"),
    }
}

enum SummarySource {
    Store(Arc<dyn ProgressStore>),
    Catalog(Arc<dyn ProgressGateway>),
}

/// Read-only summaries over whichever backend holds the aggregates.
pub struct ProgressSummaryService {
    source: SummarySource,
}

impl ProgressSummaryService {
    #[must_use]
    pub fn new(store: Arc<dyn ProgressStore>) -> Self {
        Self {
            source: SummarySource::Store(store),
        }
    }

    /// Summaries from the server catalog, which also lists documents that
    /// were never quizzed.
    #[must_use]
    pub fn with_catalog(gateway: Arc<dyn ProgressGateway>) -> Self {
        Self {
            source: SummarySource::Catalog(gateway),
        }
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    pub async fn topics(&self) -> Result<Vec<TopicProgressItem>, StorageError> {
        match &self.source {
            SummarySource::Store(store) => {
                let mut items: Vec<TopicProgressItem> = store
                    .list()
                    .await?
                    .into_iter()
                    .map(|(topic, aggregate)| {
                        let label = label_for(&topic);
                        TopicProgressItem::new(topic, label, Some(aggregate))
                    })
                    .collect();
                items.sort_by(|a, b| a.label.cmp(&b.label));
                Ok(items)
            }
            SummarySource::Catalog(gateway) => {
                let entries = gateway.catalog().await?;
                Ok(entries
                    .into_iter()
                    .map(|entry| {
                        TopicProgressItem::new(
                            TopicIdentity::document(entry.document.id),
                            entry.document.name,
                            entry.progress,
                        )
                    })
                    .collect())
            }
        }
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    pub async fn overview(&self) -> Result<ProgressOverview, StorageError> {
        let items = self.topics().await?;
        Ok(overview_of(&items))
    }
}

fn overview_of(items: &[TopicProgressItem]) -> ProgressOverview {
    let unquizzed = items.iter().filter(|i| i.aggregate.is_none()).count();
    ProgressOverview::from_aggregates(items.iter().filter_map(|i| i.aggregate.as_ref()), unquizzed)
}
