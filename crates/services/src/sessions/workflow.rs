use std::sync::Arc;

use quiz_core::model::{Quiz, TopicIdentity};
use storage::repository::ProgressStore;

use super::progress::SessionProgress;
use super::service::{ActiveSession, AnswerReveal};
use super::view::CompletedSession;
use crate::error::SessionError;
use crate::gate::{AlwaysAllow, SessionGate};
use crate::Clock;

/// Coarse stage of the controller, for presentation layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStage {
    Selecting,
    InProgress,
    Completed,
}

enum Stage {
    Selecting,
    InProgress(ActiveSession),
    Completed(CompletedSession),
}

/// Owns the lifecycle of one quiz session at a time:
/// `Selecting -> InProgress -> Completed -> Selecting`.
///
/// `complete` takes `&mut self`, so a controller can never issue a second
/// merge while one is outstanding.
pub struct SessionController {
    clock: Clock,
    progress: Arc<dyn ProgressStore>,
    gate: Arc<dyn SessionGate>,
    stage: Stage,
}

impl SessionController {
    #[must_use]
    pub fn new(clock: Clock, progress: Arc<dyn ProgressStore>) -> Self {
        Self {
            clock,
            progress,
            gate: Arc::new(AlwaysAllow),
            stage: Stage::Selecting,
        }
    }

    #[must_use]
    pub fn with_gate(mut self, gate: Arc<dyn SessionGate>) -> Self {
        self.gate = gate;
        self
    }

    #[must_use]
    pub fn stage(&self) -> SessionStage {
        match self.stage {
            Stage::Selecting => SessionStage::Selecting,
            Stage::InProgress(_) => SessionStage::InProgress,
            Stage::Completed(_) => SessionStage::Completed,
        }
    }

    /// The session being played, if any.
    #[must_use]
    pub fn active(&self) -> Option<&ActiveSession> {
        match &self.stage {
            Stage::InProgress(active) => Some(active),
            _ => None,
        }
    }

    /// The results view of the last completed session.
    #[must_use]
    pub fn results(&self) -> Option<&CompletedSession> {
        match &self.stage {
            Stage::Completed(done) => Some(done),
            _ => None,
        }
    }

    #[must_use]
    pub fn progress(&self) -> Option<SessionProgress> {
        self.active().map(ActiveSession::progress)
    }

    /// Begin a session for `topic`. An unfinished session is discarded and
    /// never merged.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotAllowed` if the gate refuses; the stage is
    /// unchanged.
    pub fn start(
        &mut self,
        quiz: Quiz,
        topic: TopicIdentity,
    ) -> Result<SessionProgress, SessionError> {
        if !self.gate.is_session_allowed() {
            return Err(SessionError::NotAllowed);
        }
        let active = ActiveSession::new(quiz, topic, self.clock.now());

        if let Stage::InProgress(previous) = &self.stage {
            tracing::debug!(
                topic = %previous.topic(),
                answered = previous.answers().answered_count(),
                "discarding unfinished session"
            );
        }
        tracing::info!(
            topic = %active.topic(),
            questions = active.total_questions(),
            "session started"
        );

        let progress = active.progress();
        self.stage = Stage::InProgress(active);
        Ok(progress)
    }

    /// Record an answer for the active session. Re-answering a question is a
    /// no-op that reveals the answer on record.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotInProgress` outside `InProgress`, or an
    /// out-of-range error for unknown indexes.
    pub fn record_answer(
        &mut self,
        question_index: usize,
        option_index: usize,
    ) -> Result<AnswerReveal, SessionError> {
        match &mut self.stage {
            Stage::InProgress(active) => active.answer(question_index, option_index),
            _ => Err(SessionError::NotInProgress),
        }
    }

    /// Score the session, merge it into the topic's aggregate exactly once and
    /// move to `Completed`.
    ///
    /// # Errors
    ///
    /// - `SessionError::NotInProgress` outside `InProgress`.
    /// - `SessionError::IncompleteSession` while questions are unanswered.
    /// - `SessionError::Persistence` if the merge fails; the session stays
    ///   `InProgress` with its answers so the call can be retried.
    /// - `SessionError::MergeAbandoned` if a previous call was dropped while
    ///   its merge was in flight. The merge may have landed, so the session is
    ///   dropped back to `Selecting` instead of being merged again.
    pub async fn complete(&mut self) -> Result<&CompletedSession, SessionError> {
        let Stage::InProgress(active) = &mut self.stage else {
            return Err(SessionError::NotInProgress);
        };
        if active.merge_pending() {
            tracing::warn!(topic = %active.topic(), "dropping session whose merge was abandoned");
            self.stage = Stage::Selecting;
            return Err(SessionError::MergeAbandoned);
        }
        if !active.is_complete() {
            return Err(SessionError::IncompleteSession {
                answered: active.answers().answered_count(),
                total: active.total_questions(),
            });
        }

        let (result, breakdown) = active.build_result(self.clock.now())?;
        active.set_merge_pending(true);
        let aggregate = match self.progress.merge(active.topic(), &result).await {
            Ok(aggregate) => aggregate,
            Err(err) => {
                active.set_merge_pending(false);
                tracing::warn!(topic = %active.topic(), error = %err, "progress merge failed");
                return Err(SessionError::Persistence(err));
            }
        };
        tracing::info!(
            topic = %result.topic,
            score = result.score_percent,
            sessions = aggregate.session_count,
            "session completed"
        );

        match std::mem::replace(&mut self.stage, Stage::Selecting) {
            Stage::InProgress(active) => {
                self.stage = Stage::Completed(CompletedSession::new(
                    active, result, aggregate, breakdown,
                ));
            }
            other => self.stage = other,
        }
        self.results().ok_or(SessionError::NotInProgress)
    }

    /// Drop whatever is active and go back to `Selecting`.
    pub fn restart(&mut self) {
        if matches!(self.stage, Stage::InProgress(_)) {
            tracing::debug!("restart discarded an unfinished session");
        }
        self.stage = Stage::Selecting;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::SwitchGate;
    use async_trait::async_trait;
    use quiz_core::model::{ProgressAggregate, Question, QuizOption, SessionResult};
    use quiz_core::time::fixed_clock;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use storage::local::LocalProgressStore;
    use storage::repository::{InMemoryRepository, StorageError};

    /// Local store that can be told to fail, counting attempted merges.
    struct FlakyStore {
        inner: LocalProgressStore,
        failing: AtomicBool,
        merges: AtomicUsize,
    }

    impl FlakyStore {
        fn new(failing: bool) -> Self {
            Self {
                inner: LocalProgressStore::new(Arc::new(InMemoryRepository::new())),
                failing: AtomicBool::new(failing),
                merges: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ProgressStore for FlakyStore {
        async fn get(
            &self,
            topic: &TopicIdentity,
        ) -> Result<Option<ProgressAggregate>, StorageError> {
            self.inner.get(topic).await
        }

        async fn merge(
            &self,
            topic: &TopicIdentity,
            result: &SessionResult,
        ) -> Result<ProgressAggregate, StorageError> {
            self.merges.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(StorageError::Connection("offline".into()));
            }
            self.inner.merge(topic, result).await
        }

        async fn list(&self) -> Result<Vec<(TopicIdentity, ProgressAggregate)>, StorageError> {
            self.inner.list().await
        }
    }

    /// Commits the merge, then stalls forever the first time it is called.
    struct StallAfterCommit {
        inner: LocalProgressStore,
        stall: AtomicBool,
    }

    #[async_trait]
    impl ProgressStore for StallAfterCommit {
        async fn get(
            &self,
            topic: &TopicIdentity,
        ) -> Result<Option<ProgressAggregate>, StorageError> {
            self.inner.get(topic).await
        }

        async fn merge(
            &self,
            topic: &TopicIdentity,
            result: &SessionResult,
        ) -> Result<ProgressAggregate, StorageError> {
            let merged = self.inner.merge(topic, result).await?;
            if self.stall.swap(false, Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            Ok(merged)
        }

        async fn list(&self) -> Result<Vec<(TopicIdentity, ProgressAggregate)>, StorageError> {
            self.inner.list().await
        }
    }

    fn two_question_quiz() -> Quiz {
        let q = |prompt: &str| {
            Question::new(
                prompt,
                vec![
                    QuizOption::new("a", true, "a is right"),
                    QuizOption::new("b", false, "b is wrong"),
                    QuizOption::new("c", false, "c is wrong"),
                    QuizOption::new("d", false, "d is wrong"),
                ],
            )
        };
        Quiz::new(vec![q("Q0"), q("Q1")]).unwrap()
    }

    fn topic() -> TopicIdentity {
        TopicIdentity::topic("Cardiology").unwrap()
    }

    fn controller(store: Arc<FlakyStore>) -> SessionController {
        SessionController::new(fixed_clock(), store)
    }

    #[tokio::test]
    async fn completes_and_merges_once() {
        let store = Arc::new(FlakyStore::new(false));
        let mut ctl = controller(store.clone());
        assert_eq!(ctl.stage(), SessionStage::Selecting);

        ctl.start(two_question_quiz(), topic()).unwrap();
        assert!(ctl.record_answer(0, 0).unwrap().is_correct());
        assert!(!ctl.record_answer(1, 1).unwrap().is_correct());

        let done = ctl.complete().await.unwrap();
        assert_eq!(done.result().score_percent, 50);
        assert_eq!(done.aggregate().total_answered, 2);
        assert_eq!(done.aggregate().total_correct, 1);
        assert_eq!(done.aggregate().session_count, 1);
        assert_eq!(ctl.stage(), SessionStage::Completed);

        assert!(matches!(
            ctl.complete().await,
            Err(SessionError::NotInProgress)
        ));
        assert_eq!(store.merges.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn incomplete_session_is_rejected() {
        let store = Arc::new(FlakyStore::new(false));
        let mut ctl = controller(store.clone());
        ctl.start(two_question_quiz(), topic()).unwrap();
        ctl.record_answer(0, 0).unwrap();

        let err = ctl.complete().await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::IncompleteSession {
                answered: 1,
                total: 2
            }
        ));
        assert_eq!(ctl.stage(), SessionStage::InProgress);
        assert_eq!(ctl.active().unwrap().answers().answered_count(), 1);
        assert_eq!(store.merges.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_merge_keeps_answers_for_retry() {
        let store = Arc::new(FlakyStore::new(true));
        let mut ctl = controller(store.clone());
        ctl.start(two_question_quiz(), topic()).unwrap();
        ctl.record_answer(0, 0).unwrap();
        ctl.record_answer(1, 0).unwrap();

        let err = ctl.complete().await.unwrap_err();
        assert!(matches!(err, SessionError::Persistence(_)));
        assert_eq!(ctl.stage(), SessionStage::InProgress);
        assert_eq!(ctl.active().unwrap().answers().correct_count(), 2);
        assert!(!ctl.active().unwrap().merge_pending());
        assert!(store.get(&topic()).await.unwrap().is_none());

        store.failing.store(false, Ordering::SeqCst);
        let done = ctl.complete().await.unwrap();
        assert_eq!(done.result().score_percent, 100);
        assert_eq!(done.aggregate().session_count, 1);
        assert_eq!(store.merges.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn abandoned_merge_is_never_repeated() {
        let store = Arc::new(StallAfterCommit {
            inner: LocalProgressStore::new(Arc::new(InMemoryRepository::new())),
            stall: AtomicBool::new(true),
        });
        let mut ctl = SessionController::new(fixed_clock(), store.clone());
        ctl.start(two_question_quiz(), topic()).unwrap();
        ctl.record_answer(0, 0).unwrap();
        ctl.record_answer(1, 1).unwrap();

        let abandoned =
            tokio::time::timeout(std::time::Duration::from_millis(50), ctl.complete()).await;
        assert!(abandoned.is_err());
        assert_eq!(ctl.stage(), SessionStage::InProgress);
        assert!(ctl.active().unwrap().merge_pending());

        assert!(matches!(
            ctl.complete().await,
            Err(SessionError::MergeAbandoned)
        ));
        assert_eq!(ctl.stage(), SessionStage::Selecting);

        let stored = store.get(&topic()).await.unwrap().unwrap();
        assert_eq!(stored.session_count, 1);
        assert_eq!(stored.total_answered, 2);
    }

    #[tokio::test]
    async fn restart_starts_an_independent_session() {
        let store = Arc::new(FlakyStore::new(false));
        let mut ctl = controller(store.clone());
        ctl.start(two_question_quiz(), topic()).unwrap();
        ctl.record_answer(0, 0).unwrap();
        ctl.record_answer(1, 0).unwrap();
        ctl.complete().await.unwrap();

        ctl.restart();
        assert_eq!(ctl.stage(), SessionStage::Selecting);
        assert!(ctl.results().is_none());

        ctl.start(two_question_quiz(), topic()).unwrap();
        assert_eq!(ctl.progress().unwrap().answered, 0);
        ctl.record_answer(0, 2).unwrap();
        ctl.record_answer(1, 3).unwrap();
        let done = ctl.complete().await.unwrap();

        assert_eq!(done.result().questions_correct, 0);
        assert_eq!(done.aggregate().total_answered, 4);
        assert_eq!(done.aggregate().total_correct, 2);
        assert_eq!(done.aggregate().session_count, 2);
    }

    #[tokio::test]
    async fn start_discards_unfinished_session() {
        let store = Arc::new(FlakyStore::new(false));
        let mut ctl = controller(store.clone());
        ctl.start(two_question_quiz(), topic()).unwrap();
        ctl.record_answer(0, 0).unwrap();

        let fresh = ctl.start(two_question_quiz(), topic()).unwrap();
        assert_eq!(fresh.answered, 0);
        assert_eq!(store.merges.load(Ordering::SeqCst), 0);
        assert!(store.list().await.unwrap().is_empty());
    }

    #[test]
    fn answers_outside_a_session_are_rejected() {
        let mut ctl = controller(Arc::new(FlakyStore::new(false)));
        assert!(matches!(
            ctl.record_answer(0, 0),
            Err(SessionError::NotInProgress)
        ));
    }

    #[test]
    fn gate_blocks_start() {
        let gate = Arc::new(SwitchGate::new(false));
        let mut ctl = controller(Arc::new(FlakyStore::new(false))).with_gate(gate.clone());

        assert!(matches!(
            ctl.start(two_question_quiz(), topic()),
            Err(SessionError::NotAllowed)
        ));
        assert_eq!(ctl.stage(), SessionStage::Selecting);

        gate.set_allowed(true);
        ctl.start(two_question_quiz(), topic()).unwrap();
        assert_eq!(ctl.stage(), SessionStage::InProgress);
    }
}
