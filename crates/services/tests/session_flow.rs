use quiz_core::model::{DocumentId, Question, Quiz, QuizOption, TopicIdentity};
use quiz_core::scoring::Grade;
use quiz_core::time::fixed_now;
use services::{AppServices, Clock, ProgressBackend, SessionError, SessionStage};
use storage::repository::{DocumentRecord, Storage, StorageError};

fn quiz_with_first_option_correct(questions: usize) -> Quiz {
    let questions = (0..questions)
        .map(|i| {
            Question::new(
                format!("Question {i}"),
                vec![
                    QuizOption::new("correct", true, "this is the one"),
                    QuizOption::new("distractor 1", false, "not this"),
                    QuizOption::new("distractor 2", false, "not this either"),
                    QuizOption::new("distractor 3", false, "no"),
                ],
            )
        })
        .collect();
    Quiz::new(questions).unwrap()
}

#[tokio::test]
async fn two_question_session_merges_into_empty_aggregate() {
    let services = AppServices::new(
        Storage::in_memory(),
        Clock::fixed(fixed_now()),
        ProgressBackend::Local,
    );
    let topic = TopicIdentity::topic("Cardiology").unwrap();
    let mut controller = services.controller();

    controller
        .start(quiz_with_first_option_correct(2), topic.clone())
        .unwrap();
    controller.record_answer(0, 0).unwrap();
    controller.record_answer(1, 1).unwrap();
    // re-answering is ignored
    controller.record_answer(1, 0).unwrap();

    let done = controller.complete().await.unwrap();
    let result = done.result();
    assert_eq!(result.questions_correct, 1);
    assert_eq!(result.questions_answered, 2);
    assert_eq!(result.score_percent, 50);
    assert_eq!(result.completed_at, fixed_now());
    assert_eq!(done.grade(), Grade::KeepGoing);

    let aggregate = done.aggregate();
    assert_eq!(aggregate.total_answered, 2);
    assert_eq!(aggregate.total_correct, 1);
    assert_eq!(aggregate.session_count, 1);
    assert_eq!(aggregate.last_score_percent, Some(50));

    let rows = done.breakdown();
    assert_eq!(rows[1].chosen, Some(1));
    assert_eq!(rows[1].correct, Some(0));

    let stored = services.progress_store().get(&topic).await.unwrap();
    assert_eq!(stored.as_ref(), Some(aggregate));
}

#[tokio::test]
async fn every_question_answered_allows_completion() {
    let services = AppServices::new(
        Storage::in_memory(),
        Clock::fixed(fixed_now()),
        ProgressBackend::Local,
    );
    for n in 1..=6 {
        let mut controller = services.controller();
        controller
            .start(
                quiz_with_first_option_correct(n),
                TopicIdentity::topic(format!("Topic {n}")).unwrap(),
            )
            .unwrap();
        for i in 0..n {
            assert!(!controller.progress().unwrap().can_complete);
            controller.record_answer(i, i % 4).unwrap();
        }
        assert!(controller.active().unwrap().is_complete());
        controller.complete().await.unwrap();
    }

    let overview = services.progress_summaries().overview().await.unwrap();
    assert_eq!(overview.topics_covered, 6);
    assert_eq!(overview.total_answered, 21);
}

#[tokio::test]
async fn server_backend_merges_into_the_catalog() {
    let storage = Storage::in_memory();
    storage
        .catalog
        .upsert_document(&DocumentRecord::new(DocumentId::new(1), "Pharmacology"))
        .await
        .unwrap();
    let services = AppServices::new(storage, Clock::fixed(fixed_now()), ProgressBackend::Server);
    let topic = TopicIdentity::document(DocumentId::new(1));

    for correct_answers in [4_usize, 3] {
        let mut controller = services.controller();
        controller
            .start(quiz_with_first_option_correct(5), topic.clone())
            .unwrap();
        for i in 0..5 {
            let option = usize::from(i >= correct_answers);
            controller.record_answer(i, option).unwrap();
        }
        controller.complete().await.unwrap();
    }

    let stored = services
        .storage()
        .catalog
        .get_progress(DocumentId::new(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.total_answered, 10);
    assert_eq!(stored.total_correct, 7);
    assert_eq!(stored.session_count, 2);
    assert_eq!(stored.last_score_percent, Some(60));

    let topics = services.progress_summaries().topics().await.unwrap();
    assert_eq!(topics[0].label, "Pharmacology");
    assert_eq!(topics[0].accuracy, Some(70));
}

#[tokio::test]
async fn server_backend_failure_keeps_the_session_in_progress() {
    let services = AppServices::new(
        Storage::in_memory(),
        Clock::fixed(fixed_now()),
        ProgressBackend::Server,
    );
    let topic = TopicIdentity::document(DocumentId::new(42));
    let mut controller = services.controller();
    controller
        .start(quiz_with_first_option_correct(2), topic)
        .unwrap();
    controller.record_answer(0, 0).unwrap();
    controller.record_answer(1, 0).unwrap();

    // document 42 is not in the catalog yet
    let err = controller.complete().await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Persistence(StorageError::NotFound)
    ));
    assert_eq!(controller.stage(), SessionStage::InProgress);

    services
        .storage()
        .catalog
        .upsert_document(&DocumentRecord::new(DocumentId::new(42), "Renal"))
        .await
        .unwrap();
    let done = controller.complete().await.unwrap();
    assert_eq!(done.aggregate().session_count, 1);
    assert_eq!(done.result().score_percent, 100);
}
