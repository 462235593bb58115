use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use assess_core::model::{
    AssessmentOutcome, DifficultyRank, LearningCategory, Lesson, Module, ModuleId, Question,
    QuestionId, SessionPhase,
};
use assess_core::time::fixed_now;
use async_trait::async_trait;
use services::{
    AssessmentEngine, AssessmentError, AssessmentSession, Clock, ExpiryFuture, ManualTimer,
    QuestionTicket, RepositorySink, ResultSink, SessionPrompt, SessionRegistry, SessionStep,
    SinkError, TimerHandle, TimerService, TokioTimer,
};
use storage::repository::{InMemoryRepository, QuestionBank, RoadmapRepository, StorageError};

const LESSONS: [&str; 4] = ["Variables", "Loops", "Functions", "Classes"];

fn question(lesson: &str, rank: DifficultyRank) -> Question {
    question_with_id(lesson, rank, format!("{lesson}-{rank}"))
}

fn question_with_id(lesson: &str, rank: DifficultyRank, id: String) -> Question {
    Question::new(
        QuestionId::new(id),
        lesson,
        format!("{rank} question about {lesson}"),
        vec![
            ("A".to_string(), "right".to_string()),
            ("B".to_string(), "wrong".to_string()),
        ],
        "A",
        rank,
    )
    .unwrap()
}

fn add_module(repo: &InMemoryRepository, id: u64, lessons: &[&str]) {
    let module = Module::new(ModuleId::new(id), format!("Module {id}"), None).unwrap();
    let lessons = (1_u32..)
        .zip(lessons)
        .map(|(ordinal, name)| Lesson::new(ordinal, *name).unwrap())
        .collect();
    repo.add_module(module, lessons).unwrap();
}

/// Modules 1..=4 hold the first 1..=4 lessons; module 9 has none; module 10
/// holds a lesson without authored questions; module 11 holds a lesson with
/// only a medium question.
fn catalog() -> InMemoryRepository {
    let repo = InMemoryRepository::new();
    for n in 1..=4 {
        add_module(&repo, n, &LESSONS[..usize::try_from(n).unwrap()]);
    }
    add_module(&repo, 9, &[]);
    add_module(&repo, 10, &["Unwritten"]);
    add_module(&repo, 11, &["Half Written"]);
    for lesson in LESSONS {
        for rank in DifficultyRank::SEQUENCE {
            repo.add_question(question(lesson, rank)).unwrap();
        }
    }
    repo.add_question(question("Half Written", DifficultyRank::Medium))
        .unwrap();
    repo
}

struct Harness {
    engine: AssessmentEngine,
    timer: ManualTimer,
    repo: InMemoryRepository,
}

fn harness() -> Harness {
    let repo = catalog();
    let timer = ManualTimer::new();
    let engine = AssessmentEngine::new(
        Arc::new(repo.clone()),
        Arc::new(timer.clone()),
        Arc::new(RepositorySink::new(Arc::new(repo.clone()))),
    )
    .with_clock(Clock::fixed(fixed_now()));
    Harness {
        engine,
        timer,
        repo,
    }
}

fn issued(step: &SessionStep) -> QuestionTicket {
    match &step.prompt {
        SessionPrompt::Question { ticket, .. } => ticket.clone(),
        other => panic!("expected a question prompt, got {other:?}"),
    }
}

async fn stored_outcomes(repo: &InMemoryRepository, module: u64) -> Vec<AssessmentOutcome> {
    repo.list_outcomes(ModuleId::new(module), 100)
        .await
        .unwrap()
        .into_iter()
        .map(|row| row.outcome)
        .collect()
}

#[tokio::test]
async fn strong_and_unconfident_lessons_land_in_opposite_phases() {
    let h = harness();
    let (session, step) = h.engine.start_session(ModuleId::new(2)).await.unwrap();
    assert!(matches!(
        step.prompt,
        SessionPrompt::Confidence { position: 1, total: 2, .. }
    ));

    let step = session.submit_confidence(true).await.unwrap();
    let q1 = issued(&step);
    let step = session.submit_answer(&q1, Some("A")).await.unwrap();
    let q2 = issued(&step);
    let step = session.submit_answer(&q2, Some("a")).await.unwrap();

    let classified = step.classified.unwrap();
    assert_eq!(classified.lesson_name(), "Variables");
    assert_eq!(classified.category(), LearningCategory::StrongTopic);
    let SessionPrompt::Confidence { lesson, .. } = step.prompt else {
        panic!("expected the next lesson's confidence check");
    };
    assert_eq!(lesson.name(), "Loops");

    let step = session.submit_confidence(false).await.unwrap();
    let SessionPrompt::Completed { roadmap } = step.prompt else {
        panic!("expected completion");
    };
    assert_eq!(roadmap.phase1.topics, vec!["Loops".to_string()]);
    assert!(roadmap.phase2.topics.is_empty());
    assert_eq!(roadmap.phase3.topics, vec!["Variables".to_string()]);
    assert_eq!(roadmap.completion_percentage, 50);

    assert_eq!(session.phase().await, SessionPhase::Completed);
    assert!(session.is_published().await);
    let stored = stored_outcomes(&h.repo, 2).await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].roadmap, roadmap);
    assert_eq!(stored[0].session_id, session.id());
}

#[tokio::test]
async fn timed_out_second_answer_is_suggested_learning() {
    let h = harness();
    let (session, _) = h.engine.start_session(ModuleId::new(1)).await.unwrap();

    let step = session.submit_confidence(true).await.unwrap();
    assert_eq!(h.timer.pending(), 1);
    let q1 = issued(&step);
    session.submit_answer(&q1, Some("A")).await.unwrap();
    assert_eq!(h.timer.pending(), 1);

    let handle = h.timer.pending_handles()[0];
    assert_eq!(h.timer.armed_duration(handle), Some(Duration::from_secs(45)));
    assert!(session.last_result().await.is_none());
    assert!(h.timer.fire(handle).await);

    let outcome = session.outcome().await.expect("session completed by timeout");
    let result = &outcome.results[0];
    assert_eq!(result.category(), LearningCategory::SuggestedLearning);
    assert_eq!(result.accuracy(), 50.0);

    let timed_out = &result.responses()[1];
    assert_eq!(timed_out.selected_label, None);
    assert!(!timed_out.correct);
    assert_eq!(timed_out.elapsed_seconds, 45);
    assert_eq!(outcome.summary.timeouts, 1);
    assert_eq!(h.timer.pending(), 0);
    assert_eq!(session.last_result().await.as_ref(), Some(result));
}

#[tokio::test]
async fn abort_mid_lesson_emits_nothing_and_rejects_submissions() {
    let h = harness();
    let (session, _) = h.engine.start_session(ModuleId::new(3)).await.unwrap();

    session.submit_confidence(false).await.unwrap();
    let step = session.submit_confidence(true).await.unwrap();
    let q1 = issued(&step);

    session.abort().await.unwrap();
    assert_eq!(h.timer.pending(), 0);
    assert_eq!(session.phase().await, SessionPhase::Aborted);
    assert!(session.outcome().await.is_none());
    assert!(session.current_prompt().await.is_none());

    assert!(matches!(
        session.submit_confidence(true).await,
        Err(AssessmentError::InvalidState { .. })
    ));
    assert!(matches!(
        session.submit_answer(&q1, Some("A")).await,
        Err(AssessmentError::InvalidState { .. })
    ));
    assert!(matches!(
        session.select_module(ModuleId::new(1)).await,
        Err(AssessmentError::InvalidState { .. })
    ));
    assert!(matches!(
        session.finalize().await,
        Err(AssessmentError::InvalidState { .. })
    ));

    session.abort().await.unwrap();
    assert!(stored_outcomes(&h.repo, 3).await.is_empty());
    assert_eq!(session.progress().await.completed_lessons, 1);
}

#[tokio::test]
async fn manual_answer_after_timeout_is_double_submission() {
    let h = harness();
    let (session, _) = h.engine.start_session(ModuleId::new(1)).await.unwrap();
    let q1 = issued(&session.submit_confidence(true).await.unwrap());

    assert!(h.timer.fire_next().await);

    let err = session.submit_answer(&q1, Some("A")).await.unwrap_err();
    assert!(matches!(err, AssessmentError::DoubleSubmission(ref id) if id == q1.question_id()));

    let progress = session.progress().await;
    assert_eq!(progress.questions_answered, 1);
    assert_eq!(progress.correct_answers, 0);
    assert!(matches!(
        session.current_prompt().await,
        Some(SessionPrompt::Question { number: 2, .. })
    ));
}

#[tokio::test]
async fn answering_the_last_question_twice_is_double_submission() {
    let h = harness();
    let (session, _) = h.engine.start_session(ModuleId::new(1)).await.unwrap();
    let q1 = issued(&session.submit_confidence(true).await.unwrap());
    let q2 = issued(&session.submit_answer(&q1, Some("A")).await.unwrap());
    session.submit_answer(&q2, Some("B")).await.unwrap();

    assert!(matches!(
        session.submit_answer(&q2, Some("A")).await,
        Err(AssessmentError::DoubleSubmission(_))
    ));
    let outcome = session.outcome().await.unwrap();
    assert_eq!(outcome.results[0].responses().len(), 2);
}

/// Timer whose expiry is already in flight when the answer arrives.
#[derive(Clone, Default)]
struct UncancellableTimer(ManualTimer);

impl TimerService for UncancellableTimer {
    fn arm(&self, duration: Duration, on_expire: ExpiryFuture) -> TimerHandle {
        self.0.arm(duration, on_expire)
    }

    fn disarm(&self, _handle: TimerHandle) {}
}

#[tokio::test]
async fn timeout_losing_the_race_is_dropped() {
    let repo = catalog();
    let timer = UncancellableTimer::default();
    let engine = AssessmentEngine::new(
        Arc::new(repo.clone()),
        Arc::new(timer.clone()),
        Arc::new(RepositorySink::new(Arc::new(repo.clone()))),
    );
    let (session, _) = engine.start_session(ModuleId::new(1)).await.unwrap();

    let q1 = issued(&session.submit_confidence(true).await.unwrap());
    let stale = timer.0.pending_handles()[0];
    session.submit_answer(&q1, Some("A")).await.unwrap();

    assert!(timer.0.fire(stale).await);

    let progress = session.progress().await;
    assert_eq!(progress.questions_answered, 1);
    assert_eq!(progress.correct_answers, 1);
    assert_eq!(progress.phase, SessionPhase::Testing);
}

#[tokio::test]
async fn elapsed_time_is_measured_from_issue_and_capped() {
    let h = harness();
    let (session, _) = h.engine.start_session(ModuleId::new(1)).await.unwrap();
    let q1 = issued(&session.submit_confidence(true).await.unwrap());

    let step = session
        .submit_answer_at(&q1, Some("A"), fixed_now() + chrono::Duration::seconds(12))
        .await
        .unwrap();
    let q2 = issued(&step);
    session
        .submit_answer_at(&q2, Some("A"), fixed_now() + chrono::Duration::seconds(300))
        .await
        .unwrap();

    let outcome = session.outcome().await.unwrap();
    let elapsed: Vec<_> = outcome.results[0]
        .responses()
        .iter()
        .map(|r| r.elapsed_seconds)
        .collect();
    assert_eq!(elapsed, [12, 45]);
}

#[tokio::test]
async fn unknown_and_empty_modules_fail_selection() {
    let h = harness();

    let session = h.engine.new_session();
    assert!(matches!(
        session.select_module(ModuleId::new(77)).await,
        Err(AssessmentError::NotFound(_))
    ));
    assert!(matches!(
        session.select_module(ModuleId::new(9)).await,
        Err(AssessmentError::NoLessons(id)) if id == ModuleId::new(9)
    ));
    assert_eq!(session.phase().await, SessionPhase::ModuleSelection);

    session.select_module(ModuleId::new(1)).await.unwrap();
    assert_eq!(session.phase().await, SessionPhase::ConfidenceCheck);
}

#[tokio::test]
async fn missing_question_is_not_found_and_aborts() {
    let h = harness();
    let (session, _) = h.engine.start_session(ModuleId::new(10)).await.unwrap();
    assert!(matches!(
        session.submit_confidence(true).await,
        Err(AssessmentError::NotFound(_))
    ));
    assert_eq!(h.timer.pending(), 0);
    assert_eq!(session.phase().await, SessionPhase::Aborted);
    assert!(session.current_prompt().await.is_none());
    assert!(session.outcome().await.is_none());
}

#[tokio::test]
async fn missing_hard_question_after_answer_aborts() {
    let h = harness();
    let (session, _) = h.engine.start_session(ModuleId::new(11)).await.unwrap();
    let q1 = issued(&session.submit_confidence(true).await.unwrap());

    assert!(matches!(
        session.submit_answer(&q1, Some("A")).await,
        Err(AssessmentError::NotFound(_))
    ));
    assert_eq!(session.phase().await, SessionPhase::Aborted);
    assert_eq!(h.timer.pending(), 0);
    assert!(matches!(
        session.submit_answer(&q1, Some("A")).await,
        Err(AssessmentError::InvalidState { .. })
    ));
}

#[tokio::test]
async fn missing_hard_question_after_timeout_aborts() {
    let h = harness();
    let (session, _) = h.engine.start_session(ModuleId::new(11)).await.unwrap();
    session.submit_confidence(true).await.unwrap();

    assert!(h.timer.fire_next().await);

    assert_eq!(session.phase().await, SessionPhase::Aborted);
    assert!(session.current_prompt().await.is_none());
    assert!(session.outcome().await.is_none());
    assert_eq!(h.timer.pending(), 0);
    assert!(stored_outcomes(&h.repo, 11).await.is_empty());
}

#[tokio::test]
async fn out_of_order_calls_are_invalid_state() {
    let h = harness();
    let session = h.engine.new_session();
    assert!(matches!(
        session.submit_confidence(true).await,
        Err(AssessmentError::InvalidState { .. })
    ));

    // a ticket for the same question, issued by another session
    let (other, _) = h.engine.start_session(ModuleId::new(1)).await.unwrap();
    let foreign = issued(&other.submit_confidence(true).await.unwrap());

    session.select_module(ModuleId::new(1)).await.unwrap();
    assert!(matches!(
        session.submit_answer(&foreign, Some("A")).await,
        Err(AssessmentError::InvalidState { .. })
    ));

    let q1 = issued(&session.submit_confidence(true).await.unwrap());
    assert_eq!(q1.question_id(), foreign.question_id());
    assert!(matches!(
        session.submit_confidence(true).await,
        Err(AssessmentError::InvalidState { .. })
    ));
    assert!(matches!(
        session.submit_answer(&foreign, Some("A")).await,
        Err(AssessmentError::InvalidState { .. })
    ));
    session.submit_answer(&q1, Some("A")).await.unwrap();
    other.abort().await.unwrap();
}

#[tokio::test]
async fn every_lesson_yields_one_result_and_one_phase() {
    for n in 1..=4_u64 {
        let h = harness();
        let (session, _) = h.engine.start_session(ModuleId::new(n)).await.unwrap();

        for i in 0..n {
            match i % 3 {
                0 => {
                    session.submit_confidence(false).await.unwrap();
                }
                1 => {
                    let q1 = issued(&session.submit_confidence(true).await.unwrap());
                    let q2 = issued(&session.submit_answer(&q1, Some("A")).await.unwrap());
                    session.submit_answer(&q2, Some("A")).await.unwrap();
                }
                _ => {
                    let q1 = issued(&session.submit_confidence(true).await.unwrap());
                    let q2 = issued(&session.submit_answer(&q1, Some("B")).await.unwrap());
                    session.submit_answer(&q2, Some("A")).await.unwrap();
                }
            }
        }

        let outcome = session.outcome().await.unwrap();
        let lessons = usize::try_from(n).unwrap();
        assert_eq!(outcome.results.len(), lessons);
        assert_eq!(outcome.roadmap.topic_count(), lessons);

        let mut topics: Vec<_> = outcome
            .roadmap
            .phases()
            .iter()
            .flat_map(|p| p.topics.iter().cloned())
            .collect();
        topics.sort();
        topics.dedup();
        assert_eq!(topics.len(), lessons, "phases must be disjoint");
    }
}

#[tokio::test]
async fn progress_tracks_lessons_and_answers() {
    let h = harness();
    let (session, _) = h.engine.start_session(ModuleId::new(2)).await.unwrap();

    let q1 = issued(&session.submit_confidence(true).await.unwrap());
    session.submit_answer(&q1, Some("A")).await.unwrap();

    let progress = session.progress().await;
    assert_eq!(progress.total_lessons, 2);
    assert_eq!(progress.completed_lessons, 0);
    assert_eq!(progress.remaining, 2);
    assert_eq!(progress.current_lesson.as_deref(), Some("Variables"));
    assert_eq!(progress.questions_answered, 1);
    assert_eq!(progress.correct_answers, 1);
    assert!(!progress.is_finished());
}

/// Bank that hands out the same question IDs for every lesson.
struct SharedIdBank(InMemoryRepository);

#[async_trait]
impl QuestionBank for SharedIdBank {
    async fn list_modules(&self) -> Result<Vec<Module>, StorageError> {
        self.0.list_modules().await
    }

    async fn get_module(&self, id: ModuleId) -> Result<Module, StorageError> {
        self.0.get_module(id).await
    }

    async fn get_lessons(&self, module_id: ModuleId) -> Result<Vec<Lesson>, StorageError> {
        self.0.get_lessons(module_id).await
    }

    async fn get_question(
        &self,
        lesson_name: &str,
        rank: DifficultyRank,
    ) -> Result<Question, StorageError> {
        Ok(question_with_id(lesson_name, rank, format!("shared-{rank}")))
    }
}

#[tokio::test]
async fn late_answer_cannot_land_on_a_later_lesson_with_the_same_question_id() {
    let repo = InMemoryRepository::new();
    add_module(&repo, 5, &["C++", "C#"]);
    let timer = ManualTimer::new();
    let engine = AssessmentEngine::new(
        Arc::new(SharedIdBank(repo.clone())),
        Arc::new(timer.clone()),
        Arc::new(RepositorySink::new(Arc::new(repo.clone()))),
    );
    let (session, _) = engine.start_session(ModuleId::new(5)).await.unwrap();

    let first_q1 = issued(&session.submit_confidence(true).await.unwrap());
    let first_q2 = issued(&session.submit_answer(&first_q1, Some("A")).await.unwrap());
    assert!(timer.fire_next().await);

    let step = session.submit_confidence(true).await.unwrap();
    let second_q1 = issued(&step);
    assert_eq!(first_q2.question_id(), &QuestionId::new("shared-hard"));
    assert_eq!(first_q1.question_id(), second_q1.question_id());
    assert_ne!(first_q1, second_q1);

    // the learner's late answers to the first lesson arrive now
    assert!(matches!(
        session.submit_answer(&first_q2, Some("A")).await,
        Err(AssessmentError::DoubleSubmission(_))
    ));
    assert!(matches!(
        session.submit_answer(&first_q1, Some("A")).await,
        Err(AssessmentError::DoubleSubmission(_))
    ));
    assert_eq!(session.progress().await.questions_answered, 2);

    let second_q2 = issued(&session.submit_answer(&second_q1, Some("B")).await.unwrap());
    let step = session.submit_answer(&second_q2, Some("A")).await.unwrap();
    let classified = step.classified.unwrap();
    assert_eq!(classified.lesson_name(), "C#");
    assert_eq!(classified.category(), LearningCategory::SuggestedLearning);

    let outcome = session.outcome().await.unwrap();
    assert_eq!(outcome.results[0].category(), LearningCategory::SuggestedLearning);
    let second: Vec<_> = outcome.results[1]
        .responses()
        .iter()
        .map(|r| r.selected_label.clone())
        .collect();
    assert_eq!(second, [Some("B".to_string()), Some("A".to_string())]);
}

struct FlakySink {
    failures_left: AtomicUsize,
    published: AtomicUsize,
}

#[async_trait]
impl ResultSink for FlakySink {
    async fn publish(&self, _outcome: &AssessmentOutcome) -> Result<(), SinkError> {
        if self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(SinkError::Closed);
        }
        self.published.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn failed_publish_keeps_outcome_for_finalize() {
    let sink = Arc::new(FlakySink {
        failures_left: AtomicUsize::new(1),
        published: AtomicUsize::new(0),
    });
    let engine = AssessmentEngine::new(
        Arc::new(catalog()),
        Arc::new(ManualTimer::new()),
        sink.clone(),
    );
    let (session, _) = engine.start_session(ModuleId::new(1)).await.unwrap();

    let err = session.submit_confidence(false).await.unwrap_err();
    assert!(matches!(err, AssessmentError::Sink(_)));
    assert_eq!(session.phase().await, SessionPhase::Completed);
    assert!(!session.is_published().await);
    assert!(matches!(
        session.current_prompt().await,
        Some(SessionPrompt::Completed { .. })
    ));

    let outcome = session.finalize().await.unwrap();
    assert_eq!(outcome.roadmap.phase1.topics, vec!["Variables".to_string()]);
    session.finalize().await.unwrap();
    assert_eq!(sink.published.load(Ordering::SeqCst), 1);
    assert!(session.is_published().await);
}

async fn run_all_unconfident(session: AssessmentSession) -> AssessmentOutcome {
    while session.phase().await == SessionPhase::ConfidenceCheck {
        session.submit_confidence(false).await.unwrap();
    }
    session.outcome().await.unwrap()
}

#[tokio::test]
async fn registry_runs_independent_sessions() {
    let h = harness();
    let registry = SessionRegistry::new();

    let (a, _) = h.engine.start_session(ModuleId::new(3)).await.unwrap();
    let (b, _) = h.engine.start_session(ModuleId::new(4)).await.unwrap();
    let (c, _) = h.engine.start_session(ModuleId::new(1)).await.unwrap();
    let a_id = registry.insert(a).await;
    let b_id = registry.insert(b).await;
    let c_id = registry.insert(c).await;
    assert_eq!(registry.len().await, 3);

    let a = registry.get(a_id).await.unwrap();
    let b = registry.get(b_id).await.unwrap();
    let (oa, ob) = tokio::join!(run_all_unconfident(a), run_all_unconfident(b));
    assert_eq!(oa.results.len(), 3);
    assert_eq!(ob.results.len(), 4);
    assert_ne!(oa.session_id, ob.session_id);

    let removed = registry.remove(c_id).await.unwrap();
    assert_eq!(removed.phase().await, SessionPhase::Aborted);
    assert!(registry.get(c_id).await.is_none());

    let finished = registry.remove(a_id).await.unwrap();
    assert_eq!(finished.phase().await, SessionPhase::Completed);
    assert_eq!(registry.len().await, 1);
}

#[tokio::test(start_paused = true)]
async fn tokio_timer_expiry_records_timeout() {
    let repo = catalog();
    let engine = AssessmentEngine::new(
        Arc::new(repo.clone()),
        Arc::new(TokioTimer::new()),
        Arc::new(RepositorySink::new(Arc::new(repo.clone()))),
    );
    let (session, _) = engine.start_session(ModuleId::new(1)).await.unwrap();
    let q1 = issued(&session.submit_confidence(true).await.unwrap());

    tokio::time::sleep(Duration::from_secs(46)).await;

    assert!(matches!(
        session.submit_answer(&q1, Some("A")).await,
        Err(AssessmentError::DoubleSubmission(_))
    ));
    let progress = session.progress().await;
    assert_eq!(progress.questions_answered, 1);
    assert!(matches!(
        session.current_prompt().await,
        Some(SessionPrompt::Question { number: 2, .. })
    ));

    session.abort().await.unwrap();
}
