use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use assess_core::grading::LocalGrader;
use assess_core::model::{
    AnswerSlot, EnvironmentSignal, GradeReport, IntegrityEventKind, KeyCombo, LockedMode,
    Provenance, Question, QuestionId, QuestionKind, QuestionOutcome, Quiz, QuizId, Session,
    SessionId, SessionState, SessionStateError, SignalDisposition, SubmissionPayload,
};
use assess_core::time::fixed_clock;
use async_trait::async_trait;
use services::{
    Grader, ScriptedEnvironment, SessionEngine, SessionError, SessionHandle, SubmissionCoordinator,
    SubmissionError, SubmitStatus,
};
use tokio::time::{Instant, sleep};

const Q1: QuestionId = QuestionId::new(1);
const Q2: QuestionId = QuestionId::new(2);
const Q3: QuestionId = QuestionId::new(3);

fn basics_quiz() -> Quiz {
    let q1 = Question::new(
        Q1,
        QuestionKind::SingleChoice,
        "Which type puts a value on the heap?",
        vec!["Vec".into(), "HashMap".into(), "Box".into()],
        2,
        1,
    )
    .unwrap()
    .with_correct_answer("Box")
    .unwrap();
    let q2 = Question::new(Q2, QuestionKind::TrueFalse, "Rust has a GC", Vec::new(), 1, 2)
        .unwrap()
        .with_correct_answer("false")
        .unwrap();
    let q3 = Question::new(
        Q3,
        QuestionKind::ShortText,
        "What enforces ownership rules at compile time?",
        Vec::new(),
        3,
        3,
    )
    .unwrap()
    .with_correct_answer("borrow checker")
    .unwrap();
    Quiz::new(QuizId::new(1), "Basics", None, 60, vec![q1, q2, q3]).unwrap()
}

/// Fails every call, like an unreachable server.
#[derive(Default)]
struct Unreachable {
    calls: AtomicUsize,
}

#[async_trait]
impl Grader for Unreachable {
    async fn grade(
        &self,
        _quiz: &Quiz,
        _payload: &SubmissionPayload,
    ) -> Result<GradeReport, SubmissionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(SubmissionError::NotImplemented)
    }
}

/// Grades like a server would, after a short delay.
#[derive(Default)]
struct SlowServer {
    calls: AtomicUsize,
}

#[async_trait]
impl Grader for SlowServer {
    async fn grade(
        &self,
        quiz: &Quiz,
        payload: &SubmissionPayload,
    ) -> Result<GradeReport, SubmissionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        sleep(Duration::from_secs(2)).await;
        Ok(LocalGrader::default().grade(quiz, payload)?)
    }
}

/// Never answers.
struct Silent;

#[async_trait]
impl Grader for Silent {
    async fn grade(
        &self,
        _quiz: &Quiz,
        _payload: &SubmissionPayload,
    ) -> Result<GradeReport, SubmissionError> {
        std::future::pending().await
    }
}

fn spawn(remote: Arc<dyn Grader>, env: Arc<ScriptedEnvironment>) -> SessionHandle {
    let session = Session::new(SessionId::generate(), basics_quiz());
    SessionEngine::new(session, SubmissionCoordinator::new(remote), env)
        .with_clock(fixed_clock())
        .spawn()
}

#[tokio::test(start_paused = true)]
async fn scenario_manual_submit_with_network_failure_grades_locally() {
    let remote = Arc::new(Unreachable::default());
    let handle = spawn(remote.clone(), Arc::new(ScriptedEnvironment::new()));

    handle.start().await.unwrap();
    handle.set_answer(Q1, "Box").await.unwrap();
    handle.set_answer(Q2, "true").await.unwrap();
    sleep(Duration::from_secs(40)).await;

    assert_eq!(handle.submit().await.unwrap(), SubmitStatus::Accepted);
    let result = handle.wait_for_result().await.unwrap();

    assert_eq!(result.points_earned, 2);
    assert_eq!(result.points_possible, 6);
    assert_eq!(result.provenance, Provenance::LocalFallback);
    assert_eq!(result.elapsed_seconds, 40);
    assert!(!result.expired);
    assert_eq!(result.outcome_of(Q2), Some(QuestionOutcome::Incorrect));
    assert_eq!(result.outcome_of(Q3), Some(QuestionOutcome::Unanswered));
    assert_eq!(remote.calls.load(Ordering::SeqCst), 1);
    assert_eq!(handle.state().state, SessionState::Completed);
}

#[tokio::test(start_paused = true)]
async fn scenario_incidents_are_counted_but_do_not_change_the_score() {
    let env = Arc::new(ScriptedEnvironment::new());
    let handle = spawn(Arc::new(SlowServer::default()), env.clone());

    handle.start().await.unwrap();
    handle.set_answer(Q1, "Box").await.unwrap();
    handle.set_answer(Q3, "Borrow Checker").await.unwrap();
    for signal in [
        EnvironmentSignal::VisibilityHidden,
        EnvironmentSignal::VisibilityVisible,
        EnvironmentSignal::VisibilityHidden,
        EnvironmentSignal::FullscreenExited,
    ] {
        assert_eq!(env.emit(&signal), Some(SignalDisposition::Allow));
    }

    handle.submit().await.unwrap();
    let result = handle.wait_for_result().await.unwrap();

    assert_eq!(result.incident_count, 3);
    assert_eq!(result.provenance, Provenance::ServerGraded);
    assert_eq!(result.points_earned, 5);
    assert_eq!(result.points_possible, 6);
}

#[tokio::test(start_paused = true)]
async fn scenario_countdown_expiry_auto_submits() {
    let handle = spawn(Arc::new(Unreachable::default()), Arc::new(ScriptedEnvironment::new()));

    handle.start().await.unwrap();
    handle.set_answer(Q1, "Box").await.unwrap();
    handle.set_answer(Q2, "false").await.unwrap();

    let result = handle.wait_for_result().await.unwrap();
    let state = handle.state();

    assert!(result.expired);
    assert!(state.expired);
    assert_eq!(state.remaining_seconds, 0);
    assert_eq!(state.state, SessionState::Completed);
    assert_eq!(result.elapsed_seconds, 60);
    assert_eq!(result.points_earned, 3);
    assert_eq!(result.outcome_of(Q3), Some(QuestionOutcome::Unanswered));
}

#[tokio::test(start_paused = true)]
async fn submission_is_requested_at_most_once() {
    let remote = Arc::new(SlowServer::default());
    let handle = spawn(remote.clone(), Arc::new(ScriptedEnvironment::new()));
    handle.start().await.unwrap();

    assert_eq!(handle.submit().await.unwrap(), SubmitStatus::Accepted);
    assert_eq!(handle.submit().await.unwrap(), SubmitStatus::AlreadySubmitting);

    // Reads still work while grading is in flight; writes are refused.
    assert_eq!(handle.state().state, SessionState::Submitting);
    assert_eq!(handle.get_answer(Q1).await.unwrap(), AnswerSlot::Unanswered);
    assert!(matches!(
        handle.set_answer(Q1, "Box").await,
        Err(SessionError::Misuse(SessionStateError::WrongState { .. }))
    ));

    handle.wait_for_result().await.unwrap();
    assert_eq!(handle.submit().await.unwrap(), SubmitStatus::AlreadyCompleted);

    // Well past the original deadline: no tick restarts anything.
    sleep(Duration::from_secs(120)).await;
    assert_eq!(remote.calls.load(Ordering::SeqCst), 1);
    let state = handle.state();
    assert_eq!(state.state, SessionState::Completed);
    assert_eq!(state.remaining_seconds, 60);
    assert!(!state.expired);
}

#[tokio::test(start_paused = true)]
async fn expiry_then_manual_submit_does_not_submit_twice() {
    let remote = Arc::new(SlowServer::default());
    let handle = spawn(remote.clone(), Arc::new(ScriptedEnvironment::new()));
    handle.start().await.unwrap();

    sleep(Duration::from_millis(60_500)).await;
    assert_eq!(handle.state().state, SessionState::Submitting);
    assert_eq!(handle.submit().await.unwrap(), SubmitStatus::AlreadySubmitting);

    let result = handle.wait_for_result().await.unwrap();
    assert!(result.expired);
    assert_eq!(remote.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn submit_queued_at_the_zero_instant_wins_over_expiry() {
    let remote = Arc::new(Unreachable::default());
    let handle = spawn(remote.clone(), Arc::new(ScriptedEnvironment::new()));
    handle.start().await.unwrap();

    sleep(Duration::from_millis(59_500)).await;
    assert_eq!(handle.state().remaining_seconds, 1);

    // The submit command is queued before the clock reaches the final tick.
    let (status, ()) = tokio::join!(
        handle.submit(),
        tokio::time::advance(Duration::from_millis(500))
    );
    assert_eq!(status.unwrap(), SubmitStatus::Accepted);

    let result = handle.wait_for_result().await.unwrap();
    assert!(!result.expired);
    assert_eq!(result.elapsed_seconds, 60);

    sleep(Duration::from_secs(5)).await;
    let state = handle.state();
    assert!(!state.expired);
    assert_eq!(state.remaining_seconds, 1);
    assert_eq!(remote.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn elapsed_time_stops_at_the_submission_trigger() {
    let slow = spawn(Arc::new(SlowServer::default()), Arc::new(ScriptedEnvironment::new()));
    slow.start().await.unwrap();
    sleep(Duration::from_secs(40)).await;
    slow.submit().await.unwrap();
    let result = slow.wait_for_result().await.unwrap();
    assert_eq!(result.provenance, Provenance::ServerGraded);
    assert_eq!(result.elapsed_seconds, 40);

    let session = Session::new(SessionId::generate(), basics_quiz());
    let coordinator =
        SubmissionCoordinator::new(Arc::new(Silent)).with_timeout(Duration::from_secs(10));
    let silent = SessionEngine::new(session, coordinator, Arc::new(ScriptedEnvironment::new()))
        .with_clock(fixed_clock())
        .spawn();
    silent.start().await.unwrap();
    sleep(Duration::from_secs(40)).await;
    silent.submit().await.unwrap();
    let result = silent.wait_for_result().await.unwrap();
    assert_eq!(result.provenance, Provenance::LocalFallback);
    assert_eq!(result.elapsed_seconds, 40);
}

#[tokio::test(start_paused = true)]
async fn latest_answer_wins_in_the_payload() {
    let handle = spawn(Arc::new(Unreachable::default()), Arc::new(ScriptedEnvironment::new()));
    handle.start().await.unwrap();

    handle.set_answer(Q1, "Vec").await.unwrap();
    handle.set_answer(Q1, "HashMap").await.unwrap();
    handle.set_answer(Q1, "Box").await.unwrap();
    assert_eq!(
        handle.get_answer(Q1).await.unwrap(),
        AnswerSlot::Answered("Box".into())
    );

    handle.submit().await.unwrap();
    let result = handle.wait_for_result().await.unwrap();
    assert_eq!(result.outcome_of(Q1), Some(QuestionOutcome::Correct));
    assert_eq!(handle.state().answered_count, 1);
}

#[tokio::test(start_paused = true)]
async fn three_tab_switches_log_three_events_in_order() {
    let env = Arc::new(ScriptedEnvironment::new());
    let handle = spawn(Arc::new(Unreachable::default()), env.clone());

    assert_eq!(env.emit(&EnvironmentSignal::VisibilityHidden), None);
    handle.start().await.unwrap();

    env.emit(&EnvironmentSignal::VisibilityHidden);
    env.emit(&EnvironmentSignal::KeyPressed(KeyCombo::ctrl_shift("I")));
    env.emit(&EnvironmentSignal::VisibilityHidden);
    env.emit(&EnvironmentSignal::VisibilityHidden);

    let events = handle.integrity_events().await.unwrap();
    let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        [
            IntegrityEventKind::TabHidden,
            IntegrityEventKind::RestrictedKey,
            IntegrityEventKind::TabHidden,
            IntegrityEventKind::TabHidden,
        ]
    );
    assert_eq!(handle.state().incident_count, 4);
    assert_eq!(handle.state().state, SessionState::InProgress);
}

#[tokio::test(start_paused = true)]
async fn restricted_keys_and_context_menu_are_suppressed() {
    let env = Arc::new(ScriptedEnvironment::new());
    let handle = spawn(Arc::new(Unreachable::default()), env.clone());
    handle.start().await.unwrap();

    assert_eq!(
        env.emit(&EnvironmentSignal::KeyPressed(KeyCombo::plain("F12"))),
        Some(SignalDisposition::SuppressDefault)
    );
    assert_eq!(
        env.emit(&EnvironmentSignal::ContextMenu),
        Some(SignalDisposition::SuppressDefault)
    );
    assert_eq!(
        env.emit(&EnvironmentSignal::KeyPressed(KeyCombo::ctrl("C"))),
        Some(SignalDisposition::Allow)
    );
    assert_eq!(handle.integrity_events().await.unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn failing_submission_completes_within_the_timeout() {
    let session = Session::new(SessionId::generate(), basics_quiz());
    let coordinator =
        SubmissionCoordinator::new(Arc::new(Silent)).with_timeout(Duration::from_secs(10));
    let handle = SessionEngine::new(session, coordinator, Arc::new(ScriptedEnvironment::new()))
        .with_clock(fixed_clock())
        .spawn();
    handle.start().await.unwrap();

    let submitted = Instant::now();
    handle.submit().await.unwrap();
    let result = handle.wait_for_result().await.unwrap();

    assert_eq!(result.provenance, Provenance::LocalFallback);
    assert!(submitted.elapsed() < Duration::from_secs(11));
}

#[tokio::test(start_paused = true)]
async fn misuse_is_rejected_without_touching_the_session() {
    let handle = spawn(Arc::new(Unreachable::default()), Arc::new(ScriptedEnvironment::new()));

    assert!(matches!(
        handle.set_answer(Q1, "Box").await,
        Err(SessionError::Misuse(SessionStateError::WrongState { .. }))
    ));
    assert!(matches!(
        handle.go_to_question(1).await,
        Err(SessionError::Misuse(_))
    ));
    assert!(handle.submit().await.is_err());

    handle.start().await.unwrap();
    assert!(matches!(
        handle.start().await,
        Err(SessionError::Misuse(_))
    ));
    assert!(matches!(
        handle.set_answer(QuestionId::new(99), "x").await,
        Err(SessionError::Misuse(SessionStateError::UnknownQuestion(_)))
    ));
    assert_eq!(handle.go_to_question(7).await.unwrap(), 2);
    assert_eq!(handle.go_to_question(1).await.unwrap(), 1);

    let state = handle.state();
    assert_eq!(state.state, SessionState::InProgress);
    assert_eq!(state.current_index, 1);
    assert_eq!(state.answered_count, 0);
}

#[tokio::test(start_paused = true)]
async fn locked_mode_denial_is_advisory() {
    let env = Arc::new(ScriptedEnvironment::denying_locked_mode("kiosk policy"));
    let handle = spawn(Arc::new(Unreachable::default()), env.clone());

    let snapshot = handle.start().await.unwrap();
    assert_eq!(snapshot.state, SessionState::InProgress);
    assert!(matches!(snapshot.locked_mode, LockedMode::Denied { .. }));
    assert_eq!(snapshot.incident_count, 0);
    assert!(env.is_attached());
}

#[tokio::test(start_paused = true)]
async fn scopes_are_released_on_completion() {
    let env = Arc::new(ScriptedEnvironment::new());
    let handle = spawn(Arc::new(Unreachable::default()), env.clone());

    let snapshot = handle.start().await.unwrap();
    assert_eq!(snapshot.locked_mode, LockedMode::Held);
    assert!(env.holds_locked_mode());
    assert!(env.is_attached());

    handle.submit().await.unwrap();
    handle.wait_for_result().await.unwrap();

    assert!(!env.holds_locked_mode());
    assert!(!env.is_attached());
    assert_eq!(env.release_count(), 1);
    assert_eq!(handle.state().locked_mode, LockedMode::Released);
    assert_eq!(env.emit(&EnvironmentSignal::FocusLost), None);
}

#[tokio::test(start_paused = true)]
async fn scopes_are_released_when_the_session_is_dropped() {
    let env = Arc::new(ScriptedEnvironment::new());
    let handle = spawn(Arc::new(Unreachable::default()), env.clone());
    handle.start().await.unwrap();
    assert!(env.is_attached());

    drop(handle);
    sleep(Duration::from_millis(10)).await;

    assert!(!env.is_attached());
    assert!(!env.holds_locked_mode());
    assert_eq!(env.attach_count(), 1);
}
