use std::time::Duration;

use quiz_core::model::{
    CategoryId, Difficulty, Question, QuestionDraft, QuestionId, Submission, UserId,
};
use quiz_core::time::fixed_clock;
use serde_json::json;
use services::sessions::spawn_session;
use services::{QuizSession, RunnerError, SessionError, SessionEvent, SessionPhase};
use tokio::sync::mpsc;
use uuid::Uuid;

const TICK: Duration = Duration::from_secs(1);

fn true_false(id: u64, time_limit: u32) -> Question {
    QuestionDraft {
        id: QuestionId::new(id),
        prompt: format!("Statement {id}"),
        question_type: "true_false".into(),
        category_id: CategoryId::new(1),
        difficulty: Difficulty::Easy,
        options: None,
        correct_answer: json!(true),
        explanation: String::new(),
        time_limit: Some(time_limit),
        points: Some(10),
        image_url: None,
    }
    .validate()
    .unwrap()
}

fn session(questions: Vec<Question>) -> QuizSession {
    QuizSession::new(UserId::new(Uuid::new_v4()), questions, fixed_clock()).unwrap()
}

fn drain(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}

#[tokio::test(start_paused = true)]
async fn unanswered_questions_time_out() {
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let (handle, task) = spawn_session(
        session(vec![true_false(1, 3), true_false(2, 3)]),
        TICK,
        events_tx,
    );

    let finished = task.await.unwrap();
    drop(handle);

    assert_eq!(finished.phase(), SessionPhase::Completed);
    for answer in finished.answers() {
        let answer = answer.as_ref().unwrap();
        assert_eq!(answer.submission(), &Submission::Unanswered);
        assert!(!answer.is_correct());
        assert_eq!(answer.time_taken(), 3);
    }
    assert_eq!(finished.result().unwrap().score(), 0);

    let events = drain(&mut events_rx);
    let ticks = events
        .iter()
        .filter(|e| matches!(e, SessionEvent::Tick { .. }))
        .count();
    let timeouts = events
        .iter()
        .filter(|e| matches!(e, SessionEvent::TimedOut(_)))
        .count();
    assert_eq!(ticks, 4);
    assert_eq!(timeouts, 2);
    assert!(matches!(events.last(), Some(SessionEvent::Completed(_))));
}

#[tokio::test(start_paused = true)]
async fn answers_through_handle_complete_session() {
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let (handle, task) = spawn_session(
        session(vec![true_false(1, 30), true_false(2, 30)]),
        TICK,
        events_tx,
    );

    tokio::time::sleep(Duration::from_millis(4_500)).await;
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.current_slot, Some(0));
    assert_eq!(snapshot.remaining_secs, Some(26));

    let first = handle.submit(0, Submission::Bool(true)).await.unwrap();
    assert!(first.answer.is_correct());
    assert_eq!(first.answer.time_taken(), 4);

    let dup = handle.submit(0, Submission::Bool(false)).await.unwrap_err();
    assert!(matches!(
        dup,
        RunnerError::Session(SessionError::AlreadyAnswered { slot: 0 })
    ));

    let last = handle.submit(1, Submission::Bool(false)).await.unwrap();
    assert!(last.is_complete);

    let finished = task.await.unwrap();
    assert_eq!(finished.result().unwrap().correct_answers(), 1);
    assert_eq!(finished.result().unwrap().score(), 50);

    assert!(matches!(
        handle.submit(1, Submission::Bool(true)).await,
        Err(RunnerError::Closed)
    ));

    let events = drain(&mut events_rx);
    assert!(matches!(
        events.first(),
        Some(SessionEvent::QuestionStarted { slot: 0, .. })
    ));
    assert!(events.contains(&SessionEvent::QuestionStarted {
        slot: 1,
        question_id: QuestionId::new(2),
        time_limit: 30,
    }));
}

#[tokio::test(start_paused = true)]
async fn late_answer_after_timeout_is_rejected() {
    let (events_tx, _events_rx) = mpsc::unbounded_channel();
    let (handle, task) = spawn_session(
        session(vec![true_false(1, 3), true_false(2, 30)]),
        TICK,
        events_tx,
    );

    tokio::time::sleep(Duration::from_millis(3_500)).await;
    let err = handle.submit(0, Submission::Bool(true)).await.unwrap_err();
    assert!(matches!(
        err,
        RunnerError::Session(SessionError::AlreadyAnswered { slot: 0 })
    ));

    handle.submit(1, Submission::Bool(true)).await.unwrap();
    let finished = task.await.unwrap();
    let first = finished.answers()[0].as_ref().unwrap();
    assert_eq!(first.submission(), &Submission::Unanswered);
    assert_eq!(finished.result().unwrap().correct_answers(), 1);
}

#[tokio::test(start_paused = true)]
async fn dropping_every_handle_abandons() {
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let (handle, task) = spawn_session(session(vec![true_false(1, 30)]), TICK, events_tx);

    drop(handle);
    let finished = task.await.unwrap();

    assert_eq!(finished.phase(), SessionPhase::Abandoned);
    assert!(finished.result().is_none());
    assert!(drain(&mut events_rx).contains(&SessionEvent::Abandoned));
}

#[tokio::test(start_paused = true)]
async fn explicit_abandon_stops_runner() {
    let (events_tx, _events_rx) = mpsc::unbounded_channel();
    let (handle, task) = spawn_session(
        session(vec![true_false(1, 30), true_false(2, 30)]),
        TICK,
        events_tx,
    );

    handle.submit(0, Submission::Bool(true)).await.unwrap();
    handle.abandon().await.unwrap();
    let finished = task.await.unwrap();

    assert_eq!(finished.phase(), SessionPhase::Abandoned);
    assert_eq!(finished.answered_count(), 1);
    assert!(matches!(handle.snapshot().await, Err(RunnerError::Closed)));
}
