//! Async driver for a [`QuizSession`].
//!
//! The session is owned by a single task. Answers, timeouts, snapshots and
//! abandonment arrive as commands on one channel, and the countdown ticks on
//! a `tokio` interval inside the same `select!` loop. Whichever reaches the
//! task first for a slot wins; the loser is rejected by the session itself.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{Instrument, debug, info, info_span, warn};

use quiz_core::model::{QuestionId, QuizResult, SessionId, Submission};

use super::progress::SessionProgress;
use super::session::{QuizSession, RecordedAnswer, SessionPhase, TickOutcome};
use crate::error::{RunnerError, SessionError};

const COMMAND_BUFFER: usize = 16;

//
// ─── MESSAGES ──────────────────────────────────────────────────────────────────
//

#[derive(Debug)]
enum SessionCommand {
    Submit {
        slot: usize,
        submission: Submission,
        reply: oneshot::Sender<Result<RecordedAnswer, SessionError>>,
    },
    Timeout {
        slot: usize,
        reply: oneshot::Sender<Result<RecordedAnswer, SessionError>>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Abandon,
}

/// Notifications published by the runner while the session is live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    QuestionStarted {
        slot: usize,
        question_id: QuestionId,
        time_limit: u32,
    },
    Tick {
        slot: usize,
        remaining: u32,
    },
    AnswerRecorded(RecordedAnswer),
    TimedOut(RecordedAnswer),
    Completed(QuizResult),
    Abandoned,
}

/// Point-in-time view of a live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub phase: SessionPhase,
    pub progress: SessionProgress,
    pub current_slot: Option<usize>,
    pub remaining_secs: Option<u32>,
}

impl SessionSnapshot {
    fn of(session: &QuizSession) -> Self {
        Self {
            session_id: session.id(),
            phase: session.phase(),
            progress: session.progress(),
            current_slot: session
                .current_question()
                .map(|_| session.current_index()),
            remaining_secs: session.remaining_secs(),
        }
    }
}

//
// ─── HANDLE ────────────────────────────────────────────────────────────────────
//

/// Cloneable front end to a running session. Dropping every handle abandons
/// the session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    session_id: SessionId,
    tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Submit an answer for `slot`.
    ///
    /// # Errors
    ///
    /// Returns `RunnerError::Closed` once the session has ended, or the
    /// session's own rejection (for example a slot that already timed out).
    pub async fn submit(
        &self,
        slot: usize,
        submission: Submission,
    ) -> Result<RecordedAnswer, RunnerError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Submit {
            slot,
            submission,
            reply,
        })
        .await?;
        Ok(rx.await.map_err(|_| RunnerError::Closed)??)
    }

    /// Force the countdown of `slot` to expire now.
    ///
    /// # Errors
    ///
    /// Same as [`SessionHandle::submit`].
    pub async fn timeout(&self, slot: usize) -> Result<RecordedAnswer, RunnerError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Timeout { slot, reply }).await?;
        Ok(rx.await.map_err(|_| RunnerError::Closed)??)
    }

    /// # Errors
    ///
    /// Returns `RunnerError::Closed` once the session has ended.
    pub async fn snapshot(&self) -> Result<SessionSnapshot, RunnerError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Snapshot { reply }).await?;
        rx.await.map_err(|_| RunnerError::Closed)
    }

    /// # Errors
    ///
    /// Returns `RunnerError::Closed` once the session has ended.
    pub async fn abandon(&self) -> Result<(), RunnerError> {
        self.send(SessionCommand::Abandon).await
    }

    async fn send(&self, command: SessionCommand) -> Result<(), RunnerError> {
        self.tx.send(command).await.map_err(|_| RunnerError::Closed)
    }
}

//
// ─── RUNNER ────────────────────────────────────────────────────────────────────
//

/// Spawn a task that owns `session` until it completes or is abandoned.
///
/// `tick` is the length of one countdown second; tests pass a paused clock
/// instead of shortening it. The join handle yields the final session so the
/// caller can persist its result.
#[must_use]
pub fn spawn_session(
    session: QuizSession,
    tick: Duration,
    events: mpsc::UnboundedSender<SessionEvent>,
) -> (SessionHandle, JoinHandle<QuizSession>) {
    let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
    let session_id = session.id();
    let span = info_span!("quiz_session", session_id = %session_id);
    let runner = SessionRunner {
        session,
        tick,
        events,
    };
    let task = tokio::spawn(runner.run(rx).instrument(span));
    (SessionHandle { session_id, tx }, task)
}

struct SessionRunner {
    session: QuizSession,
    tick: Duration,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionRunner {
    async fn run(mut self, mut rx: mpsc::Receiver<SessionCommand>) -> QuizSession {
        let mut ticker = interval_at(Instant::now() + self.tick, self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(questions = self.session.total_questions(), "session started");
        self.announce_current();

        while self.session.is_in_progress() {
            tokio::select! {
                biased;
                command = rx.recv() => match command {
                    Some(command) => {
                        if self.handle(command) {
                            ticker.reset();
                        }
                    }
                    None => {
                        debug!("all handles dropped");
                        self.abandon();
                    }
                },
                _ = ticker.tick() => {
                    if self.handle_tick() {
                        ticker.reset();
                    }
                }
            }
        }

        self.session
    }

    /// Returns true when the active question changed.
    fn handle(&mut self, command: SessionCommand) -> bool {
        match command {
            SessionCommand::Submit {
                slot,
                submission,
                reply,
            } => {
                let outcome = self.session.submit_answer(slot, submission);
                let advanced = self.after_record(&outcome, SessionEvent::AnswerRecorded);
                let _ = reply.send(outcome);
                advanced
            }
            SessionCommand::Timeout { slot, reply } => {
                let outcome = self.session.on_timeout(slot);
                let advanced = self.after_record(&outcome, SessionEvent::TimedOut);
                let _ = reply.send(outcome);
                advanced
            }
            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(SessionSnapshot::of(&self.session));
                false
            }
            SessionCommand::Abandon => {
                self.abandon();
                false
            }
        }
    }

    fn handle_tick(&mut self) -> bool {
        match self.session.tick() {
            Ok(TickOutcome::Counting { slot, remaining }) => {
                self.emit(SessionEvent::Tick { slot, remaining });
                false
            }
            Ok(TickOutcome::TimedOut(recorded)) => {
                self.after_record(&Ok(recorded), SessionEvent::TimedOut)
            }
            Ok(TickOutcome::Idle) => false,
            Err(err) => {
                warn!(error = %err, "tick on inactive session");
                false
            }
        }
    }

    fn after_record(
        &mut self,
        outcome: &Result<RecordedAnswer, SessionError>,
        event: fn(RecordedAnswer) -> SessionEvent,
    ) -> bool {
        let recorded = match outcome {
            Ok(recorded) => recorded.clone(),
            Err(err) => {
                debug!(error = %err, "command rejected");
                return false;
            }
        };
        self.emit(event(recorded));

        if let Some(result) = self.session.result() {
            info!(
                score = result.score(),
                correct = result.correct_answers(),
                total = result.total_questions(),
                "session completed"
            );
            let result = result.clone();
            self.emit(SessionEvent::Completed(result));
        } else {
            self.announce_current();
        }
        true
    }

    fn announce_current(&self) {
        if let Some(question) = self.session.current_question() {
            self.emit(SessionEvent::QuestionStarted {
                slot: self.session.current_index(),
                question_id: question.id(),
                time_limit: question.time_limit(),
            });
        }
    }

    fn abandon(&mut self) {
        if self.session.abandon().is_ok() {
            info!(answered = self.session.answered_count(), "session abandoned");
            self.emit(SessionEvent::Abandoned);
        }
    }

    fn emit(&self, event: SessionEvent) {
        // A dropped receiver only means nobody is watching.
        let _ = self.events.send(event);
    }
}
