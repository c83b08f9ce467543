use chrono::{DateTime, Utc};
use tracing::debug;

use quiz_core::Clock;
use quiz_core::evaluator::evaluate;
use quiz_core::model::{Answer, Question, QuestionId, QuizResult, SessionId, Submission, UserId};

use super::progress::SessionProgress;
use super::timer::{QuestionTimer, TimerEvent};
use crate::error::SessionError;

//
// ─── OUTCOMES ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    InProgress,
    Completed,
    Abandoned,
}

/// One answer as it was written into its slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedAnswer {
    pub slot: usize,
    pub question_id: QuestionId,
    pub answer: Answer,
    pub is_complete: bool,
}

/// What a one-second tick did to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Counting { slot: usize, remaining: u32 },
    TimedOut(RecordedAnswer),
    Idle,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// A running quiz: ordered questions, one answer slot each, and a countdown
/// for the active question.
///
/// The number of filled slots always equals the index of the active question.
/// Each slot is written at most once, either by an answer or by a timeout,
/// and never changes afterwards.
#[derive(Debug, Clone)]
pub struct QuizSession {
    id: SessionId,
    user_id: UserId,
    clock: Clock,
    questions: Vec<Question>,
    answers: Vec<Option<Answer>>,
    current: usize,
    timer: QuestionTimer,
    phase: SessionPhase,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    result: Option<QuizResult>,
    persisted_id: Option<i64>,
}

impl QuizSession {
    /// Start a session over an already-built question list.
    ///
    /// The first question's countdown starts immediately.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoQuestionsAvailable` if `questions` is empty.
    pub fn new(
        user_id: UserId,
        questions: Vec<Question>,
        clock: Clock,
    ) -> Result<Self, SessionError> {
        let Some(first) = questions.first() else {
            return Err(SessionError::NoQuestionsAvailable);
        };
        let timer = QuestionTimer::start(first.time_limit());

        Ok(Self {
            id: SessionId::generate(),
            user_id,
            clock,
            answers: vec![None; questions.len()],
            questions,
            current: 0,
            timer,
            phase: SessionPhase::InProgress,
            started_at: clock.now(),
            completed_at: None,
            result: None,
            persisted_id: None,
        })
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Answer slots in question order; `None` for slots not reached yet.
    #[must_use]
    pub fn answers(&self) -> &[Option<Answer>] {
        &self.answers
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.iter().filter(|a| a.is_some()).count()
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        match self.phase {
            SessionPhase::InProgress => self.questions.get(self.current),
            SessionPhase::Completed | SessionPhase::Abandoned => None,
        }
    }

    /// Seconds left on the active question's countdown.
    #[must_use]
    pub fn remaining_secs(&self) -> Option<u32> {
        self.current_question().map(|_| self.timer.remaining())
    }

    #[must_use]
    pub fn is_in_progress(&self) -> bool {
        self.phase == SessionPhase::InProgress
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.phase == SessionPhase::Completed
    }

    #[must_use]
    pub fn result(&self) -> Option<&QuizResult> {
        self.result.as_ref()
    }

    /// Row id assigned by the result persister, once saved.
    #[must_use]
    pub fn persisted_id(&self) -> Option<i64> {
        self.persisted_id
    }

    pub(crate) fn set_persisted_id(&mut self, id: i64) {
        self.persisted_id = Some(id);
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let answered = self.answered_count();
        SessionProgress {
            total: self.questions.len(),
            answered,
            remaining: self.questions.len().saturating_sub(answered),
            is_complete: self.is_complete(),
        }
    }

    /// Record the player's answer for `slot`.
    ///
    /// `slot` must be the active question; this is what makes a late answer
    /// lose against a timeout that already filled the slot.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::SessionAlreadyCompleted` or `Abandoned` when the
    /// session is over, `AlreadyAnswered` for a slot that was already filled,
    /// and `SlotNotActive` for a slot not reached yet. Nothing changes on error.
    pub fn submit_answer(
        &mut self,
        slot: usize,
        submission: Submission,
    ) -> Result<RecordedAnswer, SessionError> {
        self.ensure_active(slot)?;
        let is_correct = evaluate(&self.questions[slot], &submission);
        let time_taken = self.timer.stop();
        self.record(slot, Answer::new(submission, is_correct, time_taken))
    }

    /// Answer the active question, whichever it is.
    ///
    /// # Errors
    ///
    /// See [`QuizSession::submit_answer`].
    pub fn submit_current(
        &mut self,
        submission: Submission,
    ) -> Result<RecordedAnswer, SessionError> {
        self.submit_answer(self.current, submission)
    }

    /// Fill `slot` with the unanswered sentinel after its countdown ran out.
    ///
    /// # Errors
    ///
    /// Same as [`QuizSession::submit_answer`]. A timeout for a slot the player
    /// already answered is rejected with `AlreadyAnswered`.
    pub fn on_timeout(&mut self, slot: usize) -> Result<RecordedAnswer, SessionError> {
        self.ensure_active(slot)?;
        self.timer.cancel();
        let time_limit = self.questions[slot].time_limit();
        self.record(slot, Answer::timed_out(time_limit))
    }

    /// Advance the active countdown by one second, timing out the question
    /// when it reaches zero.
    ///
    /// # Errors
    ///
    /// Returns `SessionAlreadyCompleted` or `Abandoned` when the session is over.
    pub fn tick(&mut self) -> Result<TickOutcome, SessionError> {
        self.ensure_in_progress()?;
        match self.timer.tick() {
            TimerEvent::Tick { remaining } => Ok(TickOutcome::Counting {
                slot: self.current,
                remaining,
            }),
            TimerEvent::Expired => self.on_timeout(self.current).map(TickOutcome::TimedOut),
            TimerEvent::Idle => Ok(TickOutcome::Idle),
        }
    }

    /// Stop the session without producing a result.
    ///
    /// # Errors
    ///
    /// Returns `SessionAlreadyCompleted` for a finished session and `Abandoned`
    /// if it was already abandoned.
    pub fn abandon(&mut self) -> Result<(), SessionError> {
        self.ensure_in_progress()?;
        self.timer.cancel();
        self.phase = SessionPhase::Abandoned;
        debug!(session_id = %self.id, answered = self.current, "session abandoned");
        Ok(())
    }

    fn ensure_in_progress(&self) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::InProgress => Ok(()),
            SessionPhase::Completed => Err(SessionError::SessionAlreadyCompleted),
            SessionPhase::Abandoned => Err(SessionError::Abandoned),
        }
    }

    fn ensure_active(&self, slot: usize) -> Result<(), SessionError> {
        self.ensure_in_progress()?;
        if slot < self.current {
            return Err(SessionError::AlreadyAnswered { slot });
        }
        if slot > self.current {
            return Err(SessionError::SlotNotActive { slot });
        }
        Ok(())
    }

    fn record(&mut self, slot: usize, answer: Answer) -> Result<RecordedAnswer, SessionError> {
        let next = slot + 1;
        if next == self.questions.len() {
            // Build the result before touching any state so a failure leaves
            // the session exactly as it was.
            let completed_at = self.clock.now().max(self.started_at);
            let answers = self.answers[..slot]
                .iter()
                .flatten()
                .cloned()
                .chain(std::iter::once(answer.clone()))
                .collect();
            let result = QuizResult::from_answers(
                self.id,
                self.started_at,
                completed_at,
                self.questions.clone(),
                answers,
            )?;
            self.result = Some(result);
            self.completed_at = Some(completed_at);
            self.phase = SessionPhase::Completed;
        } else {
            self.timer.reset(self.questions[next].time_limit());
        }

        let question_id = self.questions[slot].id();
        self.answers[slot] = Some(answer.clone());
        self.current = next;

        debug!(
            session_id = %self.id,
            slot,
            question_id = %question_id,
            is_correct = answer.is_correct(),
            time_taken = answer.time_taken(),
            "answer recorded"
        );

        Ok(RecordedAnswer {
            slot,
            question_id,
            answer,
            is_complete: self.is_complete(),
        })
    }

    #[cfg(test)]
    pub(crate) fn clock_mut(&mut self) -> &mut Clock {
        &mut self.clock
    }
}
