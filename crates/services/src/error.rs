//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::{QuestionId, ResultError, SubmissionError};
use storage::repository::StorageError;

/// Errors emitted by session building, the session state machine, and the
/// quiz loop.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no questions available for session")]
    NoQuestionsAvailable,
    #[error("requested question count must be greater than zero")]
    InvalidQuestionCount,
    #[error("slot {slot} already answered")]
    AlreadyAnswered { slot: usize },
    #[error("slot {slot} is not the active question")]
    SlotNotActive { slot: usize },
    #[error("session already completed")]
    SessionAlreadyCompleted,
    #[error("session was abandoned")]
    Abandoned,
    #[error("session is not completed yet")]
    NotCompleted,
    #[error(transparent)]
    Result(#[from] ResultError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("result not saved after {attempts} attempt(s): {source}")]
    Persist {
        attempts: u32,
        #[source]
        source: StorageError,
    },
}

/// Errors emitted by `AnswerCheckService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AnswerCheckError {
    #[error("question {0} not found")]
    QuestionNotFound(QuestionId),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors surfaced through a `SessionHandle`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunnerError {
    #[error("session runner has stopped")]
    Closed,
    #[error(transparent)]
    Session(#[from] SessionError),
}
