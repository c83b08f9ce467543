#![forbid(unsafe_code)]

pub mod answer_check;
pub mod error;
pub mod profile_cache;
pub mod sessions;

pub use quiz_core::Clock;

pub use answer_check::{AnswerCheck, AnswerCheckService};
pub use error::{AnswerCheckError, RunnerError, SessionError};
pub use profile_cache::ProfileCache;

pub use sessions::{
    QuizLoopService, QuizRequest, QuizSession, RecordedAnswer, SessionAnswerResult, SessionEvent,
    SessionHandle, SessionPhase, SessionProgress, SessionSnapshot,
};
