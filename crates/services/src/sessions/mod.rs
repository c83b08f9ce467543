mod builder;
mod progress;
mod runner;
mod session;
mod timer;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::{RunnerError, SessionError};
pub use builder::SessionBuilder;
pub use progress::SessionProgress;
pub use runner::{SessionEvent, SessionHandle, SessionSnapshot, spawn_session};
pub use session::{QuizSession, RecordedAnswer, SessionPhase, TickOutcome};
pub use timer::{QuestionTimer, TimerEvent, TimerState};
pub use workflow::{QuizLoopService, QuizRequest, SessionAnswerResult};
