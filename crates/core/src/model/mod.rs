mod answer;
mod ids;
mod profile;
mod question;
mod result;
mod settings;

pub use ids::{CategoryId, ParseIdError, QuestionId, SessionId, UserId};

pub use answer::{Answer, Submission, SubmissionError};
pub use profile::{POINTS_PER_LEVEL, Profile, ProfileDelta, ProfileError, level_for_points};
pub use question::{
    AnswerKey, DEFAULT_POINTS, DEFAULT_TIME_LIMIT_SECS, Difficulty, Question, QuestionDraft,
    QuestionError, QuestionType,
};
pub use result::{AnswerRecord, PerformanceBand, QuizResult, ResultError, score_percent};
pub use settings::{QuizSettings, SettingsError};
