use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SubmissionError {
    #[error("unsupported submission value: {0}")]
    UnsupportedValue(String),
}

/// A value handed in for one question slot.
///
/// `Unanswered` is the sentinel recorded when the countdown ran out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Submission {
    Unanswered,
    Choice(usize),
    Bool(bool),
    Text(String),
}

impl Submission {
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    #[must_use]
    pub fn is_unanswered(&self) -> bool {
        matches!(self, Submission::Unanswered)
    }

    /// Decode a raw JSON answer as posted by a client.
    ///
    /// `null` maps to the unanswered sentinel.
    ///
    /// # Errors
    ///
    /// Returns `SubmissionError::UnsupportedValue` for arrays, objects,
    /// negative or fractional numbers.
    pub fn from_json(value: &Value) -> Result<Self, SubmissionError> {
        match value {
            Value::Null => Ok(Self::Unanswered),
            Value::Bool(b) => Ok(Self::Bool(*b)),
            Value::String(s) => Ok(Self::Text(s.clone())),
            Value::Number(n) => n
                .as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .map(Self::Choice)
                .ok_or_else(|| SubmissionError::UnsupportedValue(value.to_string())),
            Value::Array(_) | Value::Object(_) => {
                Err(SubmissionError::UnsupportedValue(value.to_string()))
            }
        }
    }

    /// JSON rendering used for persisted answer rows.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Submission::Unanswered => Value::Null,
            Submission::Choice(i) => Value::from(*i),
            Submission::Bool(b) => Value::Bool(*b),
            Submission::Text(s) => Value::String(s.clone()),
        }
    }
}

/// The recorded outcome for one slot. Written once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    submission: Submission,
    is_correct: bool,
    time_taken: u32,
}

impl Answer {
    #[must_use]
    pub fn new(submission: Submission, is_correct: bool, time_taken: u32) -> Self {
        Self {
            submission,
            is_correct,
            time_taken,
        }
    }

    /// Answer recorded when the countdown expired: the full limit is charged.
    #[must_use]
    pub fn timed_out(time_limit: u32) -> Self {
        Self::new(Submission::Unanswered, false, time_limit)
    }

    #[must_use]
    pub fn submission(&self) -> &Submission {
        &self.submission
    }

    #[must_use]
    pub fn is_correct(&self) -> bool {
        self.is_correct
    }

    /// Seconds spent on the question.
    #[must_use]
    pub fn time_taken(&self) -> u32 {
        self.time_taken
    }
}
