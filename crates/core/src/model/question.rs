use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::model::ids::{CategoryId, QuestionId};

/// Countdown applied when a stored question carries no time limit.
pub const DEFAULT_TIME_LIMIT_SECS: u32 = 30;

/// Points applied when a stored question carries no point value.
pub const DEFAULT_POINTS: u32 = 10;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("unsupported question type: {0}")]
    UnsupportedQuestionType(String),

    #[error("unknown difficulty: {0}")]
    UnknownDifficulty(String),

    #[error("question prompt cannot be empty")]
    EmptyPrompt,

    #[error("multiple choice questions need at least two options, got {0}")]
    TooFewOptions(usize),

    #[error("option {0} is empty")]
    EmptyOption(usize),

    #[error("correct answer index {index} is out of range for {len} options")]
    AnswerOutOfRange { index: u64, len: usize },

    #[error("correct answer does not fit a {expected} question")]
    AnswerShapeMismatch { expected: QuestionType },

    #[error("text answer cannot be empty")]
    EmptyTextAnswer,

    #[error("time limit must be > 0")]
    InvalidTimeLimit,

    #[error("points must be > 0")]
    InvalidPoints,

    #[error("invalid image reference: {0}")]
    InvalidImage(String),
}

//
// ─── QUESTION TYPE ─────────────────────────────────────────────────────────────
//

/// The three answer formats a question can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    TextInput,
}

impl QuestionType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::TrueFalse => "true_false",
            QuestionType::TextInput => "text_input",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionType {
    type Err = QuestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "multiple_choice" => Ok(Self::MultipleChoice),
            "true_false" => Ok(Self::TrueFalse),
            "text_input" => Ok(Self::TextInput),
            other => Err(QuestionError::UnsupportedQuestionType(other.to_owned())),
        }
    }
}

//
// ─── DIFFICULTY ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Expert,
}

impl Difficulty {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
            Difficulty::Expert => "expert",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = QuestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            "expert" => Ok(Self::Expert),
            _ => Err(QuestionError::UnknownDifficulty(s.to_owned())),
        }
    }
}

//
// ─── ANSWER KEY ────────────────────────────────────────────────────────────────
//

/// The correct answer of a question, shaped by its type.
///
/// The variant *is* the question type, so a key can never disagree with the
/// declared type once a `Question` exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerKey {
    MultipleChoice { options: Vec<String>, correct: usize },
    TrueFalse { correct: bool },
    TextInput { correct: String },
}

impl AnswerKey {
    #[must_use]
    pub fn question_type(&self) -> QuestionType {
        match self {
            AnswerKey::MultipleChoice { .. } => QuestionType::MultipleChoice,
            AnswerKey::TrueFalse { .. } => QuestionType::TrueFalse,
            AnswerKey::TextInput { .. } => QuestionType::TextInput,
        }
    }

    /// JSON rendering of the correct answer (index, boolean or string).
    #[must_use]
    pub fn correct_json(&self) -> Value {
        match self {
            AnswerKey::MultipleChoice { correct, .. } => Value::from(*correct),
            AnswerKey::TrueFalse { correct } => Value::Bool(*correct),
            AnswerKey::TextInput { correct } => Value::String(correct.clone()),
        }
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// Unvalidated question as it arrives from the question bank.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionDraft {
    pub id: QuestionId,
    pub prompt: String,
    pub question_type: String,
    pub category_id: CategoryId,
    pub difficulty: Difficulty,
    pub options: Option<Vec<String>>,
    pub correct_answer: Value,
    pub explanation: String,
    pub time_limit: Option<u32>,
    pub points: Option<u32>,
    pub image_url: Option<String>,
}

impl QuestionDraft {
    /// Check the draft and build an immutable `Question`.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::UnsupportedQuestionType` for an unknown type tag,
    /// and the other `QuestionError` variants when the answer key, options,
    /// limits or image reference do not fit.
    pub fn validate(self) -> Result<Question, QuestionError> {
        let question_type: QuestionType = self.question_type.parse()?;

        let prompt = self.prompt.trim().to_owned();
        if prompt.is_empty() {
            return Err(QuestionError::EmptyPrompt);
        }

        let key = build_key(question_type, self.options, &self.correct_answer)?;

        let time_limit = self.time_limit.unwrap_or(DEFAULT_TIME_LIMIT_SECS);
        if time_limit == 0 {
            return Err(QuestionError::InvalidTimeLimit);
        }
        let points = self.points.unwrap_or(DEFAULT_POINTS);
        if points == 0 {
            return Err(QuestionError::InvalidPoints);
        }

        let image = match self.image_url.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                Url::parse(raw).map_err(|_| QuestionError::InvalidImage(raw.to_owned()))?,
            ),
        };

        Ok(Question {
            id: self.id,
            prompt,
            category_id: self.category_id,
            difficulty: self.difficulty,
            key,
            explanation: self.explanation,
            time_limit,
            points,
            image,
        })
    }
}

fn build_key(
    question_type: QuestionType,
    options: Option<Vec<String>>,
    correct: &Value,
) -> Result<AnswerKey, QuestionError> {
    let mismatch = QuestionError::AnswerShapeMismatch {
        expected: question_type,
    };
    match question_type {
        QuestionType::MultipleChoice => {
            let options = options.unwrap_or_default();
            if options.len() < 2 {
                return Err(QuestionError::TooFewOptions(options.len()));
            }
            if let Some(pos) = options.iter().position(|o| o.trim().is_empty()) {
                return Err(QuestionError::EmptyOption(pos));
            }
            let index = correct.as_u64().ok_or(mismatch)?;
            let correct = usize::try_from(index)
                .ok()
                .filter(|i| *i < options.len())
                .ok_or(QuestionError::AnswerOutOfRange {
                    index,
                    len: options.len(),
                })?;
            Ok(AnswerKey::MultipleChoice { options, correct })
        }
        QuestionType::TrueFalse => {
            let correct = correct.as_bool().ok_or(mismatch)?;
            Ok(AnswerKey::TrueFalse { correct })
        }
        QuestionType::TextInput => {
            let correct = correct.as_str().ok_or(mismatch)?;
            if correct.trim().is_empty() {
                return Err(QuestionError::EmptyTextAnswer);
            }
            Ok(AnswerKey::TextInput {
                correct: correct.to_owned(),
            })
        }
    }
}

/// A validated question. Read-only for the lifetime of any session holding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    prompt: String,
    category_id: CategoryId,
    difficulty: Difficulty,
    key: AnswerKey,
    explanation: String,
    time_limit: u32,
    points: u32,
    image: Option<Url>,
}

impl Question {
    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn question_type(&self) -> QuestionType {
        self.key.question_type()
    }

    #[must_use]
    pub fn category_id(&self) -> CategoryId {
        self.category_id
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn key(&self) -> &AnswerKey {
        &self.key
    }

    /// Options for multiple choice questions; empty for the other types.
    #[must_use]
    pub fn options(&self) -> &[String] {
        match &self.key {
            AnswerKey::MultipleChoice { options, .. } => options,
            _ => &[],
        }
    }

    #[must_use]
    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    /// Countdown for this question, in seconds.
    #[must_use]
    pub fn time_limit(&self) -> u32 {
        self.time_limit
    }

    #[must_use]
    pub fn points(&self) -> u32 {
        self.points
    }

    #[must_use]
    pub fn image(&self) -> Option<&Url> {
        self.image.as_ref()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn draft(question_type: &str, options: Option<Vec<&str>>, correct: Value) -> QuestionDraft {
        QuestionDraft {
            id: QuestionId::new(1),
            prompt: "What is 3 + 4?".into(),
            question_type: question_type.into(),
            category_id: CategoryId::new(2),
            difficulty: Difficulty::Easy,
            options: options.map(|o| o.into_iter().map(String::from).collect()),
            correct_answer: correct,
            explanation: "Basic arithmetic".into(),
            time_limit: None,
            points: None,
            image_url: None,
        }
    }

    #[test]
    fn multiple_choice_validates_with_defaults() {
        let q = draft("multiple_choice", Some(vec!["6", "7", "8"]), json!(1))
            .validate()
            .unwrap();
        assert_eq!(q.question_type(), QuestionType::MultipleChoice);
        assert_eq!(q.options().len(), 3);
        assert_eq!(q.time_limit(), DEFAULT_TIME_LIMIT_SECS);
        assert_eq!(q.points(), DEFAULT_POINTS);
        assert_eq!(q.key().correct_json(), json!(1));
    }

    #[test]
    fn unknown_type_is_unsupported() {
        let err = draft("essay", None, json!("x")).validate().unwrap_err();
        assert_eq!(err, QuestionError::UnsupportedQuestionType("essay".into()));
    }

    #[test]
    fn multiple_choice_index_must_be_in_range() {
        let err = draft("multiple_choice", Some(vec!["a", "b"]), json!(2))
            .validate()
            .unwrap_err();
        assert!(matches!(err, QuestionError::AnswerOutOfRange { index: 2, len: 2 }));
    }

    #[test]
    fn multiple_choice_needs_options() {
        let err = draft("multiple_choice", Some(vec!["only"]), json!(0))
            .validate()
            .unwrap_err();
        assert_eq!(err, QuestionError::TooFewOptions(1));
    }

    #[test]
    fn answer_shape_is_checked_against_type() {
        let err = draft("true_false", None, json!("true")).validate().unwrap_err();
        assert!(matches!(
            err,
            QuestionError::AnswerShapeMismatch {
                expected: QuestionType::TrueFalse
            }
        ));

        let err = draft("text_input", None, json!(7)).validate().unwrap_err();
        assert!(matches!(err, QuestionError::AnswerShapeMismatch { .. }));
    }

    #[test]
    fn options_are_dropped_for_non_choice_types() {
        let q = draft("true_false", Some(vec!["True", "False"]), json!(true))
            .validate()
            .unwrap();
        assert!(q.options().is_empty());
    }

    #[test]
    fn zero_limits_are_rejected() {
        let mut d = draft("text_input", None, json!("7"));
        d.time_limit = Some(0);
        assert_eq!(d.validate().unwrap_err(), QuestionError::InvalidTimeLimit);

        let mut d = draft("text_input", None, json!("7"));
        d.points = Some(0);
        assert_eq!(d.validate().unwrap_err(), QuestionError::InvalidPoints);
    }

    #[test]
    fn image_reference_must_be_a_url() {
        let mut d = draft("text_input", None, json!("7"));
        d.image_url = Some("not a url".into());
        assert!(matches!(d.validate(), Err(QuestionError::InvalidImage(_))));

        let mut d = draft("text_input", None, json!("7"));
        d.image_url = Some("https://cdn.example.com/q/1.png".into());
        assert!(d.validate().unwrap().image().is_some());
    }

    #[test]
    fn difficulty_parses_case_insensitively() {
        assert_eq!("Hard".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert!("legendary".parse::<Difficulty>().is_err());
    }
}
