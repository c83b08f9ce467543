use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::profile::ProfileDelta;
use crate::model::{Answer, CategoryId, Question, QuestionId, SessionId, Submission};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ResultError {
    #[error("completed_at is before started_at")]
    InvalidTimeRange,

    #[error("a result needs at least one question")]
    NoQuestions,

    #[error("{answers} answers recorded for {questions} questions")]
    AnswerCountMismatch { questions: usize, answers: usize },

    #[error("too many questions for a single session: {len}")]
    TooManyQuestions { len: usize },
}

/// Rounded percentage of correct answers, halves rounding up.
#[must_use]
pub fn score_percent(correct: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    let correct = u64::from(correct.min(total));
    let total = u64::from(total);
    let rounded = (200 * correct + total) / (2 * total);
    u8::try_from(rounded).unwrap_or(100)
}

/// Feedback tier shown with a finished quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformanceBand {
    Excellent,
    GoodJob,
    KeepTrying,
}

impl PerformanceBand {
    #[must_use]
    pub fn from_score(score: u8) -> Self {
        match score {
            80.. => Self::Excellent,
            60..=79 => Self::GoodJob,
            _ => Self::KeepTrying,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            PerformanceBand::Excellent => "Excellent!",
            PerformanceBand::GoodJob => "Good Job!",
            PerformanceBand::KeepTrying => "Keep Trying!",
        }
    }
}

/// Per-slot row handed to the result persister.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRecord {
    pub question_id: QuestionId,
    pub submission: Submission,
    pub is_correct: bool,
    pub time_taken: u32,
    pub points_earned: u32,
}

/// Immutable summary of a completed session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizResult {
    session_id: SessionId,
    category_id: CategoryId,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    total_questions: u32,
    correct_answers: u32,
    score: u8,
    total_time_secs: u32,
    total_points: u64,
    questions: Vec<Question>,
    answers: Vec<Answer>,
}

impl QuizResult {
    /// Derive the result from a finished session's questions and answers.
    ///
    /// `answers[i]` must be the answer recorded for `questions[i]`.
    ///
    /// # Errors
    ///
    /// Returns `ResultError` when the time range is inverted, the session is
    /// empty, or the two sequences differ in length.
    pub fn from_answers(
        session_id: SessionId,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        questions: Vec<Question>,
        answers: Vec<Answer>,
    ) -> Result<Self, ResultError> {
        if completed_at < started_at {
            return Err(ResultError::InvalidTimeRange);
        }
        let Some(first) = questions.first() else {
            return Err(ResultError::NoQuestions);
        };
        if questions.len() != answers.len() {
            return Err(ResultError::AnswerCountMismatch {
                questions: questions.len(),
                answers: answers.len(),
            });
        }
        let total_questions = u32::try_from(questions.len()).map_err(|_| {
            ResultError::TooManyQuestions {
                len: questions.len(),
            }
        })?;

        let mut correct_answers = 0_u32;
        let mut total_points = 0_u64;
        for (question, answer) in questions.iter().zip(&answers) {
            if answer.is_correct() {
                correct_answers += 1;
                total_points += u64::from(question.points());
            }
        }

        let elapsed_ms = (completed_at - started_at).num_milliseconds();
        let total_time_secs = u32::try_from((elapsed_ms + 500) / 1000).unwrap_or(u32::MAX);

        Ok(Self {
            session_id,
            category_id: first.category_id(),
            started_at,
            completed_at,
            total_questions,
            correct_answers,
            score: score_percent(correct_answers, total_questions),
            total_time_secs,
            total_points,
            questions,
            answers,
        })
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Category of the opening question; mixed sessions are filed under it.
    #[must_use]
    pub fn category_id(&self) -> CategoryId {
        self.category_id
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn correct_answers(&self) -> u32 {
        self.correct_answers
    }

    /// Percentage 0..=100.
    #[must_use]
    pub fn score(&self) -> u8 {
        self.score
    }

    #[must_use]
    pub fn total_time_secs(&self) -> u32 {
        self.total_time_secs
    }

    #[must_use]
    pub fn total_points(&self) -> u64 {
        self.total_points
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn answers(&self) -> &[Answer] {
        &self.answers
    }

    #[must_use]
    pub fn performance(&self) -> PerformanceBand {
        PerformanceBand::from_score(self.score)
    }

    /// One row per slot; points are only earned by correct answers.
    #[must_use]
    pub fn answer_records(&self) -> Vec<AnswerRecord> {
        self.questions
            .iter()
            .zip(&self.answers)
            .map(|(question, answer)| AnswerRecord {
                question_id: question.id(),
                submission: answer.submission().clone(),
                is_correct: answer.is_correct(),
                time_taken: answer.time_taken(),
                points_earned: if answer.is_correct() {
                    question.points()
                } else {
                    0
                },
            })
            .collect()
    }

    /// Change to apply to the player's running totals.
    #[must_use]
    pub fn profile_delta(&self) -> ProfileDelta {
        ProfileDelta {
            points: self.total_points,
            games_played: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Difficulty, QuestionDraft};
    use crate::time::fixed_now;
    use chrono::Duration;
    use serde_json::json;

    fn question(id: u64, points: u32) -> Question {
        QuestionDraft {
            id: QuestionId::new(id),
            prompt: format!("Q{id}"),
            question_type: "true_false".into(),
            category_id: CategoryId::new(id + 100),
            difficulty: Difficulty::Medium,
            options: None,
            correct_answer: json!(true),
            explanation: String::new(),
            time_limit: Some(20),
            points: Some(points),
            image_url: None,
        }
        .validate()
        .unwrap()
    }

    #[test]
    fn score_rounds_half_up() {
        assert_eq!(score_percent(2, 3), 67);
        assert_eq!(score_percent(1, 3), 33);
        assert_eq!(score_percent(1, 8), 13);
        assert_eq!(score_percent(0, 5), 0);
        assert_eq!(score_percent(5, 5), 100);
    }

    #[test]
    fn result_sums_points_of_correct_answers_only() {
        let now = fixed_now();
        let questions = vec![question(1, 10), question(2, 25), question(3, 40)];
        let answers = vec![
            Answer::new(Submission::Bool(true), true, 4),
            Answer::timed_out(20),
            Answer::new(Submission::Bool(true), true, 7),
        ];
        let result = QuizResult::from_answers(
            SessionId::generate(),
            now,
            now + Duration::milliseconds(31_600),
            questions,
            answers,
        )
        .unwrap();

        assert_eq!(result.total_questions(), 3);
        assert_eq!(result.correct_answers(), 2);
        assert_eq!(result.score(), 67);
        assert_eq!(result.total_points(), 50);
        assert_eq!(result.total_time_secs(), 32);
        assert_eq!(result.category_id(), CategoryId::new(101));
        assert_eq!(result.performance(), PerformanceBand::GoodJob);

        let records = result.answer_records();
        assert_eq!(records[1].points_earned, 0);
        assert_eq!(records[1].submission, Submission::Unanswered);
        assert_eq!(records[2].points_earned, 40);
        assert_eq!(result.profile_delta().points, 50);
        assert_eq!(result.profile_delta().games_played, 1);
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let now = fixed_now();
        let err = QuizResult::from_answers(
            SessionId::generate(),
            now,
            now,
            vec![question(1, 10)],
            Vec::new(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ResultError::AnswerCountMismatch {
                questions: 1,
                answers: 0
            }
        );
    }

    #[test]
    fn inverted_time_range_is_rejected() {
        let now = fixed_now();
        let err = QuizResult::from_answers(
            SessionId::generate(),
            now,
            now - Duration::seconds(1),
            vec![question(1, 10)],
            vec![Answer::timed_out(20)],
        )
        .unwrap_err();
        assert_eq!(err, ResultError::InvalidTimeRange);
    }

    #[test]
    fn performance_bands_follow_score() {
        assert_eq!(PerformanceBand::from_score(80), PerformanceBand::Excellent);
        assert_eq!(PerformanceBand::from_score(60), PerformanceBand::GoodJob);
        assert_eq!(PerformanceBand::from_score(59), PerformanceBand::KeepTrying);
    }
}
