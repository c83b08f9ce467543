use std::sync::Arc;

use serde_json::Value;

use quiz_core::evaluator::evaluate;
use quiz_core::model::{QuestionId, Submission};
use storage::repository::{QuestionRepository, StorageError};

use crate::error::AnswerCheckError;

/// Verdict for a single answer checked outside a session.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerCheck {
    pub question_id: QuestionId,
    pub is_correct: bool,
    pub explanation: String,
    pub correct_answer: Value,
}

/// Stateless answer checking against the question bank.
#[derive(Clone)]
pub struct AnswerCheckService {
    questions: Arc<dyn QuestionRepository>,
}

impl AnswerCheckService {
    #[must_use]
    pub fn new(questions: Arc<dyn QuestionRepository>) -> Self {
        Self { questions }
    }

    /// # Errors
    ///
    /// Returns `AnswerCheckError::QuestionNotFound` for unknown ids, or storage
    /// errors.
    pub async fn check(
        &self,
        question_id: QuestionId,
        submission: &Submission,
    ) -> Result<AnswerCheck, AnswerCheckError> {
        let question = match self.questions.get_question(question_id).await {
            Ok(question) => question,
            Err(StorageError::NotFound) => {
                return Err(AnswerCheckError::QuestionNotFound(question_id));
            }
            Err(err) => return Err(err.into()),
        };

        Ok(AnswerCheck {
            question_id,
            is_correct: evaluate(&question, submission),
            explanation: question.explanation().to_owned(),
            correct_answer: question.key().correct_json(),
        })
    }

    /// Check a raw JSON answer as a client would post it.
    ///
    /// # Errors
    ///
    /// Returns `AnswerCheckError::Submission` if the value has no submission
    /// shape, otherwise as [`AnswerCheckService::check`].
    pub async fn check_json(
        &self,
        question_id: QuestionId,
        raw: &Value,
    ) -> Result<AnswerCheck, AnswerCheckError> {
        let submission = Submission::from_json(raw)?;
        self.check(question_id, &submission).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{CategoryId, Difficulty, QuestionDraft};
    use serde_json::json;
    use storage::repository::InMemoryRepository;

    async fn service() -> AnswerCheckService {
        let repo = InMemoryRepository::new();
        let question = QuestionDraft {
            id: QuestionId::new(5),
            prompt: "Capital of France?".into(),
            question_type: "text_input".into(),
            category_id: CategoryId::new(1),
            difficulty: Difficulty::Easy,
            options: None,
            correct_answer: json!("Paris"),
            explanation: "Paris has been the capital since 987.".into(),
            time_limit: None,
            points: None,
            image_url: None,
        }
        .validate()
        .unwrap();
        repo.upsert_question(&question).await.unwrap();
        AnswerCheckService::new(Arc::new(repo))
    }

    #[tokio::test]
    async fn reports_verdict_and_explanation() {
        let service = service().await;
        let check = service
            .check(QuestionId::new(5), &Submission::text("  paris "))
            .await
            .unwrap();
        assert!(check.is_correct);
        assert_eq!(check.correct_answer, json!("Paris"));
        assert!(check.explanation.starts_with("Paris has been"));
    }

    #[tokio::test]
    async fn json_answers_are_decoded() {
        let service = service().await;
        let check = service
            .check_json(QuestionId::new(5), &json!("Lyon"))
            .await
            .unwrap();
        assert!(!check.is_correct);

        let err = service
            .check_json(QuestionId::new(5), &json!([1, 2]))
            .await
            .unwrap_err();
        assert!(matches!(err, AnswerCheckError::Submission(_)));
    }

    #[tokio::test]
    async fn unknown_question_is_reported() {
        let service = service().await;
        let err = service
            .check(QuestionId::new(404), &Submission::Bool(true))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AnswerCheckError::QuestionNotFound(id) if id == QuestionId::new(404)
        ));
    }
}
