//! Correctness rules for submitted answers.
//!
//! Every surface that judges an answer (the timed session, the validate
//! endpoint) goes through [`evaluate`], so the rules cannot drift apart.

use crate::model::{AnswerKey, Question, Submission};

/// Judge a submission against a question's answer key.
///
/// - multiple choice: exact option index equality
/// - true/false: exact boolean equality
/// - text input: case-folded equality after trimming surrounding whitespace;
///   choice and boolean submissions are compared by their textual form
/// - the unanswered sentinel is never correct
///
/// Any other shape mismatch is judged incorrect.
#[must_use]
pub fn evaluate(question: &Question, submitted: &Submission) -> bool {
    evaluate_key(question.key(), submitted)
}

/// Same as [`evaluate`] when only the key is at hand.
#[must_use]
pub fn evaluate_key(key: &AnswerKey, submitted: &Submission) -> bool {
    match (key, submitted) {
        (_, Submission::Unanswered) => false,
        (AnswerKey::MultipleChoice { correct, .. }, Submission::Choice(index)) => correct == index,
        (AnswerKey::TrueFalse { correct }, Submission::Bool(value)) => correct == value,
        (AnswerKey::TextInput { correct }, Submission::Text(text)) => text_matches(correct, text),
        (AnswerKey::TextInput { correct }, Submission::Choice(index)) => {
            text_matches(correct, &index.to_string())
        }
        (AnswerKey::TextInput { correct }, Submission::Bool(value)) => {
            text_matches(correct, if *value { "true" } else { "false" })
        }
        _ => false,
    }
}

fn text_matches(expected: &str, submitted: &str) -> bool {
    fold(expected) == fold(submitted)
}

fn fold(value: &str) -> String {
    value.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CategoryId, Difficulty, QuestionDraft, QuestionId};
    use serde_json::{Value, json};

    fn question(question_type: &str, options: Option<Vec<&str>>, correct: Value) -> Question {
        QuestionDraft {
            id: QuestionId::new(9),
            prompt: "prompt".into(),
            question_type: question_type.into(),
            category_id: CategoryId::new(1),
            difficulty: Difficulty::Easy,
            options: options.map(|o| o.into_iter().map(String::from).collect()),
            correct_answer: correct,
            explanation: String::new(),
            time_limit: Some(30),
            points: Some(10),
            image_url: None,
        }
        .validate()
        .unwrap()
    }

    #[test]
    fn multiple_choice_uses_exact_index() {
        let q = question("multiple_choice", Some(vec!["a", "b", "c"]), json!(1));
        assert!(evaluate(&q, &Submission::Choice(1)));
        assert!(!evaluate(&q, &Submission::Choice(2)));
        assert!(!evaluate(&q, &Submission::text("1")));
    }

    #[test]
    fn true_false_uses_exact_bool() {
        let q = question("true_false", None, json!(true));
        assert!(!evaluate(&q, &Submission::Bool(false)));
        assert!(evaluate(&q, &Submission::Bool(true)));
    }

    #[test]
    fn text_input_is_case_folded() {
        let q = question("text_input", None, json!("7"));
        assert!(evaluate(&q, &Submission::text("7")));
        assert!(!evaluate(&q, &Submission::text("seven")));

        let q = question("text_input", None, json!("Jakarta"));
        assert!(evaluate(&q, &Submission::text("jAKARTA")));
        assert!(evaluate(&q, &Submission::text("  Jakarta ")));
        assert!(!evaluate(&q, &Submission::text("Jak arta")));
    }

    #[test]
    fn text_input_compares_textual_form_of_other_shapes() {
        let q = question("text_input", None, json!("7"));
        assert!(evaluate(&q, &Submission::Choice(7)));

        let q = question("text_input", None, json!("True"));
        assert!(evaluate(&q, &Submission::Bool(true)));
    }

    #[test]
    fn unanswered_is_never_correct() {
        for q in [
            question("multiple_choice", Some(vec!["a", "b"]), json!(0)),
            question("true_false", None, json!(false)),
            question("text_input", None, json!("x")),
        ] {
            assert!(!evaluate(&q, &Submission::Unanswered));
        }
    }

    #[test]
    fn evaluation_is_deterministic() {
        let q = question("text_input", None, json!("Paris"));
        let submitted = Submission::text("paris");
        assert_eq!(evaluate(&q, &submitted), evaluate(&q, &submitted));
    }
}
