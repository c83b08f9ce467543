use quiz_core::model::{
    CategoryId, Difficulty, Profile, Question, QuestionDraft, QuestionId, Submission, UserId,
};
use sqlx::Row;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn question_id_from_i64(v: i64) -> Result<QuestionId, StorageError> {
    Ok(QuestionId::new(i64_to_u64("question_id", v)?))
}

pub(crate) fn category_id_from_i64(v: i64) -> Result<CategoryId, StorageError> {
    Ok(CategoryId::new(i64_to_u64("category_id", v)?))
}

pub(crate) fn user_id_from_str(v: &str) -> Result<UserId, StorageError> {
    v.parse::<UserId>().map_err(ser)
}

pub(crate) fn submission_to_text(submission: &Submission) -> String {
    submission.to_json().to_string()
}

pub(crate) fn submission_from_text(raw: &str) -> Result<Submission, StorageError> {
    let value: serde_json::Value = serde_json::from_str(raw).map_err(ser)?;
    Submission::from_json(&value).map_err(ser)
}

pub(crate) fn map_question_row(row: &sqlx::sqlite::SqliteRow) -> Result<Question, StorageError> {
    let options = row
        .try_get::<Option<String>, _>("options")
        .map_err(ser)?
        .map(|raw| serde_json::from_str::<Vec<String>>(&raw))
        .transpose()
        .map_err(ser)?;
    let correct_answer = serde_json::from_str(
        row.try_get::<String, _>("correct_answer")
            .map_err(ser)?
            .as_str(),
    )
    .map_err(ser)?;
    let difficulty: Difficulty = row
        .try_get::<String, _>("difficulty")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;

    QuestionDraft {
        id: question_id_from_i64(row.try_get("id").map_err(ser)?)?,
        prompt: row.try_get("prompt").map_err(ser)?,
        question_type: row.try_get("question_type").map_err(ser)?,
        category_id: category_id_from_i64(row.try_get("category_id").map_err(ser)?)?,
        difficulty,
        options,
        correct_answer,
        explanation: row.try_get("explanation").map_err(ser)?,
        time_limit: row
            .try_get::<Option<i64>, _>("time_limit")
            .map_err(ser)?
            .map(|v| u32_from_i64("time_limit", v))
            .transpose()?,
        points: row
            .try_get::<Option<i64>, _>("points")
            .map_err(ser)?
            .map(|v| u32_from_i64("points", v))
            .transpose()?,
        image_url: row.try_get("image_url").map_err(ser)?,
    }
    .validate()
    .map_err(ser)
}

pub(crate) fn map_profile_row(row: &sqlx::sqlite::SqliteRow) -> Result<Profile, StorageError> {
    let user_id = user_id_from_str(row.try_get::<String, _>("user_id").map_err(ser)?.as_str())?;
    let username: String = row.try_get("username").map_err(ser)?;
    let total_points = i64_to_u64(
        "total_points",
        row.try_get::<i64, _>("total_points").map_err(ser)?,
    )?;
    let games_played = u32_from_i64(
        "games_played",
        row.try_get::<i64, _>("games_played").map_err(ser)?,
    )?;

    Profile::from_persisted(user_id, username, total_points, games_played).map_err(ser)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submissions_survive_text_storage() {
        for submission in [
            Submission::Unanswered,
            Submission::Choice(3),
            Submission::Bool(false),
            Submission::text("Jakarta"),
        ] {
            let raw = submission_to_text(&submission);
            assert_eq!(submission_from_text(&raw).unwrap(), submission);
        }
    }

    #[test]
    fn negative_ids_are_rejected() {
        assert!(question_id_from_i64(-1).is_err());
        assert!(u32_from_i64("points", -5).is_err());
    }
}
