use quiz_core::model::{AnswerRecord, ProfileDelta, SessionId, level_for_points};
use sqlx::Row;
use tracing::debug;
use uuid::Uuid;

use super::{
    SqliteRepository,
    mapping::{
        category_id_from_i64, conn, id_i64, question_id_from_i64, ser, submission_from_text,
        submission_to_text, u32_from_i64, user_id_from_str,
    },
};
use crate::repository::{GameSessionRecord, PersistedSession, ResultPersister, StorageError};

fn map_session_row(row: &sqlx::sqlite::SqliteRow) -> Result<GameSessionRecord, StorageError> {
    let session_uuid: String = row.try_get("session_uuid").map_err(ser)?;
    let score = u32_from_i64("score", row.try_get::<i64, _>("score").map_err(ser)?)?;

    Ok(GameSessionRecord {
        session_id: SessionId::from_uuid(Uuid::parse_str(&session_uuid).map_err(ser)?),
        user_id: user_id_from_str(row.try_get::<String, _>("user_id").map_err(ser)?.as_str())?,
        category_id: category_id_from_i64(row.try_get("category_id").map_err(ser)?)?,
        total_questions: u32_from_i64(
            "total_questions",
            row.try_get::<i64, _>("total_questions").map_err(ser)?,
        )?,
        correct_answers: u32_from_i64(
            "correct_answers",
            row.try_get::<i64, _>("correct_answers").map_err(ser)?,
        )?,
        total_time_secs: u32_from_i64(
            "total_time",
            row.try_get::<i64, _>("total_time").map_err(ser)?,
        )?,
        score: u8::try_from(score)
            .map_err(|_| StorageError::Serialization(format!("invalid score: {score}")))?,
        started_at: row.try_get("started_at").map_err(ser)?,
        completed_at: row.try_get("completed_at").map_err(ser)?,
    })
}

fn map_answer_row(row: &sqlx::sqlite::SqliteRow) -> Result<AnswerRecord, StorageError> {
    Ok(AnswerRecord {
        question_id: question_id_from_i64(row.try_get("question_id").map_err(ser)?)?,
        submission: submission_from_text(
            row.try_get::<String, _>("user_answer").map_err(ser)?.as_str(),
        )?,
        is_correct: row.try_get("is_correct").map_err(ser)?,
        time_taken: u32_from_i64(
            "time_taken",
            row.try_get::<i64, _>("time_taken").map_err(ser)?,
        )?,
        points_earned: u32_from_i64(
            "points_earned",
            row.try_get::<i64, _>("points_earned").map_err(ser)?,
        )?,
    })
}

#[async_trait::async_trait]
impl ResultPersister for SqliteRepository {
    async fn persist(
        &self,
        session: &GameSessionRecord,
        answers: &[AnswerRecord],
        delta: ProfileDelta,
    ) -> Result<i64, StorageError> {
        let session_uuid = session.session_id.to_string();
        let user_id = session.user_id.to_string();

        let mut tx = self.pool.begin().await.map_err(conn)?;

        let existing: Option<i64> =
            sqlx::query_scalar("SELECT id FROM game_sessions WHERE session_uuid = ?1")
                .bind(&session_uuid)
                .fetch_optional(&mut *tx)
                .await
                .map_err(conn)?;
        if let Some(id) = existing {
            debug!(session_id = %session.session_id, row_id = id, "session already persisted");
            tx.commit().await.map_err(conn)?;
            return Ok(id);
        }

        let current_points: i64 =
            sqlx::query_scalar("SELECT total_points FROM profiles WHERE user_id = ?1")
                .bind(&user_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(conn)?
                .ok_or(StorageError::NotFound)?;
        let delta_points = i64::try_from(delta.points).map_err(ser)?;
        let new_points = current_points.saturating_add(delta_points);
        let new_level = level_for_points(u64::try_from(new_points).map_err(ser)?);

        sqlx::query(
            r"
                UPDATE profiles SET
                    total_points = ?2,
                    games_played = games_played + ?3,
                    current_level = ?4
                WHERE user_id = ?1
            ",
        )
        .bind(&user_id)
        .bind(new_points)
        .bind(i64::from(delta.games_played))
        .bind(i64::from(new_level))
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        let res = sqlx::query(
            r"
                INSERT INTO game_sessions (
                    session_uuid, user_id, category_id, total_questions,
                    correct_answers, total_time, score, started_at, completed_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
        )
        .bind(&session_uuid)
        .bind(&user_id)
        .bind(id_i64("category_id", session.category_id.value())?)
        .bind(i64::from(session.total_questions))
        .bind(i64::from(session.correct_answers))
        .bind(i64::from(session.total_time_secs))
        .bind(i64::from(session.score))
        .bind(session.started_at)
        .bind(session.completed_at)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;
        let session_row = res.last_insert_rowid();

        for (slot, answer) in answers.iter().enumerate() {
            sqlx::query(
                r"
                    INSERT INTO game_answers (
                        session_id, slot, question_id, user_answer,
                        is_correct, time_taken, points_earned
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ",
            )
            .bind(session_row)
            .bind(i64::try_from(slot).map_err(ser)?)
            .bind(id_i64("question_id", answer.question_id.value())?)
            .bind(submission_to_text(&answer.submission))
            .bind(answer.is_correct)
            .bind(i64::from(answer.time_taken))
            .bind(i64::from(answer.points_earned))
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        debug!(
            session_id = %session.session_id,
            row_id = session_row,
            answers = answers.len(),
            "session persisted"
        );
        Ok(session_row)
    }

    async fn get_session(&self, id: i64) -> Result<PersistedSession, StorageError> {
        let row = sqlx::query(
            r"
                SELECT
                    id, session_uuid, user_id, category_id, total_questions,
                    correct_answers, total_time, score, started_at, completed_at
                FROM game_sessions
                WHERE id = ?1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;
        let session = map_session_row(&row)?;

        let rows = sqlx::query(
            r"
                SELECT question_id, user_answer, is_correct, time_taken, points_earned
                FROM game_answers
                WHERE session_id = ?1
                ORDER BY slot ASC
            ",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut answers = Vec::with_capacity(rows.len());
        for row in rows {
            answers.push(map_answer_row(&row)?);
        }

        Ok(PersistedSession {
            id,
            session,
            answers,
        })
    }
}
