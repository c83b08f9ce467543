use quiz_core::model::{Question, QuestionId};

use super::{
    SqliteRepository,
    mapping::{conn, id_i64, map_question_row, ser},
};
use crate::repository::{CandidateFilter, QuestionRepository, StorageError};

const QUESTION_COLUMNS: &str = r"
    id, prompt, question_type, category_id, difficulty, options,
    correct_answer, explanation, time_limit, points, image_url
";

#[async_trait::async_trait]
impl QuestionRepository for SqliteRepository {
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        let options = if question.options().is_empty() {
            None
        } else {
            Some(serde_json::to_string(question.options()).map_err(ser)?)
        };

        sqlx::query(
            r"
                INSERT INTO questions (
                    id, prompt, question_type, category_id, difficulty, options,
                    correct_answer, explanation, time_limit, points, image_url
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                ON CONFLICT(id) DO UPDATE SET
                    prompt = excluded.prompt,
                    question_type = excluded.question_type,
                    category_id = excluded.category_id,
                    difficulty = excluded.difficulty,
                    options = excluded.options,
                    correct_answer = excluded.correct_answer,
                    explanation = excluded.explanation,
                    time_limit = excluded.time_limit,
                    points = excluded.points,
                    image_url = excluded.image_url
            ",
        )
        .bind(id_i64("question_id", question.id().value())?)
        .bind(question.prompt())
        .bind(question.question_type().as_str())
        .bind(id_i64("category_id", question.category_id().value())?)
        .bind(question.difficulty().as_str())
        .bind(options)
        .bind(question.key().correct_json().to_string())
        .bind(question.explanation())
        .bind(i64::from(question.time_limit()))
        .bind(i64::from(question.points()))
        .bind(question.image().map(ToString::to_string))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn get_question(&self, id: QuestionId) -> Result<Question, StorageError> {
        let sql = format!("SELECT {QUESTION_COLUMNS} FROM questions WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id_i64("question_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
            .ok_or(StorageError::NotFound)?;

        map_question_row(&row)
    }

    async fn fetch_candidates(
        &self,
        filter: &CandidateFilter,
    ) -> Result<Vec<Question>, StorageError> {
        let mut sql = format!("SELECT {QUESTION_COLUMNS} FROM questions WHERE 1 = 1");

        let mut bind_index = 1;
        if filter.category.is_some() {
            sql.push_str(" AND category_id = ?");
            sql.push_str(&bind_index.to_string());
            bind_index += 1;
        }
        if filter.difficulty.is_some() {
            sql.push_str(" AND difficulty = ?");
            sql.push_str(&bind_index.to_string());
            bind_index += 1;
        }
        if !filter.exclude_ids.is_empty() {
            sql.push_str(" AND id NOT IN (");
            for i in 0..filter.exclude_ids.len() {
                if i > 0 {
                    sql.push_str(", ");
                }
                sql.push('?');
                sql.push_str(&bind_index.to_string());
                bind_index += 1;
            }
            sql.push(')');
        }

        let mut query = sqlx::query(&sql);
        if let Some(category) = filter.category {
            query = query.bind(id_i64("category_id", category.value())?);
        }
        if let Some(difficulty) = filter.difficulty {
            query = query.bind(difficulty.as_str());
        }
        for id in &filter.exclude_ids {
            query = query.bind(id_i64("question_id", id.value())?);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_question_row(&row)?);
        }
        Ok(out)
    }
}
