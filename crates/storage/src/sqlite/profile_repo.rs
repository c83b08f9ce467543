use quiz_core::model::{Profile, UserId};

use super::{
    SqliteRepository,
    mapping::{conn, map_profile_row, ser},
};
use crate::repository::{ProfileRepository, StorageError};

#[async_trait::async_trait]
impl ProfileRepository for SqliteRepository {
    async fn upsert_profile(&self, profile: &Profile) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO profiles (user_id, username, total_points, games_played, current_level)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(user_id) DO UPDATE SET
                    username = excluded.username,
                    total_points = excluded.total_points,
                    games_played = excluded.games_played,
                    current_level = excluded.current_level
            ",
        )
        .bind(profile.user_id().to_string())
        .bind(profile.username())
        .bind(i64::try_from(profile.total_points()).map_err(ser)?)
        .bind(i64::from(profile.games_played()))
        .bind(i64::from(profile.current_level()))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn get_profile(&self, user_id: UserId) -> Result<Profile, StorageError> {
        let row = sqlx::query(
            r"
                SELECT user_id, username, total_points, games_played
                FROM profiles
                WHERE user_id = ?1
            ",
        )
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        map_profile_row(&row)
    }
}
