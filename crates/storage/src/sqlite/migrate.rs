use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

const SCHEMA_V1: [&str; 7] = [
    r"
        CREATE TABLE IF NOT EXISTS questions (
            id INTEGER PRIMARY KEY,
            prompt TEXT NOT NULL,
            question_type TEXT NOT NULL,
            category_id INTEGER NOT NULL,
            difficulty TEXT NOT NULL,
            options TEXT,
            correct_answer TEXT NOT NULL,
            explanation TEXT NOT NULL DEFAULT '',
            time_limit INTEGER CHECK (time_limit > 0),
            points INTEGER CHECK (points > 0),
            image_url TEXT
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS profiles (
            user_id TEXT PRIMARY KEY,
            username TEXT NOT NULL,
            total_points INTEGER NOT NULL DEFAULT 0 CHECK (total_points >= 0),
            games_played INTEGER NOT NULL DEFAULT 0 CHECK (games_played >= 0),
            current_level INTEGER NOT NULL DEFAULT 1 CHECK (current_level >= 1)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS game_sessions (
            id INTEGER PRIMARY KEY,
            session_uuid TEXT NOT NULL UNIQUE,
            user_id TEXT NOT NULL,
            category_id INTEGER NOT NULL,
            total_questions INTEGER NOT NULL CHECK (total_questions > 0),
            correct_answers INTEGER NOT NULL CHECK (correct_answers >= 0),
            total_time INTEGER NOT NULL CHECK (total_time >= 0),
            score INTEGER NOT NULL CHECK (score BETWEEN 0 AND 100),
            started_at TEXT NOT NULL,
            completed_at TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES profiles(user_id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS game_answers (
            id INTEGER PRIMARY KEY,
            session_id INTEGER NOT NULL,
            slot INTEGER NOT NULL CHECK (slot >= 0),
            question_id INTEGER NOT NULL,
            user_answer TEXT NOT NULL,
            is_correct INTEGER NOT NULL CHECK (is_correct IN (0, 1)),
            time_taken INTEGER NOT NULL CHECK (time_taken >= 0),
            points_earned INTEGER NOT NULL CHECK (points_earned >= 0),
            UNIQUE (session_id, slot),
            FOREIGN KEY (session_id) REFERENCES game_sessions(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_questions_category_difficulty
            ON questions (category_id, difficulty);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_game_sessions_user_completed
            ON game_sessions (user_id, completed_at);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_profiles_total_points
            ON profiles (total_points);
    ",
];

/// Runs the versioned migrations for the quiz schema.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        for statement in SCHEMA_V1 {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
