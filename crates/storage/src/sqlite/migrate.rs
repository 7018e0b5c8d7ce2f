use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs the versioned schema migrations.
///
/// Version 1 creates the learner profile, its completed-lesson set and the
/// lesson summary history.
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

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS profile (
                    id INTEGER PRIMARY KEY CHECK (id = 1),
                    name TEXT NOT NULL,
                    experience_points INTEGER NOT NULL CHECK (experience_points >= 0),
                    level INTEGER NOT NULL CHECK (level >= 1),
                    level_progress INTEGER NOT NULL CHECK (level_progress BETWEEN 0 AND 99),
                    streak INTEGER NOT NULL CHECK (streak >= 0),
                    updated_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS profile_completed_lessons (
                    profile_id INTEGER NOT NULL,
                    lesson_id INTEGER NOT NULL CHECK (lesson_id >= 0),
                    position INTEGER NOT NULL,
                    PRIMARY KEY (profile_id, lesson_id),
                    FOREIGN KEY (profile_id) REFERENCES profile(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS lesson_summaries (
                    id INTEGER PRIMARY KEY,
                    lesson_id INTEGER NOT NULL CHECK (lesson_id >= 0),
                    started_at TEXT NOT NULL,
                    completed_at TEXT NOT NULL,
                    rounds INTEGER NOT NULL CHECK (rounds >= 0),
                    correct INTEGER NOT NULL CHECK (correct >= 0),
                    mistakes INTEGER NOT NULL CHECK (mistakes >= 0),
                    hearts_left INTEGER NOT NULL CHECK (hearts_left >= 0),
                    xp_gained INTEGER NOT NULL CHECK (xp_gained >= 0)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_lesson_summaries_completed
                ON lesson_summaries (lesson_id, completed_at DESC);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)")
            .bind(1_i64)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
    }

    Ok(())
}
