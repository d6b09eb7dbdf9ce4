use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs the versioned migrations for the current schema.
///
/// Version 1 creates player progress, per-level progress, and the round log.
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
                CREATE TABLE IF NOT EXISTS player_progress (
                    id INTEGER PRIMARY KEY CHECK (id = 1),
                    current_level INTEGER NOT NULL CHECK (current_level >= 0),
                    updated_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS level_progress (
                    level_id INTEGER PRIMARY KEY CHECK (level_id >= 0),
                    wins INTEGER NOT NULL CHECK (wins BETWEEN 0 AND 3),
                    unlocked INTEGER NOT NULL CHECK (unlocked IN (0, 1))
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS round_log (
                    id INTEGER PRIMARY KEY,
                    level_id INTEGER NOT NULL CHECK (level_id >= 0),
                    target TEXT NOT NULL,
                    outcome TEXT NOT NULL CHECK (outcome IN ('won', 'lost')),
                    attempts_used INTEGER NOT NULL CHECK (attempts_used BETWEEN 1 AND 3),
                    score_after INTEGER NOT NULL CHECK (score_after >= 0),
                    started_at TEXT NOT NULL,
                    completed_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_round_log_level_completed
                    ON round_log (level_id, completed_at);
            ",
        )
        .execute(&mut *tx)
        .await?;

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
