use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Applies versioned migrations recorded in `schema_migrations`.
///
/// Version 1 creates draft answers and completed attempts.
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
                CREATE TABLE IF NOT EXISTS draft_answers (
                    quiz_id INTEGER NOT NULL,
                    question_id INTEGER NOT NULL,
                    value TEXT NOT NULL,
                    saved_at TEXT NOT NULL,
                    PRIMARY KEY (quiz_id, question_id)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS attempts (
                    id INTEGER PRIMARY KEY,
                    session_id TEXT NOT NULL UNIQUE,
                    quiz_id INTEGER NOT NULL,
                    points_earned INTEGER NOT NULL CHECK (points_earned >= 0),
                    points_possible INTEGER NOT NULL CHECK (points_possible >= 0),
                    questions TEXT NOT NULL,
                    incident_count INTEGER NOT NULL CHECK (incident_count >= 0),
                    elapsed_seconds INTEGER NOT NULL CHECK (elapsed_seconds >= 0),
                    provenance TEXT NOT NULL
                        CHECK (provenance IN ('server-graded', 'local-fallback')),
                    expired INTEGER NOT NULL,
                    started_at TEXT NOT NULL,
                    completed_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_attempts_quiz_completed
                    ON attempts (quiz_id, completed_at);
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
