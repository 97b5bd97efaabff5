use assess_core::model::{QuizId, SubmissionResult};
use sqlx::Row;

use super::{
    SqliteRepository,
    mapping::{db, id_i64, map_attempt_row, ser},
};
use crate::repository::{AttemptRepository, AttemptRow, StorageError};

const ATTEMPT_COLUMNS: &str = r"
    id, session_id, quiz_id, points_earned, points_possible, questions,
    incident_count, elapsed_seconds, provenance, expired, started_at, completed_at
";

fn insert_error(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Database(inner) if inner.is_unique_violation() => StorageError::Conflict,
        _ => db(e),
    }
}

#[async_trait::async_trait]
impl AttemptRepository for SqliteRepository {
    async fn append_attempt(&self, result: &SubmissionResult) -> Result<i64, StorageError> {
        let questions = serde_json::to_string(&result.questions).map_err(ser)?;
        let elapsed = i64::try_from(result.elapsed_seconds)
            .map_err(|_| StorageError::Serialization("elapsed_seconds overflow".into()))?;

        let res = sqlx::query(
            r"
                INSERT INTO attempts (
                    session_id, quiz_id, points_earned, points_possible, questions,
                    incident_count, elapsed_seconds, provenance, expired,
                    started_at, completed_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ",
        )
        .bind(result.session_id.to_string())
        .bind(id_i64("quiz_id", result.quiz_id.value())?)
        .bind(i64::from(result.points_earned))
        .bind(i64::from(result.points_possible))
        .bind(questions)
        .bind(i64::from(result.incident_count))
        .bind(elapsed)
        .bind(result.provenance.as_str())
        .bind(result.expired)
        .bind(result.started_at)
        .bind(result.completed_at)
        .execute(self.pool())
        .await
        .map_err(insert_error)?;

        Ok(res.last_insert_rowid())
    }

    async fn get_attempt(&self, id: i64) -> Result<SubmissionResult, StorageError> {
        let sql = format!("SELECT {ATTEMPT_COLUMNS} FROM attempts WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(db)?
            .ok_or(StorageError::NotFound)?;

        map_attempt_row(&row)
    }

    async fn list_attempts(
        &self,
        quiz_id: QuizId,
        limit: u32,
    ) -> Result<Vec<AttemptRow>, StorageError> {
        let sql = format!(
            "SELECT {ATTEMPT_COLUMNS} FROM attempts WHERE quiz_id = ?1 \
             ORDER BY completed_at DESC, id DESC LIMIT ?2"
        );
        let rows = sqlx::query(&sql)
            .bind(id_i64("quiz_id", quiz_id.value())?)
            .bind(i64::from(limit))
            .fetch_all(self.pool())
            .await
            .map_err(db)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.try_get("id").map_err(ser)?;
            out.push(AttemptRow::new(id, map_attempt_row(&row)?));
        }
        Ok(out)
    }
}
