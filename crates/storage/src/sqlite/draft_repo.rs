use assess_core::model::QuizId;
use sqlx::Row;

use super::{
    SqliteRepository,
    mapping::{db, id_i64, question_id_from_i64, ser},
};
use crate::repository::{DraftAnswer, DraftRepository, StorageError};

#[async_trait::async_trait]
impl DraftRepository for SqliteRepository {
    async fn save_draft(&self, quiz_id: QuizId, draft: &DraftAnswer) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO draft_answers (quiz_id, question_id, value, saved_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(quiz_id, question_id) DO UPDATE SET
                    value = excluded.value,
                    saved_at = excluded.saved_at
            ",
        )
        .bind(id_i64("quiz_id", quiz_id.value())?)
        .bind(id_i64("question_id", draft.question_id.value())?)
        .bind(&draft.value)
        .bind(draft.saved_at)
        .execute(self.pool())
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn load_drafts(&self, quiz_id: QuizId) -> Result<Vec<DraftAnswer>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT question_id, value, saved_at
                FROM draft_answers
                WHERE quiz_id = ?1
                ORDER BY question_id ASC
            ",
        )
        .bind(id_i64("quiz_id", quiz_id.value())?)
        .fetch_all(self.pool())
        .await
        .map_err(db)?;

        rows.iter()
            .map(|row| {
                Ok(DraftAnswer {
                    question_id: question_id_from_i64(
                        row.try_get::<i64, _>("question_id").map_err(ser)?,
                    )?,
                    value: row.try_get("value").map_err(ser)?,
                    saved_at: row.try_get("saved_at").map_err(ser)?,
                })
            })
            .collect()
    }

    async fn clear_drafts(&self, quiz_id: QuizId) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM draft_answers WHERE quiz_id = ?1")
            .bind(id_i64("quiz_id", quiz_id.value())?)
            .execute(self.pool())
            .await
            .map_err(db)?;
        Ok(())
    }
}
