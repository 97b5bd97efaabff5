use assess_core::model::{QuestionId, QuizId, SubmissionResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A saved, not yet submitted answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftAnswer {
    pub question_id: QuestionId,
    pub value: String,
    pub saved_at: DateTime<Utc>,
}

/// Stored attempt with its row id.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptRow {
    pub id: i64,
    pub result: SubmissionResult,
}

impl AttemptRow {
    #[must_use]
    pub fn new(id: i64, result: SubmissionResult) -> Self {
        Self { id, result }
    }
}

/// Draft answers keyed by quiz, so a reload can resume where the learner left off.
///
/// Assumes one open attempt per quiz on this store. A second concurrent session
/// for the same quiz would restore the first one's drafts, and whichever
/// completes first clears them for both.
#[async_trait]
pub trait DraftRepository: Send + Sync {
    /// Insert or overwrite the draft for one question.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the draft cannot be stored.
    async fn save_draft(
        &self,
        quiz_id: QuizId,
        draft: &DraftAnswer,
    ) -> Result<(), StorageError>;

    /// All drafts for a quiz, ordered by question id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn load_drafts(&self, quiz_id: QuizId) -> Result<Vec<DraftAnswer>, StorageError>;

    /// Drop every draft for a quiz. Clearing an empty set is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on write failures.
    async fn clear_drafts(&self, quiz_id: QuizId) -> Result<(), StorageError>;
}

/// Completed attempts, one per session.
#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// Persist a completed attempt and return its row id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the session was already stored.
    async fn append_attempt(&self, result: &SubmissionResult) -> Result<i64, StorageError>;

    /// Fetch an attempt by row id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing.
    async fn get_attempt(&self, id: i64) -> Result<SubmissionResult, StorageError>;

    /// Most recent attempts for a quiz, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn list_attempts(&self, quiz_id: QuizId, limit: u32) -> Result<Vec<AttemptRow>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    drafts: Arc<Mutex<HashMap<(QuizId, QuestionId), DraftAnswer>>>,
    attempts: Arc<Mutex<Vec<(i64, SubmissionResult)>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl DraftRepository for InMemoryRepository {
    async fn save_draft(
        &self,
        quiz_id: QuizId,
        draft: &DraftAnswer,
    ) -> Result<(), StorageError> {
        let mut guard = self.drafts.lock().map_err(poisoned)?;
        guard.insert((quiz_id, draft.question_id), draft.clone());
        Ok(())
    }

    async fn load_drafts(&self, quiz_id: QuizId) -> Result<Vec<DraftAnswer>, StorageError> {
        let guard = self.drafts.lock().map_err(poisoned)?;
        let mut out: Vec<DraftAnswer> = guard
            .iter()
            .filter(|((quiz, _), _)| *quiz == quiz_id)
            .map(|(_, draft)| draft.clone())
            .collect();
        out.sort_by_key(|d| d.question_id);
        Ok(out)
    }

    async fn clear_drafts(&self, quiz_id: QuizId) -> Result<(), StorageError> {
        let mut guard = self.drafts.lock().map_err(poisoned)?;
        guard.retain(|(quiz, _), _| *quiz != quiz_id);
        Ok(())
    }
}

#[async_trait]
impl AttemptRepository for InMemoryRepository {
    async fn append_attempt(&self, result: &SubmissionResult) -> Result<i64, StorageError> {
        let mut guard = self.attempts.lock().map_err(poisoned)?;
        if guard.iter().any(|(_, r)| r.session_id == result.session_id) {
            return Err(StorageError::Conflict);
        }
        let id = guard.last().map_or(1, |(id, _)| id + 1);
        guard.push((id, result.clone()));
        Ok(id)
    }

    async fn get_attempt(&self, id: i64) -> Result<SubmissionResult, StorageError> {
        let guard = self.attempts.lock().map_err(poisoned)?;
        guard
            .iter()
            .find(|(row_id, _)| *row_id == id)
            .map(|(_, r)| r.clone())
            .ok_or(StorageError::NotFound)
    }

    async fn list_attempts(&self, quiz_id: QuizId, limit: u32) -> Result<Vec<AttemptRow>, StorageError> {
        let guard = self.attempts.lock().map_err(poisoned)?;
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        let mut rows: Vec<AttemptRow> = guard
            .iter()
            .filter(|(_, r)| r.quiz_id == quiz_id)
            .map(|(id, r)| AttemptRow::new(*id, r.clone()))
            .collect();
        rows.sort_by(|a, b| {
            b.result
                .completed_at
                .cmp(&a.result.completed_at)
                .then(b.id.cmp(&a.id))
        });
        rows.truncate(limit);
        Ok(rows)
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub drafts: Arc<dyn DraftRepository>,
    pub attempts: Arc<dyn AttemptRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let drafts: Arc<dyn DraftRepository> = Arc::new(repo.clone());
        let attempts: Arc<dyn AttemptRepository> = Arc::new(repo);
        Self { drafts, attempts }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assess_core::model::{Provenance, QuestionGrade, QuestionOutcome, SessionId};
    use assess_core::time::fixed_now;
    use chrono::Duration;

    fn result(quiz: u64, minutes_later: i64) -> SubmissionResult {
        let at = fixed_now() + Duration::minutes(minutes_later);
        SubmissionResult {
            session_id: SessionId::generate(),
            quiz_id: QuizId::new(quiz),
            points_earned: 2,
            points_possible: 6,
            questions: vec![QuestionGrade {
                question_id: QuestionId::new(1),
                outcome: QuestionOutcome::Correct,
                points_awarded: 2,
            }],
            incident_count: 0,
            elapsed_seconds: 40,
            provenance: Provenance::LocalFallback,
            expired: false,
            started_at: fixed_now(),
            completed_at: at,
        }
    }

    fn draft(question: u64, value: &str) -> DraftAnswer {
        DraftAnswer {
            question_id: QuestionId::new(question),
            value: value.into(),
            saved_at: fixed_now(),
        }
    }

    #[tokio::test]
    async fn drafts_overwrite_and_clear_per_quiz() {
        let repo = InMemoryRepository::new();
        let quiz = QuizId::new(1);
        repo.save_draft(quiz, &draft(2, "a")).await.unwrap();
        repo.save_draft(quiz, &draft(1, "x")).await.unwrap();
        repo.save_draft(quiz, &draft(2, "b")).await.unwrap();
        repo.save_draft(QuizId::new(2), &draft(1, "other")).await.unwrap();

        let drafts = repo.load_drafts(quiz).await.unwrap();
        let values: Vec<_> = drafts.iter().map(|d| d.value.as_str()).collect();
        assert_eq!(values, ["x", "b"]);

        repo.clear_drafts(quiz).await.unwrap();
        assert!(repo.load_drafts(quiz).await.unwrap().is_empty());
        assert_eq!(repo.load_drafts(QuizId::new(2)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn attempts_are_unique_per_session_and_listed_newest_first() {
        let repo = InMemoryRepository::new();
        let older = result(1, 0);
        let newer = result(1, 5);

        let first = repo.append_attempt(&older).await.unwrap();
        let second = repo.append_attempt(&newer).await.unwrap();
        repo.append_attempt(&result(2, 1)).await.unwrap();
        assert!(matches!(
            repo.append_attempt(&older).await,
            Err(StorageError::Conflict)
        ));

        let rows = repo.list_attempts(QuizId::new(1), 10).await.unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, [second, first]);
        assert_eq!(repo.get_attempt(first).await.unwrap(), older);
        assert!(matches!(repo.get_attempt(99).await, Err(StorageError::NotFound)));
    }
}
