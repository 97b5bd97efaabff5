use std::collections::HashMap;

use assess_core::model::{Quiz, QuizId};
use async_trait::async_trait;

use crate::error::InitiationError;

/// Loads a quiz for a new session. Calling it twice for the same quiz is harmless.
#[async_trait]
pub trait InitiationService: Send + Sync {
    /// # Errors
    ///
    /// Returns `InitiationError` if the quiz cannot be loaded or is invalid.
    async fn initiate(&self, quiz_id: QuizId) -> Result<Quiz, InitiationError>;
}

/// Serves quizzes from memory.
#[derive(Debug, Clone, Default)]
pub struct StaticInitiationService {
    quizzes: HashMap<QuizId, Quiz>,
}

impl StaticInitiationService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_quiz(mut self, quiz: Quiz) -> Self {
        self.quizzes.insert(quiz.id(), quiz);
        self
    }
}

#[async_trait]
impl InitiationService for StaticInitiationService {
    async fn initiate(&self, quiz_id: QuizId) -> Result<Quiz, InitiationError> {
        self.quizzes
            .get(&quiz_id)
            .cloned()
            .ok_or(InitiationError::UnknownQuiz(quiz_id))
    }
}
