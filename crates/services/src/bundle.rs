use assess_core::model::{Question, QuestionId, QuestionKind, Quiz, QuizId};
use serde::{Deserialize, Serialize};

/// Quiz as delivered by the session-initiation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizBundle {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub allotted_seconds: u32,
    pub questions: Vec<QuestionBundle>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionBundle {
    pub id: QuestionId,
    pub kind: QuestionKind,
    pub text: String,
    #[serde(default)]
    pub options: Vec<String>,
    pub points: u32,
    /// Ordinal position; defaults to list order.
    #[serde(default)]
    pub position: Option<u32>,
    #[serde(default)]
    pub correct_answer: Option<String>,
}

impl QuizBundle {
    /// Validate into a domain `Quiz`.
    ///
    /// # Errors
    ///
    /// Returns `assess_core::Error` if any question or the quiz itself is invalid.
    pub fn into_quiz(self, id: QuizId) -> Result<Quiz, assess_core::Error> {
        let mut questions = Vec::with_capacity(self.questions.len());
        for (index, q) in self.questions.into_iter().enumerate() {
            let position = q
                .position
                .unwrap_or_else(|| u32::try_from(index).unwrap_or(u32::MAX));
            let question = Question::new(q.id, q.kind, q.text, q.options, q.points, position)?;
            let question = match q.correct_answer {
                Some(answer) => question.with_correct_answer(answer)?,
                None => question,
            };
            questions.push(question);
        }
        Ok(Quiz::new(
            id,
            self.title,
            self.description,
            self.allotted_seconds,
            questions,
        )?)
    }
}
