use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::model::ids::{QuestionId, QuizId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text cannot be empty")]
    EmptyText,

    #[error("{kind} question needs at least two options, got {len}")]
    MissingOptions { kind: QuestionKind, len: usize },

    #[error("{kind} question must not carry an option list")]
    UnexpectedOptions { kind: QuestionKind },

    #[error("correct answer is not one of the listed options")]
    CorrectAnswerNotAnOption,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("quiz title cannot be empty")]
    EmptyTitle,

    #[error("quiz has no questions")]
    NoQuestions,

    #[error("allotted time must be > 0 seconds")]
    ZeroTime,

    #[error("question {0} appears more than once")]
    DuplicateQuestion(QuestionId),
}

//
// ─── QUESTION KIND ─────────────────────────────────────────────────────────────
//

/// Response format of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionKind {
    SingleChoice,
    TrueFalse,
    ShortText,
    CodeFill,
    /// Free-text answer. Never gradable offline.
    Essay,
}

impl QuestionKind {
    /// Kinds whose responses are picked from an option list.
    #[must_use]
    pub fn has_options(self) -> bool {
        matches!(self, QuestionKind::SingleChoice | QuestionKind::TrueFalse)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionKind::SingleChoice => "single-choice",
            QuestionKind::TrueFalse => "true-false",
            QuestionKind::ShortText => "short-text",
            QuestionKind::CodeFill => "code-fill",
            QuestionKind::Essay => "essay",
        }
    }
}

impl std::fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A single question of a quiz. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    kind: QuestionKind,
    text: String,
    options: Vec<String>,
    points: u32,
    position: u32,
    correct_answer: Option<String>,
}

impl Question {
    /// Build a validated question.
    ///
    /// True/false questions without options get the canonical `true`/`false` pair.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the text is blank, the option list does not fit
    /// the kind, or a known correct answer is not among the options.
    pub fn new(
        id: QuestionId,
        kind: QuestionKind,
        text: impl Into<String>,
        options: Vec<String>,
        points: u32,
        position: u32,
    ) -> Result<Self, QuestionError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(QuestionError::EmptyText);
        }

        let options = match kind {
            QuestionKind::TrueFalse if options.is_empty() => {
                vec!["true".to_string(), "false".to_string()]
            }
            k if k.has_options() && options.len() < 2 => {
                return Err(QuestionError::MissingOptions {
                    kind,
                    len: options.len(),
                });
            }
            k if !k.has_options() && !options.is_empty() => {
                return Err(QuestionError::UnexpectedOptions { kind });
            }
            _ => options,
        };

        Ok(Self {
            id,
            kind,
            text,
            options,
            points,
            position,
            correct_answer: None,
        })
    }

    /// Attach the correct value used by the offline grader.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::CorrectAnswerNotAnOption` for option-based kinds
    /// whose answer is not one of the option literals.
    pub fn with_correct_answer(mut self, answer: impl Into<String>) -> Result<Self, QuestionError> {
        let answer = answer.into();
        if self.kind.has_options()
            && !self
                .options
                .iter()
                .any(|opt| opt.trim().eq_ignore_ascii_case(answer.trim()))
        {
            return Err(QuestionError::CorrectAnswerNotAnOption);
        }
        self.correct_answer = Some(answer);
        Ok(self)
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn kind(&self) -> QuestionKind {
        self.kind
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn points(&self) -> u32 {
        self.points
    }

    #[must_use]
    pub fn position(&self) -> u32 {
        self.position
    }

    #[must_use]
    pub fn correct_answer(&self) -> Option<&str> {
        self.correct_answer.as_deref()
    }
}

//
// ─── QUIZ ──────────────────────────────────────────────────────────────────────
//

/// Everything the session-initiation service hands back for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quiz {
    id: QuizId,
    title: String,
    description: Option<String>,
    allotted_seconds: u32,
    questions: Vec<Question>,
}

impl Quiz {
    /// Build a quiz, ordering questions by their ordinal position.
    ///
    /// # Errors
    ///
    /// Returns `QuizError` for a blank title, zero allotted time, an empty
    /// question list, or duplicate question ids.
    pub fn new(
        id: QuizId,
        title: impl Into<String>,
        description: Option<String>,
        allotted_seconds: u32,
        mut questions: Vec<Question>,
    ) -> Result<Self, QuizError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(QuizError::EmptyTitle);
        }
        if allotted_seconds == 0 {
            return Err(QuizError::ZeroTime);
        }
        if questions.is_empty() {
            return Err(QuizError::NoQuestions);
        }

        let mut seen = HashSet::with_capacity(questions.len());
        for question in &questions {
            if !seen.insert(question.id()) {
                return Err(QuizError::DuplicateQuestion(question.id()));
            }
        }

        questions.sort_by_key(Question::position);

        Ok(Self {
            id,
            title,
            description: description.filter(|d| !d.trim().is_empty()),
            allotted_seconds,
            questions,
        })
    }

    #[must_use]
    pub fn id(&self) -> QuizId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn allotted_seconds(&self) -> u32 {
        self.allotted_seconds
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    #[must_use]
    pub fn find(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id() == id)
    }

    #[must_use]
    pub fn contains(&self, id: QuestionId) -> bool {
        self.find(id).is_some()
    }

    /// Sum of all question point values.
    #[must_use]
    pub fn total_points(&self) -> u32 {
        self.questions
            .iter()
            .fold(0_u32, |acc, q| acc.saturating_add(q.points()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choice(id: u64, position: u32) -> Question {
        Question::new(
            QuestionId::new(id),
            QuestionKind::SingleChoice,
            format!("Q{id}"),
            vec!["a".into(), "b".into()],
            1,
            position,
        )
        .unwrap()
    }

    #[test]
    fn true_false_gets_default_options() {
        let q = Question::new(
            QuestionId::new(1),
            QuestionKind::TrueFalse,
            "Rust has a GC",
            Vec::new(),
            1,
            0,
        )
        .unwrap();
        assert_eq!(q.options(), ["true", "false"]);
    }

    #[test]
    fn single_choice_requires_options() {
        let err = Question::new(
            QuestionId::new(1),
            QuestionKind::SingleChoice,
            "Pick",
            vec!["only".into()],
            1,
            0,
        )
        .unwrap_err();
        assert!(matches!(err, QuestionError::MissingOptions { len: 1, .. }));
    }

    #[test]
    fn text_kinds_reject_options() {
        let err = Question::new(
            QuestionId::new(1),
            QuestionKind::ShortText,
            "Name it",
            vec!["x".into(), "y".into()],
            1,
            0,
        )
        .unwrap_err();
        assert_eq!(
            err,
            QuestionError::UnexpectedOptions {
                kind: QuestionKind::ShortText
            }
        );
    }

    #[test]
    fn correct_answer_must_be_an_option() {
        let err = choice(1, 0).with_correct_answer("c").unwrap_err();
        assert_eq!(err, QuestionError::CorrectAnswerNotAnOption);
        assert!(choice(1, 0).with_correct_answer("b").is_ok());
    }

    #[test]
    fn quiz_orders_by_position_and_sums_points() {
        let quiz = Quiz::new(
            QuizId::new(9),
            "Ownership",
            None,
            60,
            vec![choice(2, 5), choice(1, 1)],
        )
        .unwrap();
        assert_eq!(quiz.question(0).unwrap().id(), QuestionId::new(1));
        assert_eq!(quiz.total_points(), 2);
        assert!(quiz.contains(QuestionId::new(2)));
    }

    #[test]
    fn quiz_rejects_duplicates_and_zero_time() {
        let dup = Quiz::new(QuizId::new(1), "T", None, 60, vec![choice(1, 0), choice(1, 1)]);
        assert_eq!(dup.unwrap_err(), QuizError::DuplicateQuestion(QuestionId::new(1)));

        let zero = Quiz::new(QuizId::new(1), "T", None, 0, vec![choice(1, 0)]);
        assert_eq!(zero.unwrap_err(), QuizError::ZeroTime);
    }
}
