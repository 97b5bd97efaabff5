use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::model::ids::QuestionId;

/// Current response slot for a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum AnswerSlot {
    Unanswered,
    Answered(String),
}

impl AnswerSlot {
    #[must_use]
    pub fn as_deref(&self) -> Option<&str> {
        match self {
            AnswerSlot::Unanswered => None,
            AnswerSlot::Answered(v) => Some(v),
        }
    }

    #[must_use]
    pub fn is_answered(&self) -> bool {
        matches!(self, AnswerSlot::Answered(_))
    }
}

/// At most one answer per question; writes overwrite.
///
/// The store does not check values against option lists, that is left to grading.
/// Lifecycle gating (writes only while in progress) is enforced by `Session`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerStore {
    answers: HashMap<QuestionId, String>,
}

impl AnswerStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite. Returns the previous value, if any.
    pub(crate) fn set(&mut self, question_id: QuestionId, value: String) -> Option<String> {
        self.answers.insert(question_id, value)
    }

    /// Whitespace-only values read back as unanswered.
    #[must_use]
    pub fn get(&self, question_id: QuestionId) -> AnswerSlot {
        match self.answers.get(&question_id) {
            Some(v) if !is_blank(v) => AnswerSlot::Answered(v.clone()),
            _ => AnswerSlot::Unanswered,
        }
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.values().filter(|v| !is_blank(v)).count()
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_write_wins() {
        let mut store = AnswerStore::new();
        let id = QuestionId::new(3);
        assert_eq!(store.get(id), AnswerSlot::Unanswered);

        assert_eq!(store.set(id, "a".into()), None);
        assert_eq!(store.set(id, "b".into()), Some("a".into()));
        assert_eq!(store.get(id), AnswerSlot::Answered("b".into()));
        assert_eq!(store.answered_count(), 1);
    }

    #[test]
    fn blank_values_count_as_unanswered() {
        let mut store = AnswerStore::new();
        let id = QuestionId::new(1);
        store.set(id, "Box".into());
        store.set(QuestionId::new(2), "   ".into());
        assert_eq!(store.answered_count(), 1);

        store.set(id, String::new());
        assert_eq!(store.get(id), AnswerSlot::Unanswered);
        assert_eq!(store.get(QuestionId::new(2)), AnswerSlot::Unanswered);
        assert_eq!(store.answered_count(), 0);
    }
}
