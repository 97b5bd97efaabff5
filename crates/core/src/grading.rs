//! Offline grading used when the remote grading service cannot be reached.
//!
//! The grader only awards points for comparisons that are deterministic:
//! option picks and text answers with a known correct value. Everything else
//! is reported as ungraded with zero points.

use std::str::FromStr;

use thiserror::Error;

use crate::model::{
    GradeReport, Question, QuestionGrade, QuestionKind, QuestionOutcome, Quiz, SubmissionPayload,
};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GradingError {
    #[error("payload belongs to quiz {payload} but grading quiz {quiz}")]
    QuizMismatch { quiz: u64, payload: u64 },

    #[error("unknown text match policy: {0}")]
    UnknownPolicy(String),
}

//
// ─── COMPARISON POLICY ─────────────────────────────────────────────────────────
//

/// How free-text answers are compared against the known correct value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextMatch {
    /// Byte-for-byte equality.
    Exact,
    /// Ignore leading and trailing whitespace.
    Trimmed,
    /// Trim, collapse inner whitespace runs, ignore case.
    #[default]
    Relaxed,
}

impl TextMatch {
    #[must_use]
    pub fn matches(self, given: &str, expected: &str) -> bool {
        match self {
            TextMatch::Exact => given == expected,
            TextMatch::Trimmed => given.trim() == expected.trim(),
            TextMatch::Relaxed => collapse(given).eq_ignore_ascii_case(&collapse(expected)),
        }
    }
}

impl FromStr for TextMatch {
    type Err = GradingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "trimmed" => Ok(Self::Trimmed),
            "relaxed" => Ok(Self::Relaxed),
            other => Err(GradingError::UnknownPolicy(other.to_string())),
        }
    }
}

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Per-kind comparison settings.
///
/// Code is whitespace- and case-sensitive inside the answer, so code-fill never
/// goes below `Trimmed` even when short text is relaxed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComparisonPolicy {
    pub short_text: TextMatch,
    pub code_fill: TextMatch,
}

impl Default for ComparisonPolicy {
    fn default() -> Self {
        Self {
            short_text: TextMatch::Relaxed,
            code_fill: TextMatch::Trimmed,
        }
    }
}

impl ComparisonPolicy {
    #[must_use]
    pub fn uniform(text: TextMatch) -> Self {
        let code_fill = match text {
            TextMatch::Relaxed => TextMatch::Trimmed,
            other => other,
        };
        Self {
            short_text: text,
            code_fill,
        }
    }
}

//
// ─── GRADER ────────────────────────────────────────────────────────────────────
//

/// Deterministic local grader.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalGrader {
    policy: ComparisonPolicy,
}

impl LocalGrader {
    #[must_use]
    pub fn new(policy: ComparisonPolicy) -> Self {
        Self { policy }
    }

    /// Grade a payload against the quiz's known answers.
    ///
    /// # Errors
    ///
    /// Returns `GradingError::QuizMismatch` if the payload is for another quiz.
    pub fn grade(&self, quiz: &Quiz, payload: &SubmissionPayload) -> Result<GradeReport, GradingError> {
        if quiz.id() != payload.quiz_id {
            return Err(GradingError::QuizMismatch {
                quiz: quiz.id().value(),
                payload: payload.quiz_id.value(),
            });
        }

        let mut earned = 0_u32;
        let mut grades = Vec::with_capacity(quiz.question_count());
        for question in quiz.questions() {
            let outcome = self.grade_one(question, payload.response_for(question.id()));
            let points_awarded = if outcome == QuestionOutcome::Correct {
                question.points()
            } else {
                0
            };
            earned = earned.saturating_add(points_awarded);
            grades.push(QuestionGrade {
                question_id: question.id(),
                outcome,
                points_awarded,
            });
        }

        Ok(GradeReport {
            points_earned: earned,
            points_possible: quiz.total_points(),
            questions: grades,
        })
    }

    fn grade_one(&self, question: &Question, response: Option<&str>) -> QuestionOutcome {
        let expected = match (question.kind(), question.correct_answer()) {
            (QuestionKind::Essay, _) | (_, None) => return QuestionOutcome::Ungraded,
            (_, Some(expected)) => expected,
        };
        let Some(given) = response.filter(|r| !r.trim().is_empty()) else {
            return QuestionOutcome::Unanswered;
        };

        match question.kind() {
            QuestionKind::SingleChoice | QuestionKind::TrueFalse => {
                verdict(given.trim().eq_ignore_ascii_case(expected.trim()))
            }
            QuestionKind::ShortText => verdict(self.policy.short_text.matches(given, expected)),
            // A non-matching code answer may still be valid code; leave it to a human.
            QuestionKind::CodeFill => {
                if self.policy.code_fill.matches(given, expected) {
                    QuestionOutcome::Correct
                } else {
                    QuestionOutcome::Ungraded
                }
            }
            QuestionKind::Essay => QuestionOutcome::Ungraded,
        }
    }
}

fn verdict(correct: bool) -> QuestionOutcome {
    if correct {
        QuestionOutcome::Correct
    } else {
        QuestionOutcome::Incorrect
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{QuestionId, QuizId, SessionId, SubmittedAnswer};
    use crate::time::fixed_now;

    fn question(id: u64, kind: QuestionKind, options: &[&str], points: u32, correct: Option<&str>) -> Question {
        let q = Question::new(
            QuestionId::new(id),
            kind,
            format!("Q{id}"),
            options.iter().map(|s| (*s).to_string()).collect(),
            points,
            u32::try_from(id).unwrap(),
        )
        .unwrap();
        match correct {
            Some(c) => q.with_correct_answer(c).unwrap(),
            None => q,
        }
    }

    fn payload(quiz: &Quiz, responses: &[(u64, Option<&str>)]) -> SubmissionPayload {
        SubmissionPayload {
            session_id: SessionId::generate(),
            quiz_id: quiz.id(),
            started_at: fixed_now(),
            submitted_at: fixed_now(),
            expired: false,
            answers: responses
                .iter()
                .map(|(id, r)| SubmittedAnswer {
                    question_id: QuestionId::new(*id),
                    response: r.map(str::to_string),
                })
                .collect(),
            integrity_events: Vec::new(),
        }
    }

    fn three_question_quiz() -> Quiz {
        Quiz::new(
            QuizId::new(1),
            "Basics",
            None,
            60,
            vec![
                question(1, QuestionKind::SingleChoice, &["Vec", "HashMap", "Box"], 2, Some("Box")),
                question(2, QuestionKind::TrueFalse, &[], 1, Some("false")),
                question(3, QuestionKind::ShortText, &[], 3, Some("borrow checker")),
            ],
        )
        .unwrap()
    }

    #[test]
    fn one_correct_one_wrong_one_blank_scores_two_of_six() {
        let quiz = three_question_quiz();
        let payload = payload(&quiz, &[(1, Some("Box")), (2, Some("true")), (3, None)]);

        let report = LocalGrader::default().grade(&quiz, &payload).unwrap();
        assert_eq!(report.points_earned, 2);
        assert_eq!(report.points_possible, 6);
        let outcomes: Vec<_> = report.questions.iter().map(|g| g.outcome).collect();
        assert_eq!(
            outcomes,
            [
                QuestionOutcome::Correct,
                QuestionOutcome::Incorrect,
                QuestionOutcome::Unanswered
            ]
        );
    }

    #[test]
    fn relaxed_short_text_ignores_case_and_spacing() {
        let quiz = three_question_quiz();
        let payload = payload(&quiz, &[(3, Some("  Borrow   Checker "))]);
        let report = LocalGrader::default().grade(&quiz, &payload).unwrap();
        assert_eq!(report.points_earned, 3);

        let strict = LocalGrader::new(ComparisonPolicy::uniform(TextMatch::Exact));
        assert_eq!(strict.grade(&quiz, &payload).unwrap().points_earned, 0);
    }

    #[test]
    fn essays_and_unknown_answers_are_ungraded() {
        let quiz = Quiz::new(
            QuizId::new(2),
            "Mixed",
            None,
            60,
            vec![
                question(1, QuestionKind::Essay, &[], 5, None),
                question(2, QuestionKind::ShortText, &[], 2, None),
            ],
        )
        .unwrap();
        let payload = payload(&quiz, &[(1, Some("long answer")), (2, Some("x"))]);
        let report = LocalGrader::default().grade(&quiz, &payload).unwrap();
        assert_eq!(report.points_earned, 0);
        assert!(report
            .questions
            .iter()
            .all(|g| g.outcome == QuestionOutcome::Ungraded));
    }

    #[test]
    fn code_fill_without_exact_match_is_ungraded() {
        let quiz = Quiz::new(
            QuizId::new(3),
            "Code",
            None,
            60,
            vec![question(1, QuestionKind::CodeFill, &[], 4, Some("let x = 5;"))],
        )
        .unwrap();

        let hit = payload(&quiz, &[(1, Some(" let x = 5; "))]);
        assert_eq!(LocalGrader::default().grade(&quiz, &hit).unwrap().points_earned, 4);

        let miss = payload(&quiz, &[(1, Some("let x: i32 = 5;"))]);
        let report = LocalGrader::default().grade(&quiz, &miss).unwrap();
        assert_eq!(report.points_earned, 0);
        assert_eq!(report.questions[0].outcome, QuestionOutcome::Ungraded);
    }

    #[test]
    fn rejects_payload_for_other_quiz() {
        let quiz = three_question_quiz();
        let mut other = payload(&quiz, &[]);
        other.quiz_id = QuizId::new(99);
        let err = LocalGrader::default().grade(&quiz, &other).unwrap_err();
        assert_eq!(err, GradingError::QuizMismatch { quiz: 1, payload: 99 });
    }

    #[test]
    fn policy_parses_from_str() {
        assert_eq!("EXACT".parse::<TextMatch>().unwrap(), TextMatch::Exact);
        assert!("fuzzy".parse::<TextMatch>().is_err());
    }
}
