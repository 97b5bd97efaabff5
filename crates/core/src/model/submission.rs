use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{QuestionId, QuizId, SessionId};
use crate::model::integrity::IntegrityEvent;

//
// ─── PAYLOAD ───────────────────────────────────────────────────────────────────
//

/// One question's response as submitted. `None` means unanswered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedAnswer {
    pub question_id: QuestionId,
    pub response: Option<String>,
}

/// Everything sent for grading. Built exactly once per session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionPayload {
    pub session_id: SessionId,
    pub quiz_id: QuizId,
    pub started_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
    pub expired: bool,
    pub answers: Vec<SubmittedAnswer>,
    pub integrity_events: Vec<IntegrityEvent>,
}

impl SubmissionPayload {
    #[must_use]
    pub fn response_for(&self, question_id: QuestionId) -> Option<&str> {
        self.answers
            .iter()
            .find(|a| a.question_id == question_id)
            .and_then(|a| a.response.as_deref())
    }
}

//
// ─── GRADES ────────────────────────────────────────────────────────────────────
//

/// Per-question verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionOutcome {
    Correct,
    Incorrect,
    Unanswered,
    /// Could not be graded deterministically; zero points.
    Ungraded,
    /// The grading service chose not to reveal correctness.
    Withheld,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionGrade {
    pub question_id: QuestionId,
    pub outcome: QuestionOutcome,
    pub points_awarded: u32,
}

/// Raw grading output, before session metadata is attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeReport {
    pub points_earned: u32,
    pub points_possible: u32,
    #[serde(default)]
    pub questions: Vec<QuestionGrade>,
}

/// Who computed a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    ServerGraded,
    LocalFallback,
}

impl Provenance {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Provenance::ServerGraded => "server-graded",
            Provenance::LocalFallback => "local-fallback",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "server-graded" => Some(Self::ServerGraded),
            "local-fallback" => Some(Self::LocalFallback),
            _ => None,
        }
    }
}

//
// ─── RESULT ────────────────────────────────────────────────────────────────────
//

/// Final outcome of a session, delivered once it reaches `Completed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionResult {
    pub session_id: SessionId,
    pub quiz_id: QuizId,
    pub points_earned: u32,
    pub points_possible: u32,
    pub questions: Vec<QuestionGrade>,
    pub incident_count: u32,
    pub elapsed_seconds: u64,
    pub provenance: Provenance,
    pub expired: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl SubmissionResult {
    /// Attach session metadata to a grade report.
    #[must_use]
    pub fn assemble(
        payload: &SubmissionPayload,
        report: GradeReport,
        provenance: Provenance,
        completed_at: DateTime<Utc>,
        elapsed_seconds: u64,
    ) -> Self {
        let incident_count = u32::try_from(payload.integrity_events.len()).unwrap_or(u32::MAX);
        Self {
            session_id: payload.session_id,
            quiz_id: payload.quiz_id,
            points_earned: report.points_earned,
            points_possible: report.points_possible,
            questions: report.questions,
            incident_count,
            elapsed_seconds,
            provenance,
            expired: payload.expired,
            started_at: payload.started_at,
            completed_at,
        }
    }

    /// Fraction of points earned, `0.0` when the quiz is worth nothing.
    #[must_use]
    pub fn score_ratio(&self) -> f64 {
        if self.points_possible == 0 {
            return 0.0;
        }
        f64::from(self.points_earned) / f64::from(self.points_possible)
    }

    #[must_use]
    pub fn ungraded(&self) -> Vec<QuestionId> {
        self.questions
            .iter()
            .filter(|q| q.outcome == QuestionOutcome::Ungraded)
            .map(|q| q.question_id)
            .collect()
    }

    #[must_use]
    pub fn outcome_of(&self, question_id: QuestionId) -> Option<QuestionOutcome> {
        self.questions
            .iter()
            .find(|q| q.question_id == question_id)
            .map(|q| q.outcome)
    }
}
