use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;

use crate::model::answer::{AnswerSlot, AnswerStore};
use crate::model::countdown::{Countdown, Tick};
use crate::model::ids::{QuestionId, SessionId};
use crate::model::integrity::{Incident, IntegrityEvent, IntegrityLog};
use crate::model::question::Quiz;
use crate::model::submission::{SubmissionPayload, SubmissionResult, SubmittedAnswer};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Contract violations by the caller. The session itself is left untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionStateError {
    #[error("{operation} is not allowed while the session is {state}")]
    WrongState {
        operation: &'static str,
        state: SessionState,
    },

    #[error("question {0} is not part of this quiz")]
    UnknownQuestion(QuestionId),
}

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

/// Lifecycle of a session. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    NotStarted,
    InProgress,
    Submitting,
    Completed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::NotStarted => "not started",
            SessionState::InProgress => "in progress",
            SessionState::Submitting => "submitting",
            SessionState::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// What moved the session out of `InProgress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitTrigger {
    Manual,
    Expired,
}

/// Status of the locked/fullscreen presentation mode. Advisory only.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LockedMode {
    #[default]
    NotRequested,
    Held,
    Denied { reason: String },
    Released,
}

/// Result of a submit request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// This call won the transition; the payload must be graded exactly once.
    Started(SubmissionPayload),
    /// An earlier trigger already moved the session on.
    AlreadySubmitting,
    AlreadyCompleted,
}

/// Result of one clock tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Running(u32),
    /// Countdown hit zero and the session moved to `Submitting`.
    Expired(SubmissionPayload),
    /// Not in progress; the tick had no effect.
    Ignored,
}

/// Read-only view of a session for the hosting UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub state: SessionState,
    pub expired: bool,
    pub remaining_seconds: u32,
    pub current_index: usize,
    pub question_count: usize,
    pub answered_count: usize,
    pub incident_count: usize,
    pub locked_mode: LockedMode,
    pub result: Option<SubmissionResult>,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One learner attempt at a timed quiz.
///
/// All mutation goes through this type so lifecycle gating lives in one place:
/// answers and incidents are only accepted while `InProgress`, and exactly one
/// call to `submit`/`tick` returns a payload.
pub struct Session {
    id: SessionId,
    quiz: Quiz,
    state: SessionState,
    expired: bool,
    countdown: Countdown,
    current_index: usize,
    answers: AnswerStore,
    log: IntegrityLog,
    started_at: Option<DateTime<Utc>>,
    locked_mode: LockedMode,
    result: Option<SubmissionResult>,
}

impl Session {
    #[must_use]
    pub fn new(id: SessionId, quiz: Quiz) -> Self {
        let countdown = Countdown::new(quiz.allotted_seconds());
        Self {
            id,
            quiz,
            state: SessionState::NotStarted,
            expired: false,
            countdown,
            current_index: 0,
            answers: AnswerStore::new(),
            log: IntegrityLog::new(),
            started_at: None,
            locked_mode: LockedMode::NotRequested,
            result: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn quiz(&self) -> &Quiz {
        &self.quiz
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expired
    }

    #[must_use]
    pub fn remaining_seconds(&self) -> u32 {
        self.countdown.remaining()
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn integrity_log(&self) -> &IntegrityLog {
        &self.log
    }

    #[must_use]
    pub fn locked_mode(&self) -> &LockedMode {
        &self.locked_mode
    }

    #[must_use]
    pub fn result(&self) -> Option<&SubmissionResult> {
        self.result.as_ref()
    }

    fn require(&self, operation: &'static str, state: SessionState) -> Result<(), SessionStateError> {
        if self.state == state {
            Ok(())
        } else {
            Err(SessionStateError::WrongState {
                operation,
                state: self.state,
            })
        }
    }

    /// `NotStarted → InProgress`. Captures the start timestamp once.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::WrongState` if the session was already started.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), SessionStateError> {
        self.require("start", SessionState::NotStarted)?;
        self.countdown = Countdown::new(self.quiz.allotted_seconds());
        self.started_at = Some(now);
        self.state = SessionState::InProgress;
        Ok(())
    }

    /// Record the outcome of the locked-mode request or its release.
    pub fn set_locked_mode(&mut self, mode: LockedMode) {
        self.locked_mode = mode;
    }

    /// Move to a question, clamping into `[0, question_count - 1]`.
    ///
    /// Returns the index actually selected.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::WrongState` outside `InProgress`.
    pub fn go_to_question(&mut self, index: usize) -> Result<usize, SessionStateError> {
        self.require("navigation", SessionState::InProgress)?;
        let last = self.quiz.question_count().saturating_sub(1);
        self.current_index = index.min(last);
        Ok(self.current_index)
    }

    /// Insert or overwrite the answer for a question.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::WrongState` outside `InProgress` and
    /// `SessionStateError::UnknownQuestion` for ids not in the quiz.
    pub fn set_answer(
        &mut self,
        question_id: QuestionId,
        value: impl Into<String>,
    ) -> Result<Option<String>, SessionStateError> {
        self.require("setting an answer", SessionState::InProgress)?;
        if !self.quiz.contains(question_id) {
            return Err(SessionStateError::UnknownQuestion(question_id));
        }
        Ok(self.answers.set(question_id, value.into()))
    }

    #[must_use]
    pub fn get_answer(&self, question_id: QuestionId) -> AnswerSlot {
        self.answers.get(question_id)
    }

    /// Append an incident if the session is live. Returns the logged event.
    ///
    /// Incidents outside `InProgress` are dropped: the monitor is not armed then.
    pub fn record_incident(&mut self, incident: Incident, at: DateTime<Utc>) -> Option<&IntegrityEvent> {
        if self.state != SessionState::InProgress {
            return None;
        }
        self.log.append(incident.at(at));
        self.log.entries().last()
    }

    /// Apply one second of countdown. Reaching zero triggers the expired submission.
    pub fn tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        if self.state != SessionState::InProgress {
            return TickOutcome::Ignored;
        }
        match self.countdown.tick() {
            Tick::Running(remaining) => TickOutcome::Running(remaining),
            Tick::Expired | Tick::Stopped => {
                TickOutcome::Expired(self.begin_submission(SubmitTrigger::Expired, now))
            }
        }
    }

    /// Learner-initiated submission. Idempotent once the session has left `InProgress`.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::WrongState` if the session never started.
    pub fn submit(&mut self, now: DateTime<Utc>) -> Result<SubmitOutcome, SessionStateError> {
        match self.state {
            SessionState::NotStarted => Err(SessionStateError::WrongState {
                operation: "submit",
                state: self.state,
            }),
            SessionState::InProgress => Ok(SubmitOutcome::Started(
                self.begin_submission(SubmitTrigger::Manual, now),
            )),
            SessionState::Submitting => Ok(SubmitOutcome::AlreadySubmitting),
            SessionState::Completed => Ok(SubmitOutcome::AlreadyCompleted),
        }
    }

    fn begin_submission(&mut self, trigger: SubmitTrigger, now: DateTime<Utc>) -> SubmissionPayload {
        self.state = SessionState::Submitting;
        self.expired = trigger == SubmitTrigger::Expired;
        self.build_payload(now)
    }

    fn build_payload(&self, submitted_at: DateTime<Utc>) -> SubmissionPayload {
        let answers = self
            .quiz
            .questions()
            .iter()
            .map(|q| SubmittedAnswer {
                question_id: q.id(),
                response: self.answers.get(q.id()).as_deref().map(str::to_owned),
            })
            .collect();

        SubmissionPayload {
            session_id: self.id,
            quiz_id: self.quiz.id(),
            started_at: self.started_at.unwrap_or(submitted_at),
            submitted_at,
            expired: self.expired,
            answers,
            integrity_events: self.log.entries().to_vec(),
        }
    }

    /// `Submitting → Completed`.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::WrongState` unless the session is `Submitting`.
    pub fn complete(&mut self, result: SubmissionResult) -> Result<&SubmissionResult, SessionStateError> {
        self.require("completion", SessionState::Submitting)?;
        self.state = SessionState::Completed;
        Ok(self.result.insert(result))
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            state: self.state,
            expired: self.expired,
            remaining_seconds: self.countdown.remaining(),
            current_index: self.current_index,
            question_count: self.quiz.question_count(),
            answered_count: self.answers.answered_count(),
            incident_count: self.log.len(),
            locked_mode: self.locked_mode.clone(),
            result: self.result.clone(),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("quiz_id", &self.quiz.id())
            .field("state", &self.state)
            .field("expired", &self.expired)
            .field("remaining", &self.countdown.remaining())
            .field("current_index", &self.current_index)
            .field("answered", &self.answers.answered_count())
            .field("incidents", &self.log.len())
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
