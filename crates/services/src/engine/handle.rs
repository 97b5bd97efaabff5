use assess_core::model::{
    AnswerSlot, IntegrityEvent, QuestionId, SessionId, SessionSnapshot, SubmissionResult,
};
use tokio::sync::{mpsc, oneshot, watch};

use super::actor::Command;
use crate::error::SessionError;

/// Answer to a `submit` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitStatus {
    /// This request started the one and only submission.
    Accepted,
    AlreadySubmitting,
    AlreadyCompleted,
}

/// Cloneable handle to a running session. Every call goes through the
/// session's mailbox and is applied in delivery order.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    pub(super) fn new(
        commands: mpsc::UnboundedSender<Command>,
        snapshots: watch::Receiver<SessionSnapshot>,
    ) -> Self {
        Self {
            commands,
            snapshots,
        }
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(make(reply))
            .map_err(|_| SessionError::Stopped)?;
        rx.await.map_err(|_| SessionError::Stopped)
    }

    /// `NotStarted → InProgress`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Misuse` if the session was already started.
    pub async fn start(&self) -> Result<SessionSnapshot, SessionError> {
        self.request(|reply| Command::Start { reply }).await?
    }

    /// Select a question, clamped into range. Returns the selected index.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Misuse` outside `InProgress`.
    pub async fn go_to_question(&self, index: usize) -> Result<usize, SessionError> {
        self.request(|reply| Command::GoTo { index, reply }).await?
    }

    /// # Errors
    ///
    /// Returns `SessionError::Misuse` outside `InProgress` or for an unknown question.
    pub async fn set_answer(
        &self,
        question_id: QuestionId,
        value: impl Into<String>,
    ) -> Result<(), SessionError> {
        let value = value.into();
        self.request(|reply| Command::SetAnswer {
            question_id,
            value,
            reply,
        })
        .await?
    }

    /// # Errors
    ///
    /// Returns `SessionError::Stopped` if the engine is gone.
    pub async fn get_answer(&self, question_id: QuestionId) -> Result<AnswerSlot, SessionError> {
        self.request(|reply| Command::GetAnswer { question_id, reply })
            .await
    }

    /// Request submission. Only the first trigger, manual or expiry, submits.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Misuse` before `start`.
    pub async fn submit(&self) -> Result<SubmitStatus, SessionError> {
        self.request(|reply| Command::Submit { reply }).await?
    }

    /// Integrity events recorded so far, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Stopped` if the engine is gone.
    pub async fn integrity_events(&self) -> Result<Vec<IntegrityEvent>, SessionError> {
        self.request(|reply| Command::IntegrityLog { reply }).await
    }

    /// Latest published state.
    #[must_use]
    pub fn state(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.snapshots.borrow().session_id
    }

    #[must_use]
    pub fn result(&self) -> Option<SubmissionResult> {
        self.snapshots.borrow().result.clone()
    }

    /// Wait until the session completes.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Stopped` if the engine exits without a result.
    pub async fn wait_for_result(&self) -> Result<SubmissionResult, SessionError> {
        let mut snapshots = self.snapshots.clone();
        let snapshot = snapshots
            .wait_for(|s| s.result.is_some())
            .await
            .map_err(|_| SessionError::Stopped)?;
        snapshot.result.clone().ok_or(SessionError::Stopped)
    }
}
