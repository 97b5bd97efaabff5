use std::sync::Arc;

use assess_core::model::{QuestionId, QuizId};
use chrono::{DateTime, Utc};
use storage::repository::{DraftAnswer, DraftRepository};
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

enum DraftOp {
    Save(DraftAnswer),
    Clear,
    Flush(oneshot::Sender<()>),
}

/// Ordered, fire-and-forget draft persistence for one quiz.
///
/// Writes are applied one at a time in submission order, so storage ends up
/// with the last value set for each question. Failures are logged and dropped.
#[derive(Clone)]
pub struct DraftWriter {
    ops: mpsc::UnboundedSender<DraftOp>,
}

impl DraftWriter {
    /// Spawn the writer task. Requires a running Tokio runtime.
    #[must_use]
    pub fn spawn(repo: Arc<dyn DraftRepository>, quiz_id: QuizId) -> Self {
        let (ops, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(repo, quiz_id, rx));
        Self { ops }
    }

    pub fn save(&self, question_id: QuestionId, value: impl Into<String>, saved_at: DateTime<Utc>) {
        let draft = DraftAnswer {
            question_id,
            value: value.into(),
            saved_at,
        };
        let _ = self.ops.send(DraftOp::Save(draft));
    }

    pub fn clear(&self) {
        let _ = self.ops.send(DraftOp::Clear);
    }

    /// Wait until every write queued before this call has been applied.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.ops.send(DraftOp::Flush(tx)).is_ok() {
            let _ = rx.await;
        }
    }
}

async fn run(
    repo: Arc<dyn DraftRepository>,
    quiz_id: QuizId,
    mut rx: mpsc::UnboundedReceiver<DraftOp>,
) {
    while let Some(op) = rx.recv().await {
        match op {
            DraftOp::Save(draft) => {
                if let Err(err) = repo.save_draft(quiz_id, &draft).await {
                    warn!(%quiz_id, question_id = %draft.question_id, error = %err, "draft save failed");
                }
            }
            DraftOp::Clear => {
                if let Err(err) = repo.clear_drafts(quiz_id).await {
                    warn!(%quiz_id, error = %err, "draft clear failed");
                }
            }
            DraftOp::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}
