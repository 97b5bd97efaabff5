//! Scripted sessions: a JSON file of timed learner actions and environment
//! signals, replayed against a launched session.

use std::path::Path;
use std::time::Duration;

use assess_core::model::{EnvironmentSignal, QuestionId, QuizId, SubmissionResult};
use serde::Deserialize;
use services::bundle::QuizBundle;
use services::{LaunchedSession, ScriptedEnvironment};
use tokio::time::{Instant, sleep_until};
use tracing::{info, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    pub quiz_id: QuizId,
    /// Inline quiz. Without it the quiz is fetched from the initiation service.
    #[serde(default)]
    pub quiz: Option<QuizBundle>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    /// Seconds after replay begins.
    #[serde(default)]
    pub at: u64,
    #[serde(flatten)]
    pub action: Action,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Start,
    GoTo { index: usize },
    Answer { question: QuestionId, value: String },
    Signal { event: EnvironmentSignal },
    Submit,
}

impl Script {
    pub fn from_path(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[derive(Debug)]
pub struct ReplayOutcome {
    pub attempt_id: i64,
    pub result: SubmissionResult,
}

/// Play every step in order, then wait for the session to complete.
///
/// Misuse errors from individual steps are logged and the replay continues,
/// matching how a UI would ignore a rejected click.
pub async fn replay(
    script: &Script,
    launched: &LaunchedSession,
    environment: &ScriptedEnvironment,
) -> Result<ReplayOutcome, Box<dyn std::error::Error>> {
    let handle = launched.handle();
    let begin = Instant::now();

    for step in &script.steps {
        sleep_until(begin + Duration::from_secs(step.at)).await;
        let outcome = match &step.action {
            Action::Start => handle.start().await.map(|_| ()),
            Action::GoTo { index } => handle.go_to_question(*index).await.map(|_| ()),
            Action::Answer { question, value } => {
                handle.set_answer(*question, value.as_str()).await
            }
            Action::Signal { event } => {
                match environment.emit(event) {
                    Some(disposition) => info!(at = step.at, ?event, ?disposition, "signal"),
                    None => info!(at = step.at, ?event, "signal with no listener"),
                }
                Ok(())
            }
            Action::Submit => handle.submit().await.map(|status| {
                info!(at = step.at, ?status, "submit");
            }),
        };
        if let Err(err) = outcome {
            warn!(at = step.at, action = ?step.action, error = %err, "step rejected");
        }
    }

    let attempt_id = launched.finalize_attempt().await?;
    let result = handle.wait_for_result().await?;
    Ok(ReplayOutcome { attempt_id, result })
}
