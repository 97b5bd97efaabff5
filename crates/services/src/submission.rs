//! Submission coordination: one remote grading attempt, then the local fallback.

use std::sync::Arc;
use std::time::Duration;

use assess_core::grading::{ComparisonPolicy, LocalGrader};
use assess_core::model::{
    GradeReport, Provenance, QuestionGrade, QuestionOutcome, Quiz, SubmissionPayload,
};
use async_trait::async_trait;
use tokio::time::timeout;
use tracing::{error, warn};

use crate::config::{DEFAULT_SUBMIT_TIMEOUT, EngineConfig};
use crate::error::SubmissionError;
use crate::http::HttpSubmissionService;

/// Anything that can grade a submission payload.
#[async_trait]
pub trait Grader: Send + Sync {
    /// # Errors
    ///
    /// Returns `SubmissionError` when no grade could be produced.
    async fn grade(
        &self,
        quiz: &Quiz,
        payload: &SubmissionPayload,
    ) -> Result<GradeReport, SubmissionError>;
}

/// `LocalGrader` behind the `Grader` seam.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineGrader {
    grader: LocalGrader,
}

impl OfflineGrader {
    #[must_use]
    pub fn new(policy: ComparisonPolicy) -> Self {
        Self {
            grader: LocalGrader::new(policy),
        }
    }
}

#[async_trait]
impl Grader for OfflineGrader {
    async fn grade(
        &self,
        quiz: &Quiz,
        payload: &SubmissionPayload,
    ) -> Result<GradeReport, SubmissionError> {
        Ok(self.grader.grade(quiz, payload)?)
    }
}

/// A grade with the provenance of whoever produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Graded {
    pub report: GradeReport,
    pub provenance: Provenance,
}

#[derive(Clone)]
pub struct SubmissionCoordinator {
    remote: Arc<dyn Grader>,
    fallback: Arc<dyn Grader>,
    timeout: Duration,
}

impl SubmissionCoordinator {
    #[must_use]
    pub fn new(remote: Arc<dyn Grader>) -> Self {
        Self {
            remote,
            fallback: Arc::new(OfflineGrader::default()),
            timeout: DEFAULT_SUBMIT_TIMEOUT,
        }
    }

    /// Remote grading over HTTP when a base URL is configured, local grading otherwise.
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            remote: Arc::new(HttpSubmissionService::from_config(config)),
            fallback: Arc::new(OfflineGrader::new(config.comparison_policy())),
            timeout: config.submit_timeout,
        }
    }

    #[must_use]
    pub fn with_fallback(mut self, fallback: Arc<dyn Grader>) -> Self {
        self.fallback = fallback;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Grade a payload. Never fails: a remote error or timeout falls back to
    /// local grading, and a failing fallback yields an all-ungraded report.
    pub async fn resolve(&self, quiz: &Quiz, payload: &SubmissionPayload) -> Graded {
        let remote = match timeout(self.timeout, self.remote.grade(quiz, payload)).await {
            Ok(result) => result,
            Err(_) => Err(SubmissionError::Timeout(self.timeout)),
        };

        match remote {
            Ok(report) => {
                return Graded {
                    report,
                    provenance: Provenance::ServerGraded,
                };
            }
            Err(err) => {
                warn!(session_id = %payload.session_id, error = %err, "submission failed, grading locally");
            }
        }

        let report = match self.fallback.grade(quiz, payload).await {
            Ok(report) => report,
            Err(err) => {
                error!(session_id = %payload.session_id, error = %err, "local grading failed");
                ungraded_report(quiz)
            }
        };
        Graded {
            report,
            provenance: Provenance::LocalFallback,
        }
    }
}

fn ungraded_report(quiz: &Quiz) -> GradeReport {
    GradeReport {
        points_earned: 0,
        points_possible: quiz.total_points(),
        questions: quiz
            .questions()
            .iter()
            .map(|q| QuestionGrade {
                question_id: q.id(),
                outcome: QuestionOutcome::Ungraded,
                points_awarded: 0,
            })
            .collect(),
    }
}
