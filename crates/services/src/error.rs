//! Shared error types for the services crate.

use std::time::Duration;

use thiserror::Error;

use assess_core::model::{QuizId, SessionStateError};
use assess_core::grading::GradingError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors returned through a `SessionHandle`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    /// The caller broke the session contract; the session is unaffected.
    #[error(transparent)]
    Misuse(#[from] SessionStateError),
    #[error("session engine has stopped")]
    Stopped,
}

/// Errors emitted by session-initiation services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InitiationError {
    #[error("session initiation is not configured")]
    NotConfigured,
    #[error("quiz {0} is not available")]
    UnknownQuiz(QuizId),
    #[error("session initiation failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("invalid quiz bundle: {0}")]
    InvalidQuiz(#[from] assess_core::Error),
}

/// Errors emitted by graders. Any of them sends the coordinator to the fallback.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SubmissionError {
    #[error("grading service is not implemented")]
    NotImplemented,
    #[error("submission failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("submission timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Grading(#[from] GradingError),
}

/// Errors emitted while reading `EngineConfig` from the environment.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid {key}: {source}")]
    InvalidUrl {
        key: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("invalid {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// Errors emitted by `SessionLauncher`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LaunchError {
    #[error(transparent)]
    Initiation(#[from] InitiationError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}

/// Denial from the hosting environment. Advisory only.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EnvironmentError {
    #[error("locked mode denied: {0}")]
    LockedModeDenied(String),
}
