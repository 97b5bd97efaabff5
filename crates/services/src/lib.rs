#![forbid(unsafe_code)]

pub mod bundle;
pub mod config;
pub mod drafts;
pub mod engine;
pub mod environment;
pub mod error;
pub mod http;
pub mod initiation;
pub mod launcher;
pub mod submission;

pub use assess_core::WallClock;

pub use config::EngineConfig;
pub use engine::{SessionEngine, SessionHandle, SubmitStatus};
pub use environment::{Environment, ScriptedEnvironment, SignalSink};
pub use error::{
    ConfigError, EnvironmentError, InitiationError, LaunchError, SessionError, SubmissionError,
};
pub use http::{HttpInitiationService, HttpSubmissionService};
pub use initiation::{InitiationService, StaticInitiationService};
pub use launcher::{LaunchedSession, SessionLauncher};
pub use submission::{Grader, OfflineGrader, SubmissionCoordinator};
