use std::sync::Arc;

use assess_core::WallClock;
use assess_core::model::{QuizId, Session, SessionId, SubmissionResult};
use storage::repository::{Storage, StorageError};
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::drafts::DraftWriter;
use crate::engine::{SessionEngine, SessionHandle};
use crate::environment::Environment;
use crate::error::LaunchError;
use crate::initiation::InitiationService;
use crate::submission::SubmissionCoordinator;

/// Attempts inspected when resolving an already-stored session.
const ATTEMPT_LOOKBACK: u32 = 50;

/// Wires initiation, the session engine and persistence together.
#[derive(Clone)]
pub struct SessionLauncher {
    initiation: Arc<dyn InitiationService>,
    coordinator: SubmissionCoordinator,
    storage: Storage,
    environment: Arc<dyn Environment>,
    clock: WallClock,
    restore_drafts: bool,
}

impl SessionLauncher {
    #[must_use]
    pub fn new(
        initiation: Arc<dyn InitiationService>,
        coordinator: SubmissionCoordinator,
        storage: Storage,
        environment: Arc<dyn Environment>,
    ) -> Self {
        Self {
            initiation,
            coordinator,
            storage,
            environment,
            clock: WallClock::default(),
            restore_drafts: true,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: WallClock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_restore_drafts(mut self, restore: bool) -> Self {
        self.restore_drafts = restore;
        self
    }

    /// Open the storage named by `ASSESS_DB_URL`, or in-memory storage.
    ///
    /// # Errors
    ///
    /// Returns `LaunchError::Sqlite` if the database cannot be opened or migrated.
    pub async fn storage_for(config: &EngineConfig) -> Result<Storage, LaunchError> {
        match &config.database_url {
            Some(url) => Ok(Storage::sqlite(url).await?),
            None => Ok(Storage::in_memory()),
        }
    }

    /// Load the quiz and spawn a session engine. The session is not started yet.
    ///
    /// Drafts left by an earlier launch of the same quiz are restored, so only
    /// one launch per quiz should be open at a time. A background task stores
    /// the attempt once the session completes.
    ///
    /// # Errors
    ///
    /// Returns `LaunchError::Initiation` if the quiz cannot be loaded. Draft
    /// read failures are logged and the session starts blank.
    pub async fn launch(&self, quiz_id: QuizId) -> Result<LaunchedSession, LaunchError> {
        let quiz = self.initiation.initiate(quiz_id).await?;

        let restored = if self.restore_drafts {
            match self.storage.drafts.load_drafts(quiz_id).await {
                Ok(drafts) => drafts,
                Err(err) => {
                    warn!(%quiz_id, error = %err, "could not load drafts");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let drafts = DraftWriter::spawn(Arc::clone(&self.storage.drafts), quiz_id);
        let session = Session::new(SessionId::generate(), quiz);
        let handle = SessionEngine::new(
            session,
            self.coordinator.clone(),
            Arc::clone(&self.environment),
        )
        .with_clock(self.clock)
        .with_restored_answers(restored.into_iter().map(|d| (d.question_id, d.value)))
        .with_draft_writer(drafts.clone())
        .spawn();

        info!(%quiz_id, session_id = %handle.session_id(), "session launched");

        let launched = LaunchedSession {
            handle,
            drafts,
            storage: self.storage.clone(),
        };
        let background = launched.clone();
        tokio::spawn(async move {
            if let Err(err) = background.finalize_attempt().await {
                warn!(error = %err, "attempt not stored; finalize_attempt can retry");
            }
        });
        Ok(launched)
    }
}

/// A launched session plus the persistence around it.
#[derive(Clone)]
pub struct LaunchedSession {
    handle: SessionHandle,
    drafts: DraftWriter,
    storage: Storage,
}

impl LaunchedSession {
    #[must_use]
    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    #[must_use]
    pub fn drafts(&self) -> &DraftWriter {
        &self.drafts
    }

    /// Wait for completion and store the attempt, returning its row id.
    ///
    /// Safe to call repeatedly: an attempt already stored for this session is
    /// looked up instead of inserted twice.
    ///
    /// # Errors
    ///
    /// Returns `LaunchError` if the session stops without a result or storage fails.
    pub async fn finalize_attempt(&self) -> Result<i64, LaunchError> {
        let result = self.handle.wait_for_result().await?;
        match self.storage.attempts.append_attempt(&result).await {
            Ok(id) => {
                info!(session_id = %result.session_id, attempt_id = id, "attempt stored");
                Ok(id)
            }
            Err(StorageError::Conflict) => self.find_attempt(&result).await,
            Err(err) => Err(err.into()),
        }
    }

    async fn find_attempt(&self, result: &SubmissionResult) -> Result<i64, LaunchError> {
        self.storage
            .attempts
            .list_attempts(result.quiz_id, ATTEMPT_LOOKBACK)
            .await?
            .into_iter()
            .find(|row| row.result.session_id == result.session_id)
            .map(|row| row.id)
            .ok_or(LaunchError::Storage(StorageError::NotFound))
    }
}
