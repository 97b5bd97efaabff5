use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use assess_core::WallClock;
use assess_core::model::{
    AnswerSlot, Incident, IntegrityEvent, LockedMode, QuestionId, Quiz, Session, SessionSnapshot,
    SubmissionPayload, SubmissionResult, SubmitOutcome, SubmitTrigger, TickOutcome,
};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

use super::handle::{SessionHandle, SubmitStatus};
use crate::drafts::DraftWriter;
use crate::environment::{Environment, LockedModeScope, MonitorScope};
use crate::error::SessionError;
use crate::submission::{Graded, SubmissionCoordinator};

const TICK: Duration = Duration::from_secs(1);

/// Mailbox entries. Handles, the signal sink, and nothing else produce them.
pub(crate) enum Command {
    Start {
        reply: oneshot::Sender<Result<SessionSnapshot, SessionError>>,
    },
    GoTo {
        index: usize,
        reply: oneshot::Sender<Result<usize, SessionError>>,
    },
    SetAnswer {
        question_id: QuestionId,
        value: String,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    GetAnswer {
        question_id: QuestionId,
        reply: oneshot::Sender<AnswerSlot>,
    },
    Submit {
        reply: oneshot::Sender<Result<SubmitStatus, SessionError>>,
    },
    IntegrityLog {
        reply: oneshot::Sender<Vec<IntegrityEvent>>,
    },
    Incident(Incident),
}

/// Payload, grade, and whole seconds from start to the submission trigger.
type Resolution = Pin<Box<dyn Future<Output = (SubmissionPayload, Graded, u64)> + Send>>;

/// Builder for a session task.
///
/// The spawned task owns the `Session` and serves one mailbox: handle
/// commands, integrity incidents, countdown ticks and the submission result
/// are applied one at a time in the order they arrive.
pub struct SessionEngine {
    session: Session,
    coordinator: SubmissionCoordinator,
    environment: Arc<dyn Environment>,
    clock: WallClock,
    restored: Vec<(QuestionId, String)>,
    drafts: Option<DraftWriter>,
}

impl SessionEngine {
    #[must_use]
    pub fn new(
        session: Session,
        coordinator: SubmissionCoordinator,
        environment: Arc<dyn Environment>,
    ) -> Self {
        Self {
            session,
            coordinator,
            environment,
            clock: WallClock::default(),
            restored: Vec::new(),
            drafts: None,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: WallClock) -> Self {
        self.clock = clock;
        self
    }

    /// Answers applied on `start`, typically restored drafts. Unknown ids are skipped.
    #[must_use]
    pub fn with_restored_answers(
        mut self,
        answers: impl IntoIterator<Item = (QuestionId, String)>,
    ) -> Self {
        self.restored = answers.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_draft_writer(mut self, drafts: DraftWriter) -> Self {
        self.drafts = Some(drafts);
        self
    }

    /// Spawn the session task. Requires a running Tokio runtime.
    #[must_use]
    pub fn spawn(self) -> SessionHandle {
        let (commands, rx) = mpsc::unbounded_channel();
        let (snapshots, snapshot_rx) = watch::channel(self.session.snapshot());
        let quiz = Arc::new(self.session.quiz().clone());

        let actor = Actor {
            session: self.session,
            quiz,
            coordinator: self.coordinator,
            environment: self.environment,
            clock: self.clock,
            restored: self.restored,
            drafts: self.drafts,
            mailbox: commands.downgrade(),
            snapshots,
            started: None,
            ticker: None,
            inflight: None,
            monitor: None,
            locked: None,
        };
        tokio::spawn(actor.run(rx));

        SessionHandle::new(commands, snapshot_rx)
    }
}

struct Actor {
    session: Session,
    quiz: Arc<Quiz>,
    coordinator: SubmissionCoordinator,
    environment: Arc<dyn Environment>,
    clock: WallClock,
    restored: Vec<(QuestionId, String)>,
    drafts: Option<DraftWriter>,
    mailbox: mpsc::WeakUnboundedSender<Command>,
    snapshots: watch::Sender<SessionSnapshot>,
    started: Option<Instant>,
    ticker: Option<Interval>,
    inflight: Option<Resolution>,
    monitor: Option<MonitorScope>,
    locked: Option<LockedModeScope>,
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn next_resolution(inflight: &mut Option<Resolution>) -> (SubmissionPayload, Graded, u64) {
    match inflight {
        Some(pending) => pending.await,
        None => std::future::pending().await,
    }
}

impl Actor {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        let mut open = true;
        loop {
            // With every handle gone only an in-flight submission keeps the task alive.
            if !open && self.inflight.is_none() {
                break;
            }
            tokio::select! {
                biased;
                command = commands.recv(), if open => match command {
                    Some(command) => self.handle(command),
                    None => open = false,
                },
                () = next_tick(&mut self.ticker) => self.on_tick(),
                (payload, graded, elapsed) = next_resolution(&mut self.inflight) => {
                    self.inflight = None;
                    self.on_resolved(&payload, graded, elapsed);
                }
            }
        }
        debug!(session_id = %self.session.id(), state = %self.session.state(), "session task stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Start { reply } => {
                let _ = reply.send(self.start().map(|()| self.session.snapshot()));
            }
            Command::GoTo { index, reply } => {
                let selected = self.session.go_to_question(index).map_err(SessionError::from);
                if selected.is_ok() {
                    self.publish();
                }
                let _ = reply.send(selected);
            }
            Command::SetAnswer {
                question_id,
                value,
                reply,
            } => {
                let _ = reply.send(self.set_answer(question_id, value));
            }
            Command::GetAnswer { question_id, reply } => {
                let _ = reply.send(self.session.get_answer(question_id));
            }
            Command::Submit { reply } => {
                let _ = reply.send(self.submit());
            }
            Command::IntegrityLog { reply } => {
                let _ = reply.send(self.session.integrity_log().entries().to_vec());
            }
            Command::Incident(incident) => {
                let at = self.clock.now();
                let session_id = self.session.id();
                if let Some(event) = self.session.record_incident(incident, at) {
                    debug!(
                        %session_id,
                        kind = %event.kind,
                        detail = %event.detail,
                        "integrity incident"
                    );
                    self.publish();
                }
            }
        }
    }

    fn start(&mut self) -> Result<(), SessionError> {
        self.session.start(self.clock.now())?;
        self.started = Some(Instant::now());

        match LockedModeScope::acquire(Arc::clone(&self.environment)) {
            Ok(scope) => {
                self.locked = Some(scope);
                self.session.set_locked_mode(LockedMode::Held);
            }
            Err(err) => {
                warn!(session_id = %self.session.id(), error = %err, "locked mode unavailable");
                self.session.set_locked_mode(LockedMode::Denied {
                    reason: err.to_string(),
                });
            }
        }
        self.monitor = Some(MonitorScope::attach(
            Arc::clone(&self.environment),
            self.mailbox.clone(),
        ));

        for (question_id, value) in std::mem::take(&mut self.restored) {
            if let Err(err) = self.session.set_answer(question_id, value) {
                debug!(%question_id, error = %err, "skipping restored answer");
            }
        }

        let mut ticker = interval_at(Instant::now() + TICK, TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
        self.ticker = Some(ticker);

        info!(
            session_id = %self.session.id(),
            quiz_id = %self.quiz.id(),
            seconds = self.session.remaining_seconds(),
            questions = self.quiz.question_count(),
            "session started"
        );
        self.publish();
        Ok(())
    }

    fn set_answer(&mut self, question_id: QuestionId, value: String) -> Result<(), SessionError> {
        self.session.set_answer(question_id, value.as_str())?;
        if let Some(drafts) = &self.drafts {
            drafts.save(question_id, value, self.clock.now());
        }
        self.publish();
        Ok(())
    }

    fn submit(&mut self) -> Result<SubmitStatus, SessionError> {
        match self.session.submit(self.clock.now())? {
            SubmitOutcome::Started(payload) => {
                self.begin_submission(payload, SubmitTrigger::Manual);
                Ok(SubmitStatus::Accepted)
            }
            SubmitOutcome::AlreadySubmitting => Ok(SubmitStatus::AlreadySubmitting),
            SubmitOutcome::AlreadyCompleted => Ok(SubmitStatus::AlreadyCompleted),
        }
    }

    fn on_tick(&mut self) {
        match self.session.tick(self.clock.now()) {
            TickOutcome::Running(_) => self.publish(),
            TickOutcome::Expired(payload) => self.begin_submission(payload, SubmitTrigger::Expired),
            TickOutcome::Ignored => self.ticker = None,
        }
    }

    fn begin_submission(&mut self, payload: SubmissionPayload, trigger: SubmitTrigger) {
        self.ticker = None;
        let elapsed = self.started.map_or(0, |at| at.elapsed().as_secs());
        info!(
            session_id = %payload.session_id,
            trigger = ?trigger,
            elapsed_seconds = elapsed,
            timeout = ?self.coordinator.timeout(),
            answered = payload.answers.iter().filter(|a| a.response.is_some()).count(),
            incidents = payload.integrity_events.len(),
            "submission triggered"
        );

        let coordinator = self.coordinator.clone();
        let quiz = Arc::clone(&self.quiz);
        self.inflight = Some(Box::pin(async move {
            let graded = coordinator.resolve(&quiz, &payload).await;
            (payload, graded, elapsed)
        }));
        self.publish();
    }

    fn on_resolved(&mut self, payload: &SubmissionPayload, graded: Graded, elapsed: u64) {
        let result = SubmissionResult::assemble(
            payload,
            graded.report,
            graded.provenance,
            self.clock.now(),
            elapsed,
        );

        match self.session.complete(result) {
            Ok(result) => info!(
                session_id = %result.session_id,
                points_earned = result.points_earned,
                points_possible = result.points_possible,
                provenance = result.provenance.as_str(),
                expired = result.expired,
                incidents = result.incident_count,
                "session completed"
            ),
            Err(err) => warn!(error = %err, "discarding submission result"),
        }

        self.release_scopes();
        if let Some(drafts) = &self.drafts {
            drafts.clear();
        }
        self.publish();
    }

    fn release_scopes(&mut self) {
        drop(self.monitor.take());
        if self.locked.take().is_some() {
            self.session.set_locked_mode(LockedMode::Released);
        }
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.session.snapshot());
    }
}
