//! Hosting-environment seam: locked mode and integrity listeners.
//!
//! Both are scoped acquisitions. `LockedModeScope` releases locked mode and
//! `MonitorScope` detaches listeners when dropped, so every exit path of the
//! session engine (completion, fallback, the task going away) gives them back.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use assess_core::model::{EnvironmentSignal, SignalDisposition, classify};
use tokio::sync::mpsc::WeakUnboundedSender;

use crate::engine::Command;
use crate::error::EnvironmentError;

/// Capabilities the hosting UI provides to a running session.
pub trait Environment: Send + Sync {
    /// Ask for locked/fullscreen presentation.
    ///
    /// # Errors
    ///
    /// Returns `EnvironmentError::LockedModeDenied` when the host refuses.
    fn request_locked_mode(&self) -> Result<(), EnvironmentError>;

    fn release_locked_mode(&self);

    /// Start forwarding raw signals to `sink`.
    fn attach_listeners(&self, sink: SignalSink);

    fn detach_listeners(&self);
}

//
// ─── SIGNAL SINK ───────────────────────────────────────────────────────────────
//

/// Entry point for raw environment signals.
///
/// Classification happens synchronously so the host learns right away whether
/// to suppress the default action. Incidents are queued on the session mailbox.
#[derive(Clone)]
pub struct SignalSink {
    mailbox: WeakUnboundedSender<Command>,
    armed: Arc<AtomicBool>,
}

impl SignalSink {
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    /// Classify and forward one signal. Disarmed sinks allow everything.
    pub fn deliver(&self, signal: &EnvironmentSignal) -> SignalDisposition {
        if !self.is_armed() {
            return SignalDisposition::Allow;
        }
        let (incident, disposition) = classify(signal);
        if let Some(incident) = incident {
            let Some(mailbox) = self.mailbox.upgrade() else {
                return SignalDisposition::Allow;
            };
            if mailbox.send(Command::Incident(incident)).is_err() {
                return SignalDisposition::Allow;
            }
        }
        disposition
    }
}

//
// ─── SCOPES ────────────────────────────────────────────────────────────────────
//

/// Listener subscription held while the session is live.
pub struct MonitorScope {
    environment: Arc<dyn Environment>,
    armed: Arc<AtomicBool>,
}

impl MonitorScope {
    pub(crate) fn attach(
        environment: Arc<dyn Environment>,
        mailbox: WeakUnboundedSender<Command>,
    ) -> Self {
        let armed = Arc::new(AtomicBool::new(true));
        environment.attach_listeners(SignalSink {
            mailbox,
            armed: Arc::clone(&armed),
        });
        Self { environment, armed }
    }
}

impl Drop for MonitorScope {
    fn drop(&mut self) {
        self.armed.store(false, Ordering::Release);
        self.environment.detach_listeners();
    }
}

/// Held locked mode.
pub struct LockedModeScope {
    environment: Arc<dyn Environment>,
}

impl LockedModeScope {
    /// # Errors
    ///
    /// Returns the host's denial unchanged.
    pub fn acquire(environment: Arc<dyn Environment>) -> Result<Self, EnvironmentError> {
        environment.request_locked_mode()?;
        Ok(Self { environment })
    }
}

impl Drop for LockedModeScope {
    fn drop(&mut self) {
        self.environment.release_locked_mode();
    }
}

//
// ─── SCRIPTED ENVIRONMENT ──────────────────────────────────────────────────────
//

#[derive(Default)]
struct ScriptedState {
    sink: Option<SignalSink>,
    locked: bool,
    attach_count: usize,
    release_count: usize,
}

/// Headless environment driven by code: replay tools and tests emit signals
/// through it and inspect what the session acquired.
#[derive(Default)]
pub struct ScriptedEnvironment {
    deny_locked_mode: Option<String>,
    state: Mutex<ScriptedState>,
}

impl ScriptedEnvironment {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn denying_locked_mode(reason: impl Into<String>) -> Self {
        Self {
            deny_locked_mode: Some(reason.into()),
            state: Mutex::default(),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ScriptedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Emit a signal to the attached listener. `None` when nothing is listening.
    pub fn emit(&self, signal: &EnvironmentSignal) -> Option<SignalDisposition> {
        let sink = self.state().sink.clone()?;
        Some(sink.deliver(signal))
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.state().sink.is_some()
    }

    #[must_use]
    pub fn holds_locked_mode(&self) -> bool {
        self.state().locked
    }

    #[must_use]
    pub fn attach_count(&self) -> usize {
        self.state().attach_count
    }

    #[must_use]
    pub fn release_count(&self) -> usize {
        self.state().release_count
    }
}

impl Environment for ScriptedEnvironment {
    fn request_locked_mode(&self) -> Result<(), EnvironmentError> {
        if let Some(reason) = &self.deny_locked_mode {
            return Err(EnvironmentError::LockedModeDenied(reason.clone()));
        }
        self.state().locked = true;
        Ok(())
    }

    fn release_locked_mode(&self) {
        let mut state = self.state();
        state.locked = false;
        state.release_count += 1;
    }

    fn attach_listeners(&self, sink: SignalSink) {
        let mut state = self.state();
        state.sink = Some(sink);
        state.attach_count += 1;
    }

    fn detach_listeners(&self) {
        self.state().sink = None;
    }
}
