use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

//
// ─── EVENT KINDS ───────────────────────────────────────────────────────────────
//

/// Category of an integrity incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntegrityEventKind {
    TabHidden,
    WindowBlur,
    FullscreenExit,
    RestrictedKey,
    ContextMenuBlocked,
}

impl IntegrityEventKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            IntegrityEventKind::TabHidden => "tab-hidden",
            IntegrityEventKind::WindowBlur => "window-blur",
            IntegrityEventKind::FullscreenExit => "fullscreen-exit",
            IntegrityEventKind::RestrictedKey => "restricted-key",
            IntegrityEventKind::ContextMenuBlocked => "context-menu-blocked",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "tab-hidden" => Some(Self::TabHidden),
            "window-blur" => Some(Self::WindowBlur),
            "fullscreen-exit" => Some(Self::FullscreenExit),
            "restricted-key" => Some(Self::RestrictedKey),
            "context-menu-blocked" => Some(Self::ContextMenuBlocked),
            _ => None,
        }
    }
}

impl std::fmt::Display for IntegrityEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded incident. Never mutated once logged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityEvent {
    pub kind: IntegrityEventKind,
    pub at: DateTime<Utc>,
    pub detail: String,
}

//
// ─── LOG ───────────────────────────────────────────────────────────────────────
//

/// Append-only incident log. Insertion order is chronological order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityLog {
    events: Vec<IntegrityEvent>,
}

impl IntegrityLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn append(&mut self, event: IntegrityEvent) {
        self.events.push(event);
    }

    #[must_use]
    pub fn entries(&self) -> &[IntegrityEvent] {
        &self.events
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[must_use]
    pub fn count_of(&self, kind: IntegrityEventKind) -> usize {
        self.events.iter().filter(|e| e.kind == kind).count()
    }
}

//
// ─── RAW ENVIRONMENT SIGNALS ───────────────────────────────────────────────────
//

/// A key press as reported by the hosting environment.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeyCombo {
    pub key: String,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub meta: bool,
}

impl KeyCombo {
    #[must_use]
    pub fn plain(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn ctrl_shift(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ctrl: true,
            shift: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn ctrl(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ctrl: true,
            ..Self::default()
        }
    }

    /// Human readable form, e.g. `Ctrl+Shift+I`.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(5);
        if self.ctrl {
            parts.push("Ctrl");
        }
        if self.meta {
            parts.push("Meta");
        }
        if self.alt {
            parts.push("Alt");
        }
        if self.shift {
            parts.push("Shift");
        }
        let key = self.key.to_ascii_uppercase();
        let mut out = parts.join("+");
        if !out.is_empty() {
            out.push('+');
        }
        out.push_str(&key);
        out
    }

    /// Developer-tools and view-source shortcuts across platforms.
    fn restriction(&self) -> Option<&'static str> {
        let key = self.key.to_ascii_uppercase();
        let primary = self.ctrl || self.meta;

        if key == "F12" {
            return Some("developer tools");
        }
        if primary && (self.shift || (self.meta && self.alt)) {
            match key.as_str() {
                "I" | "J" | "C" => return Some("developer tools"),
                _ => {}
            }
        }
        if primary && key == "U" {
            return Some("view source");
        }
        None
    }
}

/// Raw environment-level occurrence, before classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum EnvironmentSignal {
    VisibilityHidden,
    VisibilityVisible,
    FocusLost,
    FocusGained,
    FullscreenExited,
    FullscreenEntered,
    KeyPressed(KeyCombo),
    ContextMenu,
}

/// What the environment should do with the signal's default action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalDisposition {
    Allow,
    SuppressDefault,
}

/// An incident derived from a raw signal, not yet timestamped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incident {
    pub kind: IntegrityEventKind,
    pub detail: String,
}

impl Incident {
    #[must_use]
    pub fn at(self, at: DateTime<Utc>) -> IntegrityEvent {
        IntegrityEvent {
            kind: self.kind,
            at,
            detail: self.detail,
        }
    }
}

/// Map a raw signal onto an incident (if any) and a disposition.
///
/// Only losses are incidents; regaining focus, visibility or fullscreen is not.
#[must_use]
pub fn classify(signal: &EnvironmentSignal) -> (Option<Incident>, SignalDisposition) {
    let incident = |kind, detail: String| Some(Incident { kind, detail });
    match signal {
        EnvironmentSignal::VisibilityHidden => (
            incident(IntegrityEventKind::TabHidden, "document hidden".into()),
            SignalDisposition::Allow,
        ),
        EnvironmentSignal::FocusLost => (
            incident(IntegrityEventKind::WindowBlur, "window lost focus".into()),
            SignalDisposition::Allow,
        ),
        EnvironmentSignal::FullscreenExited => (
            incident(IntegrityEventKind::FullscreenExit, "left fullscreen".into()),
            SignalDisposition::Allow,
        ),
        EnvironmentSignal::KeyPressed(combo) => match combo.restriction() {
            Some(what) => (
                incident(
                    IntegrityEventKind::RestrictedKey,
                    format!("{} ({what})", combo.describe()),
                ),
                SignalDisposition::SuppressDefault,
            ),
            None => (None, SignalDisposition::Allow),
        },
        EnvironmentSignal::ContextMenu => (
            incident(
                IntegrityEventKind::ContextMenuBlocked,
                "context menu requested".into(),
            ),
            SignalDisposition::SuppressDefault,
        ),
        EnvironmentSignal::VisibilityVisible
        | EnvironmentSignal::FocusGained
        | EnvironmentSignal::FullscreenEntered => (None, SignalDisposition::Allow),
    }
}
