use chrono::{DateTime, Utc};

/// Source of wall-clock timestamps for session start, incidents and completion.
///
/// The countdown itself does not read this clock: it is driven by discrete
/// one-second ticks. `WallClock` only stamps events so tests can pin time.
#[derive(Debug, Clone, Copy, Default)]
pub enum WallClock {
    #[default]
    System,
    Fixed(DateTime<Utc>),
}

impl WallClock {
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            WallClock::System => Utc::now(),
            WallClock::Fixed(t) => *t,
        }
    }
}

/// Deterministic timestamp for tests and examples (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

#[must_use]
pub fn fixed_clock() -> WallClock {
    WallClock::fixed(fixed_now())
}
