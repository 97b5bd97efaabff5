/// Outcome of applying one clock tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Time remains; carries the new remaining seconds.
    Running(u32),
    /// This tick took the countdown to zero.
    Expired,
    /// The countdown had already reached zero. Nothing changed.
    Stopped,
}

/// Remaining-time arithmetic for a session. One tick is one second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    total: u32,
    remaining: u32,
}

impl Countdown {
    #[must_use]
    pub fn new(total_seconds: u32) -> Self {
        Self {
            total: total_seconds,
            remaining: total_seconds,
        }
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }

    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.remaining == 0
    }

    /// Decrement by exactly one second, floored at zero.
    pub fn tick(&mut self) -> Tick {
        match self.remaining {
            0 => Tick::Stopped,
            1 => {
                self.remaining = 0;
                Tick::Expired
            }
            n => {
                self.remaining = n - 1;
                Tick::Running(self.remaining)
            }
        }
    }
}
