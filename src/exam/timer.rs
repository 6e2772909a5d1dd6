// src/exam/timer.rs

use crate::config::LOW_TIME_WARNING_SECS;

/// Result of advancing the countdown by one second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Still counting; carries the seconds left.
    Running(u64),
    /// The countdown reached zero on this tick. Reported once.
    Expired,
    /// Nothing to do: the countdown already expired or the session is not live.
    Idle,
}

/// Fixed-length countdown for one exam attempt.
#[derive(Debug, Clone)]
pub struct SessionTimer {
    duration: u64,
    remaining: u64,
    fired: bool,
}

impl SessionTimer {
    pub fn new(duration_secs: u64) -> Self {
        Self {
            duration: duration_secs,
            remaining: duration_secs,
            fired: false,
        }
    }

    pub fn tick(&mut self) -> TickOutcome {
        if self.remaining > 0 {
            self.remaining -= 1;
            if self.remaining > 0 {
                return TickOutcome::Running(self.remaining);
            }
        }
        if self.fired {
            TickOutcome::Idle
        } else {
            self.fired = true;
            TickOutcome::Expired
        }
    }

    /// Lets an already-fired expiry be reported again on the next tick.
    /// Used when the submission it triggered could not be persisted.
    pub fn rearm(&mut self) {
        if self.remaining == 0 {
            self.fired = false;
        }
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn elapsed(&self) -> u64 {
        self.duration - self.remaining
    }

    pub fn is_expired(&self) -> bool {
        self.remaining == 0
    }

    pub fn is_running_low(&self) -> bool {
        self.remaining <= LOW_TIME_WARNING_SECS
    }
}

/// Formats seconds as `HH:MM:SS`.
pub fn format_clock(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}
