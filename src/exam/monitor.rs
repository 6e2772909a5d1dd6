// src/exam/monitor.rs

use std::time::Duration;

use serde::Serialize;

use crate::config::{DEFAULT_AUTO_SUBMIT_GRACE_SECS, DEFAULT_TAB_SWITCH_THRESHOLD};

/// Anti-cheat policy: how many visibility losses are tolerated, and how long
/// the candidate is warned before the automatic submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegrityPolicy {
    pub threshold: u32,
    pub grace: Duration,
}

impl Default for IntegrityPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_TAB_SWITCH_THRESHOLD,
            grace: Duration::from_secs(DEFAULT_AUTO_SUBMIT_GRACE_SECS),
        }
    }
}

/// What the caller must do after a visibility loss was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum MonitorVerdict {
    /// Below threshold: show a non-blocking warning.
    Warning { count: u32, threshold: u32 },
    /// Threshold reached: schedule the single automatic submission.
    ScheduleAutoSubmit {
        count: u32,
        #[serde(rename = "grace_secs", serialize_with = "serialize_secs")]
        grace: Duration,
    },
    /// Threshold already reached and an automatic submission is pending.
    FinalWarning { count: u32 },
    /// The session no longer accepts events.
    Ignored,
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_secs())
}

/// Counts visibility losses and decides when the exam must end.
#[derive(Debug, Clone)]
pub struct IntegrityMonitor {
    policy: IntegrityPolicy,
    tab_switches: u32,
    final_warning: bool,
    auto_submit_pending: bool,
}

impl IntegrityMonitor {
    pub fn new(policy: IntegrityPolicy) -> Self {
        Self {
            policy,
            tab_switches: 0,
            final_warning: false,
            auto_submit_pending: false,
        }
    }

    pub fn on_visibility_lost(&mut self) -> MonitorVerdict {
        self.tab_switches = self.tab_switches.saturating_add(1);

        if self.tab_switches < self.policy.threshold {
            return MonitorVerdict::Warning {
                count: self.tab_switches,
                threshold: self.policy.threshold,
            };
        }

        self.final_warning = true;
        if self.auto_submit_pending {
            MonitorVerdict::FinalWarning {
                count: self.tab_switches,
            }
        } else {
            self.auto_submit_pending = true;
            MonitorVerdict::ScheduleAutoSubmit {
                count: self.tab_switches,
                grace: self.policy.grace,
            }
        }
    }

    pub fn tab_switches(&self) -> u32 {
        self.tab_switches
    }

    pub fn final_warning(&self) -> bool {
        self.final_warning
    }

    pub fn auto_submit_pending(&self) -> bool {
        self.auto_submit_pending
    }

    pub fn policy(&self) -> IntegrityPolicy {
        self.policy
    }

    /// Banner text for the current count, if any warning applies.
    pub fn banner(&self) -> Option<String> {
        if self.tab_switches == 0 {
            return None;
        }
        if self.final_warning {
            Some(format!(
                "Final warning: {} tab switches recorded. The exam will be submitted automatically in {} seconds.",
                self.tab_switches,
                self.policy.grace.as_secs()
            ))
        } else {
            Some(format!(
                "Warning: leaving the exam page was detected ({}/{}).",
                self.tab_switches, self.policy.threshold
            ))
        }
    }
}
