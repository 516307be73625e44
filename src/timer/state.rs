use serde::{Deserialize, Serialize};

use super::engine::compute_remaining;
use super::TimerMode;

/// One countdown, anchored by the wall-clock instant it (re)started and the
/// duration it started from. Remaining time is always recomputed from the
/// anchor, never decremented.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimerRun {
    pub mode: TimerMode,
    pub start_ms: i64,
    pub initial_secs: u64,
    pub is_running: bool,
}

impl TimerRun {
    pub fn new(mode: TimerMode, start_ms: i64, initial_secs: u64) -> Self {
        Self {
            mode,
            start_ms,
            initial_secs,
            is_running: true,
        }
    }

    pub fn remaining_secs(&self, now_ms: i64) -> u64 {
        compute_remaining(self.start_ms, self.initial_secs, now_ms)
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.remaining_secs(now_ms) == 0
    }

    /// Same anchor, ignoring whether it is currently ticking.
    pub fn same_anchor(&self, other: &TimerRun) -> bool {
        self.mode == other.mode
            && self.start_ms == other.start_ms
            && self.initial_secs == other.initial_secs
    }

    pub fn stop(&mut self) {
        self.is_running = false;
    }
}
