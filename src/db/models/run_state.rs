//! Persisted run-state record shared by the popup and the background
//! synchronizer.

use serde::{Deserialize, Serialize};

use crate::timer::{TimerMode, TimerRun};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RunStateRecord {
    #[serde(default)]
    pub mode: TimerMode,
    #[serde(default)]
    pub time_left: u64,
    #[serde(default)]
    pub is_running: bool,
    #[serde(default)]
    pub current_task: String,
    #[serde(default)]
    pub has_progress: bool,
    #[serde(default)]
    pub start_time: Option<i64>,
    #[serde(default)]
    pub initial_time: Option<u64>,
}

impl Default for RunStateRecord {
    fn default() -> Self {
        Self::idle(TimerMode::default())
    }
}

impl RunStateRecord {
    /// Stopped at the mode's full nominal duration, no anchor.
    pub fn idle(mode: TimerMode) -> Self {
        Self {
            mode,
            time_left: mode.duration_secs(),
            is_running: false,
            current_task: String::new(),
            has_progress: false,
            start_time: None,
            initial_time: None,
        }
    }

    /// The anchor, if both halves are present and non-zero. Zero is what a
    /// cleared anchor looks like in older records.
    pub fn anchor(&self) -> Option<TimerRun> {
        match (self.start_time, self.initial_time) {
            (Some(start), Some(initial)) if start > 0 && initial > 0 => Some(TimerRun {
                mode: self.mode,
                start_ms: start,
                initial_secs: initial,
                is_running: self.is_running,
            }),
            _ => None,
        }
    }

    /// A run that should be ticking. A record marked running without an
    /// anchor counts as no active run.
    pub fn active_run(&self) -> Option<TimerRun> {
        if !self.is_running {
            return None;
        }
        self.anchor()
    }
}
