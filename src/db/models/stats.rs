//! Daily statistics record.
//!
//! Stored under a fixed key as `{date, sessions, focusTime, deepworkTime,
//! distractions}`. A record whose `date` is not today is treated as absent.

use serde::{Deserialize, Serialize};

pub const DEFAULT_DISTRACTION_TASK: &str = "No task set";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Distraction {
    pub time: String,
    pub task: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DailyStats {
    pub date: String,
    #[serde(default)]
    pub sessions: u32,
    #[serde(default)]
    pub focus_time: u64,
    #[serde(default)]
    pub deepwork_time: u64,
    #[serde(default)]
    pub distractions: Vec<Distraction>,
}

impl DailyStats {
    pub fn fresh(date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            sessions: 0,
            focus_time: 0,
            deepwork_time: 0,
            distractions: Vec::new(),
        }
    }

    pub fn is_for(&self, date: &str) -> bool {
        self.date == date
    }

    /// Appends to the log. A blank task is recorded as [`DEFAULT_DISTRACTION_TASK`].
    pub fn log_distraction(&mut self, time: impl Into<String>, task: &str) -> &Distraction {
        let task = if task.trim().is_empty() {
            DEFAULT_DISTRACTION_TASK.to_string()
        } else {
            task.to_string()
        };
        self.distractions.push(Distraction {
            time: time.into(),
            task,
        });
        &self.distractions[self.distractions.len() - 1]
    }

    /// Newest first.
    pub fn recent_distractions(&self, limit: usize) -> Vec<Distraction> {
        self.distractions.iter().rev().take(limit).cloned().collect()
    }
}
