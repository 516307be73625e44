use std::fmt;

use serde::Serialize;

use crate::db::models::{DailyStats, Distraction, RunStateRecord};
use crate::timer::TimerMode;
use crate::utils::format::format_clock;

const RECENT_DISTRACTIONS: usize = 5;

/// Everything a renderer needs for one frame of the popup.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopupView {
    pub mode: TimerMode,
    pub mode_label: &'static str,
    pub color: &'static str,
    pub clock: String,
    pub progress_percent: f64,
    pub is_running: bool,
    /// Finish is offered once the run has progressed past its nominal start.
    pub can_finish: bool,
    pub current_task: String,
    pub sessions: u32,
    pub focus_time: String,
    pub deepwork_time: String,
    pub distraction_count: usize,
    pub recent_distractions: Vec<Distraction>,
}

impl PopupView {
    pub fn build(state: &RunStateRecord, stats: &DailyStats) -> Self {
        let nominal = state.mode.duration_secs();
        let done = nominal.saturating_sub(state.time_left);
        let progress_percent = (done as f64 / nominal as f64 * 100.0).clamp(0.0, 100.0);

        Self {
            mode: state.mode,
            mode_label: state.mode.label(),
            color: state.mode.color(),
            clock: format_clock(state.time_left),
            progress_percent,
            is_running: state.is_running,
            can_finish: state.has_progress && state.time_left < nominal,
            current_task: state.current_task.clone(),
            sessions: stats.sessions,
            focus_time: format_clock(stats.focus_time),
            deepwork_time: format_clock(stats.deepwork_time),
            distraction_count: stats.distractions.len(),
            recent_distractions: stats.recent_distractions(RECENT_DISTRACTIONS),
        }
    }

    /// Single-line status, used for live redraws.
    pub fn status_line(&self) -> String {
        format!(
            "[{}] {} {} ({:.0}%)",
            self.mode_label,
            self.clock,
            if self.is_running { "running" } else { "stopped" },
            self.progress_percent
        )
    }
}

impl fmt::Display for PopupView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.status_line())?;
        if !self.current_task.is_empty() {
            writeln!(f, "Task: {}", self.current_task)?;
        }
        if self.can_finish {
            writeln!(f, "Finish available")?;
        }
        writeln!(
            f,
            "Today: {} sessions | focus {} | deep work {} | {} distractions",
            self.sessions, self.focus_time, self.deepwork_time, self.distraction_count
        )?;
        for distraction in &self.recent_distractions {
            writeln!(f, "  {}  {}", distraction.time, distraction.task)?;
        }
        Ok(())
    }
}
