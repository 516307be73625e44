//! The transient UI side. On activation it rebuilds its state from the store,
//! then mirrors every user action both locally and to the synchronizer.

use std::sync::Arc;

use crate::{
    clock::Clock,
    db::{
        models::{DailyStats, Distraction, RunStateRecord},
        Database,
    },
    messaging::{Command, Event, MessageBus},
    timer::{engine, Completion, TimerMode},
};

use super::view::PopupView;

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

/// Rebuilds local run state from the stored record at `now_ms`. The second
/// value is the mode whose run turned out to be already over; the returned
/// state then shows the follow-up mode, but nothing has been credited.
pub fn reconcile(
    record: Option<RunStateRecord>,
    now_ms: i64,
) -> (RunStateRecord, Option<TimerMode>) {
    let Some(mut record) = record else {
        return (RunStateRecord::idle(TimerMode::Focus), None);
    };

    if record.is_running {
        match record.active_run() {
            Some(run) => {
                let remaining = run.remaining_secs(now_ms);
                if remaining == 0 {
                    let finished = record.mode;
                    let next = RunStateRecord {
                        current_task: record.current_task,
                        ..RunStateRecord::idle(finished.next())
                    };
                    return (next, Some(finished));
                }
                record.time_left = remaining;
            }
            None => {
                record.is_running = false;
                record.start_time = None;
                record.initial_time = None;
                record.has_progress = false;
            }
        }
    }

    if record.time_left == 0 {
        record.time_left = record.mode.duration_secs();
    }
    (record, None)
}

pub struct PopupController {
    state: RunStateRecord,
    stats: DailyStats,
    db: Database,
    bus: MessageBus,
    clock: Arc<dyn Clock>,
}

impl PopupController {
    /// Loads today's statistics and the run state, recomputing any in-flight
    /// run at the current instant.
    pub async fn activate(db: Database, bus: MessageBus, clock: Arc<dyn Clock>) -> Self {
        let stats = db.load_daily_stats(&clock.today_key()).await;
        let (state, finished) = reconcile(db.load_run_state().await, clock.now_ms());
        if let Some(mode) = finished {
            log_info!("{mode} run finished while the popup was closed");
        }

        Self {
            state,
            stats,
            db,
            bus,
            clock,
        }
    }

    /// Re-reads both records, e.g. after another process wrote them.
    pub async fn reload(&mut self) -> Option<TimerMode> {
        self.reload_stats().await;
        let (state, finished) = reconcile(self.db.load_run_state().await, self.clock.now_ms());
        self.state = state;
        finished
    }

    pub fn state(&self) -> &RunStateRecord {
        &self.state
    }

    pub fn stats(&self) -> &DailyStats {
        &self.stats
    }

    pub fn view(&self) -> PopupView {
        PopupView::build(&self.state, &self.stats)
    }

    fn remaining_now(&self) -> u64 {
        match self.state.anchor() {
            Some(run) if self.state.is_running => run.remaining_secs(self.clock.now_ms()),
            _ => self.state.time_left,
        }
    }

    /// Recomputes the display from the anchor. Returns the mode that just
    /// ran out, if any; the state then shows the next mode, stopped. Crediting
    /// that run is the synchronizer's job.
    pub fn refresh(&mut self) -> Option<TimerMode> {
        if !self.state.is_running {
            return None;
        }
        let remaining = self.remaining_now();
        if remaining > 0 {
            self.state.time_left = remaining;
            return None;
        }

        let finished = self.state.mode;
        self.show_next_mode(finished);
        Some(finished)
    }

    pub fn on_visibility_change(&mut self, visible: bool) -> Option<TimerMode> {
        if visible {
            self.refresh()
        } else {
            None
        }
    }

    fn show_next_mode(&mut self, finished: TimerMode) {
        let current_task = std::mem::take(&mut self.state.current_task);
        self.state = RunStateRecord {
            current_task,
            ..RunStateRecord::idle(finished.next())
        };
    }

    /// Starts a fresh run or resumes a paused one. Resuming re-anchors the
    /// start so the time already elapsed is preserved.
    pub async fn start(&mut self) {
        if self.state.is_running || self.state.time_left == 0 {
            return;
        }

        let now = self.clock.now_ms();
        let resuming = self.state.anchor().is_some();
        let initial = self.state.initial_time.unwrap_or(self.state.time_left);
        let start = engine::resume_start_ms(now, initial, self.state.time_left);

        self.state.start_time = Some(start);
        self.state.initial_time = Some(initial);
        self.state.has_progress = true;
        self.state.is_running = true;

        let command = if resuming {
            Command::ResumeTimer {
                start_time: start,
                initial_time: initial,
                mode: self.state.mode,
            }
        } else {
            Command::StartTimer {
                start_time: start,
                initial_time: initial,
                mode: self.state.mode,
            }
        };
        self.persist_run_state().await;
        self.bus.send_command(command);
    }

    pub async fn pause(&mut self) {
        if self.refresh().is_some() || !self.state.is_running {
            return;
        }
        self.state.is_running = false;
        self.persist_run_state().await;
        self.bus.send_command(Command::PauseTimer);
    }

    pub async fn toggle(&mut self) {
        if self.state.is_running {
            self.pause().await;
        } else {
            self.start().await;
        }
    }

    pub async fn reset(&mut self) {
        let current_task = std::mem::take(&mut self.state.current_task);
        self.state = RunStateRecord {
            current_task,
            ..RunStateRecord::idle(self.state.mode)
        };
        self.persist_run_state().await;
        self.bus.send_command(Command::ResetTimer);
    }

    /// Switches mode directly, stopped at full duration. Time already spent
    /// in a running run is credited without counting a session. Returns the
    /// credited seconds. An expired run is not switched away from; the state
    /// shows the mode that follows it instead.
    pub async fn switch_mode(&mut self, mode: TimerMode) -> u64 {
        // A run that already reached zero belongs to the synchronizer.
        if self.refresh().is_some() {
            return 0;
        }

        let mut credited = 0;
        if self.state.is_running {
            if let Some(initial) = self.state.initial_time {
                let remaining = self.remaining_now();
                self.reload_stats().await;
                credited =
                    engine::credit_mode_switch(&mut self.stats, self.state.mode, initial, remaining);
                if credited > 0 {
                    self.persist_stats().await;
                }
            }
        }

        let current_task = std::mem::take(&mut self.state.current_task);
        self.state = RunStateRecord {
            current_task,
            ..RunStateRecord::idle(mode)
        };
        self.persist_run_state().await;
        self.bus.send_command(Command::ResetTimer);
        credited
    }

    /// Completes the run now, crediting only the elapsed time. A run with
    /// nothing elapsed, or no run at all, is left untouched. A run that has
    /// already run out only shows the next mode; its credit comes from the
    /// synchronizer.
    pub async fn finish_early(&mut self) -> Option<Completion> {
        if self.refresh().is_some() {
            return None;
        }
        let initial = self.state.initial_time?;
        let remaining = self.remaining_now();
        if initial.saturating_sub(remaining) == 0 {
            return None;
        }

        self.reload_stats().await;
        let completion =
            engine::finish_with_remaining(&mut self.stats, self.state.mode, initial, remaining)?;
        self.persist_stats().await;

        let finished = self.state.mode;
        self.show_next_mode(finished);
        self.persist_run_state().await;
        self.bus.send_command(Command::ResetTimer);
        Some(completion)
    }

    pub async fn log_distraction(&mut self) -> Distraction {
        self.reload_stats().await;
        let time = self.clock.time_label();
        let entry = self
            .stats
            .log_distraction(time, &self.state.current_task)
            .clone();
        self.persist_stats().await;
        entry
    }

    pub async fn set_task(&mut self, task: impl Into<String>) {
        self.state.current_task = task.into();
        self.persist_run_state().await;
    }

    /// Applies a message from the synchronizer.
    pub async fn handle_event(&mut self, event: Event) {
        match event {
            Event::TimerUpdate {
                time_left,
                is_running,
            } => {
                // A late update must not restart a run paused here.
                if self.state.is_running {
                    self.state.time_left = time_left;
                    self.state.is_running = is_running;
                }
            }
            Event::TimerComplete { mode, .. } => {
                if self.state.mode == mode && self.state.anchor().is_some() {
                    self.show_next_mode(mode);
                }
                self.reload_stats().await;
            }
        }
    }

    async fn reload_stats(&mut self) {
        self.stats = self.db.load_daily_stats(&self.clock.today_key()).await;
    }

    async fn persist_run_state(&self) {
        if let Err(err) = self.db.save_run_state(&self.state).await {
            log_error!("Failed to save timer state: {err:#}");
        }
    }

    async fn persist_stats(&self) {
        if let Err(err) = self.db.save_daily_stats(&self.stats).await {
            log_error!("Failed to save daily stats: {err:#}");
        }
    }
}
