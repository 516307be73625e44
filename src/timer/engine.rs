//! Elapsed-time math and the mode-completion state machine.
//!
//! Everything here is pure: callers pass the wall-clock instant in epoch
//! milliseconds and the statistics record to mutate.

use serde::Serialize;

use crate::db::models::DailyStats;

use super::TimerMode;

/// `max(0, initial − floor((now − start) / 1000))`.
///
/// A `now` earlier than `start` (clock stepped backwards) counts as zero
/// elapsed time.
pub fn compute_remaining(start_ms: i64, initial_secs: u64, now_ms: i64) -> u64 {
    let elapsed_secs = (now_ms.saturating_sub(start_ms)).max(0) / 1000;
    initial_secs.saturating_sub(elapsed_secs as u64)
}

/// Start timestamp that makes an uninterrupted run from `now_ms` report
/// `time_left_secs` remaining, i.e. the anchor used on resume.
pub fn resume_start_ms(now_ms: i64, initial_secs: u64, time_left_secs: u64) -> i64 {
    let elapsed_secs = initial_secs.saturating_sub(time_left_secs);
    now_ms - (elapsed_secs as i64) * 1000
}

/// Outcome of a run that expired or was finished early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    pub mode: TimerMode,
    pub credited_secs: u64,
    pub next_mode: TimerMode,
    pub next_duration_secs: u64,
}

fn credit(stats: &mut DailyStats, mode: TimerMode, secs: u64) {
    if mode.is_focus_family() {
        stats.focus_time = stats.focus_time.saturating_add(secs);
    } else if mode == TimerMode::Deepwork {
        stats.deepwork_time = stats.deepwork_time.saturating_add(secs);
    }
}

fn complete(stats: &mut DailyStats, mode: TimerMode, completed_secs: u64) -> Completion {
    if mode != TimerMode::Break {
        credit(stats, mode, completed_secs);
        stats.sessions += 1;
    }

    let next_mode = mode.next();
    Completion {
        mode,
        credited_secs: if mode == TimerMode::Break { 0 } else { completed_secs },
        next_mode,
        next_duration_secs: next_mode.duration_secs(),
    }
}

/// Natural expiry. Credits the run's recorded initial duration, not the
/// mode's nominal one.
pub fn on_expire(stats: &mut DailyStats, mode: TimerMode, initial_secs: u64) -> Completion {
    complete(stats, mode, initial_secs)
}

/// Early finish from a known remaining time (works for paused runs, whose
/// anchor is stale). Returns `None` and leaves everything untouched when no
/// time has elapsed.
pub fn finish_with_remaining(
    stats: &mut DailyStats,
    mode: TimerMode,
    initial_secs: u64,
    remaining_secs: u64,
) -> Option<Completion> {
    let elapsed = initial_secs.saturating_sub(remaining_secs);
    if elapsed == 0 {
        return None;
    }
    Some(complete(stats, mode, elapsed))
}

pub fn on_finish_early(
    stats: &mut DailyStats,
    mode: TimerMode,
    start_ms: i64,
    initial_secs: u64,
    now_ms: i64,
) -> Option<Completion> {
    let remaining = compute_remaining(start_ms, initial_secs, now_ms);
    finish_with_remaining(stats, mode, initial_secs, remaining)
}

/// Credit for abandoning a running run through a manual mode switch: the
/// elapsed time goes to the mode's accumulator, but no session is counted.
/// Returns the credited seconds.
pub fn credit_mode_switch(
    stats: &mut DailyStats,
    mode: TimerMode,
    initial_secs: u64,
    remaining_secs: u64,
) -> u64 {
    let elapsed = initial_secs.saturating_sub(remaining_secs);
    if elapsed == 0 || mode == TimerMode::Break {
        return 0;
    }
    credit(stats, mode, elapsed);
    elapsed
}
