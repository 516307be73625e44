use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Local, TimeZone, Utc};

/// Wall-clock source. Everything time-dependent asks the clock instead of
/// reading the system time directly.
pub trait Clock: Send + Sync {
    /// Epoch milliseconds.
    fn now_ms(&self) -> i64;

    /// Calendar-day key for today, e.g. `Sat Oct 17 2026`.
    fn today_key(&self) -> String {
        date_key(self.now_ms())
    }

    /// Short local time label, e.g. `09:41 AM`.
    fn time_label(&self) -> String {
        local_time(self.now_ms()).format("%I:%M %p").to_string()
    }
}

fn local_time(epoch_ms: i64) -> DateTime<Local> {
    match Local.timestamp_millis_opt(epoch_ms).single() {
        Some(dt) => dt,
        None => Utc::now().with_timezone(&Local),
    }
}

pub fn date_key(epoch_ms: i64) -> String {
    local_time(epoch_ms).format("%a %b %d %Y").to_string()
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    pub fn new(now_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(now_ms),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, delta_ms: i64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_moves_on_request() {
        let clock = ManualClock::new(1_000);
        clock.advance_ms(500);
        assert_eq!(clock.now_ms(), 1_500);
        clock.set(0);
        assert_eq!(clock.now_ms(), 0);
    }

    #[test]
    fn date_key_has_weekday_month_day_year() {
        let key = ManualClock::new(1_792_000_000_000).today_key();
        let parts: Vec<&str> = key.split(' ').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[2].len(), 2);
        assert_eq!(parts[3].len(), 4);
    }

    #[test]
    fn same_instant_same_day() {
        assert_eq!(date_key(86_400_000 * 400), date_key(86_400_000 * 400 + 1));
    }
}
