use anyhow::Result;
use log::{error, info};

use crate::db::{models::DailyStats, Database};

pub const STATS_KEY: &str = "devFocusTimerData";

impl Database {
    /// Today's statistics. Storage failures, malformed records and records
    /// from another day all yield a zeroed record for `today`.
    pub async fn load_daily_stats(&self, today: &str) -> DailyStats {
        match self.get_json::<DailyStats>(STATS_KEY).await {
            Ok(Some(stats)) if stats.is_for(today) => stats,
            Ok(Some(stale)) => {
                info!("Starting fresh daily stats (stored date {})", stale.date);
                DailyStats::fresh(today)
            }
            Ok(None) => DailyStats::fresh(today),
            Err(err) => {
                error!("Failed to load daily stats: {err:#}");
                DailyStats::fresh(today)
            }
        }
    }

    pub async fn save_daily_stats(&self, stats: &DailyStats) -> Result<()> {
        self.set_json(STATS_KEY, stats).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_day_returns_stored_values() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("store.sqlite3")).unwrap();
        let mut stats = DailyStats::fresh("Sat Oct 17 2026");
        stats.sessions = 3;
        stats.focus_time = 4500;
        stats.log_distraction("11:02 AM", "inbox");
        db.save_daily_stats(&stats).await.unwrap();

        assert_eq!(db.load_daily_stats("Sat Oct 17 2026").await, stats);
    }

    #[tokio::test]
    async fn new_day_yields_zeroed_record() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("store.sqlite3")).unwrap();
        let mut stats = DailyStats::fresh("Fri Oct 16 2026");
        stats.deepwork_time = 3600;
        db.save_daily_stats(&stats).await.unwrap();

        let loaded = db.load_daily_stats("Sat Oct 17 2026").await;
        assert_eq!(loaded, DailyStats::fresh("Sat Oct 17 2026"));
    }

    #[tokio::test]
    async fn malformed_record_falls_back_to_zeroed() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("store.sqlite3")).unwrap();
        db.set_raw(STATS_KEY, "{\"sessions\":\"many\"}".into())
            .await
            .unwrap();

        let loaded = db.load_daily_stats("Sat Oct 17 2026").await;
        assert_eq!(loaded, DailyStats::fresh("Sat Oct 17 2026"));
    }
}
