use anyhow::Result;
use log::warn;

use crate::db::{models::RunStateRecord, Database, StoreChange};

pub const TIMER_STATE_KEY: &str = "devFocusTimerState";

impl Database {
    /// The stored run state, or `None` when absent, unreadable or malformed.
    pub async fn load_run_state(&self) -> Option<RunStateRecord> {
        match self.get_json::<RunStateRecord>(TIMER_STATE_KEY).await {
            Ok(record) => record,
            Err(err) => {
                warn!("Ignoring stored run state: {err:#}");
                None
            }
        }
    }

    pub async fn save_run_state(&self, record: &RunStateRecord) -> Result<()> {
        self.set_json(TIMER_STATE_KEY, record).await
    }
}

impl RunStateRecord {
    /// Decodes a store notification for the run-state key. `Some(None)` means
    /// the record was removed or is malformed; `None` means the change is for
    /// another key.
    pub fn from_change(change: &StoreChange) -> Option<Option<RunStateRecord>> {
        if change.key != TIMER_STATE_KEY {
            return None;
        }
        let record = change.new_value.as_deref().and_then(|raw| {
            serde_json::from_str(raw)
                .map_err(|err| warn!("Ignoring malformed run state change: {err}"))
                .ok()
        });
        Some(record)
    }
}
