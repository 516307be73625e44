//! Detects writes made through other connections to the store file (another
//! `devfocus` process) and republishes them as [`StoreChange`]s.
//!
//! SQLite bumps `PRAGMA data_version` only for commits made by *other*
//! connections, so our own writes never show up here twice.

use std::collections::HashMap;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::{lock_snapshot, read_entries, Database, StoreChange};

const ENABLE_LOGS: bool = true;

use crate::log_warn;

fn diff_entries(
    previous: &HashMap<String, String>,
    current: &HashMap<String, String>,
) -> Vec<StoreChange> {
    let mut changes: Vec<StoreChange> = current
        .iter()
        .filter(|(key, value)| previous.get(*key) != Some(*value))
        .map(|(key, value)| StoreChange {
            key: key.clone(),
            new_value: Some(value.clone()),
        })
        .collect();

    changes.extend(
        previous
            .keys()
            .filter(|key| !current.contains_key(*key))
            .map(|key| StoreChange {
                key: key.clone(),
                new_value: None,
            }),
    );

    changes.sort_by(|a, b| a.key.cmp(&b.key));
    changes
}

impl Database {
    pub fn spawn_change_watcher(
        &self,
        poll_interval: Duration,
        cancel_token: CancellationToken,
    ) -> JoinHandle<()> {
        let db = self.clone();
        tokio::spawn(async move {
            let mut ticker = time::interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last_version: Option<i64> = None;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(err) = db.poll_external_changes(&mut last_version).await {
                            log_warn!("store change poll failed: {err:#}");
                        }
                    }
                    _ = cancel_token.cancelled() => break,
                }
            }
        })
    }

    /// One poll step. Returns how many changes were published.
    pub async fn poll_external_changes(&self, last_version: &mut Option<i64>) -> Result<usize> {
        let seen = *last_version;
        let snapshot = self.snapshot_handle();

        let (version, changes) = self
            .execute(move |conn| {
                let version: i64 = conn
                    .pragma_query_value(None, "data_version", |row| row.get(0))
                    .context("failed to read data_version pragma")?;
                if seen == Some(version) {
                    return Ok((version, Vec::new()));
                }

                let current = read_entries(conn)?;
                let mut snapshot = lock_snapshot(&snapshot);
                let changes = diff_entries(&snapshot, &current);
                *snapshot = current;
                Ok((version, changes))
            })
            .await?;

        *last_version = Some(version);
        let count = changes.len();
        for change in changes {
            self.publish(change);
        }
        Ok(count)
    }
}
