use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use log::{error, info};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::{broadcast, oneshot};

mod migrations;
pub mod models;
pub mod repositories;
mod watcher;

use migrations::run_migrations;

pub use repositories::{STATS_KEY, TIMER_STATE_KEY};

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// A key whose stored value changed, either through this handle or through
/// another connection to the same file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreChange {
    pub key: String,
    pub new_value: Option<String>,
}

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;
type Snapshot = Arc<Mutex<HashMap<String, String>>>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

struct DatabaseInner {
    sender: mpsc::Sender<DbCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
    changes: broadcast::Sender<StoreChange>,
    snapshot: Snapshot,
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(DbCommand::Shutdown) {
                error!("Failed to send shutdown to DB thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join DB thread: {join_err:?}");
            }
        }
    }
}

fn lock_snapshot(snapshot: &Snapshot) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
    match snapshot.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn read_entries(conn: &Connection) -> Result<HashMap<String, String>> {
    let mut stmt = conn.prepare("SELECT key, value FROM kv_store")?;
    let mut rows = stmt.query([])?;
    let mut entries = HashMap::new();
    while let Some(row) = rows.next()? {
        entries.insert(row.get::<_, String>(0)?, row.get::<_, String>(1)?);
    }
    Ok(entries)
}

/// Durable key-value store backed by a single SQLite connection living on a
/// dedicated worker thread. Cloning shares the connection and the change
/// channel.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
    db_path: Arc<PathBuf>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<HashMap<String, String>>>();
        let path_for_thread = db_path.clone();

        let worker = thread::Builder::new()
            .name("devfocus-db".into())
            .spawn(move || {
                let mut conn = match Connection::open(&path_for_thread) {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(anyhow::Error::new(err)
                            .context("failed to open SQLite database")));
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("Failed to enable WAL mode: {err}");
                }
                if let Err(err) = conn.busy_timeout(std::time::Duration::from_secs(5)) {
                    error!("Failed to set busy timeout: {err}");
                }

                let init_result = run_migrations(&mut conn)
                    .context("failed to run database migrations")
                    .and_then(|()| read_entries(&conn).context("failed to load stored keys"));
                let init_ok = init_result.is_ok();
                if ready_tx.send(init_result).is_err() {
                    error!("DB initialization receiver dropped before ready signal");
                    return;
                }
                if !init_ok {
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        DbCommand::Execute(task) => {
                            task(&mut conn);
                        }
                        DbCommand::Shutdown => break,
                    }
                }

                info!("Database thread shutting down");
            })
            .with_context(|| "failed to spawn database worker thread")?;

        let entries = ready_rx
            .recv()
            .context("database worker exited before signaling readiness")??;

        info!("State store opened at {}", db_path.as_path().display());

        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
                changes,
                snapshot: Arc::new(Mutex::new(entries)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.inner.sender.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = DbCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("DB caller dropped before receiving result");
            }
        }));

        sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to DB thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("database thread terminated unexpectedly"))?
    }

    /// Change notifications for every key. Receivers only see changes
    /// published after they subscribe.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.inner.changes.subscribe()
    }

    pub(crate) fn publish(&self, change: StoreChange) {
        // No subscribers is the normal state for one-shot invocations.
        let _ = self.inner.changes.send(change);
    }

    pub(crate) fn snapshot_handle(&self) -> Snapshot {
        Arc::clone(&self.inner.snapshot)
    }

    pub async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.execute(move |conn| {
            conn.query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .with_context(|| format!("failed to read key {key}"))
        })
        .await
    }

    /// Writes `value` under `key` and publishes a [`StoreChange`] when the
    /// stored value actually changed.
    pub async fn set_raw(&self, key: &str, value: String) -> Result<()> {
        let key = key.to_string();
        let snapshot = self.snapshot_handle();
        let change = self
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                                    updated_at = excluded.updated_at",
                    params![key, value, Utc::now().to_rfc3339()],
                )
                .with_context(|| format!("failed to write key {key}"))?;

                let mut snapshot = lock_snapshot(&snapshot);
                let previous = snapshot.insert(key.clone(), value.clone());
                if previous.as_deref() == Some(value.as_str()) {
                    return Ok(None);
                }
                Ok(Some(StoreChange {
                    key,
                    new_value: Some(value),
                }))
            })
            .await?;

        if let Some(change) = change {
            self.publish(change);
        }
        Ok(())
    }

    pub async fn get_json<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        match self.get_raw(key).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .with_context(|| format!("malformed JSON stored under {key}")),
            None => Ok(None),
        }
    }

    pub async fn set_json<T>(&self, key: &str, value: &T) -> Result<()>
    where
        T: Serialize,
    {
        let raw = serde_json::to_string(value)
            .with_context(|| format!("failed to serialize value for {key}"))?;
        self.set_raw(key, raw).await
    }
}
