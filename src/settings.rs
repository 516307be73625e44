use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationSettings {
    pub enabled: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Tick and poll periods. Zero values fall back to the defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimingSettings {
    pub background_tick_ms: u64,
    pub popup_refresh_ms: u64,
    pub store_poll_ms: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            background_tick_ms: 1000,
            popup_refresh_ms: 100,
            store_poll_ms: 250,
        }
    }
}

impl TimingSettings {
    fn or_default(value: u64, fallback: u64) -> Duration {
        Duration::from_millis(if value == 0 { fallback } else { value })
    }

    pub fn background_tick(&self) -> Duration {
        Self::or_default(self.background_tick_ms, Self::default().background_tick_ms)
    }

    pub fn popup_refresh(&self) -> Duration {
        Self::or_default(self.popup_refresh_ms, Self::default().popup_refresh_ms)
    }

    pub fn store_poll(&self) -> Duration {
        Self::or_default(self.store_poll_ms, Self::default().store_poll_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct UserSettings {
    #[serde(default)]
    notifications: NotificationSettings,
    #[serde(default)]
    timing: TimingSettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring unreadable settings at {}: {err}", path.display());
                UserSettings::default()
            })
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, UserSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, UserSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn notifications(&self) -> NotificationSettings {
        self.read().notifications.clone()
    }

    pub fn timing(&self) -> TimingSettings {
        self.read().timing.clone()
    }

    pub fn update_notifications(&self, settings: NotificationSettings) -> Result<()> {
        let mut guard = self.write();
        guard.notifications = settings;
        self.persist(&guard)
    }

    pub fn to_pretty_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&*self.read())?)
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        assert!(store.notifications().enabled);
        assert_eq!(store.timing().background_tick(), Duration::from_secs(1));
        assert_eq!(store.timing().popup_refresh(), Duration::from_millis(100));
    }

    #[test]
    fn updates_persist_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();
        store
            .update_notifications(NotificationSettings { enabled: false })
            .unwrap();

        let reopened = SettingsStore::new(path).unwrap();
        assert!(!reopened.notifications().enabled);
    }

    #[test]
    fn zero_periods_fall_back_to_defaults() {
        let timing = TimingSettings {
            background_tick_ms: 0,
            popup_refresh_ms: 50,
            store_poll_ms: 0,
        };
        assert_eq!(timing.background_tick(), Duration::from_secs(1));
        assert_eq!(timing.popup_refresh(), Duration::from_millis(50));
        assert_eq!(timing.store_poll(), Duration::from_millis(250));
    }

    #[test]
    fn garbage_file_reads_as_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "not json").unwrap();
        let store = SettingsStore::new(path).unwrap();
        assert!(store.notifications().enabled);
        assert_eq!(store.timing(), TimingSettings::default());
    }
}
