//! Fire-and-forget messages between the popup and the background
//! synchronizer.
//!
//! Delivery is best effort: a send succeeds once it has been attempted. A
//! closed popup or a synchronizer living in another process simply means
//! nobody receives it.

use log::debug;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::timer::TimerMode;

const CHANNEL_CAPACITY: usize = 32;

/// Popup → background.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum Command {
    StartTimer {
        start_time: i64,
        initial_time: u64,
        mode: TimerMode,
    },
    PauseTimer,
    ResumeTimer {
        start_time: i64,
        initial_time: u64,
        mode: TimerMode,
    },
    ResetTimer,
}

/// Background → popup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum Event {
    TimerUpdate { time_left: u64, is_running: bool },
    TimerComplete { mode: TimerMode, initial_time: u64 },
}

#[derive(Clone)]
pub struct MessageBus {
    commands: broadcast::Sender<Command>,
    events: broadcast::Sender<Event>,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBus {
    pub fn new() -> Self {
        let (commands, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (events, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { commands, events }
    }

    pub fn send_command(&self, command: Command) {
        if let Err(broadcast::error::SendError(command)) = self.commands.send(command) {
            debug!("no synchronizer listening, dropped {command:?}");
        }
    }

    pub fn send_event(&self, event: Event) {
        if let Err(broadcast::error::SendError(event)) = self.events.send(event) {
            debug!("no popup listening, dropped {event:?}");
        }
    }

    pub fn subscribe_commands(&self) -> broadcast::Receiver<Command> {
        self.commands.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }
}
