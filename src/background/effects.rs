//! User-visible side effects of the synchronizer: the toolbar badge and
//! completion notifications. Real renderers live outside this crate; the log
//! implementations are what the CLI uses.

use log::info;
use serde::Serialize;

use crate::timer::TimerMode;
use crate::utils::format::{badge_text, format_clock};

pub trait Badge: Send + Sync {
    fn set_text(&self, text: &str);
    fn set_color(&self, color: &str);

    fn clear(&self) {
        self.set_text("");
    }

    fn show_remaining(&self, remaining_secs: u64, mode: TimerMode) {
        self.set_text(&badge_text(remaining_secs));
        self.set_color(mode.color());
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn for_completion(mode: TimerMode, completed_secs: u64) -> Self {
        match mode {
            TimerMode::Focus | TimerMode::Short => Self {
                title: "🎉 Focus block complete!".into(),
                message: format!(
                    "Focus time: {}\nTime for a break!",
                    format_clock(completed_secs)
                ),
            },
            TimerMode::Deepwork => Self {
                title: "🎉 Deep work complete!".into(),
                message: format!(
                    "Deep work time: {}\nTime for a break!",
                    format_clock(completed_secs)
                ),
            },
            TimerMode::Break => Self {
                title: "✅ Break complete!".into(),
                message: "Ready for the next focus block!".into(),
            },
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification);
}

#[derive(Debug, Default)]
pub struct LogBadge;

impl Badge for LogBadge {
    fn set_text(&self, text: &str) {
        log::debug!("badge text: {text:?}");
    }

    fn set_color(&self, color: &str) {
        log::debug!("badge color: {color}");
    }
}

#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: &Notification) {
        info!(
            "{} | {}",
            notification.title,
            notification.message.replace('\n', " ")
        );
    }
}
