pub mod effects;
pub mod synchronizer;

pub use effects::{Badge, LogBadge, LogNotifier, Notification, Notifier};
pub use synchronizer::{BackgroundSynchronizer, TickOutcome};
