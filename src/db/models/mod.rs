pub mod run_state;
pub mod stats;

pub use run_state::RunStateRecord;
pub use stats::{DailyStats, Distraction, DEFAULT_DISTRACTION_TASK};
