mod run_state;
mod stats;

pub use run_state::TIMER_STATE_KEY;
pub use stats::STATS_KEY;
