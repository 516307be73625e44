pub mod engine;
pub mod mode;
pub mod state;

pub use engine::{compute_remaining, Completion};
pub use mode::{ModeConfig, TimerMode};
pub use state::TimerRun;
