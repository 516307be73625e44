use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TimerMode {
    Short,
    Focus,
    Break,
    Deepwork,
}

impl Default for TimerMode {
    fn default() -> Self {
        TimerMode::Focus
    }
}

/// Static per-mode configuration: nominal duration, display label and badge colour.
#[derive(Debug)]
pub struct ModeConfig {
    pub duration_secs: u64,
    pub label: &'static str,
    pub color: &'static str,
}

const SHORT: ModeConfig = ModeConfig {
    duration_secs: 15 * 60,
    label: "Short Focus",
    color: "#06b6d4",
};

const FOCUS: ModeConfig = ModeConfig {
    duration_secs: 25 * 60,
    label: "Focus Block",
    color: "#3b82f6",
};

const BREAK: ModeConfig = ModeConfig {
    duration_secs: 5 * 60,
    label: "Break",
    color: "#10b981",
};

const DEEPWORK: ModeConfig = ModeConfig {
    duration_secs: 60 * 60,
    label: "Deep Work",
    color: "#a855f7",
};

impl TimerMode {
    pub fn config(self) -> &'static ModeConfig {
        match self {
            TimerMode::Short => &SHORT,
            TimerMode::Focus => &FOCUS,
            TimerMode::Break => &BREAK,
            TimerMode::Deepwork => &DEEPWORK,
        }
    }

    pub fn duration_secs(self) -> u64 {
        self.config().duration_secs
    }

    pub fn label(self) -> &'static str {
        self.config().label
    }

    pub fn color(self) -> &'static str {
        self.config().color
    }

    /// Short and focus runs credit the same accumulator.
    pub fn is_focus_family(self) -> bool {
        matches!(self, TimerMode::Short | TimerMode::Focus)
    }

    /// Mode entered once a run of this mode completes.
    pub fn next(self) -> TimerMode {
        match self {
            TimerMode::Short | TimerMode::Focus | TimerMode::Deepwork => TimerMode::Break,
            TimerMode::Break => TimerMode::Focus,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimerMode::Short => "short",
            TimerMode::Focus => "focus",
            TimerMode::Break => "break",
            TimerMode::Deepwork => "deepwork",
        }
    }
}

impl fmt::Display for TimerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimerMode {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "short" => Ok(TimerMode::Short),
            "focus" => Ok(TimerMode::Focus),
            "break" => Ok(TimerMode::Break),
            "deepwork" | "deep-work" | "deep_work" => Ok(TimerMode::Deepwork),
            other => Err(anyhow!("unknown timer mode '{other}'")),
        }
    }
}
