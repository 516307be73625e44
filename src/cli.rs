use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::timer::TimerMode;

#[derive(Debug, Parser)]
#[command(name = "devfocus", version, about = "Focus, break and deep-work timer")]
pub struct Cli {
    /// Directory holding the shared store and settings.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run the background synchronizer until Ctrl-C.
    Background,
    /// Synchronizer plus an interactive popup in one process.
    Run,
    /// Interactive popup against a synchronizer running elsewhere.
    Watch,
    /// Print the current timer and today's statistics.
    Status,
    Start,
    Pause,
    Toggle,
    Reset,
    /// Finish the current run early, crediting the elapsed time.
    Finish,
    /// Switch to another mode, stopped at its full duration.
    Mode {
        #[arg(value_parser = parse_mode)]
        mode: TimerMode,
    },
    /// Set the task shown in the popup and recorded with distractions.
    Task { text: Vec<String> },
    /// Log a distraction against the current task.
    Distract,
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    Show,
    Notifications { state: Toggle },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    pub fn enabled(self) -> bool {
        self == Toggle::On
    }
}

fn parse_mode(raw: &str) -> Result<TimerMode, String> {
    raw.parse::<TimerMode>().map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mode_and_global_data_dir() {
        let cli = Cli::try_parse_from(["devfocus", "mode", "deepwork", "--data-dir", "/tmp/x"])
            .unwrap();
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/x")));
        assert!(matches!(
            cli.command,
            CliCommand::Mode {
                mode: TimerMode::Deepwork
            }
        ));
    }

    #[test]
    fn rejects_unknown_mode() {
        assert!(Cli::try_parse_from(["devfocus", "mode", "nap"]).is_err());
    }

    #[test]
    fn task_joins_words() {
        let cli = Cli::try_parse_from(["devfocus", "task", "fix", "the", "parser"]).unwrap();
        match cli.command {
            CliCommand::Task { text } => assert_eq!(text.join(" "), "fix the parser"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn notifications_toggle() {
        let cli = Cli::try_parse_from(["devfocus", "config", "notifications", "off"]).unwrap();
        assert!(matches!(
            cli.command,
            CliCommand::Config(ConfigCommand::Notifications { state: Toggle::Off })
        ));
    }
}
