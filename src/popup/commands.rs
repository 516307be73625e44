//! User actions on the popup, shared by the one-shot CLI commands and the
//! interactive session.

use std::io::Write;
use std::str::FromStr;

use anyhow::{anyhow, bail, Result};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::{self, error::RecvError},
    time::{self, Duration, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    db::{StoreChange, STATS_KEY, TIMER_STATE_KEY},
    messaging::MessageBus,
    timer::TimerMode,
    utils::format::format_clock,
};

use super::PopupController;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Status,
    Start,
    Pause,
    Toggle,
    Reset,
    Finish,
    Mode(TimerMode),
    Task(String),
    Distract,
}

impl FromStr for Action {
    type Err = anyhow::Error;

    /// Interactive syntax: a verb, optionally followed by its argument.
    fn from_str(line: &str) -> Result<Self> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        let action = match verb.to_ascii_lowercase().as_str() {
            "" | "status" | "?" => Action::Status,
            "start" | "s" => Action::Start,
            "pause" | "p" => Action::Pause,
            "toggle" | "t" => Action::Toggle,
            "reset" | "r" => Action::Reset,
            "finish" | "f" => Action::Finish,
            "distract" | "d" => Action::Distract,
            "mode" | "m" => {
                if rest.is_empty() {
                    bail!("usage: mode <short|focus|break|deepwork>");
                }
                Action::Mode(rest.parse()?)
            }
            "task" => Action::Task(rest.to_string()),
            other => return Err(anyhow!("unknown command '{other}'")),
        };
        Ok(action)
    }
}

/// Performs `action` and returns a line describing what happened.
pub async fn apply(popup: &mut PopupController, action: Action) -> String {
    match action {
        Action::Status => popup.view().status_line(),
        Action::Start => {
            if popup.state().is_running {
                return "Already running".to_string();
            }
            popup.start().await;
            format!("Started {}", popup.view().status_line())
        }
        Action::Pause => {
            if !popup.state().is_running {
                return "Not running".to_string();
            }
            popup.pause().await;
            format!("Paused at {}", format_clock(popup.state().time_left))
        }
        Action::Toggle => {
            popup.toggle().await;
            popup.view().status_line()
        }
        Action::Reset => {
            popup.reset().await;
            format!("Reset {}", popup.view().status_line())
        }
        Action::Finish => match popup.finish_early().await {
            Some(done) => format!(
                "Finished {} after {}; next up {}",
                done.mode.label(),
                format_clock(done.credited_secs),
                done.next_mode.label()
            ),
            None => "Nothing to finish yet".to_string(),
        },
        Action::Mode(mode) => {
            let credited = popup.switch_mode(mode).await;
            if popup.state().mode != mode {
                return format!("Run already finished; next up {}", popup.state().mode.label());
            }
            if credited > 0 {
                format!(
                    "Switched to {} (credited {})",
                    mode.label(),
                    format_clock(credited)
                )
            } else {
                format!("Switched to {}", mode.label())
            }
        }
        Action::Task(text) => {
            popup.set_task(text).await;
            if popup.state().current_task.is_empty() {
                "Task cleared".to_string()
            } else {
                format!("Task: {}", popup.state().current_task)
            }
        }
        Action::Distract => {
            let entry = popup.log_distraction().await;
            format!("Distraction logged at {} ({})", entry.time, entry.task)
        }
    }
}

/// Keeps the popup open: redraws on every refresh, follows synchronizer
/// events and store writes, and reads actions from stdin until EOF, `quit`,
/// Ctrl-C or `cancel_token`.
pub async fn run_session(
    mut popup: PopupController,
    bus: MessageBus,
    mut changes: broadcast::Receiver<StoreChange>,
    refresh: Duration,
    cancel_token: CancellationToken,
) -> Result<()> {
    let mut events = bus.subscribe_events();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut redraw = time::interval(refresh);
    redraw.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_line = String::new();

    print!("{}", popup.view());
    println!("Commands: start, pause, toggle, reset, finish, mode <m>, task <text>, distract, quit");

    loop {
        tokio::select! {
            _ = redraw.tick() => {
                if let Some(finished) = popup.refresh() {
                    println!("{} run finished", finished.label());
                }
            }
            event = events.recv() => match event {
                Ok(event) => popup.handle_event(event).await,
                Err(RecvError::Lagged(skipped)) => {
                    log_warn!("popup skipped {} synchronizer events", skipped);
                    popup.reload().await;
                }
                Err(RecvError::Closed) => {}
            },
            change = changes.recv() => match change {
                Ok(change) if change.key == TIMER_STATE_KEY || change.key == STATS_KEY => {
                    popup.reload().await;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(_)) => {
                    popup.reload().await;
                }
                Err(RecvError::Closed) => {}
            },
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let trimmed = line.trim();
                if matches!(trimmed, "quit" | "q" | "exit") {
                    break;
                }
                match trimmed.parse::<Action>() {
                    Ok(action) => println!("{}", apply(&mut popup, action).await),
                    Err(err) => println!("{err}"),
                }
                last_line.clear();
            }
            _ = tokio::signal::ctrl_c() => break,
            _ = cancel_token.cancelled() => break,
        }

        let status = popup.view().status_line();
        if status != last_line {
            println!("{status}");
            std::io::stdout().flush()?;
            last_line = status;
        }
    }

    log_info!("popup closed");
    Ok(())
}
