pub mod background;
mod cli;
pub mod clock;
pub mod db;
pub mod messaging;
pub mod popup;
pub mod settings;
pub mod timer;
pub mod utils;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::info;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use background::{BackgroundSynchronizer, LogBadge, LogNotifier};
use cli::{Cli, CliCommand, ConfigCommand};
use clock::{Clock, SystemClock};
use db::Database;
use messaging::MessageBus;
use popup::{
    commands::{self as popup_commands, Action},
    PopupController,
};
use settings::{NotificationSettings, SettingsStore};

const STORE_FILE: &str = "store.sqlite3";
const SETTINGS_FILE: &str = "settings.json";

/// Everything the popup and the synchronizer share inside one process.
#[derive(Clone)]
pub struct AppContext {
    pub db: Database,
    pub bus: MessageBus,
    pub settings: Arc<SettingsStore>,
    pub clock: Arc<dyn Clock>,
}

impl AppContext {
    pub fn open(data_dir: &Path) -> Result<Self> {
        Self::open_with_clock(data_dir, Arc::new(SystemClock))
    }

    pub fn open_with_clock(data_dir: &Path, clock: Arc<dyn Clock>) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data dir {}", data_dir.display()))?;

        let db = Database::new(data_dir.join(STORE_FILE))?;
        let settings = SettingsStore::new(data_dir.join(SETTINGS_FILE))?;

        Ok(Self {
            db,
            bus: MessageBus::new(),
            settings: Arc::new(settings),
            clock,
        })
    }

    pub fn synchronizer(&self) -> BackgroundSynchronizer {
        BackgroundSynchronizer::new(
            self.db.clone(),
            self.bus.clone(),
            self.clock.clone(),
            Arc::new(LogBadge),
            Arc::new(LogNotifier),
        )
        .with_tick_interval(self.settings.timing().background_tick())
        .with_notifications(self.settings.notifications().enabled)
    }

    pub async fn popup(&self) -> PopupController {
        PopupController::activate(self.db.clone(), self.bus.clone(), self.clock.clone()).await
    }
}

pub fn default_data_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|dir| dir.join("devfocus"))
        .ok_or_else(|| anyhow!("No data directory available; pass --data-dir"))
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(dispatch(cli.command, data_dir))
}

async fn dispatch(command: CliCommand, data_dir: PathBuf) -> Result<()> {
    let ctx = AppContext::open(&data_dir)?;

    match command {
        CliCommand::Background => run_background(&ctx).await,
        CliCommand::Run => run_interactive(&ctx, true).await,
        CliCommand::Watch => run_interactive(&ctx, false).await,
        CliCommand::Status => {
            print!("{}", ctx.popup().await.view());
            Ok(())
        }
        CliCommand::Start => one_shot(&ctx, Action::Start).await,
        CliCommand::Pause => one_shot(&ctx, Action::Pause).await,
        CliCommand::Toggle => one_shot(&ctx, Action::Toggle).await,
        CliCommand::Reset => one_shot(&ctx, Action::Reset).await,
        CliCommand::Finish => one_shot(&ctx, Action::Finish).await,
        CliCommand::Mode { mode } => one_shot(&ctx, Action::Mode(mode)).await,
        CliCommand::Task { text } => one_shot(&ctx, Action::Task(text.join(" "))).await,
        CliCommand::Distract => one_shot(&ctx, Action::Distract).await,
        CliCommand::Config(ConfigCommand::Show) => {
            println!("{}", ctx.settings.to_pretty_json()?);
            println!("data dir: {}", data_dir.display());
            Ok(())
        }
        CliCommand::Config(ConfigCommand::Notifications { state }) => {
            ctx.settings.update_notifications(NotificationSettings {
                enabled: state.enabled(),
            })?;
            println!(
                "Notifications {}",
                if state.enabled() { "enabled" } else { "disabled" }
            );
            Ok(())
        }
    }
}

async fn one_shot(ctx: &AppContext, action: Action) -> Result<()> {
    let mut popup = ctx.popup().await;
    println!("{}", popup_commands::apply(&mut popup, action).await);
    print!("{}", popup.view());
    Ok(())
}

/// Starts the store watcher and the synchronizer listener, adopting any run
/// left active by a previous process.
async fn start_background(
    ctx: &AppContext,
    cancel: &CancellationToken,
) -> Vec<JoinHandle<()>> {
    let synchronizer = ctx.synchronizer();
    let listener = synchronizer.spawn_listener(cancel.child_token());
    synchronizer.recover().await;

    let watcher = ctx
        .db
        .spawn_change_watcher(ctx.settings.timing().store_poll(), cancel.child_token());
    vec![listener, watcher]
}

async fn join_all(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        if let Err(err) = handle.await {
            log::error!("background task failed: {err}");
        }
    }
}

async fn run_background(ctx: &AppContext) -> Result<()> {
    let cancel = CancellationToken::new();
    let handles = start_background(ctx, &cancel).await;
    info!("Synchronizer running on {}", ctx.db.path().display());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutting down synchronizer");

    cancel.cancel();
    join_all(handles).await;
    Ok(())
}

async fn run_interactive(ctx: &AppContext, with_background: bool) -> Result<()> {
    let cancel = CancellationToken::new();
    let handles = if with_background {
        start_background(ctx, &cancel).await
    } else {
        vec![ctx
            .db
            .spawn_change_watcher(ctx.settings.timing().store_poll(), cancel.child_token())]
    };

    let changes = ctx.db.subscribe();
    let popup = ctx.popup().await;
    let result = popup_commands::run_session(
        popup,
        ctx.bus.clone(),
        changes,
        ctx.settings.timing().popup_refresh(),
        cancel.child_token(),
    )
    .await;

    cancel.cancel();
    join_all(handles).await;
    result
}
