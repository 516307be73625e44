use std::sync::Arc;

use tokio::{
    sync::{broadcast::error::RecvError, Mutex},
    task::JoinHandle,
    time::{self, Duration, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    clock::Clock,
    db::{models::RunStateRecord, Database, StoreChange},
    messaging::{Command, Event, MessageBus},
    timer::{engine, Completion, TimerMode, TimerRun},
};

use super::effects::{Badge, Notification, Notifier};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

/// Whether the stored record still describes `run` (or nothing newer), so
/// the completion may overwrite it.
fn record_follows(record: &RunStateRecord, run: &TimerRun) -> bool {
    match record.anchor() {
        Some(stored) => stored.same_anchor(run),
        None => record.mode == run.mode,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing is running; the tick loop should stop.
    Idle,
    Running { remaining_secs: u64 },
    Completed(Completion),
}

struct Ticker {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

/// Keeps the authoritative countdown alive and raises completion side
/// effects whether or not a popup is open.
#[derive(Clone)]
pub struct BackgroundSynchronizer {
    run: Arc<Mutex<Option<TimerRun>>>,
    ticker: Arc<Mutex<Option<Ticker>>>,
    db: Database,
    bus: MessageBus,
    clock: Arc<dyn Clock>,
    badge: Arc<dyn Badge>,
    notifier: Arc<dyn Notifier>,
    tick_interval: Duration,
    notifications_enabled: bool,
    log_every_tick: bool,
}

impl BackgroundSynchronizer {
    pub fn new(
        db: Database,
        bus: MessageBus,
        clock: Arc<dyn Clock>,
        badge: Arc<dyn Badge>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let debug_mode = std::env::var("DEVFOCUS_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Self {
            run: Arc::new(Mutex::new(None)),
            ticker: Arc::new(Mutex::new(None)),
            db,
            bus,
            clock,
            badge,
            notifier,
            tick_interval: Duration::from_secs(1),
            notifications_enabled: true,
            log_every_tick: debug_mode,
        }
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub fn with_notifications(mut self, enabled: bool) -> Self {
        self.notifications_enabled = enabled;
        self
    }

    pub async fn current_run(&self) -> Option<TimerRun> {
        *self.run.lock().await
    }

    async fn running_run(&self) -> Option<TimerRun> {
        self.run.lock().await.filter(|run| run.is_running)
    }

    pub async fn is_ticking(&self) -> bool {
        self.running_run().await.is_some()
    }

    /// (Re)anchors the run and restarts the tick.
    pub async fn start(&self, start_ms: i64, initial_secs: u64, mode: TimerMode) {
        let run = TimerRun::new(mode, start_ms, initial_secs);
        *self.run.lock().await = Some(run);
        log_info!(
            "{} run anchored at {} for {}s",
            mode,
            start_ms,
            initial_secs
        );
        self.spawn_ticker().await;
    }

    pub async fn resume(&self, start_ms: i64, initial_secs: u64, mode: TimerMode) {
        self.start(start_ms, initial_secs, mode).await;
    }

    pub async fn pause(&self) {
        self.cancel_ticker().await;
        if let Some(run) = self.run.lock().await.as_mut() {
            run.stop();
        }
        self.badge.clear();
    }

    pub async fn reset(&self) {
        self.cancel_ticker().await;
        *self.run.lock().await = None;
        self.badge.clear();
    }

    pub async fn handle_command(&self, command: Command) {
        log_debug!("handling {:?}", command);
        match command {
            Command::StartTimer {
                start_time,
                initial_time,
                mode,
            } => self.start(start_time, initial_time, mode).await,
            Command::ResumeTimer {
                start_time,
                initial_time,
                mode,
            } => self.resume(start_time, initial_time, mode).await,
            Command::PauseTimer => self.pause().await,
            Command::ResetTimer => self.reset().await,
        }
    }

    /// One authoritative tick: recompute from the anchor, refresh the badge,
    /// broadcast an update and complete the run once it reaches zero.
    pub async fn tick(&self) -> TickOutcome {
        let Some(run) = self.running_run().await else {
            return TickOutcome::Idle;
        };

        let remaining = run.remaining_secs(self.clock.now_ms());
        if self.log_every_tick {
            log_info!("tick: {} {}s remaining", run.mode, remaining);
        }

        self.badge.show_remaining(remaining, run.mode);
        self.bus.send_event(Event::TimerUpdate {
            time_left: remaining,
            is_running: true,
        });

        if remaining > 0 {
            return TickOutcome::Running {
                remaining_secs: remaining,
            };
        }

        match self.complete(run).await {
            Some(completion) => TickOutcome::Completed(completion),
            None => TickOutcome::Idle,
        }
    }

    /// Credits an expired run and announces it. Returns `None` when the run
    /// was replaced or already completed by a concurrent caller.
    async fn complete(&self, run: TimerRun) -> Option<Completion> {
        {
            let mut guard = self.run.lock().await;
            match guard.as_ref() {
                Some(current) if current.same_anchor(&run) => *guard = None,
                _ => return None,
            }
        }

        let mut stats = self.db.load_daily_stats(&self.clock.today_key()).await;
        let completion = engine::on_expire(&mut stats, run.mode, run.initial_secs);
        if let Err(err) = self.db.save_daily_stats(&stats).await {
            log_error!("Failed to save stats after {} completed: {err:#}", run.mode);
        }

        let stored = self.db.load_run_state().await;
        if stored.as_ref().map_or(true, |record| record_follows(record, &run)) {
            let current_task = stored.map(|record| record.current_task).unwrap_or_default();
            let record = RunStateRecord {
                current_task,
                ..RunStateRecord::idle(completion.next_mode)
            };
            if let Err(err) = self.db.save_run_state(&record).await {
                log_error!("Failed to save run state after completion: {err:#}");
            }
        } else {
            log_info!("store moved on from the {} run, leaving it untouched", run.mode);
        }

        if self.notifications_enabled {
            self.notifier
                .notify(&Notification::for_completion(run.mode, run.initial_secs));
        }
        self.bus.send_event(Event::TimerComplete {
            mode: run.mode,
            initial_time: run.initial_secs,
        });
        self.badge.clear();

        log_info!(
            "{} run complete, credited {}s, next {}",
            run.mode,
            completion.credited_secs,
            completion.next_mode
        );
        Some(completion)
    }

    /// Reacts to a run-state record written by anyone: adopt an active run
    /// (replacing a local run with a different anchor), stop the local tick
    /// when the record says the run is no longer active.
    pub async fn on_store_change(&self, change: &StoreChange) {
        if let Some(record) = RunStateRecord::from_change(change) {
            self.reconcile_with(record.as_ref()).await;
        }
    }

    async fn reconcile_with(&self, record: Option<&RunStateRecord>) {
        match record.and_then(RunStateRecord::active_run) {
            Some(run) => {
                match self.running_run().await {
                    Some(local) if local.same_anchor(&run) => return,
                    Some(local) => {
                        // Several writes can collapse into one observed record,
                        // so the local run may have been replaced unseen.
                        self.cancel_ticker().await;
                        if local.is_expired(run.start_ms) {
                            self.complete(local).await;
                        }
                        log_info!(
                            "re-anchoring to {} run started at {}",
                            run.mode,
                            run.start_ms
                        );
                    }
                    None => {
                        log_info!("adopting {} run started at {}", run.mode, run.start_ms);
                    }
                }
                self.start(run.start_ms, run.initial_secs, run.mode).await;
            }
            None => {
                let Some(local) = self.running_run().await else {
                    return;
                };
                if local.is_expired(self.clock.now_ms()) {
                    // Reached zero before the stop arrived; credit it.
                    self.cancel_ticker().await;
                    self.complete(local).await;
                } else {
                    log_info!("run marked inactive in store, stopping tick");
                    self.pause().await;
                }
            }
        }
    }

    /// Adopts a run left active in the store by a previous process.
    pub async fn recover(&self) -> Option<TimerRun> {
        let record = self.db.load_run_state().await?;
        let run = record.active_run()?;
        log_warn!(
            "Recovered in-flight {} run started at {}; resuming tick",
            run.mode,
            run.start_ms
        );
        self.start(run.start_ms, run.initial_secs, run.mode).await;
        Some(run)
    }

    /// Subscribes to commands and store changes immediately, then serves them
    /// on a spawned task until `cancel_token` fires.
    pub fn spawn_listener(&self, cancel_token: CancellationToken) -> JoinHandle<()> {
        let mut commands = self.bus.subscribe_commands();
        let mut changes = self.db.subscribe();
        let this = self.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    command = commands.recv() => match command {
                        Ok(command) => this.handle_command(command).await,
                        Err(RecvError::Lagged(skipped)) => {
                            log_warn!("synchronizer skipped {} commands", skipped);
                        }
                        Err(RecvError::Closed) => break,
                    },
                    change = changes.recv() => match change {
                        Ok(change) => this.on_store_change(&change).await,
                        Err(RecvError::Lagged(skipped)) => {
                            log_warn!("synchronizer skipped {} store changes", skipped);
                            let record = this.db.load_run_state().await;
                            this.reconcile_with(record.as_ref()).await;
                        }
                        Err(RecvError::Closed) => break,
                    },
                    _ = cancel_token.cancelled() => break,
                }
            }
            this.shutdown().await;
        })
    }

    pub async fn shutdown(&self) {
        self.cancel_ticker().await;
        self.badge.clear();
    }

    async fn spawn_ticker(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        // The old task exits at its next await; an in-flight completion is
        // left to finish.
        if let Some(previous) = ticker_guard.take() {
            previous.cancel.cancel();
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let this = self.clone();
        let period = self.tick_interval;

        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = token.cancelled() => break,
                }
                match this.tick().await {
                    TickOutcome::Running { .. } => {}
                    TickOutcome::Idle | TickOutcome::Completed(_) => break,
                }
            }
        });

        *ticker_guard = Some(Ticker { handle, cancel });
    }

    async fn cancel_ticker(&self) {
        let ticker = self.ticker.lock().await.take();
        if let Some(ticker) = ticker {
            ticker.cancel.cancel();
            if let Err(err) = ticker.handle.await {
                if !err.is_cancelled() {
                    log_error!("tick task failed: {err}");
                }
            }
        }
    }
}
