use std::{future::Future, sync::Arc, time::Duration};

use devfocus_lib::{
    background::{BackgroundSynchronizer, LogBadge, LogNotifier, TickOutcome},
    clock::{Clock, ManualClock},
    db::Database,
    messaging::{Command, Event, MessageBus},
    popup::PopupController,
    timer::TimerMode,
};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

const T0: i64 = 1_700_000_000_000;

struct Harness {
    _dir: tempfile::TempDir,
    db: Database,
    bus: MessageBus,
    clock: Arc<ManualClock>,
    sync: BackgroundSynchronizer,
    commands: broadcast::Receiver<Command>,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("store.sqlite3")).unwrap();
        let bus = MessageBus::new();
        let clock = Arc::new(ManualClock::new(T0));
        // Ticks are driven by hand; the spawned ticker never fires in time.
        let sync = BackgroundSynchronizer::new(
            db.clone(),
            bus.clone(),
            clock.clone(),
            Arc::new(LogBadge),
            Arc::new(LogNotifier),
        )
        .with_tick_interval(Duration::from_secs(3600));

        Self {
            _dir: dir,
            commands: bus.subscribe_commands(),
            db,
            bus,
            clock,
            sync,
        }
    }

    /// Delivers every command the popup has sent so far, in order.
    async fn pump(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            self.sync.handle_command(command).await;
        }
    }

    async fn popup(&self) -> PopupController {
        PopupController::activate(self.db.clone(), self.bus.clone(), self.clock.clone()).await
    }
}

async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..400 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn focus_run_expires_into_break() {
    let mut h = Harness::new();
    let mut events = h.bus.subscribe_events();

    let mut popup = h.popup().await;
    popup.start().await;
    h.pump().await;
    assert!(h.sync.is_ticking().await);

    h.clock.set(T0 + 1_500_000);
    let outcome = h.sync.tick().await;
    let TickOutcome::Completed(done) = outcome else {
        panic!("expected completion, got {outcome:?}");
    };
    assert_eq!(done.credited_secs, 1500);
    assert_eq!(done.next_mode, TimerMode::Break);

    loop {
        let event = events.recv().await.unwrap();
        let complete = matches!(event, Event::TimerComplete { .. });
        popup.handle_event(event).await;
        if complete {
            break;
        }
    }

    assert_eq!(popup.stats().sessions, 1);
    assert_eq!(popup.stats().focus_time, 1500);
    assert_eq!(popup.state().mode, TimerMode::Break);
    assert_eq!(popup.state().time_left, 300);
    assert!(!popup.state().is_running);

    let stored = h.db.load_run_state().await.unwrap();
    assert_eq!(stored.mode, TimerMode::Break);
    assert_eq!(stored.time_left, 300);
    h.sync.shutdown().await;
}

#[tokio::test]
async fn completion_while_popup_closed_is_seen_on_reopen() {
    let mut h = Harness::new();

    let mut popup = h.popup().await;
    popup.set_task("ship release").await;
    popup.start().await;
    drop(popup);
    h.pump().await;

    h.clock.set(T0 + 1_600_000);
    assert!(matches!(h.sync.tick().await, TickOutcome::Completed(_)));

    let popup = h.popup().await;
    assert_eq!(popup.state().mode, TimerMode::Break);
    assert_eq!(popup.state().current_task, "ship release");
    assert_eq!(popup.stats().sessions, 1);
    h.sync.shutdown().await;
}

#[tokio::test]
async fn deepwork_pause_and_resume_keeps_elapsed_time() {
    let mut h = Harness::new();

    let mut popup = h.popup().await;
    popup.switch_mode(TimerMode::Deepwork).await;
    popup.start().await;
    h.pump().await;
    assert!(h.sync.is_ticking().await);

    h.clock.set(T0 + 10_000);
    popup.pause().await;
    assert_eq!(popup.state().time_left, 3590);
    h.pump().await;
    assert!(!h.sync.is_ticking().await);

    h.clock.set(T0 + 20_000);
    popup.start().await;
    h.pump().await;
    let run = h.sync.current_run().await.unwrap();
    assert!(run.is_running);
    assert_eq!(run.start_ms, T0 + 10_000);

    h.clock.set(T0 + 25_000);
    assert_eq!(
        h.sync.tick().await,
        TickOutcome::Running {
            remaining_secs: 3585
        }
    );
    popup.refresh();
    assert_eq!(popup.state().time_left, 3585);
    h.sync.shutdown().await;
}

#[tokio::test]
async fn distraction_is_logged_in_any_run_state() {
    let h = Harness::new();
    let mut popup = h.popup().await;
    popup.set_task("refactor parser").await;

    let entry = popup.log_distraction().await;
    assert_eq!(entry.task, "refactor parser");
    assert!(!entry.time.is_empty());

    popup.start().await;
    popup.log_distraction().await;
    popup.pause().await;
    popup.log_distraction().await;

    let stats = h.db.load_daily_stats(&h.clock.today_key()).await;
    assert_eq!(stats.distractions.len(), 3);
    assert!(stats
        .distractions
        .iter()
        .all(|d| d.task == "refactor parser"));
}

#[tokio::test]
async fn synchronizer_in_another_process_adopts_run_from_store() {
    let h = Harness::new();
    // A second handle on the same file stands in for a separate process; no
    // message reaches it.
    let remote_db = Database::new(h.db.path().to_path_buf()).unwrap();
    let remote = BackgroundSynchronizer::new(
        remote_db.clone(),
        MessageBus::new(),
        h.clock.clone(),
        Arc::new(LogBadge),
        Arc::new(LogNotifier),
    )
    .with_tick_interval(Duration::from_secs(3600));
    let cancel = CancellationToken::new();
    let listener = remote.spawn_listener(cancel.clone());

    let mut popup = h.popup().await;
    popup.start().await;

    let mut version = None;
    remote_db.poll_external_changes(&mut version).await.unwrap();
    let sync = &remote;
    eventually(|| async move { sync.is_ticking().await }).await;
    assert_eq!(remote.current_run().await.unwrap().start_ms, T0);

    popup.pause().await;
    remote_db.poll_external_changes(&mut version).await.unwrap();
    eventually(|| async move { !sync.is_ticking().await }).await;

    cancel.cancel();
    listener.await.unwrap();
}

#[tokio::test]
async fn restarted_run_seen_in_one_poll_replaces_the_old_one() {
    let h = Harness::new();
    let remote_db = Database::new(h.db.path().to_path_buf()).unwrap();
    let remote = BackgroundSynchronizer::new(
        remote_db.clone(),
        MessageBus::new(),
        h.clock.clone(),
        Arc::new(LogBadge),
        Arc::new(LogNotifier),
    )
    .with_tick_interval(Duration::from_secs(3600));
    let cancel = CancellationToken::new();
    let listener = remote.spawn_listener(cancel.clone());

    let mut popup = h.popup().await;
    popup.start().await;
    let mut version = None;
    remote_db.poll_external_changes(&mut version).await.unwrap();
    let sync = &remote;
    eventually(|| async move { sync.is_ticking().await }).await;

    // Switch and restart land between two polls.
    h.clock.set(T0 + 600_000);
    assert_eq!(popup.switch_mode(TimerMode::Deepwork).await, 600);
    popup.start().await;
    remote_db.poll_external_changes(&mut version).await.unwrap();
    eventually(|| async move {
        sync.current_run()
            .await
            .is_some_and(|run| run.mode == TimerMode::Deepwork && run.start_ms == T0 + 600_000)
    })
    .await;

    h.clock.set(T0 + 1_500_000);
    assert_eq!(
        remote.tick().await,
        TickOutcome::Running {
            remaining_secs: 2700
        }
    );

    let stats = h.db.load_daily_stats(&h.clock.today_key()).await;
    assert_eq!(stats.sessions, 0);
    assert_eq!(stats.focus_time, 600);
    assert_eq!(stats.deepwork_time, 0);
    let stored = h.db.load_run_state().await.unwrap();
    assert_eq!(stored.mode, TimerMode::Deepwork);
    assert!(stored.is_running);
    assert_eq!(stored.start_time, Some(T0 + 600_000));

    cancel.cancel();
    listener.await.unwrap();
}

#[tokio::test]
async fn finish_at_expiry_is_credited_once() {
    let mut h = Harness::new();
    let mut changes = h.db.subscribe();

    let mut popup = h.popup().await;
    popup.start().await;
    h.pump().await;

    h.clock.set(T0 + 1_500_000);
    assert!(popup.finish_early().await.is_none());
    assert!(matches!(h.sync.tick().await, TickOutcome::Completed(_)));
    while let Ok(change) = changes.try_recv() {
        h.sync.on_store_change(&change).await;
    }
    assert!(!h.sync.is_ticking().await);

    let stats = h.db.load_daily_stats(&h.clock.today_key()).await;
    assert_eq!(stats.sessions, 1);
    assert_eq!(stats.focus_time, 1500);

    popup.reload().await;
    assert_eq!(popup.state().mode, TimerMode::Break);
    assert_eq!(popup.stats().sessions, 1);
    h.sync.shutdown().await;
}
