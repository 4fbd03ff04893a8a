use std::{sync::Arc, time::Duration};

use tokio::{
    sync::mpsc,
    task::{JoinHandle, JoinSet},
    time::{Instant, MissedTickBehavior, interval_at},
};
use tracing::{debug, error, info, instrument, warn};

use super::{RelayError, RelayHandle, RelayMessage};
use crate::{
    config::KeepaliveConfig,
    keepalive::{KeepaliveHost, KeepaliveSupervisor},
    model::{DebugPatch, DebugState},
    panel::{PanelHost, PanelId},
    store::BridgeStore,
};

/// The long-lived background context.
///
/// Owns the keepalive context through a [`KeepaliveSupervisor`], re-ensuring
/// it on a watchdog timer and on demand, persists writes relayed by contexts
/// without store access, and keeps at most one panel open.
pub struct Coordinator {
    store: BridgeStore,
    supervisor: KeepaliveSupervisor,
    panels: Arc<dyn PanelHost>,
    panel_id: Option<PanelId>,
    watchdog_interval: Duration,
    handle: RelayHandle,
    inbox: mpsc::Receiver<RelayMessage>,
    ensures: JoinSet<()>,
}

impl Coordinator {
    /// Creates a coordinator; nothing happens until it runs.
    pub fn new(
        store: BridgeStore,
        keepalive: Arc<dyn KeepaliveHost>,
        panels: Arc<dyn PanelHost>,
        config: &KeepaliveConfig,
    ) -> Self {
        let (handle, inbox) = RelayHandle::channel();

        Self {
            store,
            supervisor: KeepaliveSupervisor::new(keepalive, handle.clone()),
            panels,
            panel_id: None,
            watchdog_interval: config.watchdog_interval(),
            handle,
            inbox,
            ensures: JoinSet::new(),
        }
    }

    /// Handle contexts use to reach this coordinator.
    pub fn handle(&self) -> RelayHandle {
        self.handle.clone()
    }

    /// Runs the coordinator on its own task.
    pub fn spawn(self) -> (RelayHandle, JoinHandle<()>) {
        let handle = self.handle();
        (handle, tokio::spawn(self.run()))
    }

    /// Processes relay messages until a shutdown request arrives.
    #[instrument(skip_all, name = "coordinator")]
    pub async fn run(mut self) {
        info!(
            watchdog_secs = self.watchdog_interval.as_secs(),
            "coordinator started"
        );
        self.spawn_ensure();

        let mut watchdog = interval_at(
            Instant::now() + self.watchdog_interval,
            self.watchdog_interval,
        );
        watchdog.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = watchdog.tick() => {
                    debug!("watchdog tick");
                    self.spawn_ensure();
                }

                message = self.inbox.recv() => {
                    let Some(message) = message else { break };

                    if let RelayMessage::Shutdown { reply } = message {
                        self.shutdown().await;
                        let _ = reply.send(());
                        break;
                    }

                    self.handle_message(message).await;
                }
            }
        }

        info!("coordinator stopped");
    }

    async fn handle_message(&mut self, message: RelayMessage) {
        match message {
            RelayMessage::AppendLog(record) => {
                if let Err(e) = self.store.append_log(record).await {
                    error!("failed to append bridge log: {e}");
                }
            }
            RelayMessage::UpdateDebug(patch) => self.update_debug(patch).await,
            RelayMessage::GetStorageSnapshot { reply } => {
                let _ = reply.send(self.store.snapshot());
            }
            RelayMessage::OpenPanel { reply } => {
                let result = self.open_or_focus_panel().await;
                if let Err(e) = &result {
                    warn!("failed to open panel: {e}");
                }
                let _ = reply.send(result);
            }
            RelayMessage::EnsureKeepalive => self.spawn_ensure(),
            RelayMessage::KeepaliveUnloading => {
                info!("keepalive context unloading; re-ensuring");
                self.spawn_ensure();
            }
            RelayMessage::PanelClosed(id) => {
                if self.panel_id == Some(id) {
                    debug!(%id, "tracked panel closed");
                    self.panel_id = None;
                }
            }
            RelayMessage::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    async fn update_debug(&self, patch: DebugPatch) {
        let merged = self
            .store
            .debug_state()
            .unwrap_or_else(|| DebugState::default_for(self.store.base_url()))
            .merged(patch);

        if let Err(e) = self.store.set_debug_state(&merged).await {
            error!("failed to persist relayed debug state: {e}");
        }
    }

    async fn open_or_focus_panel(&mut self) -> Result<PanelId, RelayError> {
        if let Some(id) = self.panel_id {
            match self.panels.focus(id).await {
                Ok(()) => return Ok(id),
                Err(e) => {
                    debug!("tracked panel unavailable ({e}); opening a new one");
                    self.panel_id = None;
                }
            }
        }

        let id = self.panels.create(self.handle.clone()).await?;
        self.panel_id = Some(id);
        Ok(id)
    }

    fn spawn_ensure(&mut self) {
        while self.ensures.try_join_next().is_some() {}

        let supervisor = self.supervisor.clone();
        self.ensures.spawn(async move {
            if let Err(e) = supervisor.ensure().await {
                error!("failed to ensure keepalive context: {e}");
            }
        });
    }

    async fn shutdown(&mut self) {
        info!("coordinator shutting down");

        // No ensure may outlive the close below and recreate the context.
        self.ensures.shutdown().await;
        self.supervisor.cancel();
        self.supervisor.host().close().await;
        self.panels.close_all().await;
        self.panel_id = None;

        // Persist whatever the closing contexts relayed on their way out.
        while let Ok(message) = self.inbox.try_recv() {
            match message {
                RelayMessage::AppendLog(_) | RelayMessage::UpdateDebug(_) => {
                    self.handle_message(message).await;
                }
                RelayMessage::Shutdown { reply } => {
                    let _ = reply.send(());
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::sync::{
        Mutex,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    };

    use async_trait::async_trait;

    use super::*;
    use crate::{
        config::BridgeConfig,
        context::{BridgeContext, Persistence},
        keepalive::KeepaliveError,
        model::{ConnectionHealth, LOG_LIMIT, LogRecord, RecordLevel},
        panel::PanelError,
    };

    #[derive(Default)]
    struct FakeKeepalive {
        alive: AtomicBool,
        creations: AtomicUsize,
        closes: AtomicUsize,
        create_delay: Duration,
    }

    #[async_trait]
    impl KeepaliveHost for FakeKeepalive {
        async fn exists(&self) -> bool {
            self.alive.load(Ordering::SeqCst)
        }

        async fn create(&self, _relay: RelayHandle) -> Result<(), KeepaliveError> {
            if !self.create_delay.is_zero() {
                tokio::time::sleep(self.create_delay).await;
            }
            self.creations.fetch_add(1, Ordering::SeqCst);
            self.alive.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn close(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
            self.alive.store(false, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct FakePanels {
        next: AtomicU64,
        open: Mutex<Vec<PanelId>>,
        focused: Mutex<Vec<PanelId>>,
    }

    impl FakePanels {
        fn dismiss(&self, id: PanelId) {
            self.open.lock().unwrap().retain(|open| *open != id);
        }
    }

    #[async_trait]
    impl PanelHost for FakePanels {
        async fn create(&self, _relay: RelayHandle) -> Result<PanelId, PanelError> {
            let id = PanelId(self.next.fetch_add(1, Ordering::SeqCst) + 1);
            self.open.lock().unwrap().push(id);
            Ok(id)
        }

        async fn focus(&self, id: PanelId) -> Result<(), PanelError> {
            if !self.open.lock().unwrap().contains(&id) {
                return Err(PanelError::Closed(id));
            }
            self.focused.lock().unwrap().push(id);
            Ok(())
        }

        async fn close_all(&self) {
            self.open.lock().unwrap().clear();
        }
    }

    struct Harness {
        store: BridgeStore,
        keepalive: Arc<FakeKeepalive>,
        panels: Arc<FakePanels>,
        relay: RelayHandle,
        task: JoinHandle<()>,
    }

    fn start() -> Harness {
        start_with(Arc::new(FakeKeepalive::default()))
    }

    fn start_with(keepalive: Arc<FakeKeepalive>) -> Harness {
        let store = BridgeStore::in_memory("http://localhost:5000");
        let panels = Arc::new(FakePanels::default());

        let (relay, task) = Coordinator::new(
            store.clone(),
            keepalive.clone(),
            panels.clone(),
            &KeepaliveConfig::default(),
        )
        .spawn();

        Harness {
            store,
            keepalive,
            panels,
            relay,
            task,
        }
    }

    #[tokio::test]
    async fn relayed_logs_are_persisted_in_order_and_capped() {
        let h = start();

        for i in 0..LOG_LIMIT + 50 {
            h.relay
                .append_log(LogRecord::now(RecordLevel::Info, format!("entry {i}")))
                .await
                .unwrap();
        }
        let snapshot = h.relay.storage_snapshot().await.unwrap();

        let logs = snapshot.bridge_logs.unwrap();
        assert_eq!(logs.len(), LOG_LIMIT);
        assert_eq!(logs.records().next().unwrap().message, "entry 50");
        assert_eq!(
            logs.records().last().unwrap().message,
            format!("entry {}", LOG_LIMIT + 49)
        );
    }

    #[tokio::test]
    async fn relayed_and_direct_logs_share_one_ordered_buffer() {
        let h = start();
        let config = BridgeConfig::default();
        let panel = BridgeContext::new("panel", Persistence::Relay(h.relay.clone()), &config);
        let keepalive =
            BridgeContext::new("keepalive", Persistence::Direct(h.store.clone()), &config);

        let total = LOG_LIMIT + 30;
        for i in 0..total {
            if i % 2 == 0 {
                panel.info(format!("entry {i}")).await;
                // Relayed appends are only ordered once the coordinator has taken them.
                h.relay.storage_snapshot().await.unwrap();
            } else {
                keepalive.warn(format!("entry {i}")).await;
            }
        }

        let logs = h.store.logs();
        assert_eq!(logs.len(), LOG_LIMIT);

        let messages: Vec<String> = logs.records().map(|r| r.message.clone()).collect();
        let expected: Vec<String> = (total - LOG_LIMIT..total)
            .map(|i| format!("entry {i}"))
            .collect();
        assert_eq!(messages, expected);

        let levels: Vec<RecordLevel> = logs.records().map(|r| r.level).collect();
        assert_eq!(levels[0], RecordLevel::Info);
        assert_eq!(levels[1], RecordLevel::Warn);
    }

    #[tokio::test]
    async fn relayed_debug_patch_merges_over_persisted_state() {
        let h = start();
        let mut persisted = DebugState::default_for("http://localhost:5000");
        persisted.last_event_at = Some(42);
        h.store.set_debug_state(&persisted).await.unwrap();

        h.relay
            .update_debug(DebugPatch {
                health: Some(ConnectionHealth::Error),
                last_error: Some(Some("SSE error (status 503)".into())),
                ..DebugPatch::default()
            })
            .await
            .unwrap();
        h.relay.storage_snapshot().await.unwrap();

        let debug = h.store.debug_state().unwrap();
        assert_eq!(debug.health, ConnectionHealth::Error);
        assert_eq!(debug.last_error.as_deref(), Some("SSE error (status 503)"));
        assert_eq!(debug.last_event_at, Some(42));
    }

    #[tokio::test]
    async fn open_panel_focuses_or_recreates() {
        let h = start();

        let first = h.relay.open_panel().await.unwrap();
        let again = h.relay.open_panel().await.unwrap();
        assert_eq!(first, again);
        assert_eq!(*h.panels.focused.lock().unwrap(), vec![first]);

        h.panels.dismiss(first);
        let replacement = h.relay.open_panel().await.unwrap();
        assert_ne!(replacement, first);
    }

    #[tokio::test]
    async fn closed_panel_notification_clears_tracking() {
        let h = start();

        let first = h.relay.open_panel().await.unwrap();
        h.relay.panel_closed(first).await.unwrap();
        let second = h.relay.open_panel().await.unwrap();

        assert_ne!(first, second);
        assert!(h.panels.focused.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn watchdog_recreates_a_vanished_keepalive_context() {
        let h = start();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(h.keepalive.creations.load(Ordering::SeqCst), 1);

        h.keepalive.alive.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(31)).await;

        assert_eq!(h.keepalive.creations.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_pending_ensures() {
        let keepalive = Arc::new(FakeKeepalive {
            create_delay: Duration::from_secs(60),
            ..FakeKeepalive::default()
        });
        let h = start_with(keepalive.clone());

        h.relay.ensure_keepalive().await.unwrap();
        h.relay.keepalive_unloading().await.unwrap();
        h.relay.shutdown().await.unwrap();
        h.task.await.unwrap();

        tokio::time::sleep(Duration::from_secs(120)).await;

        assert!(!keepalive.alive.load(Ordering::SeqCst));
        assert_eq!(keepalive.creations.load(Ordering::SeqCst), 0);
        assert_eq!(keepalive.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn shutdown_closes_owned_contexts() {
        let h = start();
        h.relay.open_panel().await.unwrap();

        h.relay.shutdown().await.unwrap();
        h.task.await.unwrap();

        assert_eq!(h.keepalive.closes.load(Ordering::SeqCst), 1);
        assert!(h.panels.open.lock().unwrap().is_empty());
        assert!(h.relay.is_closed());
    }
}
