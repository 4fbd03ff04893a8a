use std::sync::Arc;

use tokio::{
    sync::{Notify, watch},
    time::{MissedTickBehavior, interval},
};
use tracing::{debug, instrument};

use super::{
    PanelId, PanelOutput,
    render::{PanelView, render},
};
use crate::{
    config::BridgeConfig,
    context::{BridgeContext, Persistence},
    projector::PlaybackProjector,
    relay::RelayHandle,
    store::{BASE_URL_KEY, BridgeStore, DEBUG_KEY, LOGS_KEY, StorageChange},
};

/// One open panel.
///
/// Reads and writes the store directly and follows its change notifications.
/// The relay is only used to nudge the keepalive context and to report that
/// the panel closed.
pub struct PanelContext {
    id: PanelId,
    ctx: BridgeContext,
    store: BridgeStore,
    relay: RelayHandle,
    output: Arc<dyn PanelOutput>,
    visible_logs: usize,
    refresh_interval: std::time::Duration,
    projector: PlaybackProjector,
}

impl PanelContext {
    /// Creates the panel; nothing is drawn until [`run`](Self::run).
    pub fn new(
        id: PanelId,
        store: BridgeStore,
        relay: RelayHandle,
        config: &BridgeConfig,
        output: Arc<dyn PanelOutput>,
    ) -> Self {
        let ctx = BridgeContext::new("panel", Persistence::Direct(store.clone()), config);

        Self {
            id,
            ctx,
            store,
            relay,
            output,
            visible_logs: config.panel.visible_logs,
            refresh_interval: config.panel.refresh_interval(),
            projector: PlaybackProjector::new(),
        }
    }

    /// The panel's bridge state.
    pub fn context(&self) -> &BridgeContext {
        &self.ctx
    }

    /// Draws the current state.
    pub fn redraw(&self) {
        let mut debug = self.ctx.debug();
        debug.base_url = self.ctx.base_url();
        let projected = self.projector.projected_at(tokio::time::Instant::now());
        let logs = self.ctx.logs().tail(self.visible_logs);

        let frame = render(&PanelView {
            debug: &debug,
            projected: projected.as_ref(),
            logs: &logs,
        });
        self.output.present(self.id, &frame);
    }

    /// Boots, then redraws on every tick, focus request and store change
    /// until `shutdown` flips or its sender is dropped.
    #[instrument(skip_all, fields(panel = %self.id))]
    pub async fn run(mut self, focus: Arc<Notify>, mut shutdown: watch::Receiver<bool>) {
        self.ctx.info("panel boot start").await;
        self.ctx.load().await;
        self.follow_last_state();

        if let Err(e) = self.relay.ensure_keepalive().await {
            self.ctx
                .warn(format!("could not nudge keepalive context: {e}"))
                .await;
        }

        let pattern = format!("{BASE_URL_KEY}|{DEBUG_KEY}|{LOGS_KEY}");
        let mut changes = match self.store.subscribe(&pattern).await {
            Ok(subscription) => Some(subscription),
            Err(e) => {
                self.ctx
                    .warn(format!("storage notifications unavailable: {e}"))
                    .await;
                None
            }
        };

        let mut refresh = interval(self.refresh_interval);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.ctx.info("panel boot completed").await;
        self.redraw();

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,

                _ = focus.notified() => {
                    debug!("focus requested");
                    self.redraw();
                }

                _ = refresh.tick() => self.redraw(),

                change = async {
                    match changes.as_mut() {
                        Some(subscription) => subscription.recv().await,
                        None => std::future::pending().await,
                    }
                } => match change {
                    Some(change) => {
                        self.apply_change(&change);
                        self.redraw();
                    }
                    None => changes = None,
                },
            }
        }

        self.ctx.info("panel closing").await;
        if let Err(e) = self.relay.panel_closed(self.id).await {
            debug!("coordinator not told about closed panel: {e}");
        }
    }

    fn apply_change(&mut self, change: &StorageChange) {
        match change.key.as_str() {
            BASE_URL_KEY => {
                self.ctx.set_base_url(change.as_string());
            }
            DEBUG_KEY => {
                if let Some(persisted) = self.store.debug_state() {
                    self.ctx.adopt_debug(persisted);
                    self.follow_last_state();
                }
            }
            LOGS_KEY => self.ctx.adopt_logs(self.store.logs()),
            _ => {}
        }
    }

    fn follow_last_state(&mut self) {
        let last_state = self.ctx.debug().last_state;

        match last_state {
            Some(snapshot) if self.projector.snapshot() != Some(&snapshot) => {
                self.projector.reset_now(snapshot);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::time::Duration;

    use super::*;
    use tokio::sync::mpsc::Receiver;

    use crate::{
        model::{LogRecord, PlaybackSnapshot, PlaybackStatus, RecordLevel},
        panel::tests::RecordingOutput,
        relay::RelayMessage,
    };

    fn panel(store: &BridgeStore) -> (PanelContext, Arc<RecordingOutput>, Receiver<RelayMessage>) {
        let (relay, inbox) = RelayHandle::channel();
        let output = Arc::new(RecordingOutput::default());
        let context = PanelContext::new(
            PanelId(7),
            store.clone(),
            relay,
            &BridgeConfig::default(),
            output.clone(),
        );
        (context, output, inbox)
    }

    fn last_frame(output: &RecordingOutput) -> String {
        output.frames.lock().unwrap().last().unwrap().1.clone()
    }

    #[tokio::test]
    async fn boot_logs_lifecycle_and_nudges_keepalive() {
        let store = BridgeStore::in_memory("http://localhost:5000");
        let (context, output, mut inbox) = panel(&store);
        let (shutdown, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(context.run(Arc::new(Notify::new()), shutdown_rx));

        assert!(matches!(
            inbox.recv().await.unwrap(),
            RelayMessage::EnsureKeepalive
        ));
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.send(true).unwrap();
        task.await.unwrap();

        assert!(matches!(
            inbox.recv().await.unwrap(),
            RelayMessage::PanelClosed(PanelId(7))
        ));

        let messages: Vec<_> = store.logs().records().map(|r| r.message.clone()).collect();
        assert_eq!(
            messages,
            vec!["panel boot start", "panel boot completed", "panel closing"]
        );
        assert!(!output.frames.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn store_changes_are_redrawn() {
        let store = BridgeStore::in_memory("http://localhost:5000");
        let (context, output, _inbox) = panel(&store);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(context.run(Arc::new(Notify::new()), shutdown_rx));
        tokio::time::sleep(Duration::from_millis(50)).await;

        let snapshot = PlaybackSnapshot {
            player_name: "vlc".into(),
            playback_status: PlaybackStatus::Paused,
            title: Some("Nightcall".into()),
            ..PlaybackSnapshot::default()
        };
        let mut debug = store.debug_state().unwrap();
        debug.last_state = Some(snapshot);
        store.set_debug_state(&debug).await.unwrap();
        store
            .append_log(LogRecord::now(RecordLevel::Warn, "SSE error (status 502)"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let frame = last_frame(&output);
        assert!(frame.contains("Nightcall"));
        assert!(frame.contains("SSE error (status 502)"));

        shutdown.send(true).unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn base_url_change_is_followed() {
        let store = BridgeStore::in_memory("http://localhost:5000");
        let (context, output, _inbox) = panel(&store);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(context.run(Arc::new(Notify::new()), shutdown_rx));
        tokio::time::sleep(Duration::from_millis(50)).await;

        store.set_base_url("http://192.168.1.20:5000").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(last_frame(&output).contains("http://192.168.1.20:5000"));

        shutdown.send(true).unwrap();
        task.await.unwrap();
    }
}
