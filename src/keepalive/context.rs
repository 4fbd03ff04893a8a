use std::sync::Arc;

use tokio::{
    sync::{mpsc, watch},
    time::{MissedTickBehavior, interval},
};
use tracing::{debug, instrument};

use super::audio::{AudioSink, KeepaliveAudio, ToneBuffer};
use crate::{
    config::BridgeConfig,
    context::{BridgeContext, Persistence},
    model::ConnectionHealth,
    relay::RelayHandle,
    session::{ControlSurfaceAdapter, SessionProvider},
    store::{BASE_URL_KEY, BridgeStore, StorageChange, Subscription},
    stream::{EventStreamClient, StreamEvent},
};

/// Everything a keepalive context needs besides its relay.
#[derive(Clone)]
pub struct KeepaliveOptions {
    /// Bridge configuration.
    pub config: Arc<BridgeConfig>,
    /// Opens the native media session; `None` disables it.
    pub sessions: Option<Arc<dyn SessionProvider>>,
    /// Output for the keepalive tone.
    pub audio_sink: Arc<dyn AudioSink>,
    /// Store whose change notifications the context follows. The context never
    /// writes to it; writes go through the relay.
    pub notifications: Option<BridgeStore>,
}

/// The headless context that keeps media keys routed to the bridge.
///
/// Holds the keepalive audio loop, the native session and the event stream.
/// Persists only through the coordinator relay.
pub struct KeepaliveContext {
    ctx: BridgeContext,
    relay: RelayHandle,
    options: KeepaliveOptions,
}

impl KeepaliveContext {
    /// Creates the context; nothing runs until [`run`](Self::run).
    pub fn new(relay: RelayHandle, options: KeepaliveOptions) -> Self {
        let ctx = BridgeContext::new(
            "keepalive",
            Persistence::Relay(relay.clone()),
            &options.config,
        );

        Self {
            ctx,
            relay,
            options,
        }
    }

    /// The context's bridge state.
    pub fn context(&self) -> &BridgeContext {
        &self.ctx
    }

    /// Boots and runs until `shutdown` flips or its sender is dropped.
    ///
    /// Boot never fails: missing audio or media-session support is logged and
    /// the context continues without it.
    #[instrument(skip_all, name = "keepalive")]
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let ctx = self.ctx.clone();
        let config = self.options.config.clone();

        ctx.info("keepalive context boot start").await;
        ctx.load().await;

        let audio = match KeepaliveAudio::start(
            self.options.audio_sink.clone(),
            ToneBuffer::from_config(&config.keepalive),
        ) {
            Ok(audio) => {
                ctx.info(format!(
                    "keepalive audio started ({} Hz tone)",
                    config.keepalive.tone_frequency_hz
                ))
                .await;
                Some(audio)
            }
            Err(e) => {
                ctx.warn(format!("{e}; keepalive audio cannot start")).await;
                None
            }
        };

        let session = match self.options.sessions.as_ref() {
            Some(provider) => match provider.open().await {
                Ok(session) => Some(session),
                Err(e) => {
                    ctx.warn(format!("{e}; native controls disabled")).await;
                    None
                }
            },
            None => {
                ctx.info("native media session disabled by configuration")
                    .await;
                None
            }
        };

        let mut adapter = ControlSurfaceAdapter::new(ctx.clone(), session);
        let (action_tx, mut action_rx) = mpsc::unbounded_channel();
        adapter.register_actions(action_tx).await;

        let mut base_url_changes = match self.options.notifications.as_ref() {
            Some(store) => match store.subscribe(BASE_URL_KEY).await {
                Ok(subscription) => Some(subscription),
                Err(e) => {
                    ctx.warn(format!("storage notifications unavailable: {e}"))
                        .await;
                    None
                }
            },
            None => None,
        };

        let (mut stream, mut stream_events) =
            EventStreamClient::new(ctx.http().clone(), config.stream.reconnect_delay());
        stream.connect(&ctx.base_url());

        let mut position_sync = interval(config.panel.refresh_interval());
        position_sync.set_missed_tick_behavior(MissedTickBehavior::Delay);

        ctx.info("keepalive context boot completed").await;

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,

                Some(event) = stream_events.recv() => {
                    handle_stream_event(&ctx, &mut adapter, audio.as_ref(), event).await;
                }

                Some(details) = action_rx.recv() => {
                    debug!(action = %details.action, "native action");
                    adapter.handle_action(details).await;
                }

                _ = position_sync.tick() => adapter.sync_position().await,

                change = next_change(&mut base_url_changes) => match change {
                    Some(change) => on_base_url_change(&ctx, &mut stream, &change).await,
                    None => base_url_changes = None,
                },
            }
        }

        ctx.info("keepalive context unloading").await;
        stream.close();
        drop(audio);

        if let Err(e) = self.relay.keepalive_unloading().await {
            debug!("coordinator not told about unload: {e}");
        }
    }
}

async fn handle_stream_event(
    ctx: &BridgeContext,
    adapter: &mut ControlSurfaceAdapter,
    audio: Option<&KeepaliveAudio>,
    event: StreamEvent,
) {
    match event {
        StreamEvent::Connecting { url } => {
            ctx.set_health(ConnectionHealth::Connecting, None).await;
            ctx.info(format!("connecting to SSE: {url}")).await;
        }
        StreamEvent::Connected => {
            ctx.set_health(ConnectionHealth::Connected, None).await;
            ctx.info("SSE connected").await;
        }
        StreamEvent::Snapshot(snapshot) => {
            adapter.apply_snapshot(*snapshot).await;

            if audio.is_some_and(KeepaliveAudio::resume) {
                ctx.info("keepalive audio resumed").await;
            }
        }
        StreamEvent::Malformed { details } => {
            ctx.warn(format!("ignored malformed state event: {details}"))
                .await;
        }
        StreamEvent::Failed(error) => {
            let detail = error.to_string();
            ctx.set_health(ConnectionHealth::Error, Some(detail.clone()))
                .await;
            ctx.warn(detail).await;
        }
    }
}

async fn on_base_url_change(
    ctx: &BridgeContext,
    stream: &mut EventStreamClient,
    change: &StorageChange,
) {
    if !ctx.set_base_url(change.as_string()) {
        return;
    }

    ctx.set_health(ConnectionHealth::Idle, None).await;
    ctx.info(format!("baseUrl updated: {}", ctx.base_url())).await;
    stream.connect(&ctx.base_url());
}

async fn next_change(subscription: &mut Option<Subscription>) -> Option<StorageChange> {
    match subscription.as_mut() {
        Some(subscription) => subscription.recv().await,
        None => std::future::pending().await,
    }
}
