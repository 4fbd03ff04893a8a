//! Per-context bridge state.
//!
//! Each context (keepalive, panel) owns one [`BridgeContext`] holding its
//! current base URL, its cached [`DebugState`] and its local log ring. Writes
//! reach the store either directly or through the coordinator relay.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use chrono::Utc;
use reqwest::Client;
use tracing::{debug, error, info, warn};

use crate::{
    backend::{BackendClient, BackendError},
    config::BridgeConfig,
    model::{
        ConnectionHealth, DebugPatch, DebugState, LogBuffer, LogRecord, PlaybackSnapshot,
        RecordLevel,
    },
    property::Property,
    relay::RelayHandle,
    store::{BridgeStore, StorageSnapshot},
};

/// How a context reaches the persisted store.
#[derive(Clone)]
pub enum Persistence {
    /// The context reads and writes the store itself
    Direct(BridgeStore),
    /// Every write is forwarded to the coordinator
    Relay(RelayHandle),
}

struct Inner {
    name: &'static str,
    http: Client,
    request_timeout: Duration,
    default_base_url: String,
    base_url: Property<String>,
    debug: Property<DebugState>,
    logs: Mutex<LogBuffer>,
    persistence: Persistence,
}

/// State owned by one bridge context.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct BridgeContext {
    inner: Arc<Inner>,
}

impl BridgeContext {
    /// Creates a context with runtime defaults. Call [`load`](Self::load) to
    /// pick up persisted state.
    pub fn new(name: &'static str, persistence: Persistence, config: &BridgeConfig) -> Self {
        let default_base_url = config.backend.default_base_url.clone();

        Self {
            inner: Arc::new(Inner {
                name,
                http: Client::new(),
                request_timeout: config.backend.request_timeout(),
                base_url: Property::new(default_base_url.clone()),
                debug: Property::new(DebugState::default_for(default_base_url.clone())),
                default_base_url,
                logs: Mutex::new(LogBuffer::default()),
                persistence,
            }),
        }
    }

    /// Context name used in log messages.
    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// Shared HTTP connection pool.
    pub fn http(&self) -> &Client {
        &self.inner.http
    }

    /// Current backend base URL.
    pub fn base_url(&self) -> String {
        self.inner.base_url.get()
    }

    /// Watchable base URL.
    pub fn base_url_property(&self) -> &Property<String> {
        &self.inner.base_url
    }

    /// Cached debug state.
    pub fn debug(&self) -> DebugState {
        self.inner.debug.get()
    }

    /// Watchable debug state.
    pub fn debug_property(&self) -> &Property<DebugState> {
        &self.inner.debug
    }

    /// Copy of the local log ring.
    pub fn logs(&self) -> LogBuffer {
        self.inner
            .logs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Persistence route of this context.
    pub fn persistence(&self) -> &Persistence {
        &self.inner.persistence
    }

    /// Backend client bound to the current base URL.
    ///
    /// # Errors
    /// Returns error if the current base URL is not a valid http(s) URL.
    pub fn backend(&self) -> Result<BackendClient, BackendError> {
        BackendClient::with_http(
            self.inner.http.clone(),
            &self.base_url(),
            self.inner.request_timeout,
        )
    }

    /// Records a bridge log entry.
    ///
    /// The record lands in the local ring, goes to the persisted buffer (directly
    /// or through the relay) and is mirrored to `tracing`. Persistence failures
    /// are logged and swallowed.
    pub async fn log(&self, level: RecordLevel, message: impl Into<String>) {
        let record = LogRecord::now(level, message);
        let name = self.inner.name;

        match level {
            RecordLevel::Info => info!(context = name, "[bridge] {}", record.message),
            RecordLevel::Warn => warn!(context = name, "[bridge] {}", record.message),
            RecordLevel::Error => error!(context = name, "[bridge] {}", record.message),
        }

        self.inner
            .logs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());

        match &self.inner.persistence {
            Persistence::Direct(store) => {
                if let Err(e) = store.append_log(record).await {
                    warn!(context = name, "failed to persist bridge log: {e}");
                }
            }
            Persistence::Relay(relay) => {
                if let Err(e) = relay.append_log(record).await {
                    debug!(context = name, "bridge log not relayed: {e}");
                }
            }
        }
    }

    /// Shorthand for an info record.
    pub async fn info(&self, message: impl Into<String>) {
        self.log(RecordLevel::Info, message).await;
    }

    /// Shorthand for a warn record.
    pub async fn warn(&self, message: impl Into<String>) {
        self.log(RecordLevel::Warn, message).await;
    }

    /// Shorthand for an error record.
    pub async fn error(&self, message: impl Into<String>) {
        self.log(RecordLevel::Error, message).await;
    }

    /// Records a health transition and persists the debug state.
    pub async fn set_health(&self, health: ConnectionHealth, error: Option<String>) {
        let base_url = self.base_url();
        let state = self.inner.debug.update(|debug| {
            debug.base_url = base_url;
            debug.health = health;
            debug.last_error = error;
            debug.last_update_at = Some(now_ms());
        });

        self.save_debug(state).await;
    }

    /// Records a freshly received snapshot and persists the debug state.
    pub async fn apply_snapshot(&self, snapshot: &PlaybackSnapshot) {
        let base_url = self.base_url();
        let now = now_ms();
        let state = self.inner.debug.update(|debug| {
            debug.base_url = base_url;
            debug.health = ConnectionHealth::Connected;
            debug.last_error = None;
            debug.last_event_at = Some(now);
            debug.last_update_at = Some(now);
            debug.last_state = Some(snapshot.clone());
        });

        self.save_debug(state).await;
    }

    /// Switches to another base URL. `None` restores the default.
    ///
    /// Returns whether the URL actually changed.
    pub fn set_base_url(&self, url: Option<String>) -> bool {
        let next = url
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| self.inner.default_base_url.clone());

        let changed = self.base_url() != next;
        self.inner.base_url.set(next);
        changed
    }

    /// Replaces the cached debug state with a persisted one.
    ///
    /// The persisted object is merged over the cache and its base URL is forced
    /// to the context's current one. Nothing is written back.
    pub fn adopt_debug(&self, persisted: DebugState) {
        let base_url = self.base_url();
        self.inner.debug.update(|debug| {
            debug.merge(DebugPatch::from(persisted));
            debug.base_url = base_url;
        });
    }

    /// Replaces the local log ring with a persisted buffer.
    pub fn adopt_logs(&self, logs: LogBuffer) {
        let mut local = self
            .inner
            .logs
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *local = LogBuffer::default();
        local.extend_from(logs.records().cloned());
    }

    /// Loads persisted base URL, logs and debug state into the context.
    ///
    /// Direct contexts read the store; relay contexts ask the coordinator and
    /// fall back to runtime defaults when it does not answer.
    pub async fn load(&self) {
        match &self.inner.persistence {
            Persistence::Direct(store) => {
                self.adopt_snapshot(store.snapshot());
                self.save_debug(self.debug()).await;
            }
            Persistence::Relay(relay) => match relay.storage_snapshot().await {
                Ok(snapshot) => {
                    self.adopt_snapshot(snapshot);
                    self.save_debug(self.debug()).await;
                    self.info("loaded debug snapshot via background relay").await;
                }
                Err(e) => {
                    self.warn(format!(
                        "storage unavailable in {} ({e}); using runtime defaults",
                        self.inner.name
                    ))
                    .await;
                }
            },
        }
    }

    fn adopt_snapshot(&self, snapshot: StorageSnapshot) {
        self.set_base_url(snapshot.base_url);

        if let Some(logs) = snapshot.bridge_logs {
            self.adopt_logs(logs);
        }

        match snapshot.bridge_debug {
            Some(persisted) => self.adopt_debug(persisted),
            None => {
                let base_url = self.base_url();
                self.inner.debug.update(|debug| debug.base_url = base_url);
            }
        }
    }

    async fn save_debug(&self, state: DebugState) {
        let name = self.inner.name;

        match &self.inner.persistence {
            Persistence::Direct(store) => {
                if let Err(e) = store.set_debug_state(&state).await {
                    warn!(context = name, "failed to persist debug state: {e}");
                }
            }
            Persistence::Relay(relay) => {
                if let Err(e) = relay.update_debug(DebugPatch::from(state)).await {
                    debug!(context = name, "debug state not relayed: {e}");
                }
            }
        }
    }
}

/// Current wall-clock time in milliseconds since the epoch.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
