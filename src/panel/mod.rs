//! The user-facing panel surface.
//!
//! A panel renders the bridge state to a terminal: connection health, the
//! current track with a projected progress bar, the players the backend sees
//! and the most recent log records. The coordinator keeps at most one open
//! through a [`PanelHost`].

mod context;
pub mod render;

pub use context::PanelContext;

use std::{
    collections::HashMap,
    fmt,
    io::Write,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use async_trait::async_trait;
use tokio::{
    sync::{Mutex, Notify, watch},
    task::JoinHandle,
};
use tracing::debug;

use crate::{config::BridgeConfig, relay::RelayHandle, store::BridgeStore};

/// Identifier of an open panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PanelId(pub u64);

impl fmt::Display for PanelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Errors raised by panel hosts.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PanelError {
    /// The panel no longer exists
    #[error("panel {0} is closed")]
    Closed(PanelId),

    /// The host could not open a panel
    #[error("failed to open panel: {0}")]
    CreateFailed(String),
}

/// Opens, focuses and closes panels.
#[async_trait]
pub trait PanelHost: Send + Sync {
    /// Opens a new panel that reports back through `relay`.
    ///
    /// # Errors
    /// Returns `PanelError::CreateFailed` if the panel cannot be opened.
    async fn create(&self, relay: RelayHandle) -> Result<PanelId, PanelError>;

    /// Brings panel `id` to the front.
    ///
    /// # Errors
    /// Returns `PanelError::Closed` if the panel is gone.
    async fn focus(&self, id: PanelId) -> Result<(), PanelError>;

    /// Closes every open panel and waits for them to finish.
    async fn close_all(&self);
}

/// Where rendered panel frames go.
pub trait PanelOutput: Send + Sync {
    /// Replaces whatever panel `id` showed with `frame`.
    fn present(&self, id: PanelId, frame: &str);
}

/// Redraws the whole terminal for every frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalOutput;

impl PanelOutput for TerminalOutput {
    fn present(&self, _id: PanelId, frame: &str) {
        let mut stdout = std::io::stdout().lock();
        let _ = write!(stdout, "\x1b[2J\x1b[H{frame}");
        let _ = stdout.flush();
    }
}

struct OpenPanel {
    focus: Arc<Notify>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Runs each panel as a tokio task.
pub struct TaskPanelHost {
    store: BridgeStore,
    config: Arc<BridgeConfig>,
    output: Arc<dyn PanelOutput>,
    next_id: AtomicU64,
    panels: Mutex<HashMap<PanelId, OpenPanel>>,
}

impl TaskPanelHost {
    /// Host whose panels read `store` directly and draw to `output`.
    pub fn new(store: BridgeStore, config: Arc<BridgeConfig>, output: Arc<dyn PanelOutput>) -> Self {
        Self {
            store,
            config,
            output,
            next_id: AtomicU64::new(1),
            panels: Mutex::new(HashMap::new()),
        }
    }

    /// Closes panel `id` as if the user dismissed it.
    pub async fn close(&self, id: PanelId) {
        let panel = self.panels.lock().await.remove(&id);
        if let Some(panel) = panel {
            stop(panel).await;
        }
    }

    /// Ids of the panels still running.
    pub async fn open_panels(&self) -> Vec<PanelId> {
        let panels = self.panels.lock().await;
        let mut ids: Vec<_> = panels
            .iter()
            .filter(|(_, panel)| !panel.task.is_finished())
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl PanelHost for TaskPanelHost {
    async fn create(&self, relay: RelayHandle) -> Result<PanelId, PanelError> {
        let id = PanelId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let focus = Arc::new(Notify::new());
        let (shutdown, shutdown_rx) = watch::channel(false);

        let context = PanelContext::new(
            id,
            self.store.clone(),
            relay,
            &self.config,
            self.output.clone(),
        );
        let task = tokio::spawn(context.run(focus.clone(), shutdown_rx));

        let mut panels = self.panels.lock().await;
        panels.retain(|_, panel| !panel.task.is_finished());
        panels.insert(
            id,
            OpenPanel {
                focus,
                shutdown,
                task,
            },
        );

        debug!(%id, "panel opened");
        Ok(id)
    }

    async fn focus(&self, id: PanelId) -> Result<(), PanelError> {
        let panels = self.panels.lock().await;
        match panels.get(&id) {
            Some(panel) if !panel.task.is_finished() => {
                panel.focus.notify_one();
                Ok(())
            }
            _ => Err(PanelError::Closed(id)),
        }
    }

    async fn close_all(&self) {
        let panels: Vec<_> = self.panels.lock().await.drain().map(|(_, p)| p).collect();
        for panel in panels {
            stop(panel).await;
        }
    }
}

async fn stop(panel: OpenPanel) {
    let _ = panel.shutdown.send(true);
    let _ = panel.task.await;
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::sync::Mutex as StdMutex;

    use super::*;

    /// Collects frames instead of drawing them.
    #[derive(Default)]
    pub(crate) struct RecordingOutput {
        pub(crate) frames: StdMutex<Vec<(PanelId, String)>>,
    }

    impl PanelOutput for RecordingOutput {
        fn present(&self, id: PanelId, frame: &str) {
            self.frames.lock().unwrap().push((id, frame.to_string()));
        }
    }

    fn host() -> (TaskPanelHost, Arc<RecordingOutput>) {
        let output = Arc::new(RecordingOutput::default());
        let host = TaskPanelHost::new(
            BridgeStore::in_memory("http://localhost:5000"),
            Arc::new(BridgeConfig::default()),
            output.clone(),
        );
        (host, output)
    }

    #[tokio::test]
    async fn panels_get_fresh_ids_and_can_be_focused() {
        let (host, _output) = host();
        let (relay, _inbox) = RelayHandle::channel();

        let first = host.create(relay.clone()).await.unwrap();
        let second = host.create(relay).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(host.focus(first).await, Ok(()));
        assert_eq!(host.open_panels().await, vec![first, second]);
    }

    #[tokio::test]
    async fn focusing_a_closed_panel_fails() {
        let (host, _output) = host();
        let (relay, _inbox) = RelayHandle::channel();

        let id = host.create(relay).await.unwrap();
        host.close(id).await;

        assert_eq!(host.focus(id).await, Err(PanelError::Closed(id)));
        assert!(host.open_panels().await.is_empty());
    }

    #[tokio::test]
    async fn close_all_stops_every_panel() {
        let (host, _output) = host();
        let (relay, _inbox) = RelayHandle::channel();

        host.create(relay.clone()).await.unwrap();
        host.create(relay).await.unwrap();
        host.close_all().await;

        assert!(host.open_panels().await.is_empty());
    }
}
