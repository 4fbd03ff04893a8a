//! Wiring for the long-running bridge process.
//!
//! [`Daemon::start`] spawns the coordinator, which in turn creates the
//! keepalive context and, unless headless, the panel.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use crate::{
    Result,
    config::{BridgeConfig, ConfigPaths},
    keepalive::{KeepaliveOptions, TaskKeepaliveHost, audio::SilentSink},
    panel::{PanelOutput, TaskPanelHost, TerminalOutput},
    relay::{Coordinator, RelayHandle},
    session::{SessionProvider, mpris::MprisProvider},
    store::BridgeStore,
};

/// Options of `mediabridge run`.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Never open the panel.
    pub headless: bool,
    /// Base URL to store before starting.
    pub base_url: Option<String>,
}

/// A running coordinator and everything it owns.
pub struct Daemon {
    relay: RelayHandle,
    coordinator: JoinHandle<()>,
    file_watcher: Option<JoinHandle<()>>,
}

impl Daemon {
    /// Starts the bridge against `store`.
    ///
    /// MPRIS is used when enabled in `config`; panels draw to `output`.
    ///
    /// # Errors
    /// Returns error if the base URL override cannot be stored.
    #[instrument(skip_all)]
    pub async fn start(
        config: BridgeConfig,
        store: BridgeStore,
        options: RunOptions,
        output: Arc<dyn PanelOutput>,
    ) -> Result<Self> {
        let config = Arc::new(config);

        if let Some(url) = options.base_url.as_deref() {
            store.set_base_url(url).await?;
            info!(base_url = %store.base_url(), "base URL overridden");
        }

        let file_watcher = match store.start_file_watching() {
            Ok(watcher) => watcher,
            Err(e) => {
                warn!("store file watching unavailable: {e}");
                None
            }
        };

        let sessions: Option<Arc<dyn SessionProvider>> = if config.session.enable_mpris {
            Some(Arc::new(MprisProvider::new(
                config.session.bus_name_suffix.clone(),
            )))
        } else {
            None
        };

        let keepalive = Arc::new(TaskKeepaliveHost::new(KeepaliveOptions {
            config: config.clone(),
            sessions,
            audio_sink: Arc::new(SilentSink),
            notifications: Some(store.clone()),
        }));
        let panels = Arc::new(TaskPanelHost::new(store.clone(), config.clone(), output));

        let (relay, coordinator) =
            Coordinator::new(store, keepalive, panels, &config.keepalive).spawn();

        if !options.headless && config.panel.open_on_start {
            if let Err(e) = relay.open_panel().await {
                warn!("could not open panel: {e}");
            }
        }

        info!("bridge started");
        Ok(Self {
            relay,
            coordinator,
            file_watcher,
        })
    }

    /// Handle to the coordinator.
    pub fn relay(&self) -> &RelayHandle {
        &self.relay
    }

    /// Tears every context down and waits for the coordinator to stop.
    ///
    /// # Errors
    /// Returns error if the coordinator already stopped.
    pub async fn shutdown(self) -> Result<()> {
        self.relay.shutdown().await?;
        let _ = self.coordinator.await;

        if let Some(watcher) = self.file_watcher {
            watcher.abort();
        }

        info!("bridge stopped");
        Ok(())
    }
}

/// Runs the bridge until Ctrl-C.
///
/// # Errors
/// Returns error if the store cannot be opened or shutdown fails.
pub async fn run(config: BridgeConfig, options: RunOptions) -> Result<()> {
    let store_path = ConfigPaths::store_file()?;
    let store = BridgeStore::open(&store_path, &config.backend.default_base_url).await?;

    let daemon = Daemon::start(config, store, options, Arc::new(TerminalOutput)).await?;

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");

    daemon.shutdown().await
}
