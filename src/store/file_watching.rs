use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{BridgeStore, StoreError, file_watcher::StoreFileWatcher};

const DEBOUNCE: Duration = Duration::from_millis(200);

impl BridgeStore {
    /// Starts monitoring the store file for changes made by other processes.
    ///
    /// Bursts of file events are debounced; after the burst settles the file
    /// is reloaded and every key that differs from memory is broadcast as a
    /// [`ChangeSource::FileEdit`](super::ChangeSource::FileEdit) change. Writes
    /// made through this handle reload to identical contents and broadcast nothing.
    ///
    /// Returns `None` for in-memory stores.
    ///
    /// # Errors
    /// Returns error if file watching cannot be initialized.
    pub fn start_file_watching(&self) -> Result<Option<JoinHandle<()>>, StoreError> {
        let Some(path) = self.path() else {
            return Ok(None);
        };

        let (watcher, mut event_rx) = StoreFileWatcher::new(path)?;
        let store = self.clone();

        let handle = tokio::spawn(async move {
            let _watcher = watcher;
            let mut pending = false;

            let debounce_sleep = tokio::time::sleep(DEBOUNCE);
            tokio::pin!(debounce_sleep);

            loop {
                tokio::select! {
                    event = event_rx.recv() => {
                        if event.is_none() {
                            debug!("store file watcher closed");
                            break;
                        }

                        pending = true;
                        debounce_sleep.as_mut().reset(tokio::time::Instant::now() + DEBOUNCE);
                    }

                    _ = &mut debounce_sleep, if pending => {
                        pending = false;

                        if let Err(e) = store.reload_from_file().await {
                            warn!("Failed to reload bridge store: {e}");
                        }
                    }
                }
            }
        });

        Ok(Some(handle))
    }
}
