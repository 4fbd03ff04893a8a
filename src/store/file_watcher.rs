use std::path::{Path, PathBuf};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher, recommended_watcher};
use tokio::sync::mpsc;

use super::StoreError;

/// Watches the store file for writes made by other processes.
///
/// The parent directory is watched rather than the file itself because the
/// store is replaced atomically on every write, which would orphan a watch
/// placed on the old inode.
pub(super) struct StoreFileWatcher {
    _watcher: RecommendedWatcher,
}

impl StoreFileWatcher {
    /// Starts watching `path` and returns the watcher plus a receiver that
    /// yields one unit per relevant file-system event.
    ///
    /// # Errors
    /// Returns `StoreError::FileWatcherInitError` if the watcher cannot be created
    /// or the parent directory cannot be watched.
    pub(super) fn new(path: &Path) -> Result<(Self, mpsc::UnboundedReceiver<()>), StoreError> {
        let init_error = |details: String| StoreError::FileWatcherInitError { details };

        let parent = path
            .parent()
            .ok_or_else(|| init_error(format!("{} has no parent directory", path.display())))?
            .to_path_buf();
        std::fs::create_dir_all(&parent).map_err(|e| init_error(e.to_string()))?;

        let file_name = path.file_name().map(|name| name.to_os_string());
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let mut watcher = recommended_watcher(move |res: notify::Result<Event>| {
            let Ok(event) = res else {
                return;
            };

            if !matches!(
                event.kind,
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
            ) {
                return;
            }

            let touches_store = event
                .paths
                .iter()
                .any(|changed: &PathBuf| changed.file_name().map(|n| n.to_os_string()) == file_name);

            if touches_store {
                let _ = event_tx.send(());
            }
        })
        .map_err(|e| init_error(e.to_string()))?;

        watcher
            .watch(&parent, RecursiveMode::NonRecursive)
            .map_err(|e| init_error(e.to_string()))?;

        Ok((Self { _watcher: watcher }, event_rx))
    }
}
