use std::{
    path::{Path, PathBuf},
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::{
    ChangeSource, StorageChange, StoreError, Subscription, broadcast::BroadcastService, diff,
};
use crate::model::{DebugState, LogBuffer, LogRecord};

/// Store key holding the backend base URL.
pub const BASE_URL_KEY: &str = "baseUrl";
/// Store key holding the mirrored [`DebugState`].
pub const DEBUG_KEY: &str = "bridgeDebug";
/// Store key holding the bounded log ring buffer.
pub const LOGS_KEY: &str = "bridgeLogs";

type StoreData = Map<String, Value>;

/// The persisted key/value store every bridge context synchronizes through.
///
/// Values live in memory behind a lock and are written back to a JSON file
/// after every mutation. Writers are serialized within a process. Before each
/// mutation the file is re-read and merged key by key, so a write from another
/// process (the CLI setting `baseUrl` while the daemon appends logs) survives
/// the next local write instead of being overwritten by a stale map.
#[derive(Clone)]
pub struct BridgeStore {
    data: Arc<RwLock<StoreData>>,
    path: Option<PathBuf>,
    default_base_url: Arc<str>,
    write_lock: Arc<Mutex<()>>,
    broadcast: BroadcastService,
}

/// Everything a context needs to boot, read in one go.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageSnapshot {
    /// Persisted base URL, if one was ever set.
    pub base_url: Option<String>,
    /// Persisted debug state.
    pub bridge_debug: Option<DebugState>,
    /// Persisted log records.
    pub bridge_logs: Option<LogBuffer>,
}

impl BridgeStore {
    /// Creates a store that only lives in memory.
    pub fn in_memory(default_base_url: &str) -> Self {
        Self::with_data(StoreData::new(), None, default_base_url)
    }

    /// Opens the store backed by `path`, creating it lazily on first write.
    ///
    /// An unreadable or corrupt file is logged and replaced by an empty store.
    ///
    /// # Errors
    /// Returns `StoreError::IoError` if the file exists but cannot be read.
    #[instrument(skip(default_base_url))]
    pub async fn open(path: &Path, default_base_url: &str) -> Result<Self, StoreError> {
        let data = match read_store_file(path).await {
            Ok(Some(data)) => {
                info!("Loaded bridge store from {}", path.display());
                data
            }
            Ok(None) => {
                info!("No bridge store at {}, starting empty", path.display());
                StoreData::new()
            }
            Err(StoreError::ParseError { details, .. }) => {
                warn!("Invalid bridge store file, using defaults: {details}");
                StoreData::new()
            }
            Err(e) => return Err(e),
        };

        Ok(Self::with_data(data, Some(path.to_path_buf()), default_base_url))
    }

    fn with_data(data: StoreData, path: Option<PathBuf>, default_base_url: &str) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
            path,
            default_base_url: Arc::from(default_base_url),
            write_lock: Arc::new(Mutex::new(())),
            broadcast: BroadcastService::new(),
        }
    }

    /// Path of the backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Base URL used when none is stored.
    pub fn default_base_url(&self) -> &str {
        &self.default_base_url
    }

    /// Raw value stored under `key`.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.read_data().get(key).cloned()
    }

    /// Writes several keys at once and notifies subscribers.
    ///
    /// Unchanged values produce no notification.
    ///
    /// # Errors
    /// Returns `StoreError::PersistenceError` if the file cannot be written;
    /// the in-memory value is updated and subscribers are notified regardless.
    pub async fn set(
        &self,
        entries: impl IntoIterator<Item = (String, Value)> + Send,
    ) -> Result<(), StoreError> {
        let entries: Vec<(String, Value)> = entries.into_iter().collect();
        self.apply(move |data| {
            for (key, value) in entries {
                data.insert(key, value);
            }
        })
        .await
    }

    /// Removes a key.
    ///
    /// # Errors
    /// Returns `StoreError::PersistenceError` if the file cannot be written.
    pub async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let key = key.to_string();
        self.apply(move |data| {
            data.remove(&key);
        })
        .await
    }

    /// Stored base URL, or the configured default.
    pub fn base_url(&self) -> String {
        match self.get(BASE_URL_KEY) {
            Some(Value::String(url)) if !url.trim().is_empty() => url,
            _ => self.default_base_url.to_string(),
        }
    }

    /// Stores a new base URL; a blank value restores the default.
    ///
    /// # Errors
    /// Returns `StoreError::PersistenceError` if the file cannot be written.
    pub async fn set_base_url(&self, url: &str) -> Result<(), StoreError> {
        let url = url.trim();
        let url = if url.is_empty() {
            self.default_base_url.to_string()
        } else {
            url.trim_end_matches('/').to_string()
        };

        self.set([(BASE_URL_KEY.to_string(), Value::String(url))])
            .await
    }

    /// Persisted debug state, if present and well formed.
    pub fn debug_state(&self) -> Option<DebugState> {
        let value = self.get(DEBUG_KEY)?;
        serde_json::from_value(value)
            .map_err(|e| debug!("Ignoring malformed {DEBUG_KEY}: {e}"))
            .ok()
    }

    /// Overwrites the persisted debug state.
    ///
    /// # Errors
    /// Returns `StoreError::SerializationError` or `StoreError::PersistenceError`.
    pub async fn set_debug_state(&self, state: &DebugState) -> Result<(), StoreError> {
        let value = to_value("debug state", state)?;
        self.set([(DEBUG_KEY.to_string(), value)]).await
    }

    /// Persisted log records; malformed entries yield an empty buffer.
    pub fn logs(&self) -> LogBuffer {
        self.get(LOGS_KEY)
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default()
    }

    /// Appends records to the persisted ring buffer.
    ///
    /// The read-append-truncate-write cycle runs under the store's write lock,
    /// so concurrent appends inside one process are never lost.
    ///
    /// # Errors
    /// Returns `StoreError::PersistenceError` if the file cannot be written.
    pub async fn append_logs(
        &self,
        records: impl IntoIterator<Item = LogRecord> + Send,
    ) -> Result<(), StoreError> {
        let records: Vec<LogRecord> = records.into_iter().collect();
        self.apply(move |data| {
            let mut buffer: LogBuffer = data
                .get(LOGS_KEY)
                .cloned()
                .and_then(|value| serde_json::from_value(value).ok())
                .unwrap_or_default();
            buffer.extend_from(records);

            match serde_json::to_value(&buffer) {
                Ok(value) => {
                    data.insert(LOGS_KEY.to_string(), value);
                }
                Err(e) => warn!("Failed to serialize log buffer: {e}"),
            }
        })
        .await
    }

    /// Appends a single record to the persisted ring buffer.
    ///
    /// # Errors
    /// Returns `StoreError::PersistenceError` if the file cannot be written.
    pub async fn append_log(&self, record: LogRecord) -> Result<(), StoreError> {
        self.append_logs([record]).await
    }

    /// Reads base URL, debug state and logs together.
    pub fn snapshot(&self) -> StorageSnapshot {
        let data = self.read_data();

        StorageSnapshot {
            base_url: data
                .get(BASE_URL_KEY)
                .and_then(Value::as_str)
                .map(str::to_string),
            bridge_debug: data
                .get(DEBUG_KEY)
                .cloned()
                .and_then(|value| serde_json::from_value(value).ok()),
            bridge_logs: data
                .get(LOGS_KEY)
                .cloned()
                .and_then(|value| serde_json::from_value(value).ok()),
        }
    }

    /// Subscribes to changes on keys matching `pattern`.
    ///
    /// Patterns are exact keys, `prefix*` wildcards, or `|`-separated alternatives.
    ///
    /// # Errors
    /// Returns `StoreError::ServiceUnavailable` if the broadcast actor stopped.
    pub async fn subscribe(&self, pattern: &str) -> Result<Subscription, StoreError> {
        self.broadcast.subscribe(pattern).await
    }

    /// Re-reads the backing file and broadcasts whatever differs from memory.
    ///
    /// Only keys whose value differs are touched in memory.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed.
    pub async fn reload_from_file(&self) -> Result<Vec<StorageChange>, StoreError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(Vec::new());
        };

        let _guard = self.write_lock.lock().await;
        let Some(fresh) = read_store_file(path).await? else {
            return Ok(Vec::new());
        };

        let changes = {
            let mut data = self.write_data();
            merge_file_contents(&mut data, fresh)
        };

        if !changes.is_empty() {
            debug!(count = changes.len(), "store file changed externally");
            self.broadcast.broadcast(changes.clone()).await?;
        }

        Ok(changes)
    }

    async fn apply<F>(&self, mutate: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut StoreData) + Send,
    {
        let _guard = self.write_lock.lock().await;
        let on_disk = self.read_for_merge().await;

        let (external, changes, contents) = {
            let mut data = self.write_data();
            let external = on_disk
                .map(|fresh| merge_file_contents(&mut data, fresh))
                .unwrap_or_default();

            let before = data.clone();
            mutate(&mut data);
            (
                external,
                diff::diff_maps(&before, &data, ChangeSource::Local),
                data.clone(),
            )
        };

        if !external.is_empty() {
            debug!(count = external.len(), "merged external store edits before write");
            if let Err(e) = self.broadcast.broadcast(external).await {
                warn!("Failed to broadcast storage change: {e}");
            }
        }

        if changes.is_empty() {
            return Ok(());
        }

        let persisted = self.persist(&contents).await;

        if let Err(e) = self.broadcast.broadcast(changes).await {
            warn!("Failed to broadcast storage change: {e}");
        }

        persisted
    }

    /// Current file contents for a pre-write merge; unreadable files fall back
    /// to memory.
    async fn read_for_merge(&self) -> Option<StoreData> {
        let path = self.path.as_deref()?;

        match read_store_file(path).await {
            Ok(contents) => contents,
            Err(e) => {
                warn!("Writing over unreadable bridge store file: {e}");
                None
            }
        }
    }

    async fn persist(&self, contents: &StoreData) -> Result<(), StoreError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };

        let persistence_error = |details: String| StoreError::PersistenceError {
            path: path.to_path_buf(),
            details,
        };

        let serialized = serde_json::to_string_pretty(contents)
            .map_err(|e| persistence_error(e.to_string()))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| persistence_error(e.to_string()))?;
        }

        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, serialized)
            .await
            .map_err(|e| persistence_error(e.to_string()))?;
        tokio::fs::rename(&staging, path)
            .await
            .map_err(|e| persistence_error(e.to_string()))
    }

    fn read_data(&self) -> RwLockReadGuard<'_, StoreData> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_data(&self) -> RwLockWriteGuard<'_, StoreData> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Applies every key that differs in `fresh` to `data`, leaving equal keys untouched.
fn merge_file_contents(data: &mut StoreData, fresh: StoreData) -> Vec<StorageChange> {
    let changes = diff::diff_maps(data, &fresh, ChangeSource::FileEdit);

    for change in &changes {
        match &change.new_value {
            Some(value) => {
                data.insert(change.key.clone(), value.clone());
            }
            None => {
                data.remove(&change.key);
            }
        }
    }

    changes
}

async fn read_store_file(path: &Path) -> Result<Option<StoreData>, StoreError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(StoreError::IoError {
                path: path.to_path_buf(),
                details: e.to_string(),
            });
        }
    };

    if content.trim().is_empty() {
        return Ok(Some(StoreData::new()));
    }

    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| StoreError::ParseError {
            path: path.to_path_buf(),
            details: e.to_string(),
        })
}

fn to_value<T: Serialize>(content_type: &str, value: &T) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(|e| StoreError::SerializationError {
        content_type: content_type.to_string(),
        details: e.to_string(),
    })
}
