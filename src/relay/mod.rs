//! Point-to-point messages from bridge contexts to the coordinator.
//!
//! Contexts without direct store access forward their log and debug writes
//! here, and any context can nudge the coordinator to (re)create the
//! keepalive context or open the panel.

mod coordinator;
mod error;

pub use coordinator::Coordinator;
pub use error::RelayError;

use tokio::sync::{mpsc, oneshot};

use crate::{
    model::{DebugPatch, LogRecord},
    panel::PanelId,
    store::StorageSnapshot,
};

const INBOX_CAPACITY: usize = 64;

/// Messages understood by the coordinator.
#[derive(Debug)]
pub enum RelayMessage {
    /// Focus the tracked panel or create a new one
    OpenPanel {
        /// Receives the id of the focused or created panel
        reply: oneshot::Sender<Result<PanelId, RelayError>>,
    },

    /// Append a record to the persisted log buffer
    AppendLog(LogRecord),

    /// Merge a partial debug state over the last known one and persist it
    UpdateDebug(DebugPatch),

    /// Read the persisted `baseUrl`, `bridgeDebug` and `bridgeLogs`
    GetStorageSnapshot {
        /// Receives the snapshot
        reply: oneshot::Sender<StorageSnapshot>,
    },

    /// Make sure the keepalive context exists
    EnsureKeepalive,

    /// The keepalive context is tearing down
    KeepaliveUnloading,

    /// A panel was closed
    PanelClosed(PanelId),

    /// Stop the coordinator after tearing down every context it owns
    Shutdown {
        /// Signalled once teardown completed
        reply: oneshot::Sender<()>,
    },
}

/// Sending side of the coordinator inbox.
///
/// Cheap to clone. Every method fails with [`RelayError::Closed`] once the
/// coordinator has stopped.
#[derive(Debug, Clone)]
pub struct RelayHandle {
    tx: mpsc::Sender<RelayMessage>,
}

impl RelayHandle {
    /// Creates a handle and the receiving end of its inbox.
    pub fn channel() -> (Self, mpsc::Receiver<RelayMessage>) {
        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
        (Self { tx }, rx)
    }

    /// Whether the coordinator has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Asks the coordinator to focus or create the panel.
    ///
    /// # Errors
    /// Returns error if the coordinator is gone or the panel host fails.
    pub async fn open_panel(&self) -> Result<PanelId, RelayError> {
        let (reply, rx) = oneshot::channel();
        self.send(RelayMessage::OpenPanel { reply }).await?;
        rx.await.map_err(|_| RelayError::NoReply)?
    }

    /// Forwards a log record for persistence.
    ///
    /// # Errors
    /// Returns error if the coordinator is gone.
    pub async fn append_log(&self, record: LogRecord) -> Result<(), RelayError> {
        self.send(RelayMessage::AppendLog(record)).await
    }

    /// Forwards a partial debug state for persistence.
    ///
    /// # Errors
    /// Returns error if the coordinator is gone.
    pub async fn update_debug(&self, patch: DebugPatch) -> Result<(), RelayError> {
        self.send(RelayMessage::UpdateDebug(patch)).await
    }

    /// Reads the persisted keys through the coordinator.
    ///
    /// # Errors
    /// Returns error if the coordinator is gone or does not answer.
    pub async fn storage_snapshot(&self) -> Result<StorageSnapshot, RelayError> {
        let (reply, rx) = oneshot::channel();
        self.send(RelayMessage::GetStorageSnapshot { reply }).await?;
        rx.await.map_err(|_| RelayError::NoReply)
    }

    /// Nudges the coordinator to ensure the keepalive context.
    ///
    /// # Errors
    /// Returns error if the coordinator is gone.
    pub async fn ensure_keepalive(&self) -> Result<(), RelayError> {
        self.send(RelayMessage::EnsureKeepalive).await
    }

    /// Tells the coordinator the keepalive context is going away.
    ///
    /// # Errors
    /// Returns error if the coordinator is gone.
    pub async fn keepalive_unloading(&self) -> Result<(), RelayError> {
        self.send(RelayMessage::KeepaliveUnloading).await
    }

    /// Tells the coordinator a panel was closed.
    ///
    /// # Errors
    /// Returns error if the coordinator is gone.
    pub async fn panel_closed(&self, id: PanelId) -> Result<(), RelayError> {
        self.send(RelayMessage::PanelClosed(id)).await
    }

    /// Stops the coordinator and waits for its teardown.
    ///
    /// # Errors
    /// Returns error if the coordinator is already gone.
    pub async fn shutdown(&self) -> Result<(), RelayError> {
        let (reply, rx) = oneshot::channel();
        self.send(RelayMessage::Shutdown { reply }).await?;
        rx.await.map_err(|_| RelayError::NoReply)
    }

    async fn send(&self, message: RelayMessage) -> Result<(), RelayError> {
        self.tx.send(message).await.map_err(|_| RelayError::Closed)
    }
}
