//! Native media-control surface.
//!
//! [`MediaSession`] is the seam between the bridge and whatever the OS uses to
//! show lock-screen controls and route hardware media keys. The production
//! implementation is [`mpris::MprisSession`]; [`memory::MemorySession`] keeps
//! everything in process.

/// Snapshot-to-session translation and action dispatch.
pub mod adapter;
/// In-process session.
pub mod memory;
/// MPRIS session on the D-Bus session bus.
pub mod mpris;

pub use adapter::ControlSurfaceAdapter;

use std::{fmt, sync::Arc};

use async_trait::async_trait;

use crate::model::SessionPlaybackState;

/// Transport actions a native surface can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaAction {
    /// Start playback
    Play,
    /// Pause playback
    Pause,
    /// Previous track
    PreviousTrack,
    /// Next track
    NextTrack,
    /// Stop playback
    Stop,
    /// Skip backward by an offset
    SeekBackward,
    /// Skip forward by an offset
    SeekForward,
    /// Jump to an absolute time
    SeekTo,
}

impl MediaAction {
    /// Every action, in registration order.
    pub const ALL: [MediaAction; 8] = [
        MediaAction::Play,
        MediaAction::Pause,
        MediaAction::PreviousTrack,
        MediaAction::NextTrack,
        MediaAction::Stop,
        MediaAction::SeekBackward,
        MediaAction::SeekForward,
        MediaAction::SeekTo,
    ];

    /// Action name as used by web media sessions.
    pub fn as_str(self) -> &'static str {
        match self {
            MediaAction::Play => "play",
            MediaAction::Pause => "pause",
            MediaAction::PreviousTrack => "previoustrack",
            MediaAction::NextTrack => "nexttrack",
            MediaAction::Stop => "stop",
            MediaAction::SeekBackward => "seekbackward",
            MediaAction::SeekForward => "seekforward",
            MediaAction::SeekTo => "seekto",
        }
    }
}

impl fmt::Display for MediaAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One action request coming from the native surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionDetails {
    /// Requested action.
    pub action: MediaAction,
    /// Seek offset in seconds, for relative seeks.
    pub seek_offset: Option<f64>,
    /// Target time in seconds, for absolute seeks.
    pub seek_time: Option<f64>,
}

impl ActionDetails {
    /// Details carrying only the action.
    pub fn new(action: MediaAction) -> Self {
        Self {
            action,
            seek_offset: None,
            seek_time: None,
        }
    }

    /// Relative seek by `seconds`.
    pub fn seek_by(action: MediaAction, seconds: f64) -> Self {
        Self {
            seek_offset: Some(seconds),
            ..Self::new(action)
        }
    }

    /// Absolute seek to `seconds`.
    pub fn seek_to(seconds: f64) -> Self {
        Self {
            seek_time: Some(seconds),
            ..Self::new(MediaAction::SeekTo)
        }
    }
}

/// One artwork entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artwork {
    /// Image URL.
    pub src: String,
    /// Size hint.
    pub sizes: String,
    /// MIME hint.
    pub mime_type: String,
}

/// Metadata shown by the native surface.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionMetadata {
    /// Track title.
    pub title: String,
    /// Artist display string.
    pub artist: String,
    /// Album name, possibly empty.
    pub album: String,
    /// Artwork candidates.
    pub artwork: Vec<Artwork>,
}

/// Position reported to the native surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionState {
    /// Track length in seconds, always positive.
    pub duration: f64,
    /// Position in seconds, within `0..=duration`.
    pub position: f64,
    /// Playback rate, only present while playing.
    pub playback_rate: Option<f64>,
}

/// Callback invoked when the native surface requests an action.
pub type ActionHandler = Arc<dyn Fn(ActionDetails) + Send + Sync>;

/// Errors raised by a native media session.
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    /// The platform offers no usable media session
    #[error("media session unavailable: {0}")]
    Unavailable(String),

    /// The session does not support this action
    #[error("action handler not supported: {0}")]
    UnsupportedAction(MediaAction),

    /// The session rejected a state update
    #[error("media session rejected update: {0}")]
    Rejected(String),

    /// D-Bus failure
    #[error("D-Bus error: {0}")]
    Dbus(#[from] zbus::Error),
}

/// Opens a media session when a context boots.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Opens a new session.
    ///
    /// # Errors
    /// Returns `SessionError::Unavailable` if the platform has no usable surface.
    async fn open(&self) -> Result<Arc<dyn MediaSession>, SessionError>;
}

/// A native media-control surface.
#[async_trait]
pub trait MediaSession: Send + Sync {
    /// Replaces the displayed metadata.
    ///
    /// # Errors
    /// Returns error if the surface rejects the update.
    async fn set_metadata(&self, metadata: SessionMetadata) -> Result<(), SessionError>;

    /// Replaces the playback state.
    ///
    /// # Errors
    /// Returns error if the surface rejects the update.
    async fn set_playback_state(&self, state: SessionPlaybackState) -> Result<(), SessionError>;

    /// Reports the current position.
    ///
    /// # Errors
    /// Returns error if the surface rejects the update.
    async fn set_position_state(&self, position: PositionState) -> Result<(), SessionError>;

    /// Installs the handler for one action.
    ///
    /// # Errors
    /// Returns `SessionError::UnsupportedAction` if the surface cannot offer it.
    fn set_action_handler(
        &self,
        action: MediaAction,
        handler: ActionHandler,
    ) -> Result<(), SessionError>;
}
