use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;

use super::{
    ActionDetails, ActionHandler, MediaAction, MediaSession, PositionState, SessionError,
    SessionMetadata, SessionProvider,
};
use crate::model::SessionPlaybackState;

#[derive(Default)]
struct State {
    metadata: Option<SessionMetadata>,
    playback_state: Option<SessionPlaybackState>,
    positions: Vec<PositionState>,
    handlers: HashMap<MediaAction, ActionHandler>,
    unsupported: HashSet<MediaAction>,
}

/// Media session that keeps everything in process.
///
/// Records whatever the bridge pushes and lets the owner fire actions as if
/// they came from hardware keys.
#[derive(Clone, Default)]
pub struct MemorySession {
    state: Arc<Mutex<State>>,
}

impl MemorySession {
    /// Session supporting every action.
    pub fn new() -> Self {
        Self::default()
    }

    /// Session that refuses handlers for `actions`.
    pub fn without_actions(actions: impl IntoIterator<Item = MediaAction>) -> Self {
        let session = Self::new();
        session.lock().unsupported.extend(actions);
        session
    }

    /// Last metadata pushed.
    pub fn metadata(&self) -> Option<SessionMetadata> {
        self.lock().metadata.clone()
    }

    /// Last playback state pushed.
    pub fn playback_state(&self) -> Option<SessionPlaybackState> {
        self.lock().playback_state
    }

    /// Every position report, oldest first.
    pub fn positions(&self) -> Vec<PositionState> {
        self.lock().positions.clone()
    }

    /// Last position report.
    pub fn last_position(&self) -> Option<PositionState> {
        self.lock().positions.last().copied()
    }

    /// Whether a handler is installed for `action`.
    pub fn has_handler(&self, action: MediaAction) -> bool {
        self.lock().handlers.contains_key(&action)
    }

    /// Fires the handler for `details.action`. Returns false if none is installed.
    pub fn trigger(&self, details: ActionDetails) -> bool {
        let handler = self.lock().handlers.get(&details.action).cloned();

        match handler {
            Some(handler) => {
                handler(details);
                true
            }
            None => false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl MediaSession for MemorySession {
    async fn set_metadata(&self, metadata: SessionMetadata) -> Result<(), SessionError> {
        self.lock().metadata = Some(metadata);
        Ok(())
    }

    async fn set_playback_state(&self, state: SessionPlaybackState) -> Result<(), SessionError> {
        self.lock().playback_state = Some(state);
        Ok(())
    }

    async fn set_position_state(&self, position: PositionState) -> Result<(), SessionError> {
        if position.playback_rate == Some(0.0) {
            return Err(SessionError::Rejected("playback rate must not be zero".into()));
        }

        self.lock().positions.push(position);
        Ok(())
    }

    fn set_action_handler(
        &self,
        action: MediaAction,
        handler: ActionHandler,
    ) -> Result<(), SessionError> {
        let mut state = self.lock();
        if state.unsupported.contains(&action) {
            return Err(SessionError::UnsupportedAction(action));
        }

        state.handlers.insert(action, handler);
        Ok(())
    }
}

#[async_trait]
impl SessionProvider for MemorySession {
    async fn open(&self) -> Result<Arc<dyn MediaSession>, SessionError> {
        Ok(Arc::new(self.clone()))
    }
}
