use std::fmt;

use serde::{Deserialize, Serialize};

use super::PlaybackSnapshot;

/// Health of a context's event-stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionHealth {
    /// Not connected and not trying
    #[default]
    Idle,
    /// A connection attempt is in progress
    Connecting,
    /// The stream is open
    Connected,
    /// The last attempt failed; a reconnect is scheduled
    Error,
}

impl fmt::Display for ConnectionHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionHealth::Idle => "idle",
            ConnectionHealth::Connecting => "connecting",
            ConnectionHealth::Connected => "connected",
            ConnectionHealth::Error => "error",
        };
        write!(f, "{label}")
    }
}

/// Debug view of a bridge context, mirrored through the store.
///
/// Merged across contexts by whole-field overwrite; the last persisted write wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugState {
    /// Backend base URL the context talks to.
    pub base_url: String,

    /// Event-stream health.
    pub health: ConnectionHealth,

    /// Last error message, cleared on success.
    pub last_error: Option<String>,

    /// Wall-clock time of the last received server event (ms since epoch).
    pub last_event_at: Option<i64>,

    /// Wall-clock time of the last local mutation (ms since epoch).
    pub last_update_at: Option<i64>,

    /// Last snapshot received from the backend.
    pub last_state: Option<PlaybackSnapshot>,
}

impl DebugState {
    /// Fresh state for a context that talks to `base_url`.
    pub fn default_for(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            health: ConnectionHealth::Idle,
            last_error: None,
            last_event_at: None,
            last_update_at: None,
            last_state: None,
        }
    }

    /// Overwrites every field the patch carries.
    pub fn merge(&mut self, patch: DebugPatch) {
        if let Some(base_url) = patch.base_url {
            self.base_url = base_url;
        }
        if let Some(health) = patch.health {
            self.health = health;
        }
        if let Some(last_error) = patch.last_error {
            self.last_error = last_error;
        }
        if let Some(last_event_at) = patch.last_event_at {
            self.last_event_at = last_event_at;
        }
        if let Some(last_update_at) = patch.last_update_at {
            self.last_update_at = last_update_at;
        }
        if let Some(last_state) = patch.last_state {
            self.last_state = last_state;
        }
    }

    /// Returns a copy with `patch` merged in.
    pub fn merged(mut self, patch: DebugPatch) -> Self {
        self.merge(patch);
        self
    }
}

impl Default for DebugState {
    fn default() -> Self {
        Self::default_for(crate::config::DEFAULT_BASE_URL)
    }
}

/// A partial [`DebugState`].
///
/// `None` leaves a field untouched; `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DebugPatch {
    /// New base URL
    pub base_url: Option<String>,
    /// New health
    pub health: Option<ConnectionHealth>,
    /// New last error
    pub last_error: Option<Option<String>>,
    /// New last event time
    pub last_event_at: Option<Option<i64>>,
    /// New last update time
    pub last_update_at: Option<Option<i64>>,
    /// New last snapshot
    pub last_state: Option<Option<PlaybackSnapshot>>,
}

impl From<DebugState> for DebugPatch {
    fn from(state: DebugState) -> Self {
        Self {
            base_url: Some(state.base_url),
            health: Some(state.health),
            last_error: Some(state.last_error),
            last_event_at: Some(state.last_event_at),
            last_update_at: Some(state.last_update_at),
            last_state: Some(state.last_state),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn merge_overwrites_only_present_fields() {
        let mut state = DebugState::default_for("http://a");
        state.last_error = Some("boom".to_string());

        state.merge(DebugPatch {
            health: Some(ConnectionHealth::Connecting),
            ..Default::default()
        });

        assert_eq!(state.health, ConnectionHealth::Connecting);
        assert_eq!(state.base_url, "http://a");
        assert_eq!(state.last_error.as_deref(), Some("boom"));
    }

    #[test]
    fn merge_can_clear_nullable_fields() {
        let mut state = DebugState::default_for("http://a");
        state.last_error = Some("boom".to_string());

        state.merge(DebugPatch {
            last_error: Some(None),
            ..Default::default()
        });

        assert_eq!(state.last_error, None);
    }

    #[test]
    fn full_patch_replaces_everything() {
        let mut newer = DebugState::default_for("http://b");
        newer.health = ConnectionHealth::Connected;
        newer.last_event_at = Some(5);

        let merged = DebugState::default_for("http://a").merged(newer.clone().into());
        assert_eq!(merged, newer);
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let json = serde_json::to_value(DebugState::default_for("http://a")).unwrap();
        assert_eq!(json["baseUrl"], "http://a");
        assert_eq!(json["health"], "idle");
        assert!(json["lastState"].is_null());
    }
}
