//! Data model shared by every bridge context.

mod debug;
mod log;

pub use debug::{ConnectionHealth, DebugPatch, DebugState};
pub use log::{LOG_LIMIT, LogBuffer, LogRecord, RecordLevel};

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Lowest playback rate ever used for projection or position reporting.
pub const MIN_PLAYBACK_RATE: f64 = 0.1;

/// One discrete playback-state update pushed by the backend.
///
/// Every field defaults when absent so snapshots from older backends still parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaybackSnapshot {
    /// Display name of the player the snapshot describes.
    pub player_name: String,

    /// Current playback status.
    pub playback_status: PlaybackStatus,

    /// Track title.
    pub title: Option<String>,

    /// Track artists, in display order.
    #[serde(rename = "artist")]
    pub artists: Vec<String>,

    /// Album name.
    pub album: Option<String>,

    /// Artwork reference as reported by the player.
    pub art_url: Option<String>,

    /// Track length in microseconds, if known.
    pub duration_us: Option<u64>,

    /// Position in microseconds at the time the snapshot was taken.
    pub position_us: u64,

    /// Playback rate reported by the player.
    pub playback_rate: f64,

    /// Player can skip to the next track.
    pub can_go_next: bool,

    /// Player can go to the previous track.
    pub can_go_previous: bool,

    /// Player can start playback.
    pub can_play: bool,

    /// Player can pause playback.
    pub can_pause: bool,

    /// Player can seek within the track.
    pub can_seek: bool,

    /// How the backend picks the player it follows.
    pub selection_mode: PlayerSelectionMode,

    /// Bus name of the player the backend currently follows.
    pub active_player_bus_name: Option<String>,

    /// Bus name pinned by a manual selection.
    pub selected_player_bus_name: Option<String>,

    /// Every player the backend can see.
    pub available_players: Vec<PlayerDescriptor>,

    /// Backend timestamp of the snapshot, in milliseconds.
    pub updated_at_ms: u64,
}

impl Default for PlaybackSnapshot {
    fn default() -> Self {
        Self {
            player_name: "none".to_string(),
            playback_status: PlaybackStatus::None,
            title: None,
            artists: Vec::new(),
            album: None,
            art_url: None,
            duration_us: None,
            position_us: 0,
            playback_rate: 1.0,
            can_go_next: false,
            can_go_previous: false,
            can_play: false,
            can_pause: false,
            can_seek: false,
            selection_mode: PlayerSelectionMode::Auto,
            active_player_bus_name: None,
            selected_player_bus_name: None,
            available_players: Vec::new(),
            updated_at_ms: 0,
        }
    }
}

impl PlaybackSnapshot {
    /// Playback rate clamped to [`MIN_PLAYBACK_RATE`].
    ///
    /// Zero, negative and non-finite rates all collapse to the floor.
    pub fn effective_rate(&self) -> f64 {
        clamp_rate(self.playback_rate)
    }

    /// Track length, only when known and non-zero.
    pub fn known_duration_us(&self) -> Option<u64> {
        self.duration_us.filter(|duration| *duration > 0)
    }

    /// Position capped at the known duration.
    pub fn clamped_position_us(&self) -> u64 {
        match self.known_duration_us() {
            Some(duration) => self.position_us.min(duration),
            None => self.position_us,
        }
    }

    /// Artists joined for display, falling back to the player name.
    pub fn artist_display(&self) -> String {
        if self.artists.is_empty() {
            self.player_name.clone()
        } else {
            self.artists.join(", ")
        }
    }

    /// Capability flags as a bit set.
    pub fn capabilities(&self) -> PlayerCapabilities {
        let mut caps = PlayerCapabilities::empty();
        caps.set(PlayerCapabilities::GO_NEXT, self.can_go_next);
        caps.set(PlayerCapabilities::GO_PREVIOUS, self.can_go_previous);
        caps.set(PlayerCapabilities::PLAY, self.can_play);
        caps.set(PlayerCapabilities::PAUSE, self.can_pause);
        caps.set(PlayerCapabilities::SEEK, self.can_seek);
        caps
    }

    /// Whether the snapshot reports active playback.
    pub fn is_playing(&self) -> bool {
        self.playback_status == PlaybackStatus::Playing
    }
}

/// Clamps a playback rate to [`MIN_PLAYBACK_RATE`].
pub fn clamp_rate(rate: f64) -> f64 {
    if rate.is_finite() {
        rate.max(MIN_PLAYBACK_RATE)
    } else {
        MIN_PLAYBACK_RATE
    }
}

/// Playback status as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    /// Player is currently playing
    Playing,

    /// Player is paused
    Paused,

    /// Player is stopped
    Stopped,

    /// No player, or status unknown
    #[default]
    None,
}

impl PlaybackStatus {
    /// Maps the backend status onto the native session's three states.
    pub fn session_state(self) -> SessionPlaybackState {
        match self {
            PlaybackStatus::Playing => SessionPlaybackState::Playing,
            PlaybackStatus::Paused => SessionPlaybackState::Paused,
            PlaybackStatus::Stopped | PlaybackStatus::None => SessionPlaybackState::None,
        }
    }
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PlaybackStatus::Playing => "playing",
            PlaybackStatus::Paused => "paused",
            PlaybackStatus::Stopped => "stopped",
            PlaybackStatus::None => "none",
        };
        write!(f, "{label}")
    }
}

/// Playback state understood by the native media session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPlaybackState {
    /// Actively playing
    Playing,
    /// Paused
    Paused,
    /// Nothing to report
    None,
}

/// How the backend chooses which player to follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum PlayerSelectionMode {
    /// Backend follows whichever player is most relevant
    #[default]
    Auto,
    /// Backend sticks to the selected player
    Manual,
}

/// A player visible to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerDescriptor {
    /// D-Bus bus name of the player.
    pub bus_name: String,

    /// Display name of the player.
    pub player_name: String,
}

/// Body of a player-selection request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSelection {
    /// Selection mode.
    pub mode: PlayerSelectionMode,

    /// Pinned bus name, `None` in auto mode.
    pub selected_player_bus_name: Option<String>,
}

impl PlayerSelection {
    /// Let the backend choose.
    pub fn auto() -> Self {
        Self {
            mode: PlayerSelectionMode::Auto,
            selected_player_bus_name: None,
        }
    }

    /// Pin a specific player.
    pub fn manual(bus_name: impl Into<String>) -> Self {
        Self {
            mode: PlayerSelectionMode::Manual,
            selected_player_bus_name: Some(bus_name.into()),
        }
    }
}

bitflags! {
    /// Transport capabilities advertised by the followed player.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PlayerCapabilities: u8 {
        /// Can skip forward
        const GO_NEXT = 1;
        /// Can skip backward
        const GO_PREVIOUS = 1 << 1;
        /// Can start playback
        const PLAY = 1 << 2;
        /// Can pause playback
        const PAUSE = 1 << 3;
        /// Can seek
        const SEEK = 1 << 4;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_backend_snapshot() {
        let json = r#"{
            "playerName": "Spotify",
            "playbackStatus": "playing",
            "title": "Song",
            "artist": ["A", "B"],
            "album": null,
            "artUrl": "file:///music/art.jpg",
            "durationUs": 180000000,
            "positionUs": 1000,
            "playbackRate": 1.0,
            "canGoNext": true,
            "canGoPrevious": false,
            "canPlay": true,
            "canPause": true,
            "canSeek": true,
            "activePlayerBusName": "org.mpris.MediaPlayer2.spotify",
            "selectionMode": "manual",
            "selectedPlayerBusName": "org.mpris.MediaPlayer2.spotify",
            "availablePlayers": [
                {"busName": "org.mpris.MediaPlayer2.spotify", "playerName": "Spotify"}
            ],
            "updatedAtMs": 1700000000000
        }"#;

        let snapshot: PlaybackSnapshot = serde_json::from_str(json).unwrap();

        assert_eq!(snapshot.playback_status, PlaybackStatus::Playing);
        assert_eq!(snapshot.artists, vec!["A", "B"]);
        assert_eq!(snapshot.selection_mode, PlayerSelectionMode::Manual);
        assert_eq!(snapshot.available_players.len(), 1);
        assert_eq!(
            snapshot.capabilities(),
            PlayerCapabilities::GO_NEXT
                | PlayerCapabilities::PLAY
                | PlayerCapabilities::PAUSE
                | PlayerCapabilities::SEEK
        );
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let snapshot: PlaybackSnapshot =
            serde_json::from_str(r#"{"playerName":"vlc","playbackStatus":"paused"}"#).unwrap();

        assert_eq!(snapshot.player_name, "vlc");
        assert_eq!(snapshot.playback_rate, 1.0);
        assert!(snapshot.available_players.is_empty());
        assert_eq!(snapshot.selection_mode, PlayerSelectionMode::Auto);
    }

    #[test]
    fn rate_never_drops_below_floor() {
        for rate in [0.0, -1.0, 0.05, f64::NAN, f64::NEG_INFINITY] {
            let snapshot = PlaybackSnapshot {
                playback_rate: rate,
                ..Default::default()
            };
            assert_eq!(snapshot.effective_rate(), MIN_PLAYBACK_RATE);
        }

        assert_eq!(clamp_rate(2.0), 2.0);
    }

    #[test]
    fn position_is_capped_by_known_duration() {
        let snapshot = PlaybackSnapshot {
            duration_us: Some(10),
            position_us: 25,
            ..Default::default()
        };
        assert_eq!(snapshot.clamped_position_us(), 10);

        let unknown = PlaybackSnapshot {
            duration_us: Some(0),
            position_us: 25,
            ..Default::default()
        };
        assert_eq!(unknown.clamped_position_us(), 25);
    }

    #[test]
    fn status_maps_to_session_state() {
        assert_eq!(
            PlaybackStatus::Playing.session_state(),
            SessionPlaybackState::Playing
        );
        assert_eq!(
            PlaybackStatus::Paused.session_state(),
            SessionPlaybackState::Paused
        );
        assert_eq!(
            PlaybackStatus::Stopped.session_state(),
            SessionPlaybackState::None
        );
        assert_eq!(PlaybackStatus::None.session_state(), SessionPlaybackState::None);
    }

    #[test]
    fn artist_display_falls_back_to_player_name() {
        let snapshot = PlaybackSnapshot {
            player_name: "mpv".to_string(),
            ..Default::default()
        };
        assert_eq!(snapshot.artist_display(), "mpv");
    }

    #[test]
    fn selection_serializes_camel_case() {
        let json = serde_json::to_value(PlayerSelection::manual("org.mpris.MediaPlayer2.vlc")).unwrap();
        assert_eq!(json["mode"], "manual");
        assert_eq!(json["selectedPlayerBusName"], "org.mpris.MediaPlayer2.vlc");

        let json = serde_json::to_value(PlayerSelection::auto()).unwrap();
        assert_eq!(json["mode"], "auto");
        assert!(json["selectedPlayerBusName"].is_null());
    }
}
