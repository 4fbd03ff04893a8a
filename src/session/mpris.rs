use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, info, instrument};
use zbus::{
    Connection, connection, fdo, interface,
    object_server::{InterfaceRef, SignalEmitter},
    zvariant::{ObjectPath, OwnedValue, Value},
};

use super::{
    ActionDetails, ActionHandler, MediaAction, MediaSession, PositionState, SessionError,
    SessionMetadata, SessionProvider,
};
use crate::model::{MIN_PLAYBACK_RATE, SessionPlaybackState};

const OBJECT_PATH: &str = "/org/mpris/MediaPlayer2";
const BUS_NAME_PREFIX: &str = "org.mpris.MediaPlayer2.";
const TRACK_PATH: &str = "/org/mediabridge/track/current";
const NO_TRACK_PATH: &str = "/org/mpris/MediaPlayer2/TrackList/NoTrack";
const IDENTITY: &str = "Media Bridge";
const MAXIMUM_RATE: f64 = 4.0;

/// Position reports further than this from the projection count as a seek.
const SEEK_JUMP_US: i64 = 1_500_000;

struct PlayerState {
    metadata: Option<SessionMetadata>,
    length_us: Option<i64>,
    playback: SessionPlaybackState,
    position_us: i64,
    position_at: Instant,
    rate: Option<f64>,
    handlers: HashMap<MediaAction, ActionHandler>,
}

impl PlayerState {
    fn new() -> Self {
        Self {
            metadata: None,
            length_us: None,
            playback: SessionPlaybackState::None,
            position_us: 0,
            position_at: Instant::now(),
            rate: None,
            handlers: HashMap::new(),
        }
    }

    fn projected_position_us(&self) -> i64 {
        match (self.playback, self.rate) {
            (SessionPlaybackState::Playing, Some(rate)) => {
                let elapsed_us = self.position_at.elapsed().as_micros() as f64;
                let projected = self.position_us + (elapsed_us * rate) as i64;
                match self.length_us {
                    Some(length) => projected.min(length),
                    None => projected,
                }
            }
            _ => self.position_us,
        }
    }

    fn supports(&self, action: MediaAction) -> bool {
        self.handlers.contains_key(&action)
    }
}

type SharedState = Arc<Mutex<PlayerState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, PlayerState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

struct RootInterface;

#[interface(name = "org.mpris.MediaPlayer2")]
impl RootInterface {
    async fn raise(&self) {}

    async fn quit(&self) {}

    #[zbus(property)]
    async fn can_quit(&self) -> bool {
        false
    }

    #[zbus(property)]
    async fn can_raise(&self) -> bool {
        false
    }

    #[zbus(property)]
    async fn has_track_list(&self) -> bool {
        false
    }

    #[zbus(property)]
    async fn identity(&self) -> String {
        IDENTITY.to_string()
    }

    #[zbus(property)]
    async fn supported_uri_schemes(&self) -> Vec<String> {
        Vec::new()
    }

    #[zbus(property)]
    async fn supported_mime_types(&self) -> Vec<String> {
        Vec::new()
    }
}

struct PlayerInterface {
    state: SharedState,
}

impl PlayerInterface {
    fn dispatch(&self, details: ActionDetails) -> fdo::Result<()> {
        let handler = lock(&self.state).handlers.get(&details.action).cloned();

        match handler {
            Some(handler) => {
                handler(details);
                Ok(())
            }
            None => Err(fdo::Error::NotSupported(format!(
                "{} is not available",
                details.action
            ))),
        }
    }
}

#[interface(name = "org.mpris.MediaPlayer2.Player")]
impl PlayerInterface {
    async fn next(&self) -> fdo::Result<()> {
        self.dispatch(ActionDetails::new(MediaAction::NextTrack))
    }

    async fn previous(&self) -> fdo::Result<()> {
        self.dispatch(ActionDetails::new(MediaAction::PreviousTrack))
    }

    async fn pause(&self) -> fdo::Result<()> {
        self.dispatch(ActionDetails::new(MediaAction::Pause))
    }

    async fn play_pause(&self) -> fdo::Result<()> {
        let playing = lock(&self.state).playback == SessionPlaybackState::Playing;
        let action = if playing {
            MediaAction::Pause
        } else {
            MediaAction::Play
        };
        self.dispatch(ActionDetails::new(action))
    }

    async fn stop(&self) -> fdo::Result<()> {
        self.dispatch(ActionDetails::new(MediaAction::Stop))
    }

    async fn play(&self) -> fdo::Result<()> {
        self.dispatch(ActionDetails::new(MediaAction::Play))
    }

    async fn seek(&self, offset: i64) -> fdo::Result<()> {
        let action = if offset < 0 {
            MediaAction::SeekBackward
        } else {
            MediaAction::SeekForward
        };
        let seconds = offset.unsigned_abs() as f64 / 1_000_000.0;
        self.dispatch(ActionDetails::seek_by(action, seconds))
    }

    async fn set_position(&self, track_id: ObjectPath<'_>, position: i64) -> fdo::Result<()> {
        if position < 0 {
            return Ok(());
        }

        debug!(%track_id, position, "SetPosition requested");
        self.dispatch(ActionDetails::seek_to(position as f64 / 1_000_000.0))
    }

    async fn open_uri(&self, uri: String) -> fdo::Result<()> {
        Err(fdo::Error::NotSupported(format!("cannot open {uri}")))
    }

    #[zbus(signal)]
    async fn seeked(emitter: &SignalEmitter<'_>, position: i64) -> zbus::Result<()>;

    #[zbus(property)]
    async fn playback_status(&self) -> String {
        match lock(&self.state).playback {
            SessionPlaybackState::Playing => "Playing",
            SessionPlaybackState::Paused => "Paused",
            SessionPlaybackState::None => "Stopped",
        }
        .to_string()
    }

    #[zbus(property)]
    async fn rate(&self) -> f64 {
        lock(&self.state).rate.unwrap_or(1.0)
    }

    #[zbus(property)]
    async fn metadata(&self) -> fdo::Result<HashMap<String, OwnedValue>> {
        metadata_map(&lock(&self.state)).map_err(|e| fdo::Error::Failed(e.to_string()))
    }

    #[zbus(property)]
    async fn volume(&self) -> f64 {
        1.0
    }

    #[zbus(property(emits_changed_signal = "false"))]
    async fn position(&self) -> i64 {
        lock(&self.state).projected_position_us()
    }

    #[zbus(property)]
    async fn minimum_rate(&self) -> f64 {
        MIN_PLAYBACK_RATE
    }

    #[zbus(property)]
    async fn maximum_rate(&self) -> f64 {
        MAXIMUM_RATE
    }

    #[zbus(property)]
    async fn can_go_next(&self) -> bool {
        lock(&self.state).supports(MediaAction::NextTrack)
    }

    #[zbus(property)]
    async fn can_go_previous(&self) -> bool {
        lock(&self.state).supports(MediaAction::PreviousTrack)
    }

    #[zbus(property)]
    async fn can_play(&self) -> bool {
        lock(&self.state).supports(MediaAction::Play)
    }

    #[zbus(property)]
    async fn can_pause(&self) -> bool {
        lock(&self.state).supports(MediaAction::Pause)
    }

    #[zbus(property)]
    async fn can_seek(&self) -> bool {
        lock(&self.state).supports(MediaAction::SeekTo)
    }

    #[zbus(property)]
    async fn can_control(&self) -> bool {
        true
    }
}

fn owned(value: Value<'_>) -> Result<OwnedValue, zbus::zvariant::Error> {
    OwnedValue::try_from(value)
}

fn metadata_map(state: &PlayerState) -> Result<HashMap<String, OwnedValue>, zbus::zvariant::Error> {
    let mut map = HashMap::new();

    let track_path = if state.metadata.is_some() {
        TRACK_PATH
    } else {
        NO_TRACK_PATH
    };
    map.insert(
        "mpris:trackid".to_string(),
        owned(Value::from(ObjectPath::from_static_str_unchecked(track_path)))?,
    );

    if let Some(metadata) = state.metadata.as_ref() {
        map.insert(
            "xesam:title".to_string(),
            owned(Value::from(metadata.title.clone()))?,
        );
        map.insert(
            "xesam:artist".to_string(),
            owned(Value::from(vec![metadata.artist.clone()]))?,
        );
        if !metadata.album.is_empty() {
            map.insert(
                "xesam:album".to_string(),
                owned(Value::from(metadata.album.clone()))?,
            );
        }
        if let Some(artwork) = metadata.artwork.first() {
            map.insert(
                "mpris:artUrl".to_string(),
                owned(Value::from(artwork.src.clone()))?,
            );
        }
    }

    if let Some(length) = state.length_us {
        map.insert("mpris:length".to_string(), owned(Value::from(length))?);
    }

    Ok(map)
}

/// Media session served as an MPRIS player on the D-Bus session bus.
///
/// Desktop shells pick the player up as `org.mpris.MediaPlayer2.<suffix>` and
/// route media keys and lock-screen controls to it.
pub struct MprisSession {
    connection: Connection,
    state: SharedState,
    bus_name: String,
}

impl MprisSession {
    /// Registers the player on the session bus.
    ///
    /// # Errors
    /// Returns `SessionError::Unavailable` if there is no session bus or the
    /// name cannot be acquired.
    #[instrument]
    pub async fn connect(bus_name_suffix: &str) -> Result<Self, SessionError> {
        let bus_name = format!("{BUS_NAME_PREFIX}{bus_name_suffix}");
        let state = Arc::new(Mutex::new(PlayerState::new()));
        let unavailable = |e: zbus::Error| SessionError::Unavailable(e.to_string());

        let connection = connection::Builder::session()
            .map_err(unavailable)?
            .name(bus_name.clone())
            .map_err(unavailable)?
            .serve_at(OBJECT_PATH, RootInterface)
            .map_err(unavailable)?
            .serve_at(
                OBJECT_PATH,
                PlayerInterface {
                    state: state.clone(),
                },
            )
            .map_err(unavailable)?
            .build()
            .await
            .map_err(unavailable)?;

        info!(bus_name, "registered MPRIS player");

        Ok(Self {
            connection,
            state,
            bus_name,
        })
    }

    /// Well-known bus name owned by this session.
    pub fn bus_name(&self) -> &str {
        &self.bus_name
    }

    async fn player(&self) -> Result<InterfaceRef<PlayerInterface>, SessionError> {
        Ok(self
            .connection
            .object_server()
            .interface::<_, PlayerInterface>(OBJECT_PATH)
            .await?)
    }
}

#[async_trait]
impl MediaSession for MprisSession {
    async fn set_metadata(&self, metadata: SessionMetadata) -> Result<(), SessionError> {
        {
            let mut state = lock(&self.state);
            if state.metadata.as_ref() == Some(&metadata) {
                return Ok(());
            }
            state.metadata = Some(metadata);
        }

        let player = self.player().await?;
        player
            .get()
            .await
            .metadata_changed(player.signal_emitter())
            .await?;
        Ok(())
    }

    async fn set_playback_state(&self, playback: SessionPlaybackState) -> Result<(), SessionError> {
        {
            let mut state = lock(&self.state);
            if state.playback == playback {
                return Ok(());
            }
            state.position_us = state.projected_position_us();
            state.position_at = Instant::now();
            state.playback = playback;
        }

        let player = self.player().await?;
        player
            .get()
            .await
            .playback_status_changed(player.signal_emitter())
            .await?;
        Ok(())
    }

    async fn set_position_state(&self, position: PositionState) -> Result<(), SessionError> {
        if position.playback_rate.is_some_and(|rate| rate <= 0.0) {
            return Err(SessionError::Rejected(
                "playback rate must be positive".to_string(),
            ));
        }

        let position_us = (position.position * 1_000_000.0) as i64;
        let length_us = (position.duration * 1_000_000.0) as i64;

        let (jumped, length_changed, rate_changed) = {
            let mut state = lock(&self.state);
            let expected = state.projected_position_us();
            let jumped = (position_us - expected).abs() > SEEK_JUMP_US;
            let length_changed = state.length_us != Some(length_us);
            let rate_changed = position.playback_rate.is_some() && state.rate != position.playback_rate;

            state.position_us = position_us;
            state.position_at = Instant::now();
            state.length_us = Some(length_us);
            if position.playback_rate.is_some() {
                state.rate = position.playback_rate;
            }

            (jumped, length_changed, rate_changed)
        };

        let player = self.player().await?;
        let emitter = player.signal_emitter();

        if jumped {
            PlayerInterface::seeked(emitter, position_us).await?;
        }
        if length_changed {
            player.get().await.metadata_changed(emitter).await?;
        }
        if rate_changed {
            player.get().await.rate_changed(emitter).await?;
        }

        Ok(())
    }

    fn set_action_handler(
        &self,
        action: MediaAction,
        handler: ActionHandler,
    ) -> Result<(), SessionError> {
        lock(&self.state).handlers.insert(action, handler);
        Ok(())
    }
}

/// Opens [`MprisSession`]s under a fixed bus-name suffix.
#[derive(Debug, Clone)]
pub struct MprisProvider {
    bus_name_suffix: String,
}

impl MprisProvider {
    /// Provider registering `org.mpris.MediaPlayer2.<bus_name_suffix>`.
    pub fn new(bus_name_suffix: impl Into<String>) -> Self {
        Self {
            bus_name_suffix: bus_name_suffix.into(),
        }
    }
}

#[async_trait]
impl SessionProvider for MprisProvider {
    async fn open(&self) -> Result<Arc<dyn MediaSession>, SessionError> {
        let session = MprisSession::connect(&self.bus_name_suffix).await?;
        Ok(Arc::new(session))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::session::Artwork;

    #[test]
    fn empty_state_reports_no_track() {
        let map = metadata_map(&PlayerState::new()).unwrap();

        assert_eq!(map.len(), 1);
        assert!(map.contains_key("mpris:trackid"));
    }

    #[test]
    fn metadata_carries_track_fields() {
        let mut state = PlayerState::new();
        state.metadata = Some(SessionMetadata {
            title: "Song".into(),
            artist: "A, B".into(),
            album: String::new(),
            artwork: vec![Artwork {
                src: "http://h/art?src=x".into(),
                sizes: "512x512".into(),
                mime_type: "image/*".into(),
            }],
        });
        state.length_us = Some(60_000_000);

        let map = metadata_map(&state).unwrap();
        assert!(map.contains_key("xesam:title"));
        assert!(map.contains_key("xesam:artist"));
        assert!(!map.contains_key("xesam:album"));
        assert!(map.contains_key("mpris:artUrl"));
        assert!(map.contains_key("mpris:length"));
    }

    #[test]
    fn paused_position_does_not_advance() {
        let mut state = PlayerState::new();
        state.position_us = 5_000_000;
        state.rate = Some(1.0);
        state.playback = SessionPlaybackState::Paused;

        assert_eq!(state.projected_position_us(), 5_000_000);
    }
}
