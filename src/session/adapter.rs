use std::{future::Future, sync::Arc};

use tokio::{sync::mpsc, task::JoinHandle, time::Instant};

use super::{
    ActionDetails, ActionHandler, Artwork, MediaAction, MediaSession, PositionState,
    SessionMetadata,
};
use crate::{
    backend::{BackendError, ControlCommand, artwork_src},
    context::BridgeContext,
    model::{ConnectionHealth, PlaybackSnapshot, PlaybackStatus},
    projector::PlaybackProjector,
};

/// Title shown when the player reports none.
pub const DEFAULT_TITLE: &str = "Crostini Linux";

/// Seek step used when a relative seek carries no offset, in seconds.
pub const DEFAULT_SEEK_OFFSET_SECS: f64 = 10.0;

const ARTWORK_SIZES: &str = "512x512";
const ARTWORK_TYPE: &str = "image/*";

/// Bridges backend state and the native media surface.
///
/// Pushes metadata, playback state and position into the session on every
/// snapshot, and turns native actions into backend control calls.
pub struct ControlSurfaceAdapter {
    ctx: BridgeContext,
    session: Option<Arc<dyn MediaSession>>,
    projector: PlaybackProjector,
}

impl ControlSurfaceAdapter {
    /// Creates an adapter. Without a session only the projector and the
    /// control calls are active.
    pub fn new(ctx: BridgeContext, session: Option<Arc<dyn MediaSession>>) -> Self {
        Self {
            ctx,
            session,
            projector: PlaybackProjector::new(),
        }
    }

    /// Position projector fed by this adapter.
    pub fn projector(&self) -> &PlaybackProjector {
        &self.projector
    }

    /// Installs a handler for every action that forwards requests to `sink`.
    ///
    /// Each action is registered independently; unsupported ones are logged and
    /// skipped. Returns how many handlers were installed.
    pub async fn register_actions(&self, sink: mpsc::UnboundedSender<ActionDetails>) -> usize {
        let Some(session) = self.session.as_ref() else {
            return 0;
        };

        let mut registered = 0;
        for action in MediaAction::ALL {
            let sink = sink.clone();
            let handler: ActionHandler = Arc::new(move |details| {
                let _ = sink.send(details);
            });

            match session.set_action_handler(action, handler) {
                Ok(()) => registered += 1,
                Err(e) => {
                    self.ctx
                        .warn(format!("action handler not supported: {action} ({e})"))
                        .await;
                }
            }
        }

        registered
    }

    /// Applies a fresh snapshot to the projector, the session and the context.
    pub async fn apply_snapshot(&mut self, snapshot: PlaybackSnapshot) {
        self.projector.reset_now(snapshot.clone());

        if let Some(session) = self.session.as_ref() {
            let metadata = session_metadata(&snapshot, &self.ctx.base_url());
            if let Err(e) = session.set_metadata(metadata).await {
                self.ctx.warn(format!("setMetadata failed: {e}")).await;
            }

            self.emit_position(&snapshot).await;

            let state = snapshot.playback_status.session_state();
            if let Err(e) = session.set_playback_state(state).await {
                self.ctx.warn(format!("setPlaybackState failed: {e}")).await;
            }
        }

        self.ctx.apply_snapshot(&snapshot).await;
    }

    /// Reports the projected position to the session.
    pub async fn sync_position(&self) {
        if let Some(projected) = self.projector.projected_at(Instant::now()) {
            self.emit_position(&projected).await;
        }
    }

    /// Translates a native action into a backend call.
    ///
    /// The call runs in the background; on failure the context health turns to
    /// error and the failure is logged, with no rollback of local state.
    /// Returns the request task, or `None` when nothing was sent.
    pub async fn handle_action(&mut self, details: ActionDetails) -> Option<JoinHandle<()>> {
        match details.action {
            MediaAction::Play | MediaAction::Pause => {
                let requested = if details.action == MediaAction::Play {
                    ControlCommand::Play
                } else {
                    ControlCommand::Pause
                };
                let status = self
                    .ctx
                    .debug()
                    .last_state
                    .map(|state| state.playback_status);
                self.send_control(resolve_play_pause(requested, status)).await
            }
            MediaAction::PreviousTrack => self.send_control(ControlCommand::Previous).await,
            MediaAction::NextTrack => self.send_control(ControlCommand::Next).await,
            MediaAction::Stop => self.send_control(ControlCommand::Stop).await,
            MediaAction::SeekBackward | MediaAction::SeekForward => {
                let seconds = details
                    .seek_offset
                    .filter(|offset| offset.is_finite())
                    .unwrap_or(DEFAULT_SEEK_OFFSET_SECS);
                let sign = if details.action == MediaAction::SeekBackward {
                    -1.0
                } else {
                    1.0
                };
                let offset_us = (sign * seconds * 1_000_000.0).floor() as i64;
                let label = details.action.as_str();

                let ctx = self.ctx.clone();
                self.dispatch(label, label.to_string(), move |backend| async move {
                    backend.seek_by(offset_us).await?;
                    ctx.info(format!("sent control seekBy: {offset_us}us")).await;
                    Ok(())
                })
                .await
            }
            MediaAction::SeekTo => {
                let seek_time = details.seek_time.filter(|time| time.is_finite())?;
                let target_us = (seek_time * 1_000_000.0).floor() as i64;

                if self.projector.snapshot().is_some() {
                    self.projector
                        .seek(target_us.max(0).unsigned_abs(), Instant::now());
                    self.sync_position().await;
                }

                let ctx = self.ctx.clone();
                self.dispatch("seekto", "seekto".to_string(), move |backend| async move {
                    backend.seek_to(target_us).await?;
                    ctx.info(format!("sent control seekTo: {target_us}us")).await;
                    Ok(())
                })
                .await
            }
        }
    }

    async fn send_control(&self, command: ControlCommand) -> Option<JoinHandle<()>> {
        let ctx = self.ctx.clone();
        self.dispatch(
            "control",
            format!("control action failed ({command})"),
            move |backend| async move {
                backend.control(command).await?;
                ctx.info(format!("sent control action: {command}")).await;
                Ok(())
            },
        )
        .await
    }

    async fn dispatch<F, Fut>(
        &self,
        health_label: &'static str,
        log_label: String,
        request: F,
    ) -> Option<JoinHandle<()>>
    where
        F: FnOnce(crate::backend::BackendClient) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BackendError>> + Send + 'static,
    {
        let ctx = self.ctx.clone();
        let backend = match ctx.backend() {
            Ok(backend) => backend,
            Err(e) => {
                report_failure(&ctx, health_label, &log_label, &e).await;
                return None;
            }
        };

        Some(tokio::spawn(async move {
            if let Err(e) = request(backend).await {
                report_failure(&ctx, health_label, &log_label, &e).await;
            }
        }))
    }

    async fn emit_position(&self, snapshot: &PlaybackSnapshot) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let Some(position) = position_state(snapshot) else {
            return;
        };

        if let Err(e) = session.set_position_state(position).await {
            self.ctx.warn(format!("setPositionState failed: {e}")).await;
        }
    }
}

async fn report_failure(
    ctx: &BridgeContext,
    health_label: &str,
    log_label: &str,
    error: &BackendError,
) {
    ctx.set_health(
        ConnectionHealth::Error,
        Some(format!("{health_label} failed: {error}")),
    )
    .await;
    ctx.error(format!("{log_label}: {error}")).await;
}

/// Picks the command a play or pause action should send.
///
/// A single hardware key may fire either action; the command toggles
/// against the last known status so the key always does the opposite of
/// what is happening now.
pub fn resolve_play_pause(
    requested: ControlCommand,
    status: Option<PlaybackStatus>,
) -> ControlCommand {
    match (requested, status) {
        (ControlCommand::Pause, Some(PlaybackStatus::Paused)) => ControlCommand::Play,
        (ControlCommand::Play, Some(PlaybackStatus::Playing)) => ControlCommand::Pause,
        (command, _) => command,
    }
}

/// Metadata for the native surface.
pub fn session_metadata(snapshot: &PlaybackSnapshot, base_url: &str) -> SessionMetadata {
    SessionMetadata {
        title: snapshot
            .title
            .clone()
            .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        artist: snapshot.artist_display(),
        album: snapshot.album.clone().unwrap_or_default(),
        artwork: snapshot
            .art_url
            .as_deref()
            .map(|reference| Artwork {
                src: artwork_src(base_url, reference),
                sizes: ARTWORK_SIZES.to_string(),
                mime_type: ARTWORK_TYPE.to_string(),
            })
            .into_iter()
            .collect(),
    }
}

/// Position report for a snapshot, if its duration is known.
///
/// The rate is only present while playing and never drops below the floor.
pub fn position_state(snapshot: &PlaybackSnapshot) -> Option<PositionState> {
    let duration_us = snapshot.known_duration_us()?;
    let duration = duration_us as f64 / 1_000_000.0;
    let position = (snapshot.clamped_position_us() as f64 / 1_000_000.0).min(duration);

    Some(PositionState {
        duration,
        position,
        playback_rate: snapshot
            .is_playing()
            .then(|| snapshot.effective_rate()),
    })
}
