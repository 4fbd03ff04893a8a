//! Keepalive audio loop.
//!
//! A short sine tone is synthesized in memory and played in a loop that
//! restarts the moment playback ends. Output goes through an [`AudioSink`];
//! the bridge never plays real media.

use std::{
    f32::consts::TAU,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::{sync::Notify, task::JoinHandle};
use tracing::warn;

use super::KeepaliveError;
use crate::config::KeepaliveConfig;

const SAMPLE_RATE: u32 = 8_000;
const BUFFER_LENGTH: Duration = Duration::from_secs(1);

/// A mono PCM buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct ToneBuffer {
    samples: Arc<[f32]>,
    sample_rate: u32,
}

impl ToneBuffer {
    /// Synthesizes `length` of a sine tone at `frequency_hz` scaled by `gain`.
    pub fn sine(frequency_hz: f32, gain: f32, sample_rate: u32, length: Duration) -> Self {
        let count = (length.as_secs_f64() * f64::from(sample_rate)).round() as usize;
        let step = TAU * frequency_hz / sample_rate as f32;

        let samples: Arc<[f32]> = (0..count)
            .map(|i| (step * i as f32).sin() * gain)
            .collect();

        Self {
            samples,
            sample_rate,
        }
    }

    /// Buffer described by the keepalive settings.
    pub fn from_config(config: &KeepaliveConfig) -> Self {
        Self::sine(
            config.tone_frequency_hz,
            config.tone_gain,
            SAMPLE_RATE,
            BUFFER_LENGTH,
        )
    }

    /// PCM samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Samples per second.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Playback length.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / f64::from(self.sample_rate))
    }

    /// Largest absolute sample value.
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0, |peak, s| peak.max(s.abs()))
    }
}

/// Destination for keepalive audio.
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Checks that the sink can play at all.
    ///
    /// # Errors
    /// Returns `KeepaliveError::AudioUnavailable` if it cannot.
    fn probe(&self) -> Result<(), KeepaliveError>;

    /// Plays `buffer` to the end.
    ///
    /// # Errors
    /// Returns `KeepaliveError::Playback` if playback fails.
    async fn play(&self, buffer: &ToneBuffer) -> Result<(), KeepaliveError>;
}

/// Sink that takes as long as the buffer lasts without producing output.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentSink;

#[async_trait]
impl AudioSink for SilentSink {
    fn probe(&self) -> Result<(), KeepaliveError> {
        Ok(())
    }

    async fn play(&self, buffer: &ToneBuffer) -> Result<(), KeepaliveError> {
        tokio::time::sleep(buffer.duration()).await;
        Ok(())
    }
}

struct LoopState {
    running: AtomicBool,
    resume: Notify,
    cycles: AtomicU64,
}

/// Self-restarting playback loop.
///
/// A playback failure suspends the loop until [`resume`](Self::resume) is
/// called; ending normally restarts immediately. Dropping the value stops it.
pub struct KeepaliveAudio {
    state: Arc<LoopState>,
    task: JoinHandle<()>,
}

impl KeepaliveAudio {
    /// Probes `sink` and starts looping `buffer` through it.
    ///
    /// # Errors
    /// Returns the probe error if the sink is unusable.
    pub fn start(sink: Arc<dyn AudioSink>, buffer: ToneBuffer) -> Result<Self, KeepaliveError> {
        sink.probe()?;

        let state = Arc::new(LoopState {
            running: AtomicBool::new(true),
            resume: Notify::new(),
            cycles: AtomicU64::new(0),
        });

        let task = tokio::spawn(play_loop(sink, buffer, state.clone()));
        Ok(Self { state, task })
    }

    /// Whether the loop is currently playing.
    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst) && !self.task.is_finished()
    }

    /// Number of completed plays of the buffer.
    pub fn cycles(&self) -> u64 {
        self.state.cycles.load(Ordering::SeqCst)
    }

    /// Restarts a suspended loop. Returns whether it was suspended.
    pub fn resume(&self) -> bool {
        let was_suspended = !self.state.running.swap(true, Ordering::SeqCst);
        if was_suspended {
            self.state.resume.notify_one();
        }
        was_suspended
    }

    /// Stops the loop.
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for KeepaliveAudio {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn play_loop(sink: Arc<dyn AudioSink>, buffer: ToneBuffer, state: Arc<LoopState>) {
    loop {
        if !state.running.load(Ordering::SeqCst) {
            state.resume.notified().await;
            continue;
        }

        match sink.play(&buffer).await {
            Ok(()) => {
                state.cycles.fetch_add(1, Ordering::SeqCst);
            }
            Err(e) => {
                warn!("keepalive audio suspended: {e}");
                state.running.store(false, Ordering::SeqCst);
            }
        }
    }
}

impl std::fmt::Debug for KeepaliveAudio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeepaliveAudio")
            .field("running", &self.is_running())
            .field("cycles", &self.cycles())
            .finish()
    }
}
