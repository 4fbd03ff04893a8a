//! Position projection between discrete backend pushes.

use tokio::time::Instant;

use crate::model::PlaybackSnapshot;

#[derive(Debug, Clone)]
struct Baseline {
    snapshot: PlaybackSnapshot,
    received_at: Instant,
}

/// Extrapolates playback position from the last received snapshot.
///
/// Every fresh snapshot resets the baseline, so drift never accumulates
/// beyond one push interval.
#[derive(Debug, Clone, Default)]
pub struct PlaybackProjector {
    baseline: Option<Baseline>,
}

impl PlaybackProjector {
    /// Projector with no baseline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the baseline with a snapshot received at `received_at`.
    pub fn reset(&mut self, snapshot: PlaybackSnapshot, received_at: Instant) {
        self.baseline = Some(Baseline {
            snapshot,
            received_at,
        });
    }

    /// Replaces the baseline with a snapshot received now.
    pub fn reset_now(&mut self, snapshot: PlaybackSnapshot) {
        self.reset(snapshot, Instant::now());
    }

    /// Moves the baseline position after a local seek.
    ///
    /// The projection restarts from `position_us` as of `at`. No-op without a
    /// baseline.
    pub fn seek(&mut self, position_us: u64, at: Instant) {
        if let Some(baseline) = self.baseline.as_mut() {
            baseline.snapshot.position_us = position_us;
            baseline.received_at = at;
        }
    }

    /// Last snapshot, as received or as adjusted by [`seek`](Self::seek).
    pub fn snapshot(&self) -> Option<&PlaybackSnapshot> {
        self.baseline.as_ref().map(|baseline| &baseline.snapshot)
    }

    /// Projected position at `now`, in microseconds.
    ///
    /// While playing: last position plus elapsed time scaled by the clamped
    /// rate. Otherwise the last position unmodified. Always capped at the known
    /// duration.
    pub fn position_at(&self, now: Instant) -> Option<u64> {
        let baseline = self.baseline.as_ref()?;
        let snapshot = &baseline.snapshot;

        let position = if snapshot.is_playing() {
            let elapsed_us = now.saturating_duration_since(baseline.received_at).as_micros() as f64;
            let advanced = snapshot.position_us as f64 + elapsed_us * snapshot.effective_rate();
            advanced.max(0.0) as u64
        } else {
            snapshot.position_us
        };

        Some(match snapshot.known_duration_us() {
            Some(duration) => position.min(duration),
            None => position,
        })
    }

    /// Projected position now.
    pub fn position_now(&self) -> Option<u64> {
        self.position_at(Instant::now())
    }

    /// Snapshot with its position replaced by the projection at `now`.
    pub fn projected_at(&self, now: Instant) -> Option<PlaybackSnapshot> {
        let position = self.position_at(now)?;
        let mut snapshot = self.snapshot()?.clone();
        snapshot.position_us = position;
        Some(snapshot)
    }
}
