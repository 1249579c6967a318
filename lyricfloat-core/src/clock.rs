//! Derived playback clock.
//!
//! The media-status provider only gives us an occasional, sometimes stale
//! elapsed-time sample. Instead of running a timer of our own, the clock keeps
//! a reference instant such that `elapsed = now - reference`, and every
//! correction re-anchors that reference.

use tokio::time::Instant;

/// Elapsed-time tracker anchored to a reference instant.
///
/// The reference is kept as signed seconds relative to the instant the clock
/// was created, so it may lie before or after that instant without any
/// `Instant` arithmetic. Uses [`tokio::time::Instant`] so a paused test
/// runtime drives it.
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    epoch: Instant,
    /// Reference instant in seconds since `epoch`
    reference: f64,
}

impl PlaybackClock {
    /// Create a clock already seeded with `elapsed` seconds.
    #[must_use]
    pub fn seeded(elapsed: f64) -> Self {
        let mut clock = Self {
            epoch: Instant::now(),
            reference: 0.0,
        };
        clock.seed(elapsed);
        clock
    }

    /// Anchor the clock so that `elapsed()` returns `elapsed` right now.
    pub fn seed(&mut self, elapsed: f64) {
        self.reference = self.now() - elapsed;
    }

    /// Seconds of playback since the start of the track.
    #[must_use]
    pub fn elapsed(&self) -> f64 {
        self.now() - self.reference
    }

    /// Shift the displayed position; positive skips forward, negative rewinds.
    pub fn nudge(&mut self, delta: f64) {
        self.reference -= delta;
    }

    /// Re-anchor to a freshly observed elapsed time.
    pub fn recalibrate(&mut self, elapsed: f64) {
        self.seed(elapsed);
    }

    /// Reference instant as seconds relative to the clock's creation.
    #[must_use]
    pub const fn reference(&self) -> f64 {
        self.reference
    }

    fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_seeded_reports_seed() {
        let clock = PlaybackClock::seeded(12.5);
        assert!((clock.elapsed() - 12.5).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_follows_wall_clock() {
        let clock = PlaybackClock::seeded(3.0);
        tokio::time::advance(Duration::from_millis(1500)).await;
        assert!((clock.elapsed() - 4.5).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_nudge_forward_same_instant() {
        let mut clock = PlaybackClock::seeded(10.0);
        tokio::time::advance(Duration::from_secs(2)).await;
        let before = clock.elapsed();
        clock.nudge(1.0);
        assert!((clock.elapsed() - (before + 1.0)).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_nudge_backward() {
        let mut clock = PlaybackClock::seeded(10.0);
        clock.nudge(-1.0);
        assert!((clock.elapsed() - 9.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_nudge_only_moves_reference() {
        let mut clock = PlaybackClock::seeded(0.0);
        let reference = clock.reference();
        clock.nudge(0.25);
        assert!((clock.reference() - (reference - 0.25)).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recalibrate_replaces_drift() {
        let mut clock = PlaybackClock::seeded(0.0);
        tokio::time::advance(Duration::from_secs(5)).await;
        clock.nudge(3.0);
        clock.recalibrate(4.0);
        assert!((clock.elapsed() - 4.0).abs() < 1e-9);
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!((clock.elapsed() - 5.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_negative_seed_counts_up_to_zero() {
        let clock = PlaybackClock::seeded(-0.5);
        assert!(clock.elapsed() < 0.0);
        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(clock.elapsed().abs() < 1e-9);
    }
}
