//! Now-playing bridge: the seam to the host's media-status provider.
//!
//! How the data is obtained (D-Bus, a helper process, a private OS framework)
//! stays behind [`NowPlayingBridge`]. Bridges that can only be polled get
//! track-change and play-state events from [`BridgeWatcher`], which diffs
//! successive snapshots.

use crate::error::Result;
use crate::playback::{NowPlaying, TrackInfo};
use crate::time::DurationExt;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Position jump, in seconds, that counts as a seek rather than drift
pub const SEEK_THRESHOLD_SECS: f64 = 2.0;

/// Source of "now playing" information.
///
/// Implementations should return `Ok(None)` when no player is active and
/// reserve errors for a bridge that cannot be reached at all.
#[async_trait]
pub trait NowPlayingBridge: Send + Sync {
    /// Returns a human-readable name for this bridge.
    fn name(&self) -> &'static str;

    /// Query the currently playing track and its position.
    ///
    /// # Errors
    ///
    /// Returns an error if the media-status provider cannot be queried.
    async fn now_playing(&self) -> Result<Option<NowPlaying>>;
}

/// Change notifications derived from the bridge
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    /// A different song is now loaded in the player
    TrackChanged(TrackInfo),
    /// The same song was paused or resumed
    PlayStateChanged { is_playing: bool },
    /// The same song jumped to a new position
    Seeked { elapsed: f64 },
    /// The player went away or stopped reporting a track
    NothingPlaying,
}

impl BridgeEvent {
    /// Diff two snapshots. `expected_elapsed` is where the previous snapshot
    /// predicts the position to be now.
    #[must_use]
    pub fn between(
        previous: Option<&NowPlaying>,
        next: Option<&NowPlaying>,
        expected_elapsed: Option<f64>,
    ) -> Option<Self> {
        let Some(next) = next else {
            return previous.map(|_| Self::NothingPlaying);
        };

        let Some(previous) = previous.filter(|_| !NowPlaying::track_changed(previous, Some(next)))
        else {
            return Some(Self::TrackChanged(next.track.clone()));
        };

        if previous.play_state_changed(next) {
            return Some(Self::PlayStateChanged {
                is_playing: next.is_playing,
            });
        }

        match expected_elapsed {
            Some(expected) if next.is_playing && next.seek_occurred(expected, SEEK_THRESHOLD_SECS) => {
                Some(Self::Seeked {
                    elapsed: next.elapsed,
                })
            }
            _ => None,
        }
    }
}

/// Polls a [`NowPlayingBridge`] and publishes [`BridgeEvent`]s.
pub struct BridgeWatcher {
    bridge: Arc<dyn NowPlayingBridge>,
    poll_interval: Duration,
    events: mpsc::Sender<BridgeEvent>,
    cancel_token: CancellationToken,
}

impl BridgeWatcher {
    /// Create a new watcher
    ///
    /// # Arguments
    /// * `bridge` - Bridge to poll
    /// * `poll_interval` - Time between two polls
    /// * `events` - Channel receiving the derived events
    /// * `cancel_token` - Optional external cancellation token for graceful shutdown
    pub fn new(
        bridge: Arc<dyn NowPlayingBridge>,
        poll_interval: Duration,
        events: mpsc::Sender<BridgeEvent>,
        cancel_token: Option<CancellationToken>,
    ) -> Self {
        Self {
            bridge,
            poll_interval,
            events,
            cancel_token: cancel_token.unwrap_or_default(),
        }
    }

    /// Get a clone of the cancellation token
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Start polling in a background task
    #[must_use]
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Run the polling loop until cancelled or the event receiver is dropped
    pub async fn run(&self) {
        info!("Watching now-playing bridge: {}", self.bridge.name());

        let mut previous: Option<(NowPlaying, Instant)> = None;
        let mut consecutive_errors: u32 = 0;
        let max_backoff = Duration::from_secs(30);
        let mut delay = Duration::ZERO;

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!("Bridge watcher shutting down");
                    break;
                }
                () = tokio::time::sleep(delay) => {
                    match self.bridge.now_playing().await {
                        Ok(next) => {
                            consecutive_errors = 0;
                            delay = self.poll_interval;

                            let now = Instant::now();
                            let expected = previous
                                .as_ref()
                                .map(|(snapshot, taken_at)| snapshot.expected_elapsed(*taken_at, now));
                            let event = BridgeEvent::between(
                                previous.as_ref().map(|(snapshot, _)| snapshot),
                                next.as_ref(),
                                expected,
                            );
                            previous = next.map(|snapshot| (snapshot, now));

                            if let Some(event) = event {
                                debug!("Bridge event: {:?}", event);
                                if self.events.send(event).await.is_err() {
                                    info!("Bridge event receiver dropped, stopping watcher");
                                    break;
                                }
                            }
                        }
                        Err(e) => {
                            consecutive_errors = consecutive_errors.saturating_add(1);
                            warn!("Bridge poll error (attempt {}): {}", consecutive_errors, e);

                            // Exponential backoff: 100ms * 2^errors, capped at max_backoff
                            let backoff_ms = 100_u64
                                .saturating_mul(2_u64.saturating_pow(consecutive_errors.min(10)));
                            delay = Duration::from_millis(backoff_ms.min(max_backoff.as_millis_u64()));

                            if consecutive_errors >= 5 {
                                error!("Too many consecutive bridge errors, waiting {} seconds", delay.as_secs());
                            }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::CoreError;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Bridge replaying scripted responses; the last one repeats forever.
    pub(crate) struct ScriptedBridge {
        responses: Mutex<VecDeque<Option<NowPlaying>>>,
        last: Mutex<Option<NowPlaying>>,
        fail: Mutex<u32>,
    }

    impl ScriptedBridge {
        pub(crate) fn new(responses: Vec<Option<NowPlaying>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                last: Mutex::new(None),
                fail: Mutex::new(0),
            }
        }

        pub(crate) fn set(&self, response: Option<NowPlaying>) {
            self.responses.lock().unwrap().clear();
            *self.last.lock().unwrap() = response;
        }

        pub(crate) fn fail_next(&self, times: u32) {
            *self.fail.lock().unwrap() = times;
        }
    }

    #[async_trait]
    impl NowPlayingBridge for ScriptedBridge {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn now_playing(&self) -> Result<Option<NowPlaying>> {
            {
                let mut fail = self.fail.lock().unwrap();
                if *fail > 0 {
                    *fail -= 1;
                    return Err(CoreError::BridgeUnavailable {
                        bridge: "scripted".to_string(),
                        reason: "scripted failure".to_string(),
                    });
                }
            }
            let mut last = self.last.lock().unwrap();
            if let Some(next) = self.responses.lock().unwrap().pop_front() {
                *last = next;
            }
            Ok(last.clone())
        }
    }

    pub(crate) fn playing(artist: &str, title: &str, elapsed: f64) -> NowPlaying {
        NowPlaying::new(TrackInfo::new(artist, title), elapsed, true)
    }

    #[test]
    fn test_between_first_track() {
        let next = playing("A", "Song", 3.0);
        assert_eq!(
            BridgeEvent::between(None, Some(&next), None),
            Some(BridgeEvent::TrackChanged(TrackInfo::new("A", "Song")))
        );
    }

    #[test]
    fn test_between_track_change_wins_over_play_state() {
        let previous = playing("A", "Song", 3.0);
        let mut next = playing("A", "Other", 0.0);
        next.is_playing = false;
        assert!(matches!(
            BridgeEvent::between(Some(&previous), Some(&next), Some(4.0)),
            Some(BridgeEvent::TrackChanged(_))
        ));
    }

    #[test]
    fn test_between_pause() {
        let previous = playing("A", "Song", 3.0);
        let mut next = previous.clone();
        next.is_playing = false;
        assert_eq!(
            BridgeEvent::between(Some(&previous), Some(&next), Some(4.0)),
            Some(BridgeEvent::PlayStateChanged { is_playing: false })
        );
    }

    #[test]
    fn test_between_seek_and_drift() {
        let previous = playing("A", "Song", 3.0);
        let drift = playing("A", "Song", 4.5);
        let seek = playing("A", "Song", 60.0);
        assert_eq!(BridgeEvent::between(Some(&previous), Some(&drift), Some(4.0)), None);
        assert_eq!(
            BridgeEvent::between(Some(&previous), Some(&seek), Some(4.0)),
            Some(BridgeEvent::Seeked { elapsed: 60.0 })
        );
    }

    #[test]
    fn test_between_player_gone() {
        let previous = playing("A", "Song", 3.0);
        assert_eq!(
            BridgeEvent::between(Some(&previous), None, Some(4.0)),
            Some(BridgeEvent::NothingPlaying)
        );
        assert_eq!(BridgeEvent::between(None, None, None), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watcher_publishes_changes() {
        let mut paused = playing("A", "Song", 1.0);
        paused.is_playing = false;
        let bridge = Arc::new(ScriptedBridge::new(vec![
            Some(playing("A", "Song", 0.0)),
            Some(playing("A", "Song", 1.0)),
            Some(paused),
            None,
        ]));
        let (tx, mut rx) = mpsc::channel(8);
        let cancel_token = CancellationToken::new();
        let watcher = BridgeWatcher::new(
            bridge,
            Duration::from_secs(1),
            tx,
            Some(cancel_token.clone()),
        );
        let handle = watcher.start();

        assert_eq!(
            rx.recv().await,
            Some(BridgeEvent::TrackChanged(TrackInfo::new("A", "Song")))
        );
        assert_eq!(
            rx.recv().await,
            Some(BridgeEvent::PlayStateChanged { is_playing: false })
        );
        assert_eq!(rx.recv().await, Some(BridgeEvent::NothingPlaying));

        cancel_token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_watcher_backs_off_on_errors() {
        let bridge = Arc::new(ScriptedBridge::new(vec![Some(playing("A", "Song", 0.0))]));
        bridge.fail_next(3);
        let (tx, mut rx) = mpsc::channel(8);
        let watcher = BridgeWatcher::new(bridge, Duration::from_secs(1), tx, None);
        let cancel_token = watcher.cancel_token();
        let handle = watcher.start();

        let started = Instant::now();
        assert!(matches!(rx.recv().await, Some(BridgeEvent::TrackChanged(_))));
        // 200ms + 400ms + 800ms of backoff before the first good poll
        assert_eq!(started.elapsed(), Duration::from_millis(1400));

        cancel_token.cancel();
        handle.await.unwrap();
    }
}
