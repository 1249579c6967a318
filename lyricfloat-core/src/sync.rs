//! Lyrics synchronization state machine.
//!
//! [`SyncEngine`] owns the current [`Track`] and [`PlaybackClock`] and decides
//! when each line becomes current. It never sleeps or spawns anything itself:
//! operations that need a precise wake-up return a [`OneShot`] request, and the
//! owner (see [`crate::service::SyncService`]) arms a timer that later calls
//! [`SyncEngine::fire`] with the same generation. A coarse heartbeat calls
//! [`SyncEngine::tick`] to recover whenever no precise timer is pending.

use crate::clock::PlaybackClock;
use crate::lrc::Track;
use crate::time::SecondsExt;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, trace};

/// A line counts as due this close to its timestamp (timer granularity)
const FIRE_TOLERANCE_SECS: f64 = 0.001;

/// Events emitted by the sync engine
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// A new track replaced the previous one
    TrackLoaded { track: Track },
    /// The primary line at `index` became current
    LineChanged {
        index: usize,
        text: String,
        /// Translation lines displayed together with the primary line
        translations: Vec<String>,
    },
    /// Displayed playback position in seconds
    Progress { elapsed: f64 },
    /// The last line fired or the position is past the end of the track
    Finished,
    /// Playback stopped and the track was discarded
    Stopped,
}

/// Scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No track, a stopped track or a placeholder on screen
    Idle,
    /// Track loaded, start index being positioned
    Seeking,
    /// Firing line transitions
    Advancing,
    /// Ran past the last line; waits for a recalibration or a new track
    Finished,
}

/// Request to call [`SyncEngine::fire`] with `generation` after `delay`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OneShot {
    pub generation: u64,
    pub delay: Duration,
}

/// Line scheduler for the single "now showing" track
#[derive(Debug)]
pub struct SyncEngine {
    track: Track,
    clock: Option<PlaybackClock>,
    /// Next line not yet fired
    current_index: usize,
    running: bool,
    state: EngineState,
    /// Invalidates pending one-shots; bumped on load, recalibrate, nudge, stop and re-arm
    generation: u64,
    /// Invalidates pending delayed corrections; bumped on load and stop
    session: u64,
    /// Seconds added to every elapsed value the clock is seeded with
    global_offset: f64,
    event_tx: broadcast::Sender<SyncEvent>,
}

impl SyncEngine {
    /// Create an idle engine
    #[must_use]
    pub fn new(global_offset: f64) -> Self {
        let (event_tx, _) = broadcast::channel(64);

        Self {
            track: Track::default(),
            clock: None,
            current_index: 0,
            running: false,
            state: EngineState::Idle,
            generation: 0,
            session: 0,
            global_offset,
            event_tx,
        }
    }

    /// Subscribe to sync events
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.event_tx.subscribe()
    }

    /// Sender used to hand out additional subscriptions
    #[must_use]
    pub fn event_sender(&self) -> broadcast::Sender<SyncEvent> {
        self.event_tx.clone()
    }

    /// Change the global offset; takes effect at the next load or recalibration.
    pub fn set_global_offset(&mut self, global_offset: f64) {
        self.global_offset = global_offset;
    }

    /// Replace the track and start scheduling from `initial_elapsed`.
    ///
    /// Placeholder and empty tracks are shown without starting the scheduler.
    pub fn load(&mut self, track: Track, initial_elapsed: f64) -> Option<OneShot> {
        self.generation += 1;
        self.session += 1;
        self.track = track;
        self.track.set_current(None);
        self.current_index = 0;
        self.running = false;
        self.clock = None;

        let _ = self.event_tx.send(SyncEvent::TrackLoaded {
            track: self.track.clone(),
        });

        if self.track.is_placeholder() || self.track.is_empty() {
            self.state = EngineState::Idle;
            if !self.track.is_empty() {
                self.mark_current(0);
            }
            info!("Showing placeholder lyrics ({} lines)", self.track.len());
            return None;
        }

        self.state = EngineState::Seeking;
        let elapsed = initial_elapsed + self.global_offset;
        self.clock = Some(PlaybackClock::seeded(elapsed));
        self.current_index = self.track.seek(elapsed);
        self.running = true;
        self.state = EngineState::Advancing;

        info!(
            "Loaded {} lyric lines at {:.2}s, starting at line {}",
            self.track.len(),
            elapsed,
            self.current_index
        );

        self.advance_and_arm()
    }

    /// Re-seek the existing track to a freshly observed elapsed time.
    ///
    /// Does nothing while idle. Any one-shot armed before this call goes stale.
    pub fn recalibrate(&mut self, new_elapsed: f64) -> Option<OneShot> {
        let elapsed = new_elapsed + self.global_offset;
        let Some(clock) = self.clock.as_mut() else {
            debug!("Recalibration ignored, no track is running");
            return None;
        };

        self.generation += 1;
        clock.recalibrate(elapsed);
        self.current_index = self.track.seek(elapsed);
        self.running = true;
        self.state = EngineState::Advancing;

        debug!(
            "Recalibrated to {:.2}s, next line {}",
            elapsed, self.current_index
        );

        self.advance_and_arm()
    }

    /// Shift the clock by `delta` seconds.
    ///
    /// The index is left alone; the returned one-shot (due immediately if the
    /// next line is already behind the clock) moves it.
    pub fn nudge(&mut self, delta: f64) -> Option<OneShot> {
        let clock = self.clock.as_mut()?;
        clock.nudge(delta);
        let elapsed = clock.elapsed();
        let _ = self.event_tx.send(SyncEvent::Progress { elapsed });

        debug!("Nudged by {:+.2}s to {:.2}s", delta, elapsed);

        // The pending one-shot was computed for the old position
        self.arm()
    }

    /// Stop scheduling and discard the track.
    pub fn stop(&mut self) {
        self.generation += 1;
        self.session += 1;
        let was_active = self.clock.is_some() || !self.track.is_empty();

        self.running = false;
        self.state = EngineState::Idle;
        self.clock = None;
        self.track = Track::default();
        self.current_index = 0;

        if was_active {
            info!("Lyrics stopped");
        }
        let _ = self.event_tx.send(SyncEvent::Progress { elapsed: 0.0 });
        let _ = self.event_tx.send(SyncEvent::Stopped);
    }

    /// Heartbeat: report progress and fire any line that is due.
    ///
    /// Only re-arms when a line fired here, since otherwise the live one-shot
    /// is still pending.
    pub fn tick(&mut self) -> Option<OneShot> {
        if !self.running {
            return None;
        }
        if let Some(clock) = &self.clock {
            let _ = self.event_tx.send(SyncEvent::Progress {
                elapsed: clock.elapsed(),
            });
        }
        if self.advance() {
            self.arm()
        } else {
            None
        }
    }

    /// Handle a one-shot armed with `generation`. Stale generations are ignored.
    pub fn fire(&mut self, generation: u64) -> Option<OneShot> {
        if generation != self.generation || !self.running {
            trace!(
                "Dropping stale one-shot (generation {}, current {})",
                generation,
                self.generation
            );
            return None;
        }
        // Early wake-ups re-arm for the remaining time
        self.advance_and_arm()
    }

    /// Apply a delayed correction taken for `session`. Stale sessions are ignored.
    pub fn correct(&mut self, session: u64, elapsed: f64) -> Option<OneShot> {
        if session != self.session {
            trace!(
                "Dropping stale correction (session {}, current {})",
                session,
                self.session
            );
            return None;
        }
        info!("Delayed correction to {:.2}s", elapsed);
        self.recalibrate(elapsed)
    }

    #[must_use]
    pub const fn state(&self) -> EngineState {
        self.state
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    #[must_use]
    pub const fn current_index(&self) -> usize {
        self.current_index
    }

    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub const fn session(&self) -> u64 {
        self.session
    }

    #[must_use]
    pub const fn track(&self) -> &Track {
        &self.track
    }

    /// Current displayed position, `None` while no clock is seeded.
    #[must_use]
    pub fn elapsed(&self) -> Option<f64> {
        self.clock.as_ref().map(PlaybackClock::elapsed)
    }

    fn advance_and_arm(&mut self) -> Option<OneShot> {
        self.advance();
        self.arm()
    }

    /// Fire every due line, landing on the latest one. Returns whether a line fired.
    fn advance(&mut self) -> bool {
        let Some(elapsed) = self.elapsed() else {
            return false;
        };
        let lines = self.track.lines();

        let mut fired = None;
        // Every step moves the index forward, so this is bounded by the track length
        while self.current_index < lines.len()
            && lines[self.current_index].timestamp <= elapsed + FIRE_TOLERANCE_SECS
        {
            fired = Some(self.current_index);
            self.current_index += 1;
            // Translations ride along with their primary line
            while self.current_index < lines.len() && lines[self.current_index].is_translation {
                self.current_index += 1;
            }
        }

        if let Some(index) = fired {
            self.mark_current(index);
        }

        if self.current_index >= self.track.len() {
            self.finish();
        }

        fired.is_some()
    }

    /// Arm a one-shot for the line at `current_index`, superseding any pending one.
    fn arm(&mut self) -> Option<OneShot> {
        if !self.running {
            return None;
        }
        let next = self.track.get(self.current_index)?;
        let elapsed = self.elapsed()?;

        self.generation += 1;
        Some(OneShot {
            generation: self.generation,
            delay: (next.timestamp - elapsed).to_duration_saturating(),
        })
    }

    fn mark_current(&mut self, index: usize) {
        self.track.set_current(Some(index));
        let Some(line) = self.track.get(index) else {
            return;
        };
        let event = SyncEvent::LineChanged {
            index,
            text: line.text.clone(),
            translations: self
                .track
                .translations(index)
                .iter()
                .map(|l| l.text.clone())
                .collect(),
        };
        debug!("Line {} is current: {}", index, line.text);
        let _ = self.event_tx.send(event);
    }

    fn finish(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.state = EngineState::Finished;
        debug!("Reached the end of the lyrics");
        let _ = self.event_tx.send(SyncEvent::Finished);
    }
}

impl Default for SyncEngine {
    fn default() -> Self {
        Self::new(0.0)
    }
}
