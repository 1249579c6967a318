//! Async driver for the [`SyncEngine`].
//!
//! Every engine transition happens inside [`SyncService::run`]: commands from
//! [`SyncHandle`]s, the heartbeat, chained one-shots and delayed corrections
//! all funnel through one `select!` loop, so the engine itself needs no locks.

use crate::bridge::NowPlayingBridge;
use crate::error::{CoreError, Result};
use crate::lrc::Track;
use crate::sync::{OneShot, SyncEngine, SyncEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::{AbortHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Interval of the coarse heartbeat
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

/// Delay after a load before the bridge is re-queried
pub const CORRECTION_DELAY: Duration = Duration::from_secs(3);

const COMMAND_CHANNEL_CAPACITY: usize = 32;

/// Requests accepted by the sync service
#[derive(Debug, Clone, PartialEq)]
pub enum SyncCommand {
    /// Replace the track and start from `elapsed` seconds
    Load { track: Track, elapsed: f64 },
    /// Re-seek to a known elapsed time
    Recalibrate(f64),
    /// Re-query the bridge and re-seek to what it reports
    RecalibrateNow,
    /// Shift the displayed position by the given seconds
    Nudge(f64),
    /// Stop scheduling and discard the track
    Stop,
    /// Change the offset added at the next load or recalibration
    SetGlobalOffset(f64),
}

/// Completed timer tasks
#[derive(Debug)]
enum Wakeup {
    OneShot(u64),
    /// Bridge re-query for `session`; `None` when there is nothing to apply
    Correction { session: u64, elapsed: Option<f64> },
}

/// Cloneable front-end to a running [`SyncService`]
#[derive(Debug, Clone)]
pub struct SyncHandle {
    commands: mpsc::Sender<SyncCommand>,
    events: broadcast::Sender<SyncEvent>,
}

impl SyncHandle {
    /// Subscribe to sync events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Send a raw command
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EngineStopped`] if the service is no longer running.
    pub async fn send(&self, command: SyncCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| CoreError::EngineStopped)
    }

    /// Load a track starting at `elapsed` seconds
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EngineStopped`] if the service is no longer running.
    pub async fn load(&self, track: Track, elapsed: f64) -> Result<()> {
        self.send(SyncCommand::Load { track, elapsed }).await
    }

    /// Re-seek to `elapsed` seconds
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EngineStopped`] if the service is no longer running.
    pub async fn recalibrate(&self, elapsed: f64) -> Result<()> {
        self.send(SyncCommand::Recalibrate(elapsed)).await
    }

    /// Re-query the bridge and re-seek
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EngineStopped`] if the service is no longer running.
    pub async fn recalibrate_now(&self) -> Result<()> {
        self.send(SyncCommand::RecalibrateNow).await
    }

    /// Shift the displayed position; positive skips forward
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EngineStopped`] if the service is no longer running.
    pub async fn nudge(&self, delta: f64) -> Result<()> {
        self.send(SyncCommand::Nudge(delta)).await
    }

    /// Stop scheduling and clear the panel
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EngineStopped`] if the service is no longer running.
    pub async fn stop(&self) -> Result<()> {
        self.send(SyncCommand::Stop).await
    }

    /// Replace the global offset used from the next load or recalibration on
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EngineStopped`] if the service is no longer running.
    pub async fn set_global_offset(&self, offset: f64) -> Result<()> {
        self.send(SyncCommand::SetGlobalOffset(offset)).await
    }
}

/// Owner of the [`SyncEngine`] and its timers
pub struct SyncService {
    engine: SyncEngine,
    bridge: Arc<dyn NowPlayingBridge>,
    commands: mpsc::Receiver<SyncCommand>,
    timers: JoinSet<Wakeup>,
    pending_one_shot: Option<AbortHandle>,
    cancel_token: CancellationToken,
}

impl SyncService {
    /// Create a service and the first handle to it
    ///
    /// # Arguments
    /// * `engine` - Engine to drive
    /// * `bridge` - Bridge re-queried for delayed corrections and recalibrate-now
    /// * `cancel_token` - Optional external cancellation token for graceful shutdown
    pub fn new(
        engine: SyncEngine,
        bridge: Arc<dyn NowPlayingBridge>,
        cancel_token: Option<CancellationToken>,
    ) -> (Self, SyncHandle) {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let handle = SyncHandle {
            commands: commands_tx,
            events: engine.event_sender(),
        };

        let service = Self {
            engine,
            bridge,
            commands: commands_rx,
            timers: JoinSet::new(),
            pending_one_shot: None,
            cancel_token: cancel_token.unwrap_or_default(),
        };

        (service, handle)
    }

    /// Get a clone of the cancellation token
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Start the service in a background task
    #[must_use]
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Run until cancelled or every handle is dropped
    pub async fn run(mut self) {
        info!("Sync service started (bridge: {})", self.bridge.name());

        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!("Sync service shutting down");
                    break;
                }
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        info!("All sync handles dropped, stopping sync service");
                        break;
                    };
                    self.handle_command(command);
                }
                _ = heartbeat.tick() => {
                    let shot = self.engine.tick();
                    self.arm(shot);
                }
                Some(joined) = self.timers.join_next(), if !self.timers.is_empty() => {
                    match joined {
                        Ok(wakeup) => self.handle_wakeup(wakeup),
                        Err(e) if e.is_cancelled() => {}
                        Err(e) => warn!("Sync timer task failed: {}", e),
                    }
                }
            }
        }

        self.engine.stop();
        self.timers.shutdown().await;
    }

    fn handle_command(&mut self, command: SyncCommand) {
        debug!("Sync command: {:?}", command);
        match command {
            SyncCommand::Load { track, elapsed } => {
                let placeholder = track.is_placeholder() || track.is_empty();
                let shot = self.engine.load(track, elapsed);
                self.arm(shot);
                if !placeholder {
                    self.requery(CORRECTION_DELAY);
                }
            }
            SyncCommand::Recalibrate(elapsed) => {
                let shot = self.engine.recalibrate(elapsed);
                self.arm(shot);
            }
            SyncCommand::RecalibrateNow => self.requery(Duration::ZERO),
            SyncCommand::Nudge(delta) => {
                let shot = self.engine.nudge(delta);
                self.arm(shot);
            }
            SyncCommand::Stop => {
                self.engine.stop();
                self.disarm();
            }
            SyncCommand::SetGlobalOffset(offset) => self.engine.set_global_offset(offset),
        }
    }

    fn handle_wakeup(&mut self, wakeup: Wakeup) {
        match wakeup {
            Wakeup::OneShot(generation) => {
                let shot = self.engine.fire(generation);
                self.arm(shot);
            }
            Wakeup::Correction {
                session,
                elapsed: Some(elapsed),
            } => {
                let shot = self.engine.correct(session, elapsed);
                self.arm(shot);
            }
            Wakeup::Correction { elapsed: None, .. } => {
                trace!("Bridge re-query returned nothing to apply");
            }
        }
    }

    /// Arm a one-shot, superseding the pending one.
    fn arm(&mut self, shot: Option<OneShot>) {
        let Some(OneShot { generation, delay }) = shot else {
            return;
        };
        self.disarm();
        trace!("Arming one-shot {} in {:?}", generation, delay);
        let handle = self.timers.spawn(async move {
            tokio::time::sleep(delay).await;
            Wakeup::OneShot(generation)
        });
        self.pending_one_shot = Some(handle);
    }

    fn disarm(&mut self) {
        if let Some(handle) = self.pending_one_shot.take() {
            handle.abort();
        }
    }

    /// Query the bridge after `delay` and feed the result back as a correction.
    fn requery(&mut self, delay: Duration) {
        let bridge = Arc::clone(&self.bridge);
        let session = self.engine.session();
        self.timers.spawn(async move {
            tokio::time::sleep(delay).await;
            Wakeup::Correction {
                session,
                elapsed: query_elapsed(bridge.as_ref()).await,
            }
        });
    }
}

/// Elapsed time reported by the bridge, compensated for the query's own latency.
async fn query_elapsed(bridge: &dyn NowPlayingBridge) -> Option<f64> {
    let started = Instant::now();
    match bridge.now_playing().await {
        Ok(Some(now_playing)) if now_playing.is_playing => {
            Some(now_playing.elapsed + started.elapsed().as_secs_f64())
        }
        Ok(_) => None,
        Err(e) => {
            warn!("Failed to re-query {}: {}", bridge.name(), e);
            None
        }
    }
}
