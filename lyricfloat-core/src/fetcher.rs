//! Lyrics fetcher that turns bridge events into sync commands.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bridge::{BridgeEvent, NowPlayingBridge};
use crate::error::Result;
use crate::library::LyricsLibrary;
use crate::lrc::{LyricDocument, Track};
use crate::playback::TrackInfo;
use crate::provider::{LyricsProvider, LyricsQuery, LyricsResult};
use crate::service::SyncHandle;

/// Resolves lyrics for the playing song and keeps the sync service loaded
pub struct LyricsFetcher {
    bridge: Arc<dyn NowPlayingBridge>,
    library: LyricsLibrary,
    providers: Vec<Box<dyn LyricsProvider>>,
    sync: SyncHandle,
    events: mpsc::Receiver<BridgeEvent>,
    /// Last resolved song, reused when playback resumes
    resolved: Option<(TrackInfo, Track)>,
    cancel_token: CancellationToken,
}

impl LyricsFetcher {
    /// Create a new lyrics fetcher
    ///
    /// # Arguments
    /// * `bridge` - Bridge queried for the position right before loading
    /// * `library` - Local lyric files, checked before any provider
    /// * `providers` - Online providers tried in order; empty disables downloads
    /// * `sync` - Handle to the sync service
    /// * `events` - Bridge events from a [`crate::bridge::BridgeWatcher`]
    /// * `cancel_token` - Optional external cancellation token for graceful shutdown
    pub fn new(
        bridge: Arc<dyn NowPlayingBridge>,
        library: LyricsLibrary,
        providers: Vec<Box<dyn LyricsProvider>>,
        sync: SyncHandle,
        events: mpsc::Receiver<BridgeEvent>,
        cancel_token: Option<CancellationToken>,
    ) -> Self {
        Self {
            bridge,
            library,
            providers,
            sync,
            events,
            resolved: None,
            cancel_token: cancel_token.unwrap_or_default(),
        }
    }

    /// Get a clone of the cancellation token
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Start the lyrics fetcher in a background task
    #[must_use]
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Run the event loop until cancelled, the watcher goes away or the
    /// sync service stops
    pub async fn run(mut self) {
        let provider_names: Vec<_> = self.providers.iter().map(|p| p.name()).collect();
        info!(
            "Lyrics fetcher started (library: {}, providers: {:?})",
            self.library.folder().display(),
            provider_names
        );

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!("Lyrics fetcher shutting down");
                    break;
                }
                event = self.events.recv() => {
                    let Some(event) = event else {
                        info!("Bridge watcher gone, stopping lyrics fetcher");
                        break;
                    };
                    if let Err(e) = self.handle_event(event).await {
                        warn!("Lyrics fetcher stopping: {}", e);
                        break;
                    }
                }
            }
        }
    }

    async fn handle_event(&mut self, event: BridgeEvent) -> Result<()> {
        debug!("Handling bridge event: {:?}", event);
        match event {
            BridgeEvent::TrackChanged(_) | BridgeEvent::PlayStateChanged { is_playing: true } => {
                self.sync_now_playing().await
            }
            BridgeEvent::PlayStateChanged { is_playing: false } | BridgeEvent::NothingPlaying => {
                self.sync.stop().await
            }
            BridgeEvent::Seeked { elapsed } => self.sync.recalibrate(elapsed).await,
        }
    }

    /// Query the bridge, resolve lyrics for the song and load them at the
    /// reported position plus the time spent resolving.
    async fn sync_now_playing(&mut self) -> Result<()> {
        let started = Instant::now();
        let now_playing = match self.bridge.now_playing().await {
            Ok(Some(now_playing)) if now_playing.is_playing => now_playing,
            Ok(_) => {
                debug!("Nothing is playing, clearing lyrics");
                return self.sync.stop().await;
            }
            Err(e) => {
                warn!("Failed to query {}: {}", self.bridge.name(), e);
                return self.sync.stop().await;
            }
        };

        let track = self.lyrics_for(&now_playing.track).await;
        let elapsed = now_playing.elapsed + started.elapsed().as_secs_f64();
        self.sync.load(track, elapsed).await
    }

    async fn lyrics_for(&mut self, song: &TrackInfo) -> Track {
        if let Some((resolved_song, track)) = &self.resolved {
            if resolved_song.same_song(song) {
                debug!("Reusing lyrics for {} - {}", song.artist, song.title);
                return track.clone();
            }
        }

        let track = self.resolve(song).await;
        // Placeholders are retried on the next resume
        self.resolved = if track.is_placeholder() {
            None
        } else {
            Some((song.clone(), track.clone()))
        };
        track
    }

    /// Library first, then providers, then the placeholder
    async fn resolve(&self, song: &TrackInfo) -> Track {
        info!("Resolving lyrics for: {} - {}", song.artist, song.title);

        // Never overwrite a file the user already has, usable or not
        let file_exists = match self.library.load(song).await {
            Ok(Some(document)) if !document.track.is_empty() => return document.track,
            Ok(Some(_)) => {
                warn!(
                    "Lyric file {} has no timed lines",
                    self.library.path_for(song).display()
                );
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!("Failed to read lyric file: {}", e);
                true
            }
        };

        if let Some(document) = self.download(song).await {
            if file_exists {
                info!(
                    "Keeping existing {}, downloaded lyrics are not saved",
                    self.library.path_for(song).display()
                );
            } else if let Err(e) = self.library.save(song, &document).await {
                warn!("Failed to save downloaded lyrics: {}", e);
            }
            return document.track;
        }

        info!("No synced lyrics for {} - {}", song.artist, song.title);
        Track::placeholder(&song.artist, &song.title)
    }

    async fn download(&self, song: &TrackInfo) -> Option<LyricDocument> {
        let query = LyricsQuery::from(song);

        for provider in &self.providers {
            info!("Trying provider: {}", provider.name());
            match provider.fetch(&query).await {
                Ok(fetched) => match fetched.result {
                    LyricsResult::Synced(mut document) if !document.track.is_empty() => {
                        info!(
                            "Found synced lyrics from {} ({} lines, provider_id: {})",
                            provider.name(),
                            document.track.len(),
                            fetched.provider_id
                        );
                        let metadata = &mut document.metadata;
                        metadata.artist.get_or_insert_with(|| song.artist.clone());
                        metadata.title.get_or_insert_with(|| song.title.clone());
                        if let Some(album) = &song.album {
                            metadata.album.get_or_insert_with(|| album.clone());
                        }
                        return Some(document);
                    }
                    LyricsResult::Synced(_) | LyricsResult::Unsynced(_) => {
                        info!(
                            "Provider {} returned unsynced lyrics (not usable for syncing)",
                            provider.name()
                        );
                    }
                    LyricsResult::NotFound => {
                        info!("Provider {} returned no lyrics", provider.name());
                    }
                },
                Err(e) => {
                    warn!("Provider {} failed with error: {}", provider.name(), e);
                }
            }
        }

        None
    }
}
