use tokio::time::Instant;

/// Information about the currently playing track
#[derive(Debug, Clone, PartialEq)]
pub struct TrackInfo {
    pub artist: String,
    pub title: String,
    /// Album name, if the player reports one
    pub album: Option<String>,
    /// Track length in seconds, if the player reports one
    pub duration: Option<f64>,
}

impl TrackInfo {
    /// Create a new track info
    pub fn new(artist: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            artist: artist.into(),
            title: title.into(),
            album: None,
            duration: None,
        }
    }

    /// Set the album name
    #[must_use]
    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    /// Set the track length in seconds
    #[must_use]
    pub const fn with_duration(mut self, duration: f64) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Whether two infos describe the same song (album and length ignored)
    #[must_use]
    pub fn same_song(&self, other: &Self) -> bool {
        self.artist == other.artist && self.title == other.title
    }

    /// Get duration in whole seconds (for lyrics queries)
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn duration_secs(&self) -> Option<u32> {
        // Saturating cast of a non-negative length
        self.duration
            .filter(|d| d.is_finite() && *d >= 0.0)
            .map(|d| d.round() as u32)
    }
}

/// Snapshot reported by a now-playing bridge
#[derive(Debug, Clone, PartialEq)]
pub struct NowPlaying {
    pub track: TrackInfo,
    /// Playback position in seconds as reported by the player
    pub elapsed: f64,
    pub is_playing: bool,
}

impl NowPlaying {
    /// Create a new snapshot
    #[must_use]
    pub const fn new(track: TrackInfo, elapsed: f64, is_playing: bool) -> Self {
        Self {
            track,
            elapsed,
            is_playing,
        }
    }

    /// Check if the track has changed between two snapshots
    #[must_use]
    pub fn track_changed(previous: Option<&Self>, next: Option<&Self>) -> bool {
        match (previous, next) {
            (Some(a), Some(b)) => !a.track.same_song(&b.track),
            (None, None) => false,
            _ => true,
        }
    }

    /// Check if playback state changed (playing <-> paused)
    #[must_use]
    pub const fn play_state_changed(&self, other: &Self) -> bool {
        self.is_playing != other.is_playing
    }

    /// Position this snapshot predicts at `now` if it was taken at `taken_at`
    #[must_use]
    pub fn expected_elapsed(&self, taken_at: Instant, now: Instant) -> f64 {
        if self.is_playing {
            self.elapsed + now.saturating_duration_since(taken_at).as_secs_f64()
        } else {
            self.elapsed
        }
    }

    /// Check if a seek occurred (position jumped away from the prediction)
    #[must_use]
    pub fn seek_occurred(&self, expected_elapsed: f64, threshold: f64) -> bool {
        (self.elapsed - expected_elapsed).abs() > threshold
    }
}
