use crate::error::CoreError;
use crate::lrc::LyricDocument;
use crate::playback::TrackInfo;
use async_trait::async_trait;

/// Query parameters for fetching lyrics
#[derive(Debug, Clone, PartialEq)]
pub struct LyricsQuery {
    /// Track title
    pub title: String,
    /// Artist name
    pub artist: String,
    /// Album name (optional)
    pub album: Option<String>,
    /// Track duration in seconds (for matching)
    pub duration_secs: Option<u32>,
}

impl LyricsQuery {
    /// Create a new lyrics query
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            album: None,
            duration_secs: None,
        }
    }

    /// Set album name
    #[must_use]
    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    /// Set duration
    #[must_use]
    pub const fn with_duration(mut self, duration_secs: u32) -> Self {
        self.duration_secs = Some(duration_secs);
        self
    }
}

impl From<&TrackInfo> for LyricsQuery {
    fn from(track: &TrackInfo) -> Self {
        let mut query = Self::new(&track.title, &track.artist);
        if let Some(album) = &track.album {
            query = query.with_album(album);
        }
        if let Some(duration) = track.duration_secs() {
            query = query.with_duration(duration);
        }
        query
    }
}

/// Result from a lyrics provider
#[derive(Debug, Clone, PartialEq)]
pub enum LyricsResult {
    /// Synchronized lyrics with timing
    Synced(LyricDocument),
    /// Plain text lyrics without timing
    Unsynced(String),
    /// No lyrics found
    NotFound,
}

impl LyricsResult {
    /// Check if lyrics were found
    #[must_use]
    pub const fn is_found(&self) -> bool {
        !matches!(self, Self::NotFound)
    }

    /// Get as `LyricDocument` if synced
    #[must_use]
    pub const fn as_synced(&self) -> Option<&LyricDocument> {
        match self {
            Self::Synced(document) => Some(document),
            _ => None,
        }
    }
}

/// Lyrics with provider metadata
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedLyrics {
    /// The lyrics result
    pub result: LyricsResult,
    /// Provider-specific ID (e.g. LRCLIB's numeric ID as a string)
    pub provider_id: String,
}

/// Trait for online lyrics providers
#[async_trait]
pub trait LyricsProvider: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &'static str;

    /// Fetch lyrics for a query
    async fn fetch(&self, query: &LyricsQuery) -> Result<FetchedLyrics, CoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_from_track_info() {
        let track = TrackInfo::new("Artist", "Song")
            .with_album("Album")
            .with_duration(201.6);
        let query = LyricsQuery::from(&track);

        assert_eq!(query.title, "Song");
        assert_eq!(query.artist, "Artist");
        assert_eq!(query.album.as_deref(), Some("Album"));
        assert_eq!(query.duration_secs, Some(202));
    }

    #[test]
    fn test_query_without_optional_fields() {
        let query = LyricsQuery::from(&TrackInfo::new("Artist", "Song"));
        assert_eq!(query.album, None);
        assert_eq!(query.duration_secs, None);
    }

    #[test]
    fn test_result_accessors() {
        let synced = LyricsResult::Synced(LyricDocument::parse("[00:01.00]hi"));
        assert!(synced.is_found());
        assert_eq!(synced.as_synced().map(|d| d.track.len()), Some(1));

        let plain = LyricsResult::Unsynced("hi".to_string());
        assert!(plain.is_found());
        assert!(plain.as_synced().is_none());

        assert!(!LyricsResult::NotFound.is_found());
    }
}
