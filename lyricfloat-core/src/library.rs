//! Local lyric files, one `<Artist> - <Title>.lrc` per song.

use crate::error::Result;
use crate::lrc::LyricDocument;
use crate::playback::TrackInfo;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Extension of lyric files in the library folder
pub const LYRICS_FILE_EXTENSION: &str = "lrc";

/// Folder of lyric files keyed by artist and title
#[derive(Debug, Clone)]
pub struct LyricsLibrary {
    folder: PathBuf,
}

impl LyricsLibrary {
    /// Create a library rooted at `folder` (created lazily on first save)
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    #[must_use]
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Path of the lyric file for `track`
    #[must_use]
    pub fn path_for(&self, track: &TrackInfo) -> PathBuf {
        self.folder.join(file_name(track))
    }

    /// Read and parse the lyric file for `track`.
    ///
    /// Returns `Ok(None)` when there is no file for the song.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub async fn load(&self, track: &TrackInfo) -> Result<Option<LyricDocument>> {
        let path = self.path_for(track);
        let content = match tokio::fs::read(&path).await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No lyric file at {}", path.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let document = LyricDocument::parse(&content);
        info!(
            "Loaded {} lyric lines from {}",
            document.track.len(),
            path.display()
        );
        Ok(Some(document))
    }

    /// Write `document` as the lyric file for `track`, replacing any existing one.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be created or the file written.
    pub async fn save(&self, track: &TrackInfo, document: &LyricDocument) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.folder).await?;
        let path = self.path_for(track);
        tokio::fs::write(&path, document.to_lrc_string()).await?;
        info!("Saved lyrics to {}", path.display());
        Ok(path)
    }
}

/// `<Artist> - <Title>.lrc` with characters unsafe in file names replaced by `_`
fn file_name(track: &TrackInfo) -> String {
    format!(
        "{} - {}.{}",
        sanitize(&track.artist),
        sanitize(&track.title),
        LYRICS_FILE_EXTENSION
    )
}

fn sanitize(component: &str) -> String {
    let cleaned: String = component
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    // Leading dots would hide the file or escape the folder
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned.to_string()
    }
}
