pub mod bridge;
pub mod clock;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod library;
pub mod lrc;
pub mod paths;
pub mod playback;
pub mod provider;
pub mod service;
pub mod sync;
pub mod time;
pub mod timestamp;

pub use bridge::{BridgeEvent, BridgeWatcher, NowPlayingBridge};
pub use clock::PlaybackClock;
pub use config::{LoggingConfig, LyricFloatConfig, LyricsConfig, PlayerConfig};
pub use error::{CoreError, Result};
pub use fetcher::LyricsFetcher;
pub use library::LyricsLibrary;
pub use lrc::{LrcMetadata, LyricDocument, LyricLine, Track, LYRICS_NOT_FOUND};
pub use paths::{
    config_dir, config_path, log_file_path, lyrics_dir, CONFIG_DIR_NAME, CONFIG_FILE_NAME,
    LOG_FILE_NAME,
};
pub use playback::{NowPlaying, TrackInfo};
pub use provider::{FetchedLyrics, LyricsProvider, LyricsQuery, LyricsResult};
pub use service::{SyncCommand, SyncHandle, SyncService};
pub use sync::{EngineState, OneShot, SyncEngine, SyncEvent};
pub use time::{DurationExt, SecondsExt};
