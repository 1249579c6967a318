use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    // Configuration errors
    #[error("Config file not found at {path}. A template has been created - edit it and restart to change the defaults.")]
    ConfigNotFound { path: PathBuf },

    #[error("Invalid config: {message}")]
    ConfigInvalid { message: String },

    #[error("Failed to parse config file: {0}")]
    ConfigParseError(#[from] toml::de::Error),

    // Lyrics errors
    #[error("Lyrics provider {provider} failed: {reason}")]
    LyricsProviderFailed { provider: String, reason: String },

    // Now-playing bridge errors
    #[error("Now-playing bridge {bridge} unavailable: {reason}")]
    BridgeUnavailable { bridge: String, reason: String },

    // Sync service errors
    #[error("Sync engine is no longer running")]
    EngineStopped,

    // Network errors
    #[error("Network request failed: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Network middleware failed: {0}")]
    MiddlewareError(#[from] reqwest_middleware::Error),

    // IO errors
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
