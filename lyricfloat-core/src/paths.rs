//! Path constants for configuration, lyrics and log files.

use std::path::PathBuf;

/// The name of the configuration directory under ~/.config/
pub const CONFIG_DIR_NAME: &str = "lyricfloat";

/// The name of the main configuration file
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// The name of the default lyrics folder inside the configuration directory
pub const LYRICS_DIR_NAME: &str = "lyrics";

/// The name of the log file
pub const LOG_FILE_NAME: &str = "lyricfloat.log";

/// Get the configuration directory path (~/.config/lyricfloat/)
#[must_use]
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join(CONFIG_DIR_NAME)
}

/// Get the config file path (~/.config/lyricfloat/config.toml)
#[must_use]
pub fn config_path() -> PathBuf {
    config_dir().join(CONFIG_FILE_NAME)
}

/// Get the default lyrics folder (~/.config/lyricfloat/lyrics/)
#[must_use]
pub fn lyrics_dir() -> PathBuf {
    config_dir().join(LYRICS_DIR_NAME)
}

/// Get the log file path (~/.config/lyricfloat/lyricfloat.log)
#[must_use]
pub fn log_file_path() -> PathBuf {
    config_dir().join(LOG_FILE_NAME)
}
