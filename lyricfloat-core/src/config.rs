use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LyricFloatConfig {
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub lyrics: LyricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Player to follow; empty follows whichever player is active
    #[serde(default)]
    pub identifier: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

const fn default_poll_interval() -> u64 {
    1000
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            identifier: String::new(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl PlayerConfig {
    /// Player identifier, `None` when any player will do
    #[must_use]
    pub fn identifier(&self) -> Option<&str> {
        let identifier = self.identifier.trim();
        (!identifier.is_empty()).then_some(identifier)
    }

    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LyricsConfig {
    /// Folder holding `<Artist> - <Title>.lrc` files; empty uses the default folder
    #[serde(default)]
    pub folder: String,
    /// Seconds added to every elapsed value the clock is seeded with
    #[serde(default)]
    pub global_offset: f64,
    /// Download missing lyrics and save them into the folder
    #[serde(default = "default_true")]
    pub auto_download: bool,
}

const fn default_true() -> bool {
    true
}

impl Default for LyricsConfig {
    fn default() -> Self {
        Self {
            folder: String::new(),
            global_offset: 0.0,
            auto_download: default_true(),
        }
    }
}

impl LyricsConfig {
    /// Resolved lyrics folder
    #[must_use]
    pub fn folder(&self) -> PathBuf {
        let folder = self.folder.trim();
        if folder.is_empty() {
            crate::paths::lyrics_dir()
        } else if let Some(rest) = folder.strip_prefix("~/") {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(rest)
        } else {
            PathBuf::from(folder)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Also write logs to ~/.config/lyricfloat/lyricfloat.log
    #[serde(default)]
    pub enabled: bool,
}

impl LyricFloatConfig {
    /// Get the configuration directory path (~/.config/lyricfloat/)
    #[must_use]
    pub fn config_dir() -> PathBuf {
        crate::paths::config_dir()
    }

    /// Get the config file path (~/.config/lyricfloat/config.toml)
    #[must_use]
    pub fn config_path() -> PathBuf {
        crate::paths::config_path()
    }

    /// Load config from the default path or create the template on first run
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigNotFound`] after writing the template, or an
    /// error if the file cannot be read, parsed or validated.
    pub fn load_or_create() -> Result<Self> {
        Self::load_or_create_at(&Self::config_path())
    }

    /// Load config from `config_path` or create the template there
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigNotFound`] after writing the template, or an
    /// error if the file cannot be read, parsed or validated.
    pub fn load_or_create_at(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            // Create config directory if it doesn't exist
            if let Some(parent) = config_path.parent() {
                fs::create_dir_all(parent)?;
            }

            fs::write(config_path, CONFIG_TEMPLATE)?;

            return Err(CoreError::ConfigNotFound {
                path: config_path.to_path_buf(),
            });
        }

        let content = fs::read_to_string(config_path)?;
        Self::parse(&content)
    }

    /// Parse and validate config text
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML or fails validation.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges the type system cannot express
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigInvalid`] describing the first bad value.
    pub fn validate(&self) -> Result<()> {
        if self.player.poll_interval_ms == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "player.poll_interval_ms must be greater than 0".to_string(),
            });
        }
        if !self.lyrics.global_offset.is_finite() {
            return Err(CoreError::ConfigInvalid {
                message: "lyrics.global_offset must be a finite number of seconds".to_string(),
            });
        }
        Ok(())
    }
}

/// Template written on first run
const CONFIG_TEMPLATE: &str = r#"# lyricfloat Configuration
# ~/.config/lyricfloat/config.toml

[player]
# playerctl player name (e.g. "spotify", "vlc"); empty follows any active player
identifier = ""
# How often the player is polled for track and position changes
poll_interval_ms = 1000

[lyrics]
# Folder holding "<Artist> - <Title>.lrc" files
# Empty uses ~/.config/lyricfloat/lyrics
folder = ""
# Seconds added to the player's position when lyrics are (re)synchronized
# Positive shows lines earlier, negative shows them later
global_offset = 0.0
# Download missing lyrics from lrclib.net and save them into the folder
auto_download = true

[logging]
# Also write logs to ~/.config/lyricfloat/lyricfloat.log
enabled = false
"#;
