//! Now-playing bridge backed by the `playerctl` command-line tool (MPRIS).

use async_trait::async_trait;
use lyricfloat_core::{CoreError, NowPlaying, NowPlayingBridge, TrackInfo};
use tokio::process::Command;
use tracing::{debug, trace};

const PLAYERCTL: &str = "playerctl";

/// Tab-separated metadata line; `position` and `mpris:length` are microseconds
const METADATA_FORMAT: &str =
    "{{status}}\t{{artist}}\t{{title}}\t{{album}}\t{{position}}\t{{mpris:length}}";

const MICROS_PER_SEC: f64 = 1_000_000.0;

/// Queries `playerctl metadata` on every poll
pub struct PlayerctlBridge {
    player: Option<String>,
}

impl PlayerctlBridge {
    /// Follow `player` (a playerctl player name) or whichever player is active
    #[must_use]
    pub fn new(player: Option<&str>) -> Self {
        Self {
            player: player.map(str::to_string),
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(PLAYERCTL);
        if let Some(player) = &self.player {
            command.arg(format!("--player={player}"));
        }
        command
            .arg("metadata")
            .arg("--format")
            .arg(METADATA_FORMAT)
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl NowPlayingBridge for PlayerctlBridge {
    fn name(&self) -> &'static str {
        "playerctl"
    }

    async fn now_playing(&self) -> Result<Option<NowPlaying>, CoreError> {
        let output = self
            .command()
            .output()
            .await
            .map_err(|e| CoreError::BridgeUnavailable {
                bridge: self.name().to_string(),
                reason: format!("failed to run {PLAYERCTL}: {e}"),
            })?;

        if !output.status.success() {
            // "No players found" and friends
            trace!(
                "{} exited with {}: {}",
                PLAYERCTL,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Ok(None);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let now_playing = stdout.lines().next().and_then(parse_status_line);
        if now_playing.is_none() {
            debug!("Unusable {} output: {:?}", PLAYERCTL, stdout.trim());
        }
        Ok(now_playing)
    }
}

/// Parse one line produced with [`METADATA_FORMAT`].
///
/// Returns `None` for stopped players and for tracks without a title.
fn parse_status_line(line: &str) -> Option<NowPlaying> {
    let mut fields = line.split('\t');
    let status = fields.next()?.trim();
    let artist = fields.next()?.trim();
    let title = fields.next()?.trim();
    let album = fields.next().unwrap_or_default().trim();
    let position = fields.next().and_then(parse_micros);
    let length = fields.next().and_then(parse_micros);

    let is_playing = match status {
        "Playing" => true,
        "Paused" => false,
        _ => return None,
    };
    if title.is_empty() {
        return None;
    }

    let mut track = TrackInfo::new(artist, title);
    if !album.is_empty() {
        track = track.with_album(album);
    }
    if let Some(length) = length.filter(|l| *l > 0.0) {
        track = track.with_duration(length);
    }

    Some(NowPlaying::new(track, position.unwrap_or(0.0), is_playing))
}

fn parse_micros(field: &str) -> Option<f64> {
    field
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|micros| micros / MICROS_PER_SEC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_playing_line() {
        let now_playing =
            parse_status_line("Playing\tDaft Punk\tOne More Time\tDiscovery\t12500000\t320357000")
                .unwrap();

        assert!(now_playing.is_playing);
        assert_eq!(now_playing.track.artist, "Daft Punk");
        assert_eq!(now_playing.track.title, "One More Time");
        assert_eq!(now_playing.track.album.as_deref(), Some("Discovery"));
        assert!((now_playing.elapsed - 12.5).abs() < 1e-9);
        assert_eq!(now_playing.track.duration_secs(), Some(320));
    }

    #[test]
    fn test_parse_paused_without_optional_fields() {
        let now_playing = parse_status_line("Paused\tArtist\tTitle\t\t\t").unwrap();

        assert!(!now_playing.is_playing);
        assert_eq!(now_playing.track.album, None);
        assert_eq!(now_playing.track.duration, None);
        assert!(now_playing.elapsed.abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_rejects_stopped_and_untitled() {
        assert!(parse_status_line("Stopped\tArtist\tTitle\t\t0\t0").is_none());
        assert!(parse_status_line("Playing\tArtist\t\t\t0\t0").is_none());
        assert!(parse_status_line("No players found").is_none());
    }

    #[test]
    fn test_command_arguments() {
        let bridge = PlayerctlBridge::new(Some("spotify"));
        let command = bridge.command();
        let args: Vec<_> = command
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec!["--player=spotify", "metadata", "--format", METADATA_FORMAT]
        );
    }
}
