//! Panel commands typed on stdin.

use lyricfloat_core::timestamp;
use thiserror::Error;

/// Seconds moved by the fast-forward and rewind keys
pub const NUDGE_STEP_SECS: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PanelCommand {
    /// Shift the displayed position by the given seconds
    Nudge(f64),
    /// Jump to an absolute position in seconds
    Calibrate(f64),
    /// Ask the player for its position and re-sync
    RecalibrateNow,
    /// Replace the global offset in seconds
    SetOffset(f64),
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command '{0}' (f/+ forward, b/- back, <seconds> nudge, c <time> calibrate, o <seconds> offset, r resync, q quit)")]
    Unknown(String),

    #[error("'{0}' is not a time; use seconds (83.5) or mm:ss.xx (01:23.50)")]
    InvalidTime(String),

    #[error("'{0}' is not an offset; use signed seconds (-0.5)")]
    InvalidOffset(String),
}

/// Parse one input line. Blank lines yield `Ok(None)`.
///
/// # Errors
///
/// Returns an error for unknown commands or malformed times.
pub fn parse(line: &str) -> Result<Option<PanelCommand>, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let command = match line {
        "f" | "+" => PanelCommand::Nudge(NUDGE_STEP_SECS),
        "b" | "-" => PanelCommand::Nudge(-NUDGE_STEP_SECS),
        "r" => PanelCommand::RecalibrateNow,
        "q" | "quit" => PanelCommand::Quit,
        _ => {
            if let Some(time) = line.strip_prefix("c ") {
                PanelCommand::Calibrate(parse_time(time.trim())?)
            } else if let Some(offset) = line.strip_prefix("o ") {
                let offset = offset.trim();
                PanelCommand::SetOffset(
                    parse_signed(offset)
                        .ok_or_else(|| CommandError::InvalidOffset(offset.to_string()))?,
                )
            } else if let Some(delta) = parse_signed(line) {
                PanelCommand::Nudge(delta)
            } else {
                return Err(CommandError::Unknown(line.to_string()));
            }
        }
    };

    Ok(Some(command))
}

/// Finite signed seconds like `+0.5` or `-2`
fn parse_signed(input: &str) -> Option<f64> {
    input.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Absolute time as plain seconds or `mm:ss.xx`
fn parse_time(input: &str) -> Result<f64, CommandError> {
    parse_signed(input)
        .filter(|v| *v >= 0.0)
        .or_else(|| timestamp::parse(input))
        .ok_or_else(|| CommandError::InvalidTime(input.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_key_commands() {
        assert_eq!(parse("f"), Ok(Some(PanelCommand::Nudge(1.0))));
        assert_eq!(parse("+"), Ok(Some(PanelCommand::Nudge(1.0))));
        assert_eq!(parse(" b "), Ok(Some(PanelCommand::Nudge(-1.0))));
        assert_eq!(parse("-"), Ok(Some(PanelCommand::Nudge(-1.0))));
        assert_eq!(parse("r"), Ok(Some(PanelCommand::RecalibrateNow)));
        assert_eq!(parse("q"), Ok(Some(PanelCommand::Quit)));
    }

    #[test]
    fn test_blank_line() {
        assert_eq!(parse("   "), Ok(None));
    }

    #[test]
    fn test_free_form_nudge() {
        assert_eq!(parse("+0.25"), Ok(Some(PanelCommand::Nudge(0.25))));
        assert_eq!(parse("-3"), Ok(Some(PanelCommand::Nudge(-3.0))));
        assert_eq!(parse("1.5"), Ok(Some(PanelCommand::Nudge(1.5))));
    }

    #[test]
    fn test_calibrate() {
        assert_eq!(parse("c 83.5"), Ok(Some(PanelCommand::Calibrate(83.5))));
        assert_eq!(parse("c 01:23.50"), Ok(Some(PanelCommand::Calibrate(83.5))));
        assert_eq!(
            parse("c -4"),
            Err(CommandError::InvalidTime("-4".to_string()))
        );
        assert_eq!(
            parse("c soon"),
            Err(CommandError::InvalidTime("soon".to_string()))
        );
    }

    #[test]
    fn test_offset() {
        assert_eq!(parse("o -0.5"), Ok(Some(PanelCommand::SetOffset(-0.5))));
        assert_eq!(parse("o 2"), Ok(Some(PanelCommand::SetOffset(2.0))));
        assert_eq!(
            parse("o later"),
            Err(CommandError::InvalidOffset("later".to_string()))
        );
    }

    #[test]
    fn test_unknown_and_non_finite() {
        assert_eq!(parse("x"), Err(CommandError::Unknown("x".to_string())));
        assert_eq!(parse("inf"), Err(CommandError::Unknown("inf".to_string())));
        assert_eq!(parse("NaN"), Err(CommandError::Unknown("NaN".to_string())));
    }
}
