//! `[mm:ss.xx]` time tag codec.
//!
//! Tags are converted to and from floating-point seconds relative to the start
//! of the track. Parsing accepts any digit width for each component; formatting
//! always produces two-digit minutes, seconds and hundredths.

use std::ops::Range;

/// Parse the body of a time tag (`mm:ss.fraction`, without brackets).
///
/// Returns `None` if a component is empty or non-numeric, or if either
/// separator is missing.
#[must_use]
pub fn parse(tag: &str) -> Option<f64> {
    let (minutes, seconds_part) = tag.split_once(':')?;
    let (seconds, fraction) = seconds_part.split_once('.')?;

    if !is_digits(minutes) || !is_digits(seconds) || !is_digits(fraction) {
        return None;
    }

    let minutes: f64 = minutes.parse().ok()?;
    // `ss.fraction` is a plain decimal once the components are validated
    let seconds: f64 = seconds_part.parse().ok()?;

    Some(minutes.mul_add(60.0, seconds))
}

/// Format seconds as a tag body `mm:ss.xx`.
///
/// Values are rounded to the nearest hundredth. Negative and non-finite input
/// formats as `00:00.00`.
#[must_use]
pub fn format(seconds: f64) -> String {
    // Saturating float-to-int cast; negative values were clamped above
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let hundredths = if seconds.is_finite() && seconds > 0.0 {
        (seconds * 100.0).round() as u64
    } else {
        0
    };

    let minutes = hundredths / 6000;
    let secs = (hundredths / 100) % 60;
    let fraction = hundredths % 100;

    format!("{minutes:02}:{secs:02}.{fraction:02}")
}

/// Format seconds as a complete bracketed tag `[mm:ss.xx]`.
#[must_use]
pub fn format_tag(seconds: f64) -> String {
    format!("[{}]", format(seconds))
}

/// Find the first `[digits:digits.digits]` tag in a line.
///
/// Returns the parsed seconds and the byte range of the whole tag, brackets
/// included. Bracketed text that is not a time tag (metadata, annotations) is
/// skipped.
#[must_use]
pub fn find_tag(line: &str) -> Option<(f64, Range<usize>)> {
    let mut search_from = 0;

    while let Some(offset) = line[search_from..].find('[') {
        let open = search_from + offset;
        let close = open + 1 + line[open + 1..].find(']')?;

        if let Some(seconds) = parse(&line[open + 1..close]) {
            return Some((seconds, open..close + 1));
        }

        search_from = open + 1;
    }

    None
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_standard_tag() {
        assert_eq!(parse("01:02.50"), Some(62.5));
    }

    #[test]
    fn test_parse_variable_width() {
        assert_eq!(parse("0:5.1"), Some(5.1));
        assert_eq!(parse("123:04.5"), Some(7384.5));
        let value = parse("00:12.345").unwrap();
        assert!((value - 12.345).abs() < 1e-9);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(parse("00:12"), None);
        assert_eq!(parse("00.12.34"), None);
        assert_eq!(parse("ar:Artist"), None);
        assert_eq!(parse("0a:12.34"), None);
        assert_eq!(parse(":12.34"), None);
        assert_eq!(parse("00:12."), None);
        assert_eq!(parse("00:-1.00"), None);
        assert_eq!(parse(""), None);
    }

    #[test]
    fn test_format_pads_components() {
        assert_eq!(format(0.0), "00:00.00");
        assert_eq!(format(5.1), "00:05.10");
        assert_eq!(format(62.5), "01:02.50");
        assert_eq!(format(600.0), "10:00.00");
    }

    #[test]
    fn test_format_rounds_to_hundredths() {
        assert_eq!(format(59.996), "01:00.00");
        assert_eq!(format(1.234), "00:01.23");
    }

    #[test]
    fn test_format_clamps_negative() {
        assert_eq!(format(-3.0), "00:00.00");
        assert_eq!(format(f64::NAN), "00:00.00");
    }

    #[test]
    fn test_format_tag() {
        assert_eq!(format_tag(10.0), "[00:10.00]");
    }

    #[test]
    fn test_round_trip_within_a_hundredth() {
        let mut x = 0.0;
        while x < 4000.0 {
            let parsed = parse(&format(x)).unwrap();
            assert!((parsed - x).abs() <= 0.01, "{x} came back as {parsed}");
            x += 1.337;
        }
    }

    #[test]
    fn test_find_tag_at_line_start() {
        let (seconds, range) = find_tag("[00:10.00]Hello").unwrap();
        assert_eq!(seconds, 10.0);
        assert_eq!(range, 0..10);
    }

    #[test]
    fn test_find_tag_skips_non_time_brackets() {
        let line = "[chorus] [00:03.50]Sing";
        let (seconds, range) = find_tag(line).unwrap();
        assert_eq!(seconds, 3.5);
        assert_eq!(&line[range], "[00:03.50]");
    }

    #[test]
    fn test_find_tag_returns_first_of_many() {
        let (seconds, _) = find_tag("[00:01.00][00:02.00]Twice").unwrap();
        assert_eq!(seconds, 1.0);
    }

    #[test]
    fn test_find_tag_none() {
        assert!(find_tag("[ar:Someone]").is_none());
        assert!(find_tag("plain text").is_none());
        assert!(find_tag("[00:01.00").is_none());
    }
}
