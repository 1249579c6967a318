//! Line-level LRC documents.
//!
//! A lyric file is split into two independent views: the [`Track`], the
//! time-sorted lines the sync engine walks through, and the [`LrcMetadata`]
//! read from `[key:value]` header lines.

use crate::timestamp;
use std::fmt::Write as _;

/// Text of the second placeholder line shown when no lyrics are available
pub const LYRICS_NOT_FOUND: &str = "Lyrics not found";

/// A single timed line of lyrics
#[derive(Debug, Clone, PartialEq)]
pub struct LyricLine {
    /// Position of the line in the original file
    pub sequence_index: usize,
    pub text: String,
    /// Seconds from track start at which the line becomes current
    pub timestamp: f64,
    /// Shares its timestamp with the preceding line (secondary rendering)
    pub is_translation: bool,
    /// Set by the sync engine on the line currently being shown
    pub is_current: bool,
}

/// Time-sorted lyric lines parsed from one lyric file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Track {
    lines: Vec<LyricLine>,
    placeholder: bool,
}

impl Track {
    /// Parse lyric text into a track.
    ///
    /// Lines without a `[mm:ss.xx]` tag are dropped. Only the first tag of a
    /// line is used. The text is what remains once the tag is removed, with
    /// surrounding whitespace trimmed (`[00:01.00] Hello` is `Hello`). Lines
    /// are stably sorted by timestamp and a line with the same timestamp as
    /// its predecessor is marked as a translation.
    #[must_use]
    pub fn parse(content: &str) -> Self {
        let normalized = strip_bom(content).replace("\r\n", "\n");

        let mut lines: Vec<LyricLine> = normalized
            .split('\n')
            .filter_map(|line| {
                let (timestamp, range) = timestamp::find_tag(line)?;
                let mut text = String::with_capacity(line.len() - range.len());
                text.push_str(&line[..range.start]);
                text.push_str(&line[range.end..]);
                Some((timestamp, text.trim().to_string()))
            })
            .enumerate()
            .map(|(sequence_index, (timestamp, text))| LyricLine {
                sequence_index,
                text,
                timestamp,
                is_translation: false,
                is_current: false,
            })
            .collect();

        // `sort_by` is stable, so lines sharing a timestamp keep file order
        lines.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));

        for i in 1..lines.len() {
            #[allow(clippy::float_cmp)]
            let same_instant = lines[i].timestamp == lines[i - 1].timestamp;
            lines[i].is_translation = same_instant;
        }

        Self {
            lines,
            placeholder: false,
        }
    }

    /// Two-line track shown when no lyrics are available for a song.
    #[must_use]
    pub fn placeholder(artist: &str, title: &str) -> Self {
        let lines = [format!("{artist} - {title}"), LYRICS_NOT_FOUND.to_string()]
            .into_iter()
            .enumerate()
            .map(|(sequence_index, text)| LyricLine {
                sequence_index,
                text,
                timestamp: 0.0,
                is_translation: sequence_index > 0,
                is_current: false,
            })
            .collect();

        Self {
            lines,
            placeholder: true,
        }
    }

    /// Parse lyric text, falling back to the placeholder when nothing parses.
    #[must_use]
    pub fn parse_or_placeholder(content: &str, artist: &str, title: &str) -> Self {
        let track = Self::parse(content);
        if track.is_empty() {
            Self::placeholder(artist, title)
        } else {
            track
        }
    }

    #[must_use]
    pub fn lines(&self) -> &[LyricLine] {
        &self.lines
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&LyricLine> {
        self.lines.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    #[must_use]
    pub const fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    /// Index of the first line whose timestamp is at or after `elapsed`.
    ///
    /// Returns `len()` when every line is already in the past.
    #[must_use]
    pub fn seek(&self, elapsed: f64) -> usize {
        self.lines.partition_point(|line| line.timestamp < elapsed)
    }

    /// Translation lines riding along with the primary line at `index`.
    #[must_use]
    pub fn translations(&self, index: usize) -> &[LyricLine] {
        let start = (index + 1).min(self.lines.len());
        let end = self.lines[start..]
            .iter()
            .position(|line| !line.is_translation)
            .map_or(self.lines.len(), |offset| start + offset);
        &self.lines[start..end]
    }

    /// Index of the line flagged as current, if any.
    #[must_use]
    pub fn current_index(&self) -> Option<usize> {
        self.lines.iter().position(|line| line.is_current)
    }

    /// Flag the line at `index` as current and every other line as not current.
    pub(crate) fn set_current(&mut self, index: Option<usize>) {
        for (i, line) in self.lines.iter_mut().enumerate() {
            line.is_current = Some(i) == index;
        }
    }
}

/// Metadata from `[key:value]` header lines
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LrcMetadata {
    pub artist: Option<String>,
    pub title: Option<String>,
    pub album: Option<String>,
    /// Creator of the lyric file
    pub by: Option<String>,
    pub translator: Option<String>,
    /// Remote song id used by the online update check
    pub song_id: Option<u64>,
    /// Revision of the remote lyrics the file was saved from
    pub version: Option<u32>,
}

impl LrcMetadata {
    /// Extract metadata tags from lyric text. Unknown keys are ignored.
    #[must_use]
    pub fn parse(content: &str) -> Self {
        let mut metadata = Self::default();

        for line in strip_bom(content).lines() {
            let Some((key, value)) = parse_id_tag(line.trim()) else {
                continue;
            };

            match key.to_lowercase().as_str() {
                "ar" => metadata.artist = Some(value.to_string()),
                "ti" => metadata.title = Some(value.to_string()),
                "al" => metadata.album = Some(value.to_string()),
                "by" => metadata.by = Some(value.to_string()),
                "trans" => metadata.translator = Some(value.to_string()),
                "song_id" => metadata.song_id = value.parse().ok(),
                "version" => metadata.version = value.parse().ok(),
                _ => {}
            }
        }

        metadata
    }

    fn write_tags(&self, out: &mut String) {
        let text_tags = [
            ("ar", &self.artist),
            ("ti", &self.title),
            ("al", &self.album),
            ("by", &self.by),
            ("trans", &self.translator),
        ];
        for (key, value) in text_tags {
            if let Some(value) = value {
                let _ = writeln!(out, "[{key}:{value}]");
            }
        }
        if let Some(song_id) = self.song_id {
            let _ = writeln!(out, "[song_id:{song_id}]");
        }
        if let Some(version) = self.version {
            let _ = writeln!(out, "[version:{version}]");
        }
    }
}

/// A whole lyric file: metadata plus the timed track
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LyricDocument {
    pub metadata: LrcMetadata,
    pub track: Track,
}

impl LyricDocument {
    #[must_use]
    pub fn parse(content: &str) -> Self {
        Self {
            metadata: LrcMetadata::parse(content),
            track: Track::parse(content),
        }
    }

    /// Serialize back to LRC text with LF line endings.
    ///
    /// Lines are written in track order, so a saved document parses back to
    /// the same track. Timestamps are rounded to hundredths; a primary line
    /// that would round onto the previous line's tag is pushed a hundredth
    /// later so it does not come back as a translation. Translations reuse
    /// their primary line's tag.
    #[must_use]
    pub fn to_lrc_string(&self) -> String {
        let mut out = String::new();
        self.metadata.write_tags(&mut out);

        let mut previous: Option<f64> = None;
        for line in self.track.lines() {
            let written = match previous {
                Some(previous) if line.is_translation => previous,
                Some(previous) => round_to_hundredths(line.timestamp).max(previous + 0.01),
                None => round_to_hundredths(line.timestamp),
            };
            previous = Some(written);
            let _ = writeln!(out, "{}{}", timestamp::format_tag(written), line.text);
        }
        out
    }
}

fn round_to_hundredths(seconds: f64) -> f64 {
    (seconds * 100.0).round() / 100.0
}

/// Drop a leading UTF-8 byte-order mark
fn strip_bom(content: &str) -> &str {
    content.strip_prefix('\u{feff}').unwrap_or(content)
}

/// Parse an ID tag like `[ti:Title]` or `[ar:Artist]`
fn parse_id_tag(line: &str) -> Option<(&str, &str)> {
    let content = line.strip_prefix('[')?.strip_suffix(']')?;
    let (key, value) = content.split_once(':')?;

    // A numeric key is a time tag, not an ID tag
    if key.is_empty() || key.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    Some((key.trim(), value.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(track: &Track) -> Vec<&str> {
        track.lines().iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn test_parse_simple_line() {
        let track = Track::parse("[00:12.34]Hello world");
        assert_eq!(track.len(), 1);
        assert!((track.lines()[0].timestamp - 12.34).abs() < 1e-9);
        assert_eq!(track.lines()[0].text, "Hello world");
        assert!(!track.is_placeholder());
    }

    #[test]
    fn test_same_timestamp_marks_translation() {
        let track = Track::parse("[00:10.00]Hello\n[00:10.00]Bonjour\n");
        assert_eq!(track.len(), 2);
        assert_eq!(track.lines()[0].sequence_index, 0);
        assert_eq!(track.lines()[1].sequence_index, 1);
        assert!(!track.lines()[0].is_translation);
        assert!(track.lines()[1].is_translation);
        assert_eq!(track.lines()[0].timestamp, 10.0);
        assert_eq!(track.lines()[1].timestamp, 10.0);
    }

    #[test]
    fn test_translation_uses_parsed_value_not_text() {
        let track = Track::parse("[00:10.0]Hello\n[0:10.00]Bonjour");
        assert!(track.lines()[1].is_translation);
    }

    #[test]
    fn test_lines_sorted_by_timestamp() {
        let track = Track::parse("[00:20.00]c\n[00:05.00]a\n[00:15.00]b");
        let stamps: Vec<f64> = track.lines().iter().map(|l| l.timestamp).collect();
        assert_eq!(stamps, vec![5.0, 15.0, 20.0]);
        assert_eq!(texts(&track), vec!["a", "b", "c"]);
        // File order is kept in the sequence index
        let sequence: Vec<usize> = track.lines().iter().map(|l| l.sequence_index).collect();
        assert_eq!(sequence, vec![1, 2, 0]);
    }

    #[test]
    fn test_ties_keep_file_order_after_sort() {
        let track = Track::parse("[00:09.00]late\n[00:03.00]first\n[00:03.00]second");
        assert_eq!(texts(&track), vec!["first", "second", "late"]);
        assert!(track.lines()[1].is_translation);
        assert!(!track.lines()[2].is_translation);
    }

    #[test]
    fn test_crlf_normalized() {
        let track = Track::parse("[00:01.00]One\r\n[00:02.00]Two\r\n");
        assert_eq!(texts(&track), vec!["One", "Two"]);
    }

    #[test]
    fn test_byte_order_mark_ignored() {
        let track = Track::parse("\u{feff}[00:01.00]Hi");
        assert_eq!(texts(&track), vec!["Hi"]);

        let document = LyricDocument::parse("\u{feff}[ar:Band]\r\n[00:01.00]Hi\r\n");
        assert_eq!(document.metadata.artist.as_deref(), Some("Band"));
        assert_eq!(texts(&document.track), vec!["Hi"]);
    }

    #[test]
    fn test_text_around_tag_is_trimmed() {
        let track = Track::parse("[00:01.00] Hello there  \n  [00:02.00]\tSecond");
        assert_eq!(texts(&track), vec!["Hello there", "Second"]);
    }

    #[test]
    fn test_metadata_and_malformed_lines_dropped() {
        let input = "[ar:Artist]\n[ti:Title]\n[song_id:42]\n[00:12]no fraction\n\
                     plain words\n[00:01.00]Kept";
        let track = Track::parse(input);
        assert_eq!(texts(&track), vec!["Kept"]);
        assert_eq!(track.lines()[0].sequence_index, 0);
    }

    #[test]
    fn test_only_first_tag_stripped() {
        let track = Track::parse("[00:01.00][00:05.00]Echo");
        assert_eq!(track.len(), 1);
        assert_eq!(track.lines()[0].timestamp, 1.0);
        assert_eq!(track.lines()[0].text, "[00:05.00]Echo");
    }

    #[test]
    fn test_empty_text_allowed() {
        let track = Track::parse("[00:30.00]");
        assert_eq!(track.len(), 1);
        assert_eq!(track.lines()[0].text, "");
    }

    #[test]
    fn test_empty_content_is_empty_track() {
        assert!(Track::parse("").is_empty());
        assert!(Track::parse("[ar:Nobody]\nno tags here").is_empty());
    }

    #[test]
    fn test_placeholder_for_empty_content() {
        let track = Track::parse_or_placeholder("", "Artist", "Title");
        assert!(track.is_placeholder());
        assert_eq!(texts(&track), vec!["Artist - Title", LYRICS_NOT_FOUND]);
        assert!(track.lines()[1].is_translation);
    }

    #[test]
    fn test_parse_or_placeholder_keeps_real_lyrics() {
        let track = Track::parse_or_placeholder("[00:01.00]Hi", "Artist", "Title");
        assert!(!track.is_placeholder());
        assert_eq!(texts(&track), vec!["Hi"]);
    }

    #[test]
    fn test_seek_first_at_or_after() {
        let track = Track::parse("[00:05.00]a\n[00:10.00]b\n[00:15.00]c\n[00:20.00]d");
        assert_eq!(track.seek(12.0), 2);
        assert_eq!(track.seek(10.0), 1);
        assert_eq!(track.seek(0.0), 0);
        assert_eq!(track.seek(25.0), 4);
    }

    #[test]
    fn test_seek_lands_on_primary_line() {
        let track = Track::parse("[00:05.00]a\n[00:05.00]a'\n[00:08.00]b");
        assert_eq!(track.seek(5.0), 0);
        assert_eq!(track.seek(6.0), 2);
    }

    #[test]
    fn test_translations_of_primary() {
        let track = Track::parse("[00:01.00]a\n[00:01.00]a1\n[00:01.00]a2\n[00:02.00]b");
        let translations: Vec<&str> = track.translations(0).iter().map(|l| l.text.as_str()).collect();
        assert_eq!(translations, vec!["a1", "a2"]);
        assert!(track.translations(3).is_empty());
        assert!(track.translations(10).is_empty());
    }

    #[test]
    fn test_set_current_is_exclusive() {
        let mut track = Track::parse("[00:01.00]a\n[00:02.00]b");
        track.set_current(Some(0));
        track.set_current(Some(1));
        assert_eq!(track.current_index(), Some(1));
        assert!(!track.lines()[0].is_current);
        track.set_current(None);
        assert_eq!(track.current_index(), None);
    }

    #[test]
    fn test_parse_metadata() {
        let input = "[ar:Artist Name]\n[ti:Song Title]\n[al:Album]\n[by:someone]\n\
                     [trans:translator]\n[song_id:12345]\n[version:3]\n[00:01.00]x";
        let metadata = LrcMetadata::parse(input);
        assert_eq!(metadata.artist.as_deref(), Some("Artist Name"));
        assert_eq!(metadata.title.as_deref(), Some("Song Title"));
        assert_eq!(metadata.album.as_deref(), Some("Album"));
        assert_eq!(metadata.by.as_deref(), Some("someone"));
        assert_eq!(metadata.translator.as_deref(), Some("translator"));
        assert_eq!(metadata.song_id, Some(12345));
        assert_eq!(metadata.version, Some(3));
    }

    #[test]
    fn test_parse_metadata_invalid_integer() {
        let metadata = LrcMetadata::parse("[song_id:abc]\n[version:]");
        assert_eq!(metadata.song_id, None);
        assert_eq!(metadata.version, None);
    }

    #[test]
    fn test_document_serialization_reparses() {
        let input = "[ti:Song]\r\n[ar:Band]\r\n[song_id:7]\r\n[00:02.50]Line two\r\n\
                     [00:01.00]Line one\r\n[00:01.00]Ligne un\r\n";
        let document = LyricDocument::parse(input);
        let saved = document.to_lrc_string();

        assert!(saved.starts_with("[ar:Band]\n[ti:Song]\n[song_id:7]\n"));
        assert!(saved.contains("[00:01.00]Line one\n[00:01.00]Ligne un\n[00:02.50]Line two\n"));

        let reparsed = LyricDocument::parse(&saved);
        assert_eq!(reparsed.metadata, document.metadata);
        assert_eq!(texts(&reparsed.track), texts(&document.track));
        assert!(reparsed.track.lines()[1].is_translation);
    }

    #[test]
    fn test_serialization_keeps_close_primaries_apart() {
        let document =
            LyricDocument::parse("[00:01.000]a\n[00:01.000]a'\n[00:01.004]b\n[00:01.01]c");
        assert!(!document.track.lines()[2].is_translation);

        let saved = document.to_lrc_string();
        assert_eq!(saved, "[00:01.00]a\n[00:01.00]a'\n[00:01.01]b\n[00:01.02]c\n");

        let flags: Vec<bool> = LyricDocument::parse(&saved)
            .track
            .lines()
            .iter()
            .map(|l| l.is_translation)
            .collect();
        assert_eq!(flags, vec![false, true, false, false]);
    }
}
