//! Terminal rendering of the floating lyrics panel.

use lyricfloat_core::{timestamp, SyncEvent, Track};
use std::fmt::Write as _;

/// Primary lines shown before and after the current one
pub const CONTEXT_LINES: usize = 2;

/// How a panel row is emphasized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineRole {
    Context,
    Current,
    Translation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelLine {
    pub text: String,
    pub role: LineRole,
}

/// Panel state rebuilt from [`SyncEvent`]s
#[derive(Debug, Default)]
pub struct LyricsView {
    track: Option<Track>,
    current: Option<usize>,
    elapsed: f64,
    finished: bool,
}

impl LyricsView {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an event. Returns whether the panel needs redrawing.
    pub fn apply(&mut self, event: &SyncEvent) -> bool {
        match event {
            SyncEvent::TrackLoaded { track } => {
                self.track = Some(track.clone());
                self.current = None;
                self.elapsed = 0.0;
                self.finished = false;
            }
            SyncEvent::LineChanged { index, .. } => {
                self.current = Some(*index);
            }
            SyncEvent::Progress { elapsed } => {
                let changed = timestamp::format(*elapsed) != timestamp::format(self.elapsed);
                self.elapsed = *elapsed;
                return changed && self.track.is_some();
            }
            SyncEvent::Finished => self.finished = true,
            SyncEvent::Stopped => {
                if self.track.is_none() {
                    return false;
                }
                self.track = None;
                self.current = None;
                self.elapsed = 0.0;
                self.finished = false;
            }
        }
        true
    }

    /// Rows around the current line: earlier primaries, the current line with
    /// its translations, then upcoming primaries.
    #[must_use]
    pub fn visible_lines(&self, context: usize) -> Vec<PanelLine> {
        let Some(track) = &self.track else {
            return Vec::new();
        };
        let lines = track.lines();
        let primaries: Vec<usize> = (0..lines.len())
            .filter(|&i| !lines[i].is_translation)
            .collect();

        // Before the first line fires, the first primary is "upcoming"
        let position = self
            .current
            .and_then(|current| primaries.iter().position(|&i| i == current));

        let (before, after_start) = match position {
            Some(pos) => (&primaries[pos.saturating_sub(context)..pos], pos + 1),
            None => (&primaries[..0], 0),
        };
        let after = &primaries[after_start.min(primaries.len())..];

        let mut rows: Vec<PanelLine> = before
            .iter()
            .map(|&i| PanelLine {
                text: lines[i].text.clone(),
                role: LineRole::Context,
            })
            .collect();

        if let Some(current) = position.map(|pos| primaries[pos]) {
            rows.push(PanelLine {
                text: lines[current].text.clone(),
                role: LineRole::Current,
            });
            rows.extend(track.translations(current).iter().map(|line| PanelLine {
                text: line.text.clone(),
                role: LineRole::Translation,
            }));
        }

        rows.extend(after.iter().take(context).map(|&i| PanelLine {
            text: lines[i].text.clone(),
            role: LineRole::Context,
        }));
        rows
    }

    /// Full panel as terminal text, ANSI styled
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        if self.track.is_none() {
            out.push_str("\x1b[2m(nothing playing)\x1b[0m\n");
            return out;
        }

        for line in self.visible_lines(CONTEXT_LINES) {
            let _ = match line.role {
                LineRole::Current => writeln!(out, "\x1b[1m> {}\x1b[0m", line.text),
                LineRole::Translation => writeln!(out, "\x1b[3m  {}\x1b[0m", line.text),
                LineRole::Context => writeln!(out, "\x1b[2m  {}\x1b[0m", line.text),
            };
        }

        let status = if self.finished { " (end)" } else { "" };
        let _ = writeln!(out, "\n[{}]{}", timestamp::format(self.elapsed), status);
        out
    }
}
