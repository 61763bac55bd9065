//! Plain line-array document model.
//!
//! [`LineDocument`] is the virtual document the plain replayer mutates while walking a trace.
//! Splicing mirrors what an editor's own "replace range" does, but runs against a bare
//! `Vec<String>` so that a long seek costs one pass over the trace and one commit to the
//! live widget, instead of one widget update per recorded edit.
//!
//! Positions are never rejected: lines past the end clamp to the end of the document and
//! columns past the end of a line clamp to the line length.

use crate::ops::{Position, TextChange};
use crate::text::{byte_index, char_len, split_lines_preserve_trailing};

/// A document stored as an array of lines (without line terminators).
///
/// Always holds at least one (possibly empty) line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineDocument {
    lines: Vec<String>,
}

impl LineDocument {
    /// An empty document (a single empty line).
    pub fn new() -> Self {
        Self {
            lines: vec![String::new()],
        }
    }

    /// Build a document from text, splitting on `\n`.
    pub fn from_text(text: &str) -> Self {
        Self {
            lines: split_lines_preserve_trailing(text),
        }
    }

    /// Build a document from lines. An empty vector yields an empty document.
    pub fn from_lines(lines: Vec<String>) -> Self {
        if lines.is_empty() {
            Self::new()
        } else {
            Self { lines }
        }
    }

    /// The document lines.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Number of lines (at least 1).
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Text of line `index`.
    pub fn line(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(String::as_str)
    }

    /// The full text, lines joined with `\n`.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Clamp `pos` into the document.
    pub fn clip_pos(&self, pos: Position) -> Position {
        let last = self.lines.len() - 1;
        if pos.line > last {
            return Position::new(last, char_len(&self.lines[last]));
        }
        let line_len = char_len(&self.lines[pos.line]);
        Position::new(pos.line, pos.column.min(line_len))
    }

    /// Replace the range `from..to` with `text` (a line array).
    ///
    /// Both endpoints are clamped first; an inverted range is treated as empty at `from`.
    pub fn replace_range(&mut self, text: &[String], from: Position, to: Position) {
        let from = self.clip_pos(from);
        let mut to = self.clip_pos(to);
        if to < from {
            tracing::trace!(?from, ?to, "inverted range, collapsing to start");
            to = from;
        }

        let head_line = &self.lines[from.line];
        let head = &head_line[..byte_index(head_line, from.column)];
        let tail_line = &self.lines[to.line];
        let tail = &tail_line[byte_index(tail_line, to.column)..];

        let replacement: Vec<String> = match text {
            [] => vec![format!("{head}{tail}")],
            [only] => vec![format!("{head}{only}{tail}")],
            [first, middle @ .., last] => {
                let mut out = Vec::with_capacity(text.len());
                out.push(format!("{head}{first}"));
                out.extend(middle.iter().cloned());
                out.push(format!("{last}{tail}"));
                out
            }
        };

        self.lines.splice(from.line..=to.line, replacement);
    }

    /// Apply a recorded change going forward.
    pub fn apply(&mut self, change: &TextChange) {
        self.replace_range(&change.inserted, change.from, change.to);
    }

    /// Revert a recorded change: the span the insertion occupied gets the removed lines back.
    pub fn revert(&mut self, change: &TextChange) {
        let to = change.inserted_end();
        self.replace_range(&change.removed, change.from, to);
    }
}

impl Default for LineDocument {
    fn default() -> Self {
        Self::new()
    }
}
