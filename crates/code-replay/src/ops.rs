//! Recorded editor operations.
//!
//! An [`Operation`] is one observed editor event: a text change, a cursor move, a selection
//! change, or a named key sequence the host handles itself. The JSON shape is the tuple form
//! used by recorded traces:
//!
//! ```text
//! ["command", "Mod-Enter"]
//! ["cursor", {"line": 0, "ch": 3}]
//! ["selection", {"anchor": {"line": 0, "ch": 0}, "head": {"line": 0, "ch": 2}}]
//! ["text", {"from": {...}, "to": {...}, "text": ["ab"], "removed": [""]}]
//! ```

use crate::text::char_len;
use serde::de::{self, SeqAccess, Visitor};
use serde::ser::SerializeTuple;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// Position coordinates (line and column numbers)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    /// Zero-based logical line index.
    pub line: usize,
    /// Zero-based column in characters within the logical line.
    pub column: usize,
}

impl Position {
    /// Create a new logical position.
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// A position at the end of `line`, whatever its length turns out to be.
    pub fn line_end(line: usize) -> Self {
        Self {
            line,
            column: usize::MAX,
        }
    }
}

impl Ord for Position {
    fn cmp(&self, other: &Self) -> Ordering {
        self.line
            .cmp(&other.line)
            .then_with(|| self.column.cmp(&other.column))
    }
}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Serialize, Deserialize)]
struct WirePosition {
    line: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ch: Option<i64>,
}

impl Serialize for Position {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let ch = (self.column != usize::MAX).then_some(self.column as i64);
        WirePosition {
            line: self.line as i64,
            ch,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Position {
    /// Negative coordinates read as 0; a missing `ch` means "end of line".
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = WirePosition::deserialize(deserializer)?;
        let line = wire.line.max(0) as usize;
        let column = match wire.ch {
            Some(ch) => ch.max(0) as usize,
            None => usize::MAX,
        };
        Ok(Position { line, column })
    }
}

/// A single selection range. `anchor == head` is a collapsed caret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SelectionRange {
    /// Fixed end of the selection.
    pub anchor: Position,
    /// Moving end of the selection (where the caret is drawn).
    pub head: Position,
}

impl SelectionRange {
    /// Create a selection from `anchor` to `head`.
    pub fn new(anchor: Position, head: Position) -> Self {
        Self { anchor, head }
    }

    /// A collapsed selection at `pos`.
    pub fn caret(pos: Position) -> Self {
        Self {
            anchor: pos,
            head: pos,
        }
    }

    /// Returns `true` if anchor and head coincide.
    pub fn is_empty(&self) -> bool {
        self.anchor == self.head
    }

    /// The selection endpoints in document order.
    pub fn ordered(&self) -> (Position, Position) {
        if self.anchor <= self.head {
            (self.anchor, self.head)
        } else {
            (self.head, self.anchor)
        }
    }
}

/// A text change as reported by the editor: the range `from..to` (in the pre-change document)
/// was replaced by `inserted`; `removed` holds the replaced text.
///
/// Both text fields are line arrays: `["a", "b"]` is `"a\nb"`, and `[""]` is empty text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChange {
    /// Start of the replaced range.
    pub from: Position,
    /// End of the replaced range.
    pub to: Position,
    /// Inserted lines.
    #[serde(rename = "text")]
    pub inserted: Vec<String>,
    /// Removed lines.
    #[serde(default)]
    pub removed: Vec<String>,
}

impl TextChange {
    /// Create a text change replacing `from..to` with `inserted`.
    pub fn new(from: Position, to: Position, inserted: Vec<String>, removed: Vec<String>) -> Self {
        Self {
            from,
            to,
            inserted,
            removed,
        }
    }

    /// End position of the inserted text in the post-change document.
    pub fn inserted_end(&self) -> Position {
        span_end(self.from, &self.inserted)
    }

    /// End position of the removed text in the pre-change document.
    pub fn removed_end(&self) -> Position {
        span_end(self.from, &self.removed)
    }
}

/// Where a run of `lines` ends when placed at `from`.
pub(crate) fn span_end(from: Position, lines: &[String]) -> Position {
    match lines {
        [] => from,
        [only] => Position::new(from.line, from.column.saturating_add(char_len(only))),
        [.., last] => Position::new(from.line + lines.len() - 1, char_len(last)),
    }
}

/// Replay direction passed to command handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Time moved forward; the operation is being applied.
    Forward,
    /// Time moved backward; the operation is being reverted.
    Backward,
}

impl Direction {
    /// Short name used by presentation scripts (`"fwd"` / `"back"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Forward => "fwd",
            Direction::Backward => "back",
        }
    }
}

/// One recorded editor operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// A key sequence handled by the host (e.g. "run this cell").
    Command(String),
    /// The caret moved without selecting anything.
    Cursor(Position),
    /// A non-empty selection was made.
    Selection(SelectionRange),
    /// The document text changed.
    Text(TextChange),
}

impl Operation {
    /// The wire tag of this operation.
    pub fn tag(&self) -> &'static str {
        match self {
            Operation::Command(_) => "command",
            Operation::Cursor(_) => "cursor",
            Operation::Selection(_) => "selection",
            Operation::Text(_) => "text",
        }
    }
}

impl Serialize for Operation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(self.tag())?;
        match self {
            Operation::Command(name) => tuple.serialize_element(name)?,
            Operation::Cursor(pos) => tuple.serialize_element(pos)?,
            Operation::Selection(range) => tuple.serialize_element(range)?,
            Operation::Text(change) => tuple.serialize_element(change)?,
        }
        tuple.end()
    }
}

impl<'de> Deserialize<'de> for Operation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_seq(OperationVisitor)
    }
}

struct OperationVisitor;

impl<'de> Visitor<'de> for OperationVisitor {
    type Value = Operation;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a [tag, payload] operation pair")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Operation, A::Error> {
        let tag: String = seq
            .next_element()?
            .ok_or_else(|| de::Error::invalid_length(0, &self))?;
        let missing = || de::Error::invalid_length(1, &OperationVisitor);
        let op = match tag.as_str() {
            "command" => Operation::Command(seq.next_element()?.ok_or_else(missing)?),
            "cursor" => Operation::Cursor(seq.next_element()?.ok_or_else(missing)?),
            "selection" => Operation::Selection(seq.next_element()?.ok_or_else(missing)?),
            "text" => Operation::Text(seq.next_element()?.ok_or_else(missing)?),
            other => {
                return Err(de::Error::unknown_variant(
                    other,
                    &["command", "cursor", "selection", "text"],
                ));
            }
        };
        Ok(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_position_wire_shape() {
        let pos = Position::new(2, 5);
        assert_eq!(serde_json::to_value(pos).unwrap(), json!({"line": 2, "ch": 5}));
    }

    #[test]
    fn test_position_negative_and_missing_column() {
        let pos: Position = serde_json::from_value(json!({"line": -1, "ch": -4})).unwrap();
        assert_eq!(pos, Position::new(0, 0));

        let pos: Position = serde_json::from_value(json!({"line": 3})).unwrap();
        assert_eq!(pos, Position::line_end(3));
    }

    #[test]
    fn test_operation_tuple_form() {
        let op: Operation = serde_json::from_value(json!([
            "text",
            {"from": {"line": 0, "ch": 0}, "to": {"line": 0, "ch": 0}, "text": ["ab"], "removed": [""]}
        ]))
        .unwrap();
        let Operation::Text(change) = &op else {
            panic!("expected text operation, got {op:?}");
        };
        assert_eq!(change.inserted, vec!["ab".to_string()]);
        assert_eq!(change.inserted_end(), Position::new(0, 2));

        let value = serde_json::to_value(&op).unwrap();
        assert_eq!(value[0], "text");
        assert_eq!(value[1]["text"], json!(["ab"]));
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let err = serde_json::from_value::<Operation>(json!(["scroll", 3])).unwrap_err();
        assert!(err.to_string().contains("scroll"));
    }

    #[test]
    fn test_span_end_multiline() {
        let change = TextChange::new(
            Position::new(1, 4),
            Position::new(1, 4),
            vec!["x".into(), "".into(), "yz".into()],
            vec!["".into()],
        );
        assert_eq!(change.inserted_end(), Position::new(3, 2));
        assert_eq!(change.removed_end(), Position::new(1, 4));
    }

    #[test]
    fn test_selection_ordering() {
        let range = SelectionRange::new(Position::new(2, 0), Position::new(0, 3));
        assert_eq!(range.ordered(), (Position::new(0, 3), Position::new(2, 0)));
        assert!(!range.is_empty());
        assert!(SelectionRange::caret(Position::new(1, 1)).is_empty());
    }
}
