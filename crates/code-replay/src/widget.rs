//! Editor widget interface.
//!
//! The replayer and recorder never render text themselves. They talk to a live editor
//! widget through [`EditorWidget`], which covers exactly what they need: whole-document
//! get/set, the primary selection, coordinate lookup for drawing a synthetic cursor and
//! selection, the viewer's scroll offset, and the widget's event stream.

use crate::events::{Listener, SubscriptionId};
use crate::ops::{Position, SelectionRange, TextChange};
use std::time::Duration;

/// Pixel coordinates of a character cell, relative to the editor's content box.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Coords {
    /// Left edge.
    pub left: f64,
    /// Top edge of the line box.
    pub top: f64,
    /// Bottom edge of the line box.
    pub bottom: f64,
}

impl Coords {
    /// Height of the line box.
    pub fn height(&self) -> f64 {
        (self.bottom - self.top).max(0.0)
    }
}

/// The viewer's scroll offset.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollInfo {
    /// Horizontal scroll offset.
    pub left: f64,
    /// Vertical scroll offset.
    pub top: f64,
}

/// Events emitted by a live editor widget.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    /// The document text changed.
    Change(TextChange),
    /// The cursor or selection moved.
    CursorActivity(SelectionRange),
    /// The widget handled a named key sequence (e.g. `"Mod-Enter"`).
    KeyHandled(String),
    /// The widget gained keyboard focus.
    Focus,
    /// The widget lost keyboard focus.
    Blur,
}

/// Listener type for [`EditorEvent`]s.
pub type EditorListener = Listener<EditorEvent>;

/// A live text-editing widget.
pub trait EditorWidget {
    /// The full document text.
    fn value(&self) -> String;

    /// Replace the full document text.
    fn set_value(&mut self, text: &str);

    /// The primary selection (collapsed when nothing is selected).
    fn selection(&self) -> SelectionRange;

    /// Set the primary selection.
    fn set_selection(&mut self, selection: SelectionRange);

    /// Coordinates of the cell at `pos` (clamped into the document).
    fn cursor_coords(&self, pos: Position) -> Coords;

    /// Current scroll offset.
    fn scroll_info(&self) -> ScrollInfo;

    /// Scroll to the given offset.
    fn scroll_to(&mut self, left: f64, top: f64);

    /// Width of the widget's wrapper element, used for full-width selection rows.
    fn wrapper_width(&self) -> f64;

    /// Blink period of the widget's native cursor.
    fn cursor_blink_rate(&self) -> Duration;

    /// Cursor height as a fraction of the line box height.
    fn cursor_height(&self) -> f64;

    /// Subscribe to widget events.
    fn subscribe(&mut self, listener: EditorListener) -> SubscriptionId;

    /// Detach a listener. Returns `false` if it was not subscribed.
    fn unsubscribe(&mut self, id: SubscriptionId) -> bool;
}

/// Creates editor widgets. Hosts pass one in instead of the core reaching for a global
/// editor constructor.
pub trait EditorFactory {
    /// Widget type produced by this factory.
    type Widget: EditorWidget;

    /// Create a widget holding `text`.
    fn create(&self, text: &str, read_only: bool) -> Self::Widget;
}
