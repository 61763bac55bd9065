//! In-memory editor widgets.
//!
//! [`HeadlessEditor`] implements [`EditorWidget`] over a [`Rope`] with a fixed cell grid:
//! every character advances by its Unicode display width (tabs to the next tab stop) times
//! `char_width`, and every line is `line_height` tall. It emits the same events a live
//! widget would, so recorders and replayers can be exercised without a UI.
//!
//! [`HeadlessView`] is the structured counterpart: a rope document that accepts
//! [`Transaction`]s and measures its selection through a [`FakeSelectionLayer`].

use crate::events::{Listeners, SubscriptionId};
use crate::ops::{Position, SelectionRange, TextChange};
use crate::structured::{
    FakeSelectionLayer, OffsetRange, SelectionOverride, StructuredView, Transaction,
};
use crate::text::normalize_breaks;
use crate::widget::{Coords, EditorEvent, EditorFactory, EditorListener, EditorWidget, ScrollInfo};
use ropey::Rope;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use unicode_width::UnicodeWidthChar;

/// Geometry and behavior of a headless editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadlessConfig {
    /// Width of one cell.
    pub char_width: f64,
    /// Height of one line box.
    pub line_height: f64,
    /// Width of the wrapper element.
    pub wrapper_width: f64,
    /// Cursor blink period in milliseconds. Zero disables blinking.
    pub cursor_blink_rate: u64,
    /// Cursor height as a fraction of the line height.
    pub cursor_height: f64,
    /// Tab stop width in cells.
    pub tab_size: usize,
    /// Spaces inserted by Tab.
    pub indent_unit: usize,
    /// Reject user edits.
    pub read_only: bool,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            char_width: 8.0,
            line_height: 16.0,
            wrapper_width: 640.0,
            cursor_blink_rate: 530,
            cursor_height: 1.0,
            tab_size: 4,
            indent_unit: 4,
            read_only: false,
        }
    }
}

impl HeadlessConfig {
    /// Set the cell size.
    pub fn with_cell_size(mut self, char_width: f64, line_height: f64) -> Self {
        self.char_width = char_width;
        self.line_height = line_height;
        self
    }

    /// Set the wrapper width.
    pub fn with_wrapper_width(mut self, width: f64) -> Self {
        self.wrapper_width = width;
        self
    }

    /// Set the blink period in milliseconds.
    pub fn with_cursor_blink_rate(mut self, ms: u64) -> Self {
        self.cursor_blink_rate = ms;
        self
    }

    /// Set the cursor height factor.
    pub fn with_cursor_height(mut self, factor: f64) -> Self {
        self.cursor_height = factor;
        self
    }

    /// Set the tab stop width.
    pub fn with_tab_size(mut self, tab_size: usize) -> Self {
        self.tab_size = tab_size;
        self
    }

    /// Set the indentation inserted by Tab.
    pub fn with_indent_unit(mut self, indent_unit: usize) -> Self {
        self.indent_unit = indent_unit;
        self
    }

    /// Make the editor read-only.
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}

fn cell_width_at(ch: char, cell_offset_in_line: usize, tab_width: usize) -> usize {
    if ch == '\t' {
        let tab_width = tab_width.max(1);
        tab_width - cell_offset_in_line % tab_width
    } else {
        UnicodeWidthChar::width(ch).unwrap_or(1)
    }
}

fn visual_x_for_column(line: &str, column: usize, tab_width: usize) -> usize {
    let mut x = 0usize;
    for ch in line.chars().take(column) {
        x = x.saturating_add(cell_width_at(ch, x, tab_width));
    }
    x
}

fn lines_of(text: &str) -> Vec<String> {
    text.split('\n').map(str::to_string).collect()
}

fn line_len(rope: &Rope, line: usize) -> usize {
    let slice = rope.line(line);
    let len = slice.len_chars();
    if len > 0 && slice.char(len - 1) == '\n' {
        len - 1
    } else {
        len
    }
}

fn line_text(rope: &Rope, line: usize) -> String {
    let mut text = rope.line(line).to_string();
    if text.ends_with('\n') {
        text.pop();
    }
    text
}

/// An [`EditorWidget`] with no UI.
pub struct HeadlessEditor {
    rope: Rope,
    config: HeadlessConfig,
    selection: SelectionRange,
    scroll: ScrollInfo,
    focused: bool,
    listeners: Listeners<EditorEvent>,
}

impl HeadlessEditor {
    /// An editor holding `text`.
    pub fn new(text: &str, config: HeadlessConfig) -> Self {
        Self {
            rope: Rope::from_str(&normalize_breaks(text)),
            config,
            selection: SelectionRange::default(),
            scroll: ScrollInfo::default(),
            focused: false,
            listeners: Listeners::new(),
        }
    }

    /// Editor configuration.
    pub fn config(&self) -> &HeadlessConfig {
        &self.config
    }

    /// Number of lines.
    pub fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    /// Text of `line` without its line break.
    pub fn line(&self, line: usize) -> Option<String> {
        (line < self.rope.len_lines()).then(|| line_text(&self.rope, line))
    }

    /// Clamp `pos` into the document.
    pub fn clip_pos(&self, pos: Position) -> Position {
        let last = self.rope.len_lines().saturating_sub(1);
        if pos.line > last {
            return Position::new(last, line_len(&self.rope, last));
        }
        Position::new(pos.line, pos.column.min(line_len(&self.rope, pos.line)))
    }

    /// Character offset of `pos` (clamped).
    pub fn offset_of(&self, pos: Position) -> usize {
        let pos = self.clip_pos(pos);
        self.rope.line_to_char(pos.line) + pos.column
    }

    /// Position of character offset `offset` (clamped).
    pub fn pos_of(&self, offset: usize) -> Position {
        let offset = offset.min(self.rope.len_chars());
        let line = self.rope.char_to_line(offset);
        Position::new(line, offset - self.rope.line_to_char(line))
    }

    /// Whether the editor has keyboard focus.
    pub fn has_focus(&self) -> bool {
        self.focused
    }

    /// Replace `from..to` with `text` as a user edit. Ignored when read-only.
    ///
    /// Emits a change followed by cursor activity at the end of the inserted text.
    pub fn replace_range(&mut self, text: &str, from: Position, to: Position) -> bool {
        if self.config.read_only {
            return false;
        }
        let normalized = normalize_breaks(text);
        let text = normalized.as_str();
        let (from, to) = {
            let (a, b) = (self.clip_pos(from), self.clip_pos(to));
            if b < a { (b, a) } else { (a, b) }
        };

        let start = self.offset_of(from);
        let end = self.offset_of(to);
        let removed = self.rope.slice(start..end).to_string();
        if start < end {
            self.rope.remove(start..end);
        }
        self.rope.insert(start, text);

        let change = TextChange::new(from, to, lines_of(text), lines_of(&removed));
        let caret = change.inserted_end();
        self.listeners.emit(&EditorEvent::Change(change));
        self.set_cursor(caret);
        true
    }

    /// Type `text` over the current selection.
    pub fn type_text(&mut self, text: &str) -> bool {
        let (from, to) = self.selection.ordered();
        self.replace_range(text, from, to)
    }

    /// Indent with `indent_unit` spaces at the selection.
    pub fn insert_tab(&mut self) -> bool {
        let indent = " ".repeat(self.config.indent_unit);
        self.type_text(&indent)
    }

    /// Handle a named key sequence through the built-in keymap.
    ///
    /// `Tab` indents; every sequence is reported as a handled key afterwards.
    pub fn handle_key(&mut self, key: &str) -> bool {
        if key == "Tab" {
            self.insert_tab();
        }
        self.listeners
            .emit(&EditorEvent::KeyHandled(key.to_string()));
        true
    }

    /// Move the caret to `pos`, collapsing the selection.
    pub fn set_cursor(&mut self, pos: Position) {
        self.set_selection(SelectionRange::caret(pos));
    }

    /// Give the editor keyboard focus.
    pub fn focus(&mut self) {
        if !self.focused {
            self.focused = true;
            self.listeners.emit(&EditorEvent::Focus);
        }
    }

    /// Take keyboard focus away.
    pub fn blur(&mut self) {
        if self.focused {
            self.focused = false;
            self.listeners.emit(&EditorEvent::Blur);
        }
    }
}

impl Default for HeadlessEditor {
    fn default() -> Self {
        Self::new("", HeadlessConfig::default())
    }
}

impl std::fmt::Debug for HeadlessEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeadlessEditor")
            .field("text", &self.rope.to_string())
            .field("selection", &self.selection)
            .field("scroll", &self.scroll)
            .field("focused", &self.focused)
            .finish()
    }
}

impl EditorWidget for HeadlessEditor {
    fn value(&self) -> String {
        self.rope.to_string()
    }

    fn set_value(&mut self, text: &str) {
        let normalized = normalize_breaks(text);
        let text = normalized.as_str();
        let old = self.rope.to_string();
        if old == text {
            return;
        }
        let end = self.pos_of(self.rope.len_chars());
        self.rope = Rope::from_str(text);

        let anchor = self.clip_pos(self.selection.anchor);
        let head = self.clip_pos(self.selection.head);
        self.selection = SelectionRange::new(anchor, head);

        let change = TextChange::new(Position::default(), end, lines_of(text), lines_of(&old));
        self.listeners.emit(&EditorEvent::Change(change));
    }

    fn selection(&self) -> SelectionRange {
        self.selection
    }

    fn set_selection(&mut self, selection: SelectionRange) {
        let selection = SelectionRange::new(
            self.clip_pos(selection.anchor),
            self.clip_pos(selection.head),
        );
        self.selection = selection;
        self.listeners.emit(&EditorEvent::CursorActivity(selection));
    }

    fn cursor_coords(&self, pos: Position) -> Coords {
        let pos = self.clip_pos(pos);
        let text = line_text(&self.rope, pos.line);
        let cells = visual_x_for_column(&text, pos.column, self.config.tab_size);
        let top = pos.line as f64 * self.config.line_height;
        Coords {
            left: cells as f64 * self.config.char_width,
            top,
            bottom: top + self.config.line_height,
        }
    }

    fn scroll_info(&self) -> ScrollInfo {
        self.scroll
    }

    fn scroll_to(&mut self, left: f64, top: f64) {
        self.scroll = ScrollInfo {
            left: left.max(0.0),
            top: top.max(0.0),
        };
    }

    fn wrapper_width(&self) -> f64 {
        self.config.wrapper_width
    }

    fn cursor_blink_rate(&self) -> Duration {
        Duration::from_millis(self.config.cursor_blink_rate)
    }

    fn cursor_height(&self) -> f64 {
        self.config.cursor_height
    }

    fn subscribe(&mut self, listener: EditorListener) -> SubscriptionId {
        self.listeners.subscribe(listener)
    }

    fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }
}

/// Creates [`HeadlessEditor`]s sharing one configuration.
#[derive(Debug, Clone, Default)]
pub struct HeadlessFactory {
    config: HeadlessConfig,
}

impl HeadlessFactory {
    /// A factory handing out editors configured with `config`.
    pub fn new(config: HeadlessConfig) -> Self {
        Self { config }
    }
}

impl EditorFactory for HeadlessFactory {
    type Widget = HeadlessEditor;

    fn create(&self, text: &str, read_only: bool) -> HeadlessEditor {
        HeadlessEditor::new(text, self.config.clone().with_read_only(read_only))
    }
}

/// A [`StructuredView`] with no UI.
#[derive(Debug, Clone, Default)]
pub struct HeadlessView {
    doc: Rope,
    selection: OffsetRange,
    layer: FakeSelectionLayer,
    dispatched: usize,
}

impl HeadlessView {
    /// A view over `text`.
    pub fn new(text: &str) -> Self {
        Self {
            doc: Rope::from_str(text),
            ..Self::default()
        }
    }

    /// Document text.
    pub fn text(&self) -> String {
        self.doc.to_string()
    }

    /// The view's own selection.
    pub fn selection(&self) -> OffsetRange {
        self.selection
    }

    /// Set the view's own selection.
    pub fn set_selection(&mut self, selection: OffsetRange) {
        self.selection = selection.clamp(self.doc.len_chars());
    }

    /// Ranges the renderer measures: the fake selection if one was dispatched.
    pub fn measure(&mut self) -> Vec<OffsetRange> {
        let ranges = self.layer.ranges(&[self.selection]);
        self.layer.measured();
        ranges
    }

    /// Whether the drawn cursor is shown.
    pub fn cursor_visible(&self) -> bool {
        self.layer.force_cursor_visible()
    }

    /// The fake selection layer.
    pub fn fake_selection(&self) -> &FakeSelectionLayer {
        &self.layer
    }

    /// Number of transactions dispatched so far.
    pub fn dispatched(&self) -> usize {
        self.dispatched
    }
}

impl StructuredView for HeadlessView {
    fn doc(&self) -> &Rope {
        &self.doc
    }

    fn dispatch(&mut self, transaction: Transaction) {
        match transaction.changes.apply(&self.doc) {
            Ok(doc) => self.doc = doc,
            Err(err) => {
                tracing::warn!(error = %err, "transaction rejected");
                return;
            }
        }
        self.selection = self.selection.clamp(self.doc.len_chars());
        self.layer.update(&transaction);
        self.dispatched += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recorded(editor: &mut HeadlessEditor) -> Rc<RefCell<Vec<EditorEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        editor.subscribe(Box::new(move |e: &EditorEvent| sink.borrow_mut().push(e.clone())));
        events
    }

    #[test]
    fn test_coords_follow_cell_widths() {
        let editor = HeadlessEditor::new("a\tb\n你好x", HeadlessConfig::default());
        assert_eq!(editor.cursor_coords(Position::new(0, 2)).left, 32.0);
        assert_eq!(editor.cursor_coords(Position::new(1, 2)).left, 32.0);

        let coords = editor.cursor_coords(Position::new(1, 0));
        assert_eq!(coords.top, 16.0);
        assert_eq!(coords.height(), 16.0);
    }

    #[test]
    fn test_coords_clamp_out_of_range() {
        let editor = HeadlessEditor::new("abc", HeadlessConfig::default());
        let coords = editor.cursor_coords(Position::new(9, 9));
        assert_eq!(coords.left, 24.0);
        assert_eq!(coords.top, 0.0);
    }

    #[test]
    fn test_edit_emits_change_then_cursor() {
        let mut editor = HeadlessEditor::new("hello", HeadlessConfig::default());
        let events = recorded(&mut editor);

        editor.set_cursor(Position::new(0, 5));
        editor.type_text("!\n");

        let events = events.borrow();
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[1],
            EditorEvent::Change(TextChange::new(
                Position::new(0, 5),
                Position::new(0, 5),
                vec!["!".into(), "".into()],
                vec!["".into()],
            ))
        );
        assert_eq!(
            events[2],
            EditorEvent::CursorActivity(SelectionRange::caret(Position::new(1, 0)))
        );
        assert_eq!(editor.value(), "hello!\n");
    }

    #[test]
    fn test_only_line_feeds_break_lines() {
        let mut editor = HeadlessEditor::new("a\r\nb", HeadlessConfig::default());
        assert_eq!(editor.value(), "a\nb");
        editor.set_cursor(Position::new(0, 1));
        editor.type_text("X");
        assert_eq!(editor.value(), "aX\nb");

        let mut editor = HeadlessEditor::new("x\u{2028}y", HeadlessConfig::default());
        assert_eq!(editor.line_count(), 1);
        editor.set_cursor(Position::new(0, 3));
        editor.type_text("Z\r\n");
        assert_eq!(editor.value(), "x\u{2028}yZ\n");
        assert_eq!(editor.selection().head, Position::new(1, 0));
    }

    #[test]
    fn test_tab_inserts_indent_unit() {
        let mut editor = HeadlessEditor::new("x", HeadlessConfig::default().with_indent_unit(2));
        let events = recorded(&mut editor);
        editor.handle_key("Tab");
        assert_eq!(editor.value(), "  x");
        assert_eq!(
            events.borrow().last(),
            Some(&EditorEvent::KeyHandled("Tab".into()))
        );
    }

    #[test]
    fn test_read_only_rejects_user_edits() {
        let factory = HeadlessFactory::default();
        let mut editor = factory.create("abc", true);
        assert!(!editor.type_text("x"));
        editor.set_value("xyz");
        assert_eq!(editor.value(), "xyz");
    }

    #[test]
    fn test_focus_events_fire_once() {
        let mut editor = HeadlessEditor::default();
        let events = recorded(&mut editor);
        editor.focus();
        editor.focus();
        editor.blur();
        assert_eq!(*events.borrow(), vec![EditorEvent::Focus, EditorEvent::Blur]);
    }

    #[test]
    fn test_view_measures_fake_selection() {
        let mut view = HeadlessView::new("abc");
        view.set_selection(OffsetRange::new(0, 0));
        assert_eq!(view.measure(), vec![OffsetRange::new(0, 0)]);

        view.dispatch(Transaction {
            changes: crate::changeset::ChangeSet::insert(3, 3, "d").unwrap(),
            fake_selection: crate::structured::SelectionEffect::Set(OffsetRange::new(1, 3)),
        });
        assert_eq!(view.text(), "abcd");
        assert_eq!(view.measure(), vec![OffsetRange::new(1, 3)]);
        assert!(view.cursor_visible());
    }
}
