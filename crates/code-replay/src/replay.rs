//! Plain replayer.
//!
//! [`CodeReplay`] drives a read-only editor widget from a recorded [`Trace`] of
//! [`Operation`]s. It keeps a pointer `index` into the trace (the first operation not yet
//! applied) and, on every playback tick, walks that pointer forward or backward to the
//! position implied by the new time:
//!
//! - forward (`last_time <= t`): apply operations while their cumulative time is
//!   `<= t - start`;
//! - backward (`t < last_time`): revert operations while their cumulative time is
//!   `> t - start`.
//!
//! All edits of one tick land on the replayer's own [`ReplayState`]; the live widget is
//! written once, at the end of the tick, and only if the pointer moved. The viewer's scroll
//! offset and selection inside the widget are saved before that write and restored after it.
//!
//! # Example
//!
//! ```rust
//! use code_replay::{CodeReplay, HeadlessEditor, ReplayConfig, Trace};
//!
//! let trace = Trace::from_json(r#"[
//!     [0, ["text", {"from": {"line": 0, "ch": 0}, "to": {"line": 0, "ch": 0}, "text": ["ab"], "removed": [""]}]],
//!     [100, ["text", {"from": {"line": 0, "ch": 2}, "to": {"line": 0, "ch": 2}, "text": ["c"], "removed": [""]}]]
//! ]"#).unwrap();
//!
//! let mut replay = CodeReplay::new(trace, ReplayConfig::default(), &()).unwrap();
//! replay.mount(HeadlessEditor::default());
//!
//! replay.on_time_update(150.0);
//! assert_eq!(replay.state().value.text(), "abc");
//!
//! replay.on_time_update(50.0);
//! assert_eq!(replay.state().value.text(), "ab");
//! ```

use crate::document::LineDocument;
use crate::error::ReplayError;
use crate::events::SubscriptionId;
use crate::ops::{Direction, Operation, Position, SelectionRange};
use crate::overlay::{CursorOverlay, SelectionOverlay};
use crate::playback::{PlaybackEvent, PlaybackHub};
use crate::timing::{MarkerResolver, StartTime};
use crate::trace::Trace;
use crate::widget::EditorWidget;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

/// Replayer configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Replay origin on the host timeline.
    pub start: StartTime,
}

impl ReplayConfig {
    /// Set the replay origin.
    pub fn with_start(mut self, start: impl Into<StartTime>) -> Self {
        self.start = start.into();
        self
    }
}

/// Document, cursor and selection as reconstructed from the trace.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReplayState {
    /// Recorded caret position.
    pub cursor: Position,
    /// Recorded selection, if one is active.
    pub selection: Option<SelectionRange>,
    /// Document contents.
    pub value: LineDocument,
}

impl ReplayState {
    /// State holding `value`, with the caret at the start and nothing selected.
    pub fn new(value: LineDocument) -> Self {
        Self {
            cursor: Position::default(),
            selection: None,
            value,
        }
    }
}

/// Handler for recorded `command` operations. It sees the state but cannot change it, since
/// reverting caret operations relies on carets computed from the trace alone.
pub type CommandHandler = Box<dyn FnMut(Direction, &str, &ReplayState)>;

/// Caret state in effect before a cursor/selection operation, restored when it is reverted.
#[derive(Debug, Clone, Copy)]
struct Caret {
    cursor: Position,
    selection: Option<SelectionRange>,
}

/// Replays a recorded editing session into a read-only editor widget.
pub struct CodeReplay<W> {
    trace: Trace<Operation>,
    start: f64,
    /// First operation not yet applied.
    index: usize,
    last_time: f64,
    state: ReplayState,
    /// For cursor/selection operations, the caret before that operation.
    carets: Vec<Option<Caret>>,
    handler: Option<CommandHandler>,
    widget: Option<W>,
    cursor: CursorOverlay,
    selection: SelectionOverlay,
}

impl<W: EditorWidget> CodeReplay<W> {
    /// Build a replayer, resolving the configured start time against `markers`.
    pub fn new(
        trace: Trace<Operation>,
        config: ReplayConfig,
        markers: &dyn MarkerResolver,
    ) -> Result<Self, ReplayError> {
        let start = config.start.resolve(markers)?;
        let carets = caret_history(&trace);

        Ok(Self {
            trace,
            start,
            index: 0,
            last_time: 0.0,
            state: ReplayState::default(),
            carets,
            handler: None,
            widget: None,
            cursor: CursorOverlay::new(Default::default()),
            selection: SelectionOverlay::new(),
        })
    }

    /// Build a replayer from a JSON trace.
    pub fn from_json(
        json: &str,
        config: ReplayConfig,
        markers: &dyn MarkerResolver,
    ) -> Result<Self, ReplayError> {
        Self::new(Trace::from_json(json)?, config, markers)
    }

    /// Install the handler for recorded `command` operations.
    pub fn with_command_handler(mut self, handler: CommandHandler) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Hand the replayer its widget. Ticks before this are ignored.
    ///
    /// The widget's current text becomes the document the trace is replayed onto, so
    /// playback restarts from the first entry.
    pub fn mount(&mut self, widget: W) {
        self.state = ReplayState::new(LineDocument::from_text(&widget.value()));
        self.index = 0;
        self.last_time = 0.0;
        self.cursor = CursorOverlay::new(widget.cursor_blink_rate());
        self.cursor.place(&widget, self.state.cursor);
        self.selection.render(&widget, None);
        tracing::debug!(entries = self.trace.len(), start = self.start, "replay mounted");
        self.widget = Some(widget);
    }

    /// Take the widget back, returning the replayer to its unmounted state.
    pub fn unmount(&mut self) -> Option<W> {
        self.widget.take()
    }

    /// Subscribe `this` to a playback hub. The hub only holds a weak reference.
    pub fn attach(this: &Rc<RefCell<Self>>, hub: &mut PlaybackHub) -> SubscriptionId
    where
        W: 'static,
    {
        let weak = Rc::downgrade(this);
        hub.on(Box::new(move |event: &PlaybackEvent| {
            if let Some(replay) = weak.upgrade() {
                replay.borrow_mut().on_time_update(event.time());
            }
        }))
    }

    /// Handle a `seek` or `timeupdate` at time `t`.
    ///
    /// Returns `true` if the widget was updated.
    pub fn on_time_update(&mut self, t: f64) -> bool {
        if self.widget.is_none() {
            return false;
        }

        let progress = t - self.start;
        let times = self.trace.times();
        let last_index = self.index;

        if self.last_time <= t && self.index < times.len() {
            while self.index < times.len() && times[self.index] <= progress {
                if let Some(op) = self.trace.action(self.index) {
                    apply_forward(op, &mut self.state, &mut self.handler);
                }
                self.index += 1;
            }
        } else if t < self.last_time && self.index > 0 {
            while self.index > 0 && progress < times[self.index - 1] {
                let i = self.index - 1;
                if let Some(op) = self.trace.action(i) {
                    apply_backward(op, self.carets[i], &mut self.state, &mut self.handler);
                }
                self.index = i;
            }
        }

        let changed = self.index != last_index;
        if changed {
            tracing::debug!(from = last_index, to = self.index, t, "replay commit");
            self.commit();
        }

        self.last_time = t;
        changed
    }

    fn commit(&mut self) {
        let Some(widget) = self.widget.as_mut() else {
            return;
        };

        // Viewer's own interaction state.
        let scroll = widget.scroll_info();
        let viewer_selection = widget.selection();

        widget.set_value(&self.state.value.text());
        self.selection.render(&*widget, self.state.selection);
        self.cursor.place(&*widget, self.state.cursor);

        widget.set_selection(viewer_selection);
        widget.scroll_to(scroll.left, scroll.top);
    }

    /// Toggle the synthetic cursor (one blink timer firing).
    pub fn blink_cursor(&mut self) {
        self.cursor.blink();
    }

    /// Current reconstructed state.
    pub fn state(&self) -> &ReplayState {
        &self.state
    }

    /// Index of the first operation not yet applied.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Time of the last tick.
    pub fn last_time(&self) -> f64 {
        self.last_time
    }

    /// Resolved replay origin.
    pub fn start(&self) -> f64 {
        self.start
    }

    /// Time of the last recorded operation, relative to the origin.
    pub fn duration(&self) -> Option<f64> {
        self.trace.duration()
    }

    /// The replayed trace.
    pub fn trace(&self) -> &Trace<Operation> {
        &self.trace
    }

    /// The synthetic cursor.
    pub fn cursor_overlay(&self) -> &CursorOverlay {
        &self.cursor
    }

    /// Mutable access to the synthetic cursor, e.g. to drive its blink timer.
    pub fn cursor_overlay_mut(&mut self) -> &mut CursorOverlay {
        &mut self.cursor
    }

    /// The synthetic selection.
    pub fn selection_overlay(&self) -> &SelectionOverlay {
        &self.selection
    }

    /// The mounted widget.
    pub fn widget(&self) -> Option<&W> {
        self.widget.as_ref()
    }

    /// Mutable access to the mounted widget (viewer interaction).
    pub fn widget_mut(&mut self) -> Option<&mut W> {
        self.widget.as_mut()
    }
}

fn apply_forward(op: &Operation, state: &mut ReplayState, handler: &mut Option<CommandHandler>) {
    tracing::trace!(op = op.tag(), "apply");
    match op {
        Operation::Command(name) => {
            if let Some(handler) = handler {
                handler(Direction::Forward, name.as_str(), state);
            }
        }
        Operation::Cursor(pos) => {
            state.cursor = *pos;
            state.selection = None;
        }
        Operation::Selection(range) => {
            state.cursor = range.head;
            state.selection = Some(*range);
        }
        Operation::Text(change) => state.value.apply(change),
    }
}

fn apply_backward(
    op: &Operation,
    caret: Option<Caret>,
    state: &mut ReplayState,
    handler: &mut Option<CommandHandler>,
) {
    tracing::trace!(op = op.tag(), "revert");
    match op {
        Operation::Command(name) => {
            if let Some(handler) = handler {
                handler(Direction::Backward, name.as_str(), state);
            }
        }
        Operation::Cursor(_) | Operation::Selection(_) => {
            if let Some(caret) = caret {
                state.cursor = caret.cursor;
                state.selection = caret.selection;
            }
        }
        Operation::Text(change) => state.value.revert(change),
    }
}

/// Walk the trace once, recording the caret in effect before each caret operation.
fn caret_history(trace: &Trace<Operation>) -> Vec<Option<Caret>> {
    let mut caret = Caret {
        cursor: Position::default(),
        selection: None,
    };

    trace
        .entries()
        .iter()
        .map(|entry| match &entry.action {
            Operation::Cursor(pos) => {
                let before = caret;
                caret = Caret {
                    cursor: *pos,
                    selection: None,
                };
                Some(before)
            }
            Operation::Selection(range) => {
                let before = caret;
                caret = Caret {
                    cursor: range.head,
                    selection: Some(*range),
                };
                Some(before)
            }
            Operation::Command(_) | Operation::Text(_) => None,
        })
        .collect()
}
