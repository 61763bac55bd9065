//! Structured replayer.
//!
//! The structured variant replays a trace of [`ChangeSet`]s against a view whose document
//! is a [`Rope`]. The replay loop mirrors the plain variant, but instead of mutating a
//! scratch copy it accumulates one composed change per tick and dispatches it to the view
//! in a single [`Transaction`].
//!
//! Reverting needs the inverse of every change, and an inverse can only be computed against
//! the exact document the change was applied to. The replayer therefore walks the whole
//! trace once when it is built, starting from the view's document, and keeps the inverses.
//!
//! Selections travel out of band: a change entry may carry an `[anchor, head]` pair, which
//! becomes the transaction's fake selection. Views hand it to a [`FakeSelectionLayer`],
//! which substitutes it for the real selection when measuring.

use crate::changeset::ChangeSet;
use crate::error::{ChangeSetError, ReplayError, TraceError};
use crate::events::SubscriptionId;
use crate::playback::{PlaybackEvent, PlaybackHub};
use crate::replay::ReplayConfig;
use crate::timing::MarkerResolver;
use crate::trace::Trace;
use ropey::Rope;
use serde::de;
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// A selection in character offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OffsetRange {
    /// Fixed end.
    pub anchor: usize,
    /// Moving end.
    pub head: usize,
}

impl OffsetRange {
    /// A range from `anchor` to `head`.
    pub fn new(anchor: usize, head: usize) -> Self {
        Self { anchor, head }
    }

    /// Returns `true` if nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.anchor == self.head
    }

    /// Clamp both ends to a document of `len` characters.
    pub fn clamp(self, len: usize) -> Self {
        Self::new(self.anchor.min(len), self.head.min(len))
    }
}

impl From<(usize, usize)> for OffsetRange {
    fn from((anchor, head): (usize, usize)) -> Self {
        Self::new(anchor, head)
    }
}

/// One entry of a structured trace.
#[derive(Debug, Clone, PartialEq)]
pub enum StructuredAction {
    /// A named key sequence, forwarded to the host's key handler.
    Command(String),
    /// A document change, with the selection in effect after it.
    Change {
        /// The change.
        changes: ChangeSet,
        /// Selection to draw, if the transaction set one.
        selection: Option<OffsetRange>,
    },
}

impl StructuredAction {
    fn changes(&self) -> Option<&ChangeSet> {
        match self {
            StructuredAction::Change { changes, .. } => Some(changes),
            StructuredAction::Command(_) => None,
        }
    }
}

impl TryFrom<Value> for StructuredAction {
    type Error = ChangeSetError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(command) => Ok(StructuredAction::Command(command)),
            Value::Array(items) => {
                let mut items = items.into_iter();
                let changes = items
                    .next()
                    .ok_or_else(|| ChangeSetError::Malformed("empty change entry".to_string()))?;
                let changes = ChangeSet::from_json(&changes)?;
                let selection = match items.next() {
                    None | Some(Value::Null) => None,
                    Some(range) => Some(parse_range(&range)?),
                };
                Ok(StructuredAction::Change { changes, selection })
            }
            other => Err(ChangeSetError::Malformed(format!(
                "expected a command or a change entry, got {other}"
            ))),
        }
    }
}

fn parse_range(value: &Value) -> Result<OffsetRange, ChangeSetError> {
    let pair = value
        .as_array()
        .filter(|pair| pair.len() == 2)
        .and_then(|pair| Some((pair[0].as_u64()?, pair[1].as_u64()?)));
    match pair {
        Some((anchor, head)) => Ok(OffsetRange::new(anchor as usize, head as usize)),
        None => Err(ChangeSetError::Malformed(format!(
            "invalid selection {value}"
        ))),
    }
}

impl Serialize for StructuredAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            StructuredAction::Command(command) => serializer.serialize_str(command),
            StructuredAction::Change { changes, selection } => {
                let len = if selection.is_some() { 2 } else { 1 };
                let mut seq = serializer.serialize_seq(Some(len))?;
                seq.serialize_element(changes)?;
                if let Some(range) = selection {
                    seq.serialize_element(&(range.anchor, range.head))?;
                }
                seq.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for StructuredAction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        StructuredAction::try_from(value).map_err(de::Error::custom)
    }
}

/// What a transaction does to the fake selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionEffect {
    /// Leave the current fake selection in place.
    #[default]
    Keep,
    /// Draw this range instead of the view's own selection.
    Set(OffsetRange),
    /// Drop the fake selection and fall back to the view's own.
    Clear,
}

/// A batched update for a [`StructuredView`].
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    /// Composed change, relative to the view's current document.
    pub changes: ChangeSet,
    /// Effect on the fake selection.
    pub fake_selection: SelectionEffect,
}

/// A view over a rope document that accepts transactions.
pub trait StructuredView {
    /// The current document.
    fn doc(&self) -> &Rope;

    /// Apply a transaction.
    fn dispatch(&mut self, transaction: Transaction);
}

/// Hook a renderer consults before measuring its selection.
pub trait SelectionOverride {
    /// Ranges to measure in place of `actual`.
    fn ranges(&self, actual: &[OffsetRange]) -> Vec<OffsetRange>;

    /// Whether the drawn cursor must stay visible regardless of focus.
    fn force_cursor_visible(&self) -> bool;
}

/// Tracks the latest fake selection carried by dispatched transactions.
#[derive(Debug, Clone, Default)]
pub struct FakeSelectionLayer {
    range: Option<OffsetRange>,
    needs_measure: bool,
}

impl FakeSelectionLayer {
    /// A layer with nothing to substitute.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick up the fake selection of `transaction`, if any.
    ///
    /// Returns `true` if the selection must be measured again.
    pub fn update(&mut self, transaction: &Transaction) -> bool {
        match transaction.fake_selection {
            SelectionEffect::Keep => {}
            SelectionEffect::Set(range) => {
                self.range = Some(range);
                self.needs_measure = true;
            }
            SelectionEffect::Clear => {
                self.range = None;
                self.needs_measure = true;
            }
        }
        self.needs_measure
    }

    /// Mark the pending measurement as done.
    pub fn measured(&mut self) {
        self.needs_measure = false;
    }

    /// The substituted range.
    pub fn range(&self) -> Option<OffsetRange> {
        self.range
    }
}

impl SelectionOverride for FakeSelectionLayer {
    fn ranges(&self, actual: &[OffsetRange]) -> Vec<OffsetRange> {
        match self.range {
            Some(range) => vec![range],
            None => actual.to_vec(),
        }
    }

    fn force_cursor_visible(&self) -> bool {
        true
    }
}

/// Handler for recorded key sequences. Receives the document as it stands at that point of
/// the tick.
pub type KeyHandler = Box<dyn FnMut(&str, &Rope)>;

/// Replays a structured trace into a [`StructuredView`].
pub struct StructuredReplay<V> {
    trace: Trace<StructuredAction>,
    start: f64,
    index: usize,
    last_time: f64,
    /// Inverse of each change entry against the document before it.
    inverses: Vec<Option<ChangeSet>>,
    /// Selection in effect after each entry.
    selections: Vec<Option<OffsetRange>>,
    /// Document length after each entry.
    lengths: Vec<usize>,
    initial_len: usize,
    handler: Option<KeyHandler>,
    view: V,
}

impl<V: StructuredView> StructuredReplay<V> {
    /// Build a replayer over `view`, precomputing every inverse from the view's document.
    pub fn new(
        trace: Trace<StructuredAction>,
        view: V,
        config: ReplayConfig,
        markers: &dyn MarkerResolver,
    ) -> Result<Self, ReplayError> {
        let start = config.start.resolve(markers)?;

        let initial_len = view.doc().len_chars();
        let mut doc = view.doc().clone();
        let mut inverses = Vec::with_capacity(trace.len());
        let mut selections = Vec::with_capacity(trace.len());
        let mut lengths = Vec::with_capacity(trace.len());
        let mut selection = None;

        for (index, entry) in trace.entries().iter().enumerate() {
            let inverse = match &entry.action {
                StructuredAction::Command(_) => None,
                StructuredAction::Change {
                    changes,
                    selection: range,
                } => {
                    let entry_error = |source| TraceError::Entry { index, source };
                    let inverse = changes.invert(&doc).map_err(entry_error)?;
                    doc = changes.apply(&doc).map_err(entry_error)?;
                    if range.is_some() {
                        selection = *range;
                    }
                    Some(inverse)
                }
            };
            inverses.push(inverse);
            selections.push(selection);
            lengths.push(doc.len_chars());
        }

        tracing::debug!(entries = trace.len(), start, "structured replay loaded");

        Ok(Self {
            trace,
            start,
            index: 0,
            last_time: 0.0,
            inverses,
            selections,
            lengths,
            initial_len,
            handler: None,
            view,
        })
    }

    /// Build a replayer from a JSON trace.
    pub fn from_json(
        json: &str,
        view: V,
        config: ReplayConfig,
        markers: &dyn MarkerResolver,
    ) -> Result<Self, ReplayError> {
        Self::new(Trace::from_json(json)?, view, config, markers)
    }

    /// Install the handler for recorded key sequences.
    pub fn with_key_handler(mut self, handler: KeyHandler) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Subscribe `this` to a playback hub. The hub only holds a weak reference.
    pub fn attach(this: &Rc<RefCell<Self>>, hub: &mut PlaybackHub) -> SubscriptionId
    where
        V: 'static,
    {
        let weak: Weak<RefCell<Self>> = Rc::downgrade(this);
        hub.on(Box::new(move |event: &PlaybackEvent| {
            if let Some(replay) = weak.upgrade() {
                replay.borrow_mut().on_time_update(event.time());
            }
        }))
    }

    /// Handle a `seek` or `timeupdate` at time `t`.
    ///
    /// Returns `true` if a transaction was dispatched.
    pub fn on_time_update(&mut self, t: f64) -> bool {
        match self.tick(t) {
            Ok(dispatched) => dispatched,
            Err(err) => {
                tracing::warn!(error = %err, t, "structured replay tick skipped");
                false
            }
        }
    }

    fn tick(&mut self, t: f64) -> Result<bool, ChangeSetError> {
        let expected = self.doc_len_at(self.index);
        let actual = self.view.doc().len_chars();
        if expected != actual {
            return Err(ChangeSetError::LengthMismatch { expected, actual });
        }

        let progress = t - self.start;
        let times = self.trace.times();
        let mut index = self.index;
        let mut changes = ChangeSet::empty(actual);
        let mut selection = SelectionEffect::Keep;

        if self.last_time <= t && index < times.len() {
            while index < times.len() && times[index] <= progress {
                match self.trace.action(index) {
                    Some(StructuredAction::Command(key)) => {
                        if let Some(handler) = self.handler.as_mut() {
                            let snapshot = changes.apply(self.view.doc())?;
                            handler(key.as_str(), &snapshot);
                        }
                    }
                    Some(StructuredAction::Change {
                        changes: change,
                        selection: range,
                    }) => {
                        changes = changes.compose(change)?;
                        if let Some(range) = range {
                            selection = SelectionEffect::Set(*range);
                        }
                    }
                    None => {}
                }
                index += 1;
            }
        } else if t < self.last_time && index > 0 {
            while index > 0 && progress < times[index - 1] {
                if let Some(inverse) = &self.inverses[index - 1] {
                    changes = changes.compose(inverse)?;
                }
                index -= 1;
            }
            selection = match self.selection_at(index) {
                Some(range) => SelectionEffect::Set(range),
                None => SelectionEffect::Clear,
            };
        }

        self.last_time = t;
        if index == self.index {
            return Ok(false);
        }

        tracing::debug!(from = self.index, to = index, t, "structured replay dispatch");
        self.index = index;
        self.view.dispatch(Transaction {
            changes,
            fake_selection: selection,
        });
        Ok(true)
    }

    fn doc_len_at(&self, index: usize) -> usize {
        match index {
            0 => self.initial_len,
            i => self.lengths[i - 1],
        }
    }

    fn selection_at(&self, index: usize) -> Option<OffsetRange> {
        index.checked_sub(1).and_then(|i| self.selections[i])
    }

    /// Index of the first entry not yet applied.
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

    /// Time of the last recorded entry, relative to the origin.
    pub fn duration(&self) -> Option<f64> {
        self.trace.duration()
    }

    /// The replayed trace.
    pub fn trace(&self) -> &Trace<StructuredAction> {
        &self.trace
    }

    /// Number of change entries (entries with a precomputed inverse).
    pub fn change_count(&self) -> usize {
        self.trace
            .entries()
            .iter()
            .filter(|e| e.action.changes().is_some())
            .count()
    }

    /// The view.
    pub fn view(&self) -> &V {
        &self.view
    }

    /// Mutable access to the view.
    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    /// Give the view back.
    pub fn into_view(self) -> V {
        self.view
    }
}
