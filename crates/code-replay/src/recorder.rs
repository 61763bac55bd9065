//! Trace recording.
//!
//! A [`Recorder`] owns one recording session at a time. While the session is active and not
//! paused, captured actions are stamped with the session time: clock time since
//! [`Recorder::begin_recording`], minus every paused interval. Finalizing clips the buffer
//! to a start offset and delta-encodes it into a [`Trace`].
//!
//! [`CodeRecorder`] feeds a recorder from an [`EditorWidget`]'s event stream.
//! [`ChangeRecorder`] is the structured counterpart, fed by the host with view updates.

use crate::changeset::ChangeSet;
use crate::events::SubscriptionId;
use crate::ops::Operation;
use crate::structured::{OffsetRange, StructuredAction};
use crate::trace::Trace;
use crate::widget::{EditorEvent, EditorWidget};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Instant;

/// Millisecond time source.
pub trait Clock {
    /// Current time in milliseconds. Only differences between readings matter.
    fn now(&self) -> f64;
}

/// Wall clock measured from its creation.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// A clock reading zero now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<f64>,
}

impl ManualClock {
    /// A clock reading `now`.
    pub fn new(now: f64) -> Self {
        Self {
            now: Cell::new(now),
        }
    }

    /// Jump to `now`.
    pub fn set(&self, now: f64) {
        self.now.set(now);
    }

    /// Move forward by `dt` milliseconds.
    pub fn advance(&self, dt: f64) {
        self.now.set(self.now.get() + dt);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.now.get()
    }
}

/// Recorder configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Decimal digits kept in each time delta.
    pub precision: u32,
    /// Key sequences that control the host and are never recorded.
    pub reserved_keys: Vec<String>,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            precision: 2,
            reserved_keys: vec![
                "Mod-Alt-2".to_string(),
                "Mod-Alt-3".to_string(),
                "Mod-Alt-4".to_string(),
            ],
        }
    }
}

impl RecorderConfig {
    /// Set the delta precision.
    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = precision;
        self
    }

    /// Replace the reserved key sequences.
    pub fn with_reserved_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reserved_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Returns `true` if `key` must not be recorded.
    pub fn is_reserved(&self, key: &str) -> bool {
        self.reserved_keys.iter().any(|k| k == key)
    }
}

/// State of one recording.
#[derive(Debug, Clone)]
struct Session<A> {
    capture_start: f64,
    pause_accumulated: f64,
    paused_at: Option<f64>,
    active: bool,
    buffer: Vec<(f64, A)>,
}

/// Captures timestamped actions of type `A`.
pub struct Recorder<A> {
    config: RecorderConfig,
    clock: Rc<dyn Clock>,
    session: Option<Session<A>>,
}

impl<A> Recorder<A> {
    /// A recorder reading time from `clock`.
    pub fn new(config: RecorderConfig, clock: Rc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            session: None,
        }
    }

    /// Start a fresh session, dropping anything captured before.
    pub fn begin_recording(&mut self) {
        let now = self.clock.now();
        self.session = Some(Session {
            capture_start: now,
            pause_accumulated: 0.0,
            paused_at: None,
            active: true,
            buffer: Vec::new(),
        });
        tracing::info!(at = now, "recording started");
    }

    /// Pause at clock time `t`. Time spent paused is not recorded.
    pub fn pause_recording(&mut self, t: f64) {
        if let Some(session) = self.session.as_mut().filter(|s| s.active)
            && session.paused_at.is_none()
        {
            session.paused_at = Some(t);
            tracing::info!(at = t, "recording paused");
        }
    }

    /// Resume at clock time `t`.
    pub fn resume_recording(&mut self, t: f64) {
        if let Some(session) = self.session.as_mut()
            && let Some(paused_at) = session.paused_at.take()
        {
            session.pause_accumulated += (t - paused_at).max(0.0);
            tracing::info!(at = t, paused_for = t - paused_at, "recording resumed");
        }
    }

    /// Pause now.
    pub fn pause(&mut self) {
        let now = self.clock.now();
        self.pause_recording(now);
    }

    /// Resume now.
    pub fn resume(&mut self) {
        let now = self.clock.now();
        self.resume_recording(now);
    }

    /// Session time: clock time since the session began, excluding paused intervals.
    ///
    /// Frozen while paused; `None` without a session.
    pub fn get_time(&self) -> Option<f64> {
        let session = self.session.as_ref()?;
        let now = session.paused_at.unwrap_or_else(|| self.clock.now());
        Some(now - session.capture_start - session.pause_accumulated)
    }

    /// Returns `true` while a session is active (begun and not ended).
    pub fn is_active(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.active)
    }

    /// Returns `true` while the active session is paused.
    pub fn is_paused(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.active && s.paused_at.is_some())
    }

    /// Record `action` at the current session time.
    ///
    /// Returns `false`, recording nothing, when no session is active or it is paused.
    pub fn capture(&mut self, action: A) -> bool {
        if !self.is_active() || self.is_paused() {
            return false;
        }
        let Some(time) = self.get_time() else {
            return false;
        };
        if let Some(session) = self.session.as_mut() {
            session.buffer.push((time, action));
            tracing::trace!(time, captured = session.buffer.len(), "capture");
        }
        true
    }

    /// Stop capturing. The buffer is kept for [`Recorder::finalize_recording`].
    pub fn end_recording(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.active = false;
            session.paused_at = None;
            tracing::info!(captured = session.buffer.len(), "recording ended");
        }
    }

    /// Number of captured actions in the current session.
    pub fn captured(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.buffer.len())
    }

    /// Turn the buffer into a trace.
    ///
    /// `start_delay` is subtracted from every capture time; captures that end up negative
    /// are dropped. The session is consumed.
    pub fn finalize_recording(&mut self, start_delay: f64) -> Trace<A> {
        let Some(session) = self.session.take() else {
            return Trace::empty();
        };

        let total = session.buffer.len();
        let absolute: Vec<(f64, A)> = session
            .buffer
            .into_iter()
            .map(|(time, action)| (time - start_delay, action))
            .filter(|(time, _)| *time >= 0.0)
            .collect();

        tracing::info!(
            kept = absolute.len(),
            dropped = total - absolute.len(),
            start_delay,
            "recording finalized"
        );
        Trace::from_absolute(absolute, self.config.precision)
    }

    /// Recorder configuration.
    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }
}

/// Map an editor event to the operation it records, if any.
fn operation_for(event: &EditorEvent, config: &RecorderConfig) -> Option<Operation> {
    match event {
        EditorEvent::Change(change) => Some(Operation::Text(change.clone())),
        EditorEvent::CursorActivity(range) if range.is_empty() => {
            Some(Operation::Cursor(range.head))
        }
        EditorEvent::CursorActivity(range) => Some(Operation::Selection(*range)),
        EditorEvent::KeyHandled(key) if config.is_reserved(key) => None,
        EditorEvent::KeyHandled(key) => Some(Operation::Command(key.clone())),
        EditorEvent::Focus | EditorEvent::Blur => None,
    }
}

/// Records a live editor widget into a trace of [`Operation`]s.
pub struct CodeRecorder {
    recorder: Rc<RefCell<Recorder<Operation>>>,
    subscription: Option<SubscriptionId>,
}

impl CodeRecorder {
    /// A recorder with no session yet.
    pub fn new(config: RecorderConfig, clock: Rc<dyn Clock>) -> Self {
        Self {
            recorder: Rc::new(RefCell::new(Recorder::new(config, clock))),
            subscription: None,
        }
    }

    /// Start a session and subscribe to `widget`'s change, cursor and key events.
    pub fn begin_recording(&mut self, widget: &mut dyn EditorWidget) {
        if let Some(id) = self.subscription.take() {
            widget.unsubscribe(id);
        }
        self.recorder.borrow_mut().begin_recording();

        let recorder = Rc::clone(&self.recorder);
        self.subscription = Some(widget.subscribe(Box::new(move |event: &EditorEvent| {
            let mut recorder = recorder.borrow_mut();
            if let Some(op) = operation_for(event, recorder.config()) {
                recorder.capture(op);
            }
        })));
    }

    /// Pause at clock time `t`.
    pub fn pause_recording(&mut self, t: f64) {
        self.recorder.borrow_mut().pause_recording(t);
    }

    /// Resume at clock time `t`.
    pub fn resume_recording(&mut self, t: f64) {
        self.recorder.borrow_mut().resume_recording(t);
    }

    /// Current session time.
    pub fn get_time(&self) -> Option<f64> {
        self.recorder.borrow().get_time()
    }

    /// Returns `true` while recording.
    pub fn is_active(&self) -> bool {
        self.recorder.borrow().is_active()
    }

    /// Returns `true` while paused.
    pub fn is_paused(&self) -> bool {
        self.recorder.borrow().is_paused()
    }

    /// Number of captured operations.
    pub fn captured(&self) -> usize {
        self.recorder.borrow().captured()
    }

    /// Stop recording and detach from `widget`.
    pub fn end_recording(&mut self, widget: &mut dyn EditorWidget) {
        if let Some(id) = self.subscription.take() {
            widget.unsubscribe(id);
        }
        self.recorder.borrow_mut().end_recording();
    }

    /// Turn the captured operations into a trace.
    pub fn finalize_recording(&mut self, start_delay: f64) -> Trace<Operation> {
        self.recorder.borrow_mut().finalize_recording(start_delay)
    }
}

/// Records structured view updates into a trace of [`StructuredAction`]s.
pub struct ChangeRecorder {
    recorder: Recorder<StructuredAction>,
    keys: Vec<String>,
}

impl ChangeRecorder {
    /// A recorder that also captures the key sequences in `keys`.
    pub fn new<I, S>(config: RecorderConfig, clock: Rc<dyn Clock>, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            recorder: Recorder::new(config, clock),
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Record a view update: its changes and the selection set by its last transaction.
    ///
    /// Updates that neither change the document nor set a selection are ignored.
    pub fn on_view_update(&mut self, changes: &ChangeSet, selection: Option<OffsetRange>) -> bool {
        if changes.is_empty() && selection.is_none() {
            return false;
        }
        self.recorder.capture(StructuredAction::Change {
            changes: changes.clone(),
            selection,
        })
    }

    /// Record a key sequence if it is one of the listed keys.
    ///
    /// Never consumes the key: the return value only says whether it was recorded.
    pub fn on_key(&mut self, key: &str) -> bool {
        if !self.keys.iter().any(|k| k == key) {
            return false;
        }
        self.recorder.capture(StructuredAction::Command(key.to_string()))
    }

    /// The listed key sequences.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// The underlying recorder, for session control.
    pub fn recorder(&self) -> &Recorder<StructuredAction> {
        &self.recorder
    }

    /// Mutable access to the underlying recorder.
    pub fn recorder_mut(&mut self) -> &mut Recorder<StructuredAction> {
        &mut self.recorder
    }
}
