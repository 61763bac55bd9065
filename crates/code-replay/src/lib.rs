#![warn(missing_docs)]
//! Code Replay - Timed Replay Engine for Recorded Editing Sessions
//!
//! # Overview
//!
//! `code-replay` reconstructs a code editor's document, cursor and selection at any point of
//! a playback timeline from a recorded trace of edits. Playback can jump anywhere, forwards
//! or backwards, and every jump costs one pass over the entries between the old and the new
//! position plus one update of the editor widget.
//!
//! The editor widget and the playback clock belong to the host. The crate talks to the
//! widget through [`EditorWidget`] and receives time through [`PlaybackHub`].
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐   trace (JSON)   ┌────────────────────┐   set_value    ┌──────────┐
//! │ CodeRecorder  │ ───────────────▶ │ CodeReplay         │ ─────────────▶ │  Editor  │
//! │ ChangeRecorder│                  │ StructuredReplay   │   dispatch     │  widget  │
//! └───────▲───────┘                  └─────────▲──────────┘                └──────────┘
//!         │ change / cursor / key events       │ seek / timeupdate
//!    live editor                          PlaybackHub
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use code_replay::{CodeReplay, HeadlessEditor, PlaybackHub, ReplayConfig, Trace};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let trace = Trace::from_json(r#"[
//!     [0, ["text", {"from": {"line": 0, "ch": 0}, "to": {"line": 0, "ch": 0}, "text": ["fn main() {}"], "removed": [""]}]],
//!     [500, ["cursor", {"line": 0, "ch": 11}]]
//! ]"#).unwrap();
//!
//! let replay = CodeReplay::new(trace, ReplayConfig::default().with_start("0:01"), &()).unwrap();
//! let replay = Rc::new(RefCell::new(replay));
//! replay.borrow_mut().mount(HeadlessEditor::default());
//!
//! let mut hub = PlaybackHub::new();
//! CodeReplay::attach(&replay, &mut hub);
//!
//! hub.time_update(1_600.0);
//! assert_eq!(replay.borrow().state().value.text(), "fn main() {}");
//! assert_eq!(replay.borrow().state().cursor.column, 11);
//!
//! hub.seek(1_200.0);
//! assert_eq!(replay.borrow().state().cursor.column, 0);
//! ```
//!
//! # Module Description
//!
//! - [`ops`] - recorded operations and their wire form
//! - [`trace`] - delta-encoded traces
//! - [`document`] - line-array document model
//! - [`replay`] - plain replayer
//! - [`changeset`] - composable, invertible changes
//! - [`structured`] - structured replayer and fake selection
//! - [`recorder`] - trace recorders
//! - [`overlay`] - synthetic cursor and selection geometry
//! - [`widget`] - editor widget interface
//! - [`headless`] - in-memory widgets
//! - [`keys`] - key sequences and host key capture
//! - [`timing`] - replay origin resolution

pub mod changeset;
pub mod document;
pub mod error;
pub mod events;
pub mod headless;
pub mod keys;
pub mod ops;
pub mod overlay;
pub mod playback;
pub mod recorder;
pub mod replay;
pub mod structured;
mod text;
pub mod timing;
pub mod trace;
pub mod widget;

pub use changeset::ChangeSet;
pub use document::LineDocument;
pub use error::{ChangeSetError, ReplayError, TraceError};
pub use events::{Listener, Listeners, SubscriptionId};
pub use headless::{HeadlessConfig, HeadlessEditor, HeadlessFactory, HeadlessView};
pub use keys::{
    KeyCaptureHost, KeyMap, PassThrough, Platform, SuspendControls, normalize, pass_through,
    to_host_sequence,
};
pub use ops::{Direction, Operation, Position, SelectionRange, TextChange};
pub use overlay::{Blinker, CursorOverlay, CursorRect, SelectionOverlay, SelectionRect};
pub use playback::{PlaybackEvent, PlaybackHub};
pub use recorder::{
    ChangeRecorder, Clock, CodeRecorder, ManualClock, Recorder, RecorderConfig, SystemClock,
};
pub use replay::{CodeReplay, CommandHandler, ReplayConfig, ReplayState};
pub use structured::{
    FakeSelectionLayer, KeyHandler, OffsetRange, SelectionEffect, SelectionOverride,
    StructuredAction, StructuredReplay, StructuredView, Transaction,
};
pub use timing::{MarkerResolver, StartTime, parse_timestamp};
pub use trace::{Trace, TraceEntry};
pub use widget::{Coords, EditorEvent, EditorFactory, EditorListener, EditorWidget, ScrollInfo};
