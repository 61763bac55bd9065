//! Key sequences shared between the editor and the host.
//!
//! The editor names key sequences in its own notation (`Mod-Alt-2`, with `Mod` meaning the
//! platform's command key). The host timeline uses a canonical `+`-joined notation with a
//! fixed modifier order (`Ctrl+Alt+Shift+Meta+key`). Hosts also capture keys globally for
//! playback control, which must be suspended while a viewer types into an editable widget.

use crate::events::SubscriptionId;
use crate::widget::{EditorEvent, EditorWidget};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Platform that decides what `Mod` means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// `Mod` is the command key (`Meta`).
    Mac,
    /// `Mod` is `Ctrl`.
    Other,
}

impl Platform {
    /// The platform this crate is compiled for.
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::Mac
        } else {
            Platform::Other
        }
    }
}

/// Modifier set of a key sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
struct Modifiers {
    bits: u8,
}

impl Modifiers {
    const CTRL: u8 = 0b0001;
    const ALT: u8 = 0b0010;
    const SHIFT: u8 = 0b0100;
    const META: u8 = 0b1000;

    /// Canonical order.
    const NAMES: [(u8, &'static str); 4] = [
        (Self::CTRL, "Ctrl"),
        (Self::ALT, "Alt"),
        (Self::SHIFT, "Shift"),
        (Self::META, "Meta"),
    ];

    fn parse(name: &str, platform: Platform) -> Option<u8> {
        match name.to_ascii_lowercase().as_str() {
            "ctrl" | "control" | "c" => Some(Self::CTRL),
            "alt" | "option" | "a" => Some(Self::ALT),
            "shift" | "s" => Some(Self::SHIFT),
            "meta" | "cmd" | "m" => Some(Self::META),
            "mod" => Some(match platform {
                Platform::Mac => Self::META,
                Platform::Other => Self::CTRL,
            }),
            _ => None,
        }
    }
}

fn split_sequence(seq: &str, separator: char) -> (Vec<&str>, &str) {
    // A trailing doubled separator names the separator key itself (`Ctrl--`).
    let doubled: String = [separator, separator].iter().collect();
    if let Some(prefix) = seq.strip_suffix(doubled.as_str()) {
        let parts = prefix.split(separator).filter(|p| !p.is_empty()).collect();
        return (parts, &seq[seq.len() - separator.len_utf8()..]);
    }
    if seq.len() == separator.len_utf8() && seq.starts_with(separator) {
        return (Vec::new(), seq);
    }
    let mut parts: Vec<&str> = seq.split(separator).collect();
    let key = parts.pop().unwrap_or_default();
    (parts, key)
}

fn canonical(modifiers: &[&str], key: &str, platform: Platform) -> String {
    let mut bits = 0;
    let mut unknown = Vec::new();
    for name in modifiers {
        match Modifiers::parse(name, platform) {
            Some(bit) => bits |= bit,
            None => unknown.push(*name),
        }
    }
    let modifiers = Modifiers { bits };

    let mut out: Vec<&str> = Modifiers::NAMES
        .iter()
        .filter(|(bit, _)| modifiers.bits & bit != 0)
        .map(|(_, name)| *name)
        .collect();
    out.extend(unknown);
    out.push(key);
    out.join("+")
}

/// Convert an editor key sequence (`Mod-Shift-z`) to host notation (`Ctrl+Shift+z`).
pub fn to_host_sequence(seq: &str, platform: Platform) -> String {
    let (modifiers, key) = split_sequence(seq, '-');
    canonical(&modifiers, key, platform)
}

/// Bring a host-notation sequence into canonical modifier order.
pub fn normalize(seq: &str) -> String {
    let (modifiers, key) = split_sequence(seq, '+');
    canonical(&modifiers, key, Platform::Other)
}

/// The host's global key capture.
pub trait KeyCaptureHost {
    /// Stop handling keys globally.
    fn suspend_key_capture(&mut self);

    /// Resume handling keys globally.
    fn resume_key_capture(&mut self);

    /// Run the host's handlers for a canonical sequence, even while capture is suspended.
    fn dispatch_key(&mut self, seq: &str);
}

/// Host key handler callback.
pub type KeyCallback = Box<dyn FnMut(&str)>;

/// A simple host keymap: canonical sequences to handlers, with suspendable capture.
#[derive(Default)]
pub struct KeyMap {
    handlers: HashMap<String, Vec<KeyCallback>>,
    suspended: bool,
}

impl KeyMap {
    /// An empty keymap with capture enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `seq` (any modifier order).
    pub fn on(&mut self, seq: &str, handler: KeyCallback) {
        self.handlers.entry(normalize(seq)).or_default().push(handler);
    }

    /// Handle a key captured globally. Ignored while capture is suspended.
    ///
    /// Returns `true` if some handler ran.
    pub fn handle(&mut self, seq: &str) -> bool {
        if self.suspended {
            return false;
        }
        self.run(&normalize(seq))
    }

    /// Returns `true` while capture is suspended.
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    fn run(&mut self, seq: &str) -> bool {
        match self.handlers.get_mut(seq) {
            Some(handlers) if !handlers.is_empty() => {
                for handler in handlers.iter_mut() {
                    handler(seq);
                }
                true
            }
            _ => false,
        }
    }
}

impl std::fmt::Debug for KeyMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMap")
            .field("sequences", &self.handlers.keys().collect::<Vec<_>>())
            .field("suspended", &self.suspended)
            .finish()
    }
}

impl KeyCaptureHost for KeyMap {
    fn suspend_key_capture(&mut self) {
        self.suspended = true;
    }

    fn resume_key_capture(&mut self) {
        self.suspended = false;
    }

    fn dispatch_key(&mut self, seq: &str) {
        self.run(&normalize(seq));
    }
}

/// Editor key bindings that forward to the host's handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassThrough {
    /// Editor notation to host notation.
    bindings: Vec<(String, String)>,
}

impl PassThrough {
    /// Forward each sequence in `seqs` (editor notation).
    pub fn new<I, S>(seqs: I, platform: Platform) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let bindings = seqs
            .into_iter()
            .map(|key| {
                let key: String = key.into();
                let host = to_host_sequence(&key, platform);
                (key, host)
            })
            .collect();
        Self { bindings }
    }

    /// Run the host handlers bound to `key`, if it is one of the forwarded sequences.
    ///
    /// Never consumes the key: the editor still handles it. The return value says whether
    /// the host was called.
    pub fn forward(&self, key: &str, host: &mut dyn KeyCaptureHost) -> bool {
        let Some((_, seq)) = self.bindings.iter().find(|(k, _)| k == key) else {
            return false;
        };
        tracing::trace!(key, seq = seq.as_str(), "pass through");
        host.dispatch_key(seq);
        true
    }

    /// The forwarded editor sequences.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|(k, _)| k.as_str())
    }
}

/// Forward `seqs` from `widget` to `host`: every time the widget handles one of them, the
/// host's handlers run too.
pub fn pass_through<W, H>(
    widget: &mut W,
    host: Rc<RefCell<H>>,
    seqs: &[&str],
    platform: Platform,
) -> SubscriptionId
where
    W: EditorWidget + ?Sized,
    H: KeyCaptureHost + 'static,
{
    let bindings = PassThrough::new(seqs.iter().copied(), platform);
    widget.subscribe(Box::new(move |event: &EditorEvent| {
        if let EditorEvent::KeyHandled(key) = event {
            bindings.forward(key, &mut *host.borrow_mut());
        }
    }))
}

/// Suspends host key capture while an editable widget has focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuspendControls {
    read_only: bool,
}

impl SuspendControls {
    /// Controls for a widget; read-only widgets never suspend capture.
    pub fn new(read_only: bool) -> Self {
        Self { read_only }
    }

    /// React to a widget event.
    pub fn handle(&self, event: &EditorEvent, host: &mut dyn KeyCaptureHost) {
        if self.read_only {
            return;
        }
        match event {
            EditorEvent::Focus => host.suspend_key_capture(),
            EditorEvent::Blur => host.resume_key_capture(),
            _ => {}
        }
    }

    /// Subscribe to `widget`'s focus and blur events on behalf of `host`.
    pub fn attach<W, H>(self, widget: &mut W, host: Rc<RefCell<H>>) -> SubscriptionId
    where
        W: EditorWidget + ?Sized,
        H: KeyCaptureHost + 'static,
    {
        widget.subscribe(Box::new(move |event: &EditorEvent| {
            self.handle(event, &mut *host.borrow_mut());
        }))
    }
}
