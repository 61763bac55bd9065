//! Host playback signals.
//!
//! The host timeline owns the clock; this crate only listens. A [`PlaybackHub`] is the
//! bridge: the host calls [`PlaybackHub::seek`] and [`PlaybackHub::time_update`] with the
//! elapsed playback time, and every attached replayer receives a tick.

use crate::events::{Listener, Listeners, SubscriptionId};

/// A playback-time signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackEvent {
    /// The viewer jumped to a new time.
    Seek(f64),
    /// Time advanced during normal playback.
    TimeUpdate(f64),
}

impl PlaybackEvent {
    /// Elapsed playback time carried by the event, in milliseconds.
    pub fn time(&self) -> f64 {
        match *self {
            PlaybackEvent::Seek(t) | PlaybackEvent::TimeUpdate(t) => t,
        }
    }
}

/// Fan-out point for playback signals.
#[derive(Debug, Default)]
pub struct PlaybackHub {
    listeners: Listeners<PlaybackEvent>,
    current_time: f64,
}

impl PlaybackHub {
    /// A hub with no listeners, at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to both `seek` and `timeupdate`.
    pub fn on(&mut self, listener: Listener<PlaybackEvent>) -> SubscriptionId {
        self.listeners.subscribe(listener)
    }

    /// Detach a listener.
    pub fn off(&mut self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }

    /// Emit a `seek` to `t`.
    pub fn seek(&mut self, t: f64) {
        self.emit(PlaybackEvent::Seek(t));
    }

    /// Emit a `timeupdate` at `t`.
    pub fn time_update(&mut self, t: f64) {
        self.emit(PlaybackEvent::TimeUpdate(t));
    }

    /// Last time emitted.
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    fn emit(&mut self, event: PlaybackEvent) {
        self.current_time = event.time();
        self.listeners.emit(&event);
    }
}
