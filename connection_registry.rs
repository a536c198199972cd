/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Forwards per-display connection events (hotplug, screen power,
//! config change, vsync phase offset) to whichever event-thread object
//! an embedder registered for that display, without this crate needing
//! to know anything about how that thread is actually implemented.

use rustc_hash::FxHashMap;

use crate::ids::ConnectionHandle;

/// An embedder-owned sink for one display connection's events. A real
/// implementation typically posts each call onto that display's own
/// event thread rather than handling it inline.
pub trait ConnectionEventThread {
    fn on_hotplug(&mut self, connected: bool);
    fn on_screen_acquired(&mut self);
    fn on_screen_released(&mut self);
    fn on_config_changed(&mut self, config_id: u32);
    fn set_phase_offset(&mut self, offset_ns: i64);
    fn dump(&self) -> String;
}

/// Maps each live [`ConnectionHandle`] to the event thread that owns it,
/// and forwards every [`ConnectionEventThread`] method to the right one.
/// A handle unknown at the time of a call is logged and ignored rather
/// than treated as an error: a hotplug racing a teardown is routine, not
/// exceptional.
#[derive(Default)]
pub struct ConnectionRegistry {
    next_id: u32,
    connections: FxHashMap<ConnectionHandle, Box<dyn ConnectionEventThread>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        ConnectionRegistry { next_id: 0, connections: FxHashMap::default() }
    }

    pub fn add(&mut self, event_thread: Box<dyn ConnectionEventThread>) -> ConnectionHandle {
        let handle = ConnectionHandle(self.next_id);
        self.next_id += 1;
        self.connections.insert(handle, event_thread);
        handle
    }

    pub fn remove(&mut self, handle: ConnectionHandle) -> bool {
        self.connections.remove(&handle).is_some()
    }

    pub fn on_hotplug(&mut self, handle: ConnectionHandle, connected: bool) {
        self.forward(handle, |thread| thread.on_hotplug(connected));
    }

    pub fn on_screen_acquired(&mut self, handle: ConnectionHandle) {
        self.forward(handle, |thread| thread.on_screen_acquired());
    }

    pub fn on_screen_released(&mut self, handle: ConnectionHandle) {
        self.forward(handle, |thread| thread.on_screen_released());
    }

    pub fn on_config_changed(&mut self, handle: ConnectionHandle, config_id: u32) {
        self.forward(handle, |thread| thread.on_config_changed(config_id));
    }

    pub fn set_phase_offset(&mut self, handle: ConnectionHandle, offset_ns: i64) {
        self.forward(handle, |thread| thread.set_phase_offset(offset_ns));
    }

    /// Returns each live connection's own dump text, for a combined
    /// service dump. An unknown handle never reaches this, since it only
    /// ever iterates handles this registry actually holds.
    pub fn dump(&self) -> String {
        let mut handles: Vec<&ConnectionHandle> = self.connections.keys().collect();
        handles.sort();
        handles
            .into_iter()
            .map(|handle| format!("{handle:?}: {}", self.connections[handle].dump()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    fn forward<F: FnOnce(&mut dyn ConnectionEventThread)>(&mut self, handle: ConnectionHandle, f: F) {
        match self.connections.get_mut(&handle) {
            Some(thread) => f(thread.as_mut()),
            None => log::warn!("connection event for unknown handle {handle:?}"),
        }
    }
}
