//! Per-device observer list.
//!
//! Every push-model device owns one [`EventBus`]. Listeners are registered with an id and can
//! be muted, re-enabled or removed at any time. Devices emit only after releasing their state
//! lock, so a listener may read the device it listens to. It must not register or remove
//! listeners on that same device from inside `on_input`.

use crate::event::InputEvent;
use std::collections::BTreeMap;

/// Trait for reacting to events from one device.
pub trait InputListener<K>: Send {
    fn on_input(&mut self, event: &InputEvent<K>);
}

impl<K, F> InputListener<K> for F
where
    F: FnMut(&InputEvent<K>) + Send,
{
    fn on_input(&mut self, event: &InputEvent<K>) {
        self(event)
    }
}

/// Handle returned by [`EventBus::add_listener`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Metadata-wrapped listener with control flags.
struct ListenerEntry<K> {
    listener: Box<dyn InputListener<K>>,
    enabled: bool,
}

pub struct EventBus<K> {
    next_id: u64,
    // Ordered by id so listeners fire in registration order.
    listeners: BTreeMap<ListenerId, ListenerEntry<K>>,
}

impl<K> Default for EventBus<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> EventBus<K> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            listeners: BTreeMap::new(),
        }
    }

    /// Registers a listener; it starts enabled.
    pub fn add_listener(&mut self, listener: impl InputListener<K> + 'static) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.insert(
            id,
            ListenerEntry {
                listener: Box::new(listener),
                enabled: true,
            },
        );
        id
    }

    /// Enables a previously registered listener.
    pub fn enable(&mut self, id: ListenerId) {
        if let Some(entry) = self.listeners.get_mut(&id) {
            entry.enabled = true;
        }
    }

    /// Disables (mutes) a listener without removing it.
    pub fn disable(&mut self, id: ListenerId) {
        if let Some(entry) = self.listeners.get_mut(&id) {
            entry.enabled = false;
        }
    }

    /// Unregisters a listener entirely. Returns `false` for unknown ids.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Emits one event to all enabled listeners.
    pub fn emit(&mut self, event: &InputEvent<K>) {
        for entry in self.listeners.values_mut() {
            if entry.enabled {
                entry.listener.on_input(event);
            }
        }
    }

    /// Emits a batch of events in order.
    pub fn emit_all(&mut self, events: &[InputEvent<K>]) {
        for event in events {
            self.emit(event);
        }
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }
}
