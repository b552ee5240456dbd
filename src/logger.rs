use crate::event::InputEvent;
use crate::eventbus::InputListener;
use std::fmt::Debug;

/// A listener that logs every event it receives at `debug` level.
pub struct Logger {
    target: &'static str,
}

impl Logger {
    pub fn new() -> Self {
        Self { target: "hookup::input" }
    }

    /// Log under a custom target (useful for `RUST_LOG=my_device=debug` filtering).
    pub fn with_target(target: &'static str) -> Self {
        Self { target }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Debug> InputListener<K> for Logger {
    fn on_input(&mut self, event: &InputEvent<K>) {
        log::debug!(target: self.target, "[{}] {:?}", event.device, event.kind);
    }
}
