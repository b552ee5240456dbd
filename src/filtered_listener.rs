use crate::event::InputEvent;
use crate::eventbus::InputListener;

/// Wraps a listener and forwards only events matching a user-supplied predicate.
pub struct FilteredListener<K> {
    predicate: Box<dyn Fn(&InputEvent<K>) -> bool + Send + Sync>,
    inner: Box<dyn InputListener<K>>,
}

impl<K> FilteredListener<K> {
    pub fn new(
        predicate: impl Fn(&InputEvent<K>) -> bool + Send + Sync + 'static,
        inner: impl InputListener<K> + 'static,
    ) -> Self {
        Self {
            predicate: Box::new(predicate),
            inner: Box::new(inner),
        }
    }
}

impl<K> InputListener<K> for FilteredListener<K> {
    fn on_input(&mut self, event: &InputEvent<K>) {
        if (self.predicate)(event) {
            self.inner.on_input(event);
        }
    }
}
