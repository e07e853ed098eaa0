//! Ordered observer registry
//!
//! Shared by the telemetry relay and the detection pipeline. Listeners are
//! invoked in registration order; removal goes through the handle returned on
//! registration.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Callback registration handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u32);

impl ListenerHandle {
    pub fn id(&self) -> u32 {
        self.0
    }
}

/// Registration-ordered list of callbacks of type `F`
pub struct ListenerRegistry<F: ?Sized> {
    entries: Mutex<Vec<(ListenerHandle, Arc<F>)>>,
    next_id: AtomicU32,
}

impl<F: ?Sized> Default for ListenerRegistry<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ?Sized> ListenerRegistry<F> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            next_id: AtomicU32::new(1),
        }
    }

    /// Append a listener
    pub fn subscribe(&self, listener: Arc<F>) -> ListenerHandle {
        let handle = ListenerHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.lock().push((handle, listener));
        handle
    }

    /// Remove a listener; returns `false` for an unknown handle
    pub fn unsubscribe(&self, handle: ListenerHandle) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(h, _)| *h != handle);
        entries.len() != before
    }

    /// Listeners in invocation order.
    ///
    /// The lock is released before the caller invokes anything, so a
    /// listener may subscribe or unsubscribe from inside its own callback.
    pub fn snapshot(&self) -> Vec<Arc<F>> {
        self.entries.lock().iter().map(|(_, l)| Arc::clone(l)).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Callback = dyn Fn(&mut Vec<u32>) + Send + Sync;

    fn recorder(tag: u32) -> Arc<Callback> {
        Arc::new(move |log: &mut Vec<u32>| log.push(tag))
    }

    fn invoke(registry: &ListenerRegistry<Callback>) -> Vec<u32> {
        let mut log = Vec::new();
        for listener in registry.snapshot() {
            listener(&mut log);
        }
        log
    }

    #[test]
    fn test_registration_order_is_invocation_order() {
        let registry = ListenerRegistry::<Callback>::new();
        for tag in [3, 1, 2] {
            registry.subscribe(recorder(tag));
        }
        assert_eq!(invoke(&registry), vec![3, 1, 2]);
    }

    #[test]
    fn test_unsubscribe_by_handle() {
        let registry = ListenerRegistry::<Callback>::new();
        let first = registry.subscribe(recorder(1));
        let second = registry.subscribe(recorder(2));
        registry.subscribe(recorder(3));

        assert!(registry.unsubscribe(second));
        assert!(!registry.unsubscribe(second));
        assert_eq!(invoke(&registry), vec![1, 3]);

        assert!(registry.unsubscribe(first));
        assert_eq!(registry.len(), 1);
        assert_ne!(first.id(), second.id());
    }
}
