// Explicit subscription points for pose and session notifications.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique across every `Subscribers` in the process, so an owner holding
/// several channels can route `unsubscribe` by id alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

impl SubscriptionId {
    fn next() -> Self {
        Self(NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

type Listener<T> = Box<dyn FnMut(&T) + Send>;

pub struct Subscribers<T> {
    listeners: Vec<(SubscriptionId, Listener<T>)>,
}

impl<T> Subscribers<T> {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&T) + Send + 'static) -> SubscriptionId {
        let id = SubscriptionId::next();
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns false when the id was never registered or is already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    pub fn emit(&mut self, event: &T) {
        for (_, listener) in self.listeners.iter_mut() {
            listener(event);
        }
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl<T> Default for Subscribers<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Subscribers<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscribers")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_emit_reaches_every_listener() {
        let hits = Arc::new(AtomicU32::new(0));
        let mut subscribers = Subscribers::<u32>::new();

        for _ in 0..3 {
            let hits = hits.clone();
            subscribers.subscribe(move |value| {
                hits.fetch_add(*value, Ordering::SeqCst);
            });
        }

        subscribers.emit(&2);
        assert_eq!(hits.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_ids_differ_across_channels() {
        let mut starts = Subscribers::<()>::new();
        let mut ends = Subscribers::<()>::new();
        let start_id = starts.subscribe(|_| {});
        let end_id = ends.subscribe(|_| {});

        assert_ne!(start_id, end_id);
        assert!(!starts.unsubscribe(end_id));
        assert_eq!(starts.len(), 1);
        assert!(ends.unsubscribe(end_id));
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let mut subscribers = Subscribers::<()>::new();
        let id = subscribers.subscribe(|_| {});

        assert!(subscribers.unsubscribe(id));
        assert!(!subscribers.unsubscribe(id));
        assert!(subscribers.is_empty());
    }
}
