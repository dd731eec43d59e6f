//! Listener registry shared by transport implementations.

use crate::{Listener, ListenerId, ListenerKey, TransportEvent};
use alloy_primitives::TxHash;
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

/// Publish/subscribe registry keyed by [`ListenerKey`].
///
/// Listeners are cloned out of the lock before they run, so a listener may
/// register or remove listeners on the same hub.
#[derive(Default)]
pub struct EventHub {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<ListenerKey, Vec<(ListenerId, Listener)>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, key: ListenerKey, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .entry(key)
            .or_default()
            .push((id, listener));
        id
    }

    pub fn remove_listener(&self, key: &ListenerKey, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let Some(entries) = listeners.get_mut(key) else {
            return false;
        };

        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        let removed = entries.len() != before;

        if entries.is_empty() {
            listeners.remove(key);
        }

        removed
    }

    /// Invoke every listener under `key`, keeping them registered.
    ///
    /// Returns the number of listeners invoked.
    pub fn emit(&self, key: &ListenerKey, event: &TransportEvent) -> usize {
        let targets: Vec<Listener> = self
            .listeners
            .lock()
            .get(key)
            .map(|entries| entries.iter().map(|(_, l)| l.clone()).collect())
            .unwrap_or_default();

        for listener in &targets {
            listener(event.clone());
        }

        targets.len()
    }

    /// Invoke and deregister every listener under `key`.
    pub fn emit_once(&self, key: &ListenerKey, event: &TransportEvent) -> usize {
        let targets = self.listeners.lock().remove(key).unwrap_or_default();

        for (_, listener) in &targets {
            listener(event.clone());
        }

        targets.len()
    }

    pub fn listener_count(&self, key: &ListenerKey) -> usize {
        self.listeners.lock().get(key).map_or(0, Vec::len)
    }

    /// Transaction hashes that currently have at least one listener.
    pub fn watched_transactions(&self) -> Vec<TxHash> {
        self.listeners
            .lock()
            .keys()
            .filter_map(|key| match key {
                ListenerKey::Transaction(hash) => Some(*hash),
                ListenerKey::Block => None,
            })
            .collect()
    }
}

impl fmt::Debug for EventHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners = self.listeners.lock();
        f.debug_struct("EventHub")
            .field("keys", &listeners.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    fn counting_listener(counter: &Arc<AtomicUsize>) -> Listener {
        let counter = counter.clone();
        Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_emit_keeps_listeners() {
        let hub = EventHub::new();
        let counter = Arc::new(AtomicUsize::new(0));
        hub.on(ListenerKey::Block, counting_listener(&counter));

        assert_eq!(hub.emit(&ListenerKey::Block, &TransportEvent::Block(1)), 1);
        assert_eq!(hub.emit(&ListenerKey::Block, &TransportEvent::Block(2)), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(hub.listener_count(&ListenerKey::Block), 1);
    }

    #[test]
    fn test_emit_once_removes_listeners() {
        let hub = EventHub::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let key = ListenerKey::Transaction(TxHash::repeat_byte(1));
        hub.on(key, counting_listener(&counter));

        assert_eq!(hub.watched_transactions(), vec![TxHash::repeat_byte(1)]);
        assert_eq!(hub.emit_once(&key, &TransportEvent::Block(1)), 1);
        assert_eq!(hub.emit_once(&key, &TransportEvent::Block(2)), 0);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(hub.watched_transactions().is_empty());
    }

    #[test]
    fn test_keys_are_isolated() {
        let hub = EventHub::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let first_key = ListenerKey::Transaction(TxHash::repeat_byte(1));
        let second_key = ListenerKey::Transaction(TxHash::repeat_byte(2));
        hub.on(first_key, counting_listener(&first));
        hub.on(second_key, counting_listener(&second));

        hub.emit_once(&first_key, &TransportEvent::Block(1));

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);
        assert_eq!(hub.listener_count(&second_key), 1);
    }

    #[test]
    fn test_remove_listener() {
        let hub = EventHub::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let id = hub.on(ListenerKey::Block, counting_listener(&counter));
        let other = hub.on(ListenerKey::Block, counting_listener(&counter));

        assert!(hub.remove_listener(&ListenerKey::Block, id));
        assert!(!hub.remove_listener(&ListenerKey::Block, id));
        assert_eq!(hub.listener_count(&ListenerKey::Block), 1);

        assert!(hub.remove_listener(&ListenerKey::Block, other));
        assert_eq!(hub.listener_count(&ListenerKey::Block), 0);
    }

    #[test]
    fn test_listener_can_reenter_hub() {
        let hub = Arc::new(EventHub::new());
        let inner = hub.clone();
        hub.on(
            ListenerKey::Block,
            Arc::new(move |_| {
                inner.on(ListenerKey::Transaction(TxHash::ZERO), Arc::new(|_| {}));
            }),
        );

        hub.emit(&ListenerKey::Block, &TransportEvent::Block(1));
        assert_eq!(
            hub.listener_count(&ListenerKey::Transaction(TxHash::ZERO)),
            1
        );
    }
}
