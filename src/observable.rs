/// Observable
///
/// Synchronous publish/subscribe used for every change stream in the crate:
/// provider mesh streams, tracker streams, session signals and scroll
/// notifications.
///
/// - Subscribers are notified in registration order
/// - Subscribers are removed by the handle returned from `add`
/// - `notify` works on a snapshot, so a callback may add or remove
///   subscribers (including itself) while being notified

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

/// Subscriber callback type
pub type Observer<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Handle identifying one subscription on one observable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverHandle(u64);

pub struct Observable<T> {
    observers: RwLock<Vec<(ObserverHandle, Observer<T>)>>,
    next_handle: AtomicU64,
}

impl<T> Observable<T> {
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(Vec::new()),
            next_handle: AtomicU64::new(1),
        }
    }

    /// Subscribe a callback, returning the handle used to remove it
    pub fn add(&self, observer: impl Fn(&T) + Send + Sync + 'static) -> ObserverHandle {
        let handle = ObserverHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.observers.write().push((handle, Arc::new(observer)));
        handle
    }

    /// Remove a subscription. Returns false if the handle was not subscribed
    pub fn remove(&self, handle: ObserverHandle) -> bool {
        let mut observers = self.observers.write();
        match observers.iter().position(|(h, _)| *h == handle) {
            Some(pos) => {
                observers.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Call every subscriber with `value`, in registration order
    pub fn notify(&self, value: &T) {
        let snapshot: Vec<Observer<T>> = self
            .observers
            .read()
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect();

        for observer in snapshot {
            observer(value);
        }
    }

    /// Drop every subscriber
    pub fn clear(&self) {
        self.observers.write().clear();
    }

    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }

    pub fn has_observers(&self) -> bool {
        !self.is_empty()
    }
}

impl<T> Default for Observable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("observers", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_notify_in_registration_order() {
        let observable = Observable::<u32>::new();
        let received = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let received = received.clone();
            observable.add(move |value| received.lock().push(format!("{}:{}", tag, value)));
        }

        observable.notify(&7);
        assert_eq!(*received.lock(), vec!["first:7", "second:7", "third:7"]);
    }

    #[test]
    fn test_remove_by_handle() {
        let observable = Observable::<u32>::new();
        let count = Arc::new(Mutex::new(0));

        let counter = count.clone();
        let handle = observable.add(move |_| *counter.lock() += 1);
        observable.add(|_| {});
        assert_eq!(observable.len(), 2);

        assert!(observable.remove(handle));
        assert!(!observable.remove(handle));
        observable.notify(&1);

        assert_eq!(*count.lock(), 0);
        assert_eq!(observable.len(), 1);
    }

    #[test]
    fn test_handles_are_distinct_for_identical_callbacks() {
        let observable = Observable::<()>::new();
        let a = observable.add(|_| {});
        let b = observable.add(|_| {});
        assert_ne!(a, b);
    }

    #[test]
    fn test_reentrant_unsubscribe() {
        let observable = Arc::new(Observable::<u32>::new());
        let calls = Arc::new(Mutex::new(0));
        let handle_slot: Arc<Mutex<Option<ObserverHandle>>> = Arc::new(Mutex::new(None));

        let weak = Arc::downgrade(&observable);
        let slot = handle_slot.clone();
        let counter = calls.clone();
        let handle = observable.add(move |_| {
            *counter.lock() += 1;
            if let (Some(observable), Some(handle)) = (weak.upgrade(), *slot.lock()) {
                observable.remove(handle);
            }
        });
        *handle_slot.lock() = Some(handle);

        observable.notify(&1);
        observable.notify(&2);

        assert_eq!(*calls.lock(), 1);
        assert!(observable.is_empty());
    }

    #[test]
    fn test_clear() {
        let observable = Observable::<u32>::new();
        observable.add(|_| {});
        observable.add(|_| {});
        assert!(observable.has_observers());

        observable.clear();
        assert!(!observable.has_observers());
    }
}
