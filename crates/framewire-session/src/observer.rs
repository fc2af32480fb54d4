use std::sync::{Arc, Mutex, PoisonError};

/// A set of shared observers that can change while a dispatch is running.
///
/// Dispatch iterates a snapshot taken under the lock, so observers may add or
/// remove observers (themselves included) from inside a callback. A removal
/// takes effect from the next dispatch on.
pub struct ObserverList<O: ?Sized> {
    observers: Mutex<Vec<Arc<O>>>,
}

impl<O: ?Sized> ObserverList<O> {
    pub fn new() -> Self {
        Self {
            observers: Mutex::new(Vec::new()),
        }
    }

    pub fn add(&self, observer: Arc<O>) {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    /// Remove `observer` by identity. Returns false if it was not present.
    pub fn remove(&self, observer: &Arc<O>) -> bool {
        let mut observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
        match observers.iter().position(|o| Arc::ptr_eq(o, observer)) {
            Some(index) => {
                observers.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<Arc<O>> {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Invoke `f` on every observer, outside the lock.
    pub fn for_each(&self, mut f: impl FnMut(&O)) {
        for observer in self.snapshot() {
            f(&observer);
        }
    }
}

impl<O: ?Sized> Default for ObserverList<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: ?Sized> std::fmt::Debug for ObserverList<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverList")
            .field("len", &self.len())
            .finish()
    }
}
