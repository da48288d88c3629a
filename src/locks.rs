//! Per-key mutual exclusion

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

/// A table of mutexes, one per key, created on first use.
///
/// Used to serialize read-modify-write sequences on shared records (a
/// cluster's guid, a zone's network providers) across concurrent callers.
pub struct KeyedLocks<K> {
    locks: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Run `f` while holding the lock for `key`
    pub fn with<T>(&self, key: &K, f: impl FnOnce() -> T) -> T {
        let slot = self.slot(key);
        let _guard: MutexGuard<'_, ()> = slot.lock();
        f()
    }

    fn slot(&self, key: &K) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

impl<K: Eq + Hash + Clone> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_same_key_is_serialized() {
        let locks = Arc::new(KeyedLocks::<u64>::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let overlap = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = locks.clone();
                let inside = inside.clone();
                let overlap = overlap.clone();
                thread::spawn(move || {
                    locks.with(&1, || {
                        if inside.fetch_add(1, Ordering::SeqCst) > 0 {
                            overlap.fetch_add(1, Ordering::SeqCst);
                        }
                        thread::sleep(std::time::Duration::from_millis(2));
                        inside.fetch_sub(1, Ordering::SeqCst);
                    })
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(overlap.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_with_returns_value() {
        let locks = KeyedLocks::<&str>::new();
        assert_eq!(locks.with(&"a", || 5), 5);
        assert_eq!(locks.with(&"b", || locks.with(&"a", || 6)), 6);
    }
}
