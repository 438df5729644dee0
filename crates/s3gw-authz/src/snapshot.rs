//! Atomically replaceable snapshots.
//!
//! Readers take an `Arc` to the current value and keep using it for as long as
//! they need; a concurrent [`Published::publish`] swaps in a new value without
//! affecting readers that already hold the old one.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::keys::KeyStore;
use crate::store::PolicyStore;

/// Published policy snapshot.
pub type PolicySnapshot = Published<PolicyStore>;

/// Published key snapshot.
pub type KeySnapshot = Published<KeyStore>;

/// Holder of a whole-value snapshot with lock-free reads.
///
/// Share it as `Arc<Published<T>>` between the request path and the refresher.
#[derive(Debug)]
pub struct Published<T> {
    inner: ArcSwap<T>,
}

impl<T> Published<T> {
    /// Create a holder publishing `value`.
    pub fn new(value: T) -> Self {
        Self {
            inner: ArcSwap::from_pointee(value),
        }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<T> {
        self.inner.load_full()
    }

    /// Replace the snapshot as a unit.
    pub fn publish(&self, value: T) {
        self.inner.store(Arc::new(value));
    }
}

impl<T: Default> Default for Published<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_reader_keeps_old_snapshot() {
        let holder: KeySnapshot = Published::new([("k1", "alice")].into_iter().collect());
        let before = holder.snapshot();

        holder.publish([("k2", "bob")].into_iter().collect());

        assert_eq!(before.principal("k1"), Some("alice"));
        assert_eq!(holder.snapshot().principal("k1"), None);
        assert_eq!(holder.snapshot().principal("k2"), Some("bob"));
    }

    #[test]
    fn test_concurrent_readers_never_see_torn_values() {
        // Every published value is internally consistent: both entries map to
        // the same generation number.
        let holder = Arc::new(Published::new(vec![0_u32, 0]));
        let writer = {
            let holder = Arc::clone(&holder);
            thread::spawn(move || {
                for generation in 1..500 {
                    holder.publish(vec![generation, generation]);
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let holder = Arc::clone(&holder);
                thread::spawn(move || {
                    for _ in 0..500 {
                        let snapshot = holder.snapshot();
                        assert_eq!(snapshot[0], snapshot[1]);
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(*holder.snapshot(), vec![499, 499]);
    }

    #[test]
    fn test_default_policy_snapshot_is_empty() {
        let holder = PolicySnapshot::default();
        assert_eq!(holder.snapshot().policy_count(), 0);
    }
}
