//! The table of active request identities.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tether_core::logging::targets;

use super::request::RequestId;

/// Process-wide set of active requests plus the shutting-down flag.
///
/// Every operation takes the set's lock once, so add, remove, cancel-all
/// and snapshot are atomic with respect to each other. Cancellation callbacks
/// run after the lock is released.
#[derive(Debug, Default)]
pub struct RequestRegistry {
    active: Mutex<HashSet<RequestId>>,
    shutting_down: AtomicBool,
}

impl RequestRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `id` active. Returns `false` if it already was.
    pub fn add(&self, id: RequestId) -> bool {
        let added = self.active.lock().insert(id);
        tracing::debug!(target: targets::REGISTRY, %id, added, "register request");
        added
    }

    /// Remove `id`. Removing an unknown id is a no-op returning `false`.
    pub fn remove(&self, id: RequestId) -> bool {
        let removed = self.active.lock().remove(&id);
        if removed {
            tracing::debug!(target: targets::REGISTRY, %id, "unregister request");
        }
        removed
    }

    /// Whether `id` is active.
    pub fn contains(&self, id: RequestId) -> bool {
        self.active.lock().contains(&id)
    }

    /// Number of active requests.
    pub fn len(&self) -> usize {
        self.active.lock().len()
    }

    /// Whether no request is active.
    pub fn is_empty(&self) -> bool {
        self.active.lock().is_empty()
    }

    /// A copy of the active set.
    pub fn snapshot(&self) -> Vec<RequestId> {
        self.active.lock().iter().copied().collect()
    }

    /// Remove `id` and, if it was active, hand it to `cancel`.
    pub fn cancel<F>(&self, id: RequestId, cancel: F) -> bool
    where
        F: FnOnce(RequestId),
    {
        let removed = self.remove(id);
        if removed {
            cancel(id);
        }
        removed
    }

    /// Atomically take every active id, hand each to `cancel`, and return them.
    pub fn cancel_all<F>(&self, mut cancel: F) -> Vec<RequestId>
    where
        F: FnMut(RequestId),
    {
        let taken: Vec<RequestId> = std::mem::take(&mut *self.active.lock()).into_iter().collect();
        tracing::debug!(target: targets::REGISTRY, count = taken.len(), "cancel all requests");
        for &id in &taken {
            cancel(id);
        }
        taken
    }

    /// Set the shutting-down flag. It is never cleared.
    pub fn begin_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    /// Whether shutdown has begun.
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn id(raw: i64) -> RequestId {
        RequestId::new(raw).unwrap()
    }

    #[test]
    fn test_add_remove() {
        let registry = RequestRegistry::new();
        assert!(registry.add(id(1)));
        assert!(!registry.add(id(1)));
        assert!(registry.contains(id(1)));
        assert!(registry.remove(id(1)));
        assert!(!registry.remove(id(1)));
        assert!(!registry.remove(id(42)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_cancel_all_empties_set() {
        let registry = RequestRegistry::new();
        for raw in 1..=3 {
            registry.add(id(raw));
        }
        let mut cancelled = Vec::new();
        let mut taken = registry.cancel_all(|id| cancelled.push(id));
        taken.sort();
        cancelled.sort();

        assert_eq!(taken, vec![id(1), id(2), id(3)]);
        assert_eq!(cancelled, taken);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_cancel_one() {
        let registry = RequestRegistry::new();
        registry.add(id(5));
        let mut calls = 0;
        assert!(registry.cancel(id(5), |_| calls += 1));
        assert!(!registry.cancel(id(5), |_| calls += 1));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_shutdown_flag_sticks() {
        let registry = RequestRegistry::new();
        assert!(!registry.is_shutting_down());
        registry.begin_shutdown();
        registry.cancel_all(|_| {});
        assert!(registry.is_shutting_down());
    }

    #[test]
    fn test_concurrent_add_remove() {
        let registry = Arc::new(RequestRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for i in 1..=500 {
                        let id = id(t * 1000 + i);
                        registry.add(id);
                        registry.remove(id);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(registry.is_empty());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add(i64),
        Remove(i64),
        CancelAll,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1i64..8).prop_map(Op::Add),
            (1i64..8).prop_map(Op::Remove),
            Just(Op::CancelAll),
        ]
    }

    proptest! {
        #[test]
        fn prop_matches_set_model(ops in prop::collection::vec(op(), 0..64)) {
            let registry = RequestRegistry::new();
            let mut model = HashSet::new();
            for op in ops {
                match op {
                    Op::Add(raw) => {
                        prop_assert_eq!(registry.add(id(raw)), model.insert(id(raw)));
                    }
                    Op::Remove(raw) => {
                        prop_assert_eq!(registry.remove(id(raw)), model.remove(&id(raw)));
                    }
                    Op::CancelAll => {
                        registry.cancel_all(|_| {});
                        model.clear();
                    }
                }
                let mut actual = registry.snapshot();
                actual.sort();
                let mut expected: Vec<_> = model.iter().copied().collect();
                expected.sort();
                prop_assert_eq!(actual, expected);
            }
        }
    }
}
