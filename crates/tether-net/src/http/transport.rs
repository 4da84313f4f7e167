//! Tag-based cancellation of in-flight calls.
//!
//! Every submitted call is tagged with its request identity plus a
//! generation number. Releasing a tag only touches the call that carries it,
//! so a finished or detached call can never release a newer call that
//! reuses the id.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::oneshot;

use super::request::RequestId;

/// Identifies one submitted call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallTag {
    /// The request identity.
    pub id: RequestId,
    generation: u64,
}

/// The set of live calls and their cancellation channels.
#[derive(Debug, Default)]
pub struct Transport {
    next_generation: AtomicU64,
    calls: Mutex<HashMap<RequestId, (u64, oneshot::Sender<()>)>>,
}

impl Transport {
    /// Create an empty call table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag a new call for `id`.
    ///
    /// Returns `None` if a call with this id is still live. The receiver
    /// resolves when the call is cancelled.
    pub fn tag(&self, id: RequestId) -> Option<(CallTag, oneshot::Receiver<()>)> {
        let mut calls = self.calls.lock();
        if calls.contains_key(&id) {
            return None;
        }
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        calls.insert(id, (generation, tx));
        Some((CallTag { id, generation }, rx))
    }

    /// Release a finished call. Returns `true` if `tag` was still live.
    pub fn untag(&self, tag: CallTag) -> bool {
        let mut calls = self.calls.lock();
        match calls.get(&tag.id) {
            Some((generation, _)) if *generation == tag.generation => {
                calls.remove(&tag.id);
                true
            }
            _ => false,
        }
    }

    /// Take the call for `id` out of the table and return its cancel sender.
    ///
    /// The id can be tagged again immediately. The detached task's own
    /// `untag` then finds nothing and returns `false`.
    pub fn detach(&self, id: RequestId) -> Option<oneshot::Sender<()>> {
        self.calls.lock().remove(&id).map(|(_, sender)| sender)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: i64) -> RequestId {
        RequestId::new(raw).unwrap()
    }

    #[test]
    fn test_tag_is_exclusive_per_id() {
        let transport = Transport::new();
        let (tag, _rx) = transport.tag(id(1)).unwrap();
        assert!(transport.tag(id(1)).is_none());

        assert!(transport.untag(tag));
        assert!(!transport.untag(tag));
        assert!(transport.tag(id(1)).is_some());
    }

    #[test]
    fn test_detach_delivers_cancel_and_frees_id() {
        let transport = Transport::new();
        let (tag, mut rx) = transport.tag(id(2)).unwrap();

        let sender = transport.detach(id(2)).unwrap();
        assert!(transport.detach(id(2)).is_none());
        let (_retag, _retag_rx) = transport.tag(id(2)).unwrap();

        sender.send(()).unwrap();
        assert!(rx.try_recv().is_ok());
        // The detached call no longer owns the slot.
        assert!(!transport.untag(tag));
    }

    #[test]
    fn test_stale_untag_keeps_newer_call() {
        let transport = Transport::new();
        let (old, _old_rx) = transport.tag(id(3)).unwrap();
        transport.untag(old);

        let (new, mut new_rx) = transport.tag(id(3)).unwrap();
        assert!(!transport.untag(old));
        assert!(new_rx.try_recv().is_err());
        assert!(transport.untag(new));
    }
}
