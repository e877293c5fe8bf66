use crate::domain::events::EventKind;
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use uuid::Uuid;

/// Keys retained before the oldest are evicted. Terminal transactions never
/// produce their key again, so eviction only re-opens the duplicate window
/// for traffic old enough to be long settled.
const DEFAULT_RETAINED_KEYS: usize = 65_536;

/// Processed-message filter for at-least-once consumers, keyed by
/// `(transaction_id, event_kind)`.
///
/// A key is marked only after the handler's side effects completed. A failing
/// handler leaves no trace here, so the consumer harness still observes the
/// delivery as unhandled and its retry and dead-letter path stays live.
pub struct IdempotencyGuard {
    state: Mutex<State>,
    capacity: usize,
}

#[derive(Default)]
struct State {
    processed: HashSet<(Uuid, EventKind)>,
    order: VecDeque<(Uuid, EventKind)>,
}

impl Default for IdempotencyGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl IdempotencyGuard {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_RETAINED_KEYS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(State::default()),
            capacity,
        }
    }

    /// Whether this key was already processed to completion.
    pub fn seen(&self, transaction_id: Uuid, kind: EventKind) -> bool {
        let state = self.state.lock().expect("idempotency set poisoned");
        state.processed.contains(&(transaction_id, kind))
    }

    /// Records a fully processed key, evicting the oldest keys past capacity.
    pub fn mark(&self, transaction_id: Uuid, kind: EventKind) {
        let mut state = self.state.lock().expect("idempotency set poisoned");
        if state.processed.insert((transaction_id, kind)) {
            state.order.push_back((transaction_id, kind));
            while state.order.len() > self.capacity {
                if let Some(oldest) = state.order.pop_front() {
                    state.processed.remove(&oldest);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_seen_only_after_mark() {
        let guard = IdempotencyGuard::new();
        let id = Uuid::new_v4();
        assert!(!guard.seen(id, EventKind::Completed));
        guard.mark(id, EventKind::Completed);
        assert!(guard.seen(id, EventKind::Completed));
        // A different kind for the same transaction is a distinct key
        assert!(!guard.seen(id, EventKind::Categorized));
    }

    #[test]
    fn test_mark_is_reentrant() {
        let guard = IdempotencyGuard::new();
        let id = Uuid::new_v4();
        guard.mark(id, EventKind::CreditFailed);
        guard.mark(id, EventKind::CreditFailed);
        assert!(guard.seen(id, EventKind::CreditFailed));
    }

    #[test]
    fn test_capacity_evicts_oldest_keys() {
        let guard = IdempotencyGuard::with_capacity(2);
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        guard.mark(a, EventKind::Completed);
        guard.mark(b, EventKind::Completed);
        guard.mark(c, EventKind::Completed);
        assert!(!guard.seen(a, EventKind::Completed));
        assert!(guard.seen(b, EventKind::Completed));
        assert!(guard.seen(c, EventKind::Completed));
    }
}
