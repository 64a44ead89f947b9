//! Per-bounty lock arena
//!
//! Serializes winner mutations and ledger recomputes for one bounty while
//! leaving unrelated bounties concurrent. Lock entries are created on first
//! use and kept for the life of the process; the set of active bounties is
//! small enough that eviction is not worth the bookkeeping.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

#[derive(Default)]
pub struct BountyLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl BountyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The mutex guarding a bounty's critical section.
    pub fn for_bounty(&self, bounty_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        locks
            .entry(bounty_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_bounty_shares_a_lock() {
        let arena = BountyLocks::new();
        let a = arena.for_bounty("b1");
        let b = arena.for_bounty("b1");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn different_bounties_get_distinct_locks() {
        let arena = BountyLocks::new();
        let a = arena.for_bounty("b1");
        let b = arena.for_bounty("b2");
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
