//! Payment ledger aggregator
//!
//! Recomputes `winnersSelected` and `paymentsMade` from the authoritative
//! submission set. A paid non-winner in the underlying data is a
//! collaborator bug outside this engine's control; it aborts the recompute
//! instead of being silently corrected.

use std::sync::Arc;

use rusqlite::{params, Transaction};
use tracing::{debug, error};

use crate::arena::BountyLocks;
use crate::error::{ReviewError, Result};
use crate::models::Bounty;
use crate::store::{self, SubmissionStore};

pub struct PaymentLedgerAggregator {
    store: Arc<SubmissionStore>,
    locks: Arc<BountyLocks>,
}

impl PaymentLedgerAggregator {
    pub fn new(store: Arc<SubmissionStore>, locks: Arc<BountyLocks>) -> Self {
        Self { store, locks }
    }

    /// Recounts and writes back both counters under the bounty's lock.
    pub fn recompute(&self, bounty_id: &str) -> Result<Bounty> {
        let lock = self.locks.for_bounty(bounty_id);
        let _guard = lock.lock();
        self.store.with_tx(|tx| {
            recompute_tx(tx, bounty_id)?;
            store::get_bounty_tx(tx, bounty_id)
        })
    }
}

/// Transaction-scoped recompute, shared with the allocator and the payment
/// write path so counter updates commit atomically with the flag changes
/// that caused them.
pub(crate) fn recompute_tx(tx: &Transaction, bounty_id: &str) -> Result<()> {
    store::get_bounty_tx(tx, bounty_id)?;

    let winners: u32 = tx.query_row(
        "SELECT COUNT(*) FROM submissions WHERE bounty_id = ?1 AND is_winner = 1",
        params![bounty_id],
        |row| row.get(0),
    )?;
    let paid: u32 = tx.query_row(
        "SELECT COUNT(*) FROM submissions WHERE bounty_id = ?1 AND is_paid = 1",
        params![bounty_id],
        |row| row.get(0),
    )?;
    let paid_non_winners: u32 = tx.query_row(
        "SELECT COUNT(*) FROM submissions WHERE bounty_id = ?1 AND is_paid = 1 AND is_winner = 0",
        params![bounty_id],
        |row| row.get(0),
    )?;

    if paid_non_winners > 0 {
        error!(
            bounty_id,
            paid_non_winners, "paid submissions without winner flag; refusing to recompute"
        );
        return Err(ReviewError::LedgerInconsistent {
            bounty_id: bounty_id.to_string(),
            detail: format!("{paid_non_winners} paid submission(s) are not winners"),
        });
    }

    debug!(bounty_id, winners, paid, "ledger recomputed");
    store::update_counters_tx(tx, bounty_id, winners, paid)
}
