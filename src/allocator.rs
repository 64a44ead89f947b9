//! Winner allocator
//!
//! Assigns and revokes reward positions. Every operation takes the
//! bounty's lock and runs in one storage transaction, so the uniqueness
//! check, the flag update and the counter recompute commit atomically;
//! two concurrent assigns can never both claim the same rank.

use std::sync::Arc;

use rusqlite::Transaction;
use tracing::{info, warn};

use crate::arena::BountyLocks;
use crate::error::{ReviewError, Result};
use crate::models::{Bounty, Submission};
use crate::rank;
use crate::store::{self, SubmissionStore};

pub struct WinnerAllocator {
    store: Arc<SubmissionStore>,
    locks: Arc<BountyLocks>,
}

impl WinnerAllocator {
    pub fn new(store: Arc<SubmissionStore>, locks: Arc<BountyLocks>) -> Self {
        Self { store, locks }
    }

    /// Marks a submission as the winner of `rank_label`. Re-assigning the
    /// same submission to a different rank is a move; the old rank becomes
    /// free. Returns the bounty with recomputed counters.
    pub fn assign(
        &self,
        bounty_id: &str,
        submission_id: &str,
        rank_label: &str,
        override_authority: bool,
    ) -> Result<Bounty> {
        let lock = self.locks.for_bounty(bounty_id);
        let _guard = lock.lock();
        self.store.with_tx(|tx| {
            let bounty = load_unlocked(tx, bounty_id, override_authority)?;
            let submission = load_member(tx, bounty_id, submission_id)?;
            rank::require_valid(&bounty, rank_label)?;

            if let Some(holder) = store::position_holder_tx(tx, bounty_id, rank_label)? {
                if holder != submission.id {
                    return Err(ReviewError::PositionTaken {
                        rank: rank_label.to_string(),
                    });
                }
            }

            store::set_winner_tx(tx, &submission.id, rank_label)?;
            crate::ledger::recompute_tx(tx, bounty_id)?;
            info!(bounty_id, submission_id, rank_label, "winner assigned");
            store::get_bounty_tx(tx, bounty_id)
        })
    }

    /// Clears a submission's winner state. Revoking a non-winner is a
    /// no-op; revoking a paid winner is refused until the payment is
    /// reversed by its collaborator.
    pub fn revoke(
        &self,
        bounty_id: &str,
        submission_id: &str,
        override_authority: bool,
    ) -> Result<Bounty> {
        let lock = self.locks.for_bounty(bounty_id);
        let _guard = lock.lock();
        self.store.with_tx(|tx| {
            let _bounty = load_unlocked(tx, bounty_id, override_authority)?;
            let submission = load_member(tx, bounty_id, submission_id)?;

            if !submission.is_winner {
                return store::get_bounty_tx(tx, bounty_id);
            }
            if submission.is_paid {
                return Err(ReviewError::NotPaidRevocable);
            }

            store::clear_winner_tx(tx, &submission.id)?;
            crate::ledger::recompute_tx(tx, bounty_id)?;
            info!(bounty_id, submission_id, "winner revoked");
            store::get_bounty_tx(tx, bounty_id)
        })
    }

    /// Explicit revocation-and-reassignment: moves `rank_label` onto
    /// `submission_id`, revoking the current holder first. This is the only
    /// path that changes positions on an announced bounty, and it still
    /// requires override authority there — never a silent overwrite.
    pub fn reassign(
        &self,
        bounty_id: &str,
        submission_id: &str,
        rank_label: &str,
        override_authority: bool,
    ) -> Result<Bounty> {
        let lock = self.locks.for_bounty(bounty_id);
        let _guard = lock.lock();
        self.store.with_tx(|tx| {
            let bounty = load_unlocked(tx, bounty_id, override_authority)?;
            let submission = load_member(tx, bounty_id, submission_id)?;
            rank::require_valid(&bounty, rank_label)?;

            if let Some(holder_id) = store::position_holder_tx(tx, bounty_id, rank_label)? {
                if holder_id != submission.id {
                    let holder = store::get_submission_tx(tx, &holder_id)?;
                    if holder.is_paid {
                        return Err(ReviewError::NotPaidRevocable);
                    }
                    store::clear_winner_tx(tx, &holder_id)?;
                    warn!(
                        bounty_id,
                        from = %holder_id,
                        to = %submission.id,
                        rank_label,
                        "rank reassigned away from previous holder"
                    );
                }
            }

            store::set_winner_tx(tx, &submission.id, rank_label)?;
            crate::ledger::recompute_tx(tx, bounty_id)?;
            store::get_bounty_tx(tx, bounty_id)
        })
    }
}

fn load_unlocked(tx: &Transaction, bounty_id: &str, override_authority: bool) -> Result<Bounty> {
    let bounty = store::get_bounty_tx(tx, bounty_id)?;
    if bounty.is_winners_announced && !override_authority {
        return Err(ReviewError::AnnouncementLocked);
    }
    Ok(bounty)
}

fn load_member(tx: &Transaction, bounty_id: &str, submission_id: &str) -> Result<Submission> {
    let submission = store::get_submission_tx(tx, submission_id)?;
    if submission.bounty_id != bounty_id {
        return Err(ReviewError::not_found("submission", submission_id));
    }
    Ok(submission)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BountyType;
    use crate::store::{NewBounty, NewSubmission};
    use chrono::{Duration, Utc};

    struct Fixture {
        store: Arc<SubmissionStore>,
        allocator: WinnerAllocator,
        bounty_id: String,
        subs: Vec<String>,
    }

    fn fixture(n_subs: usize) -> Fixture {
        let store = Arc::new(SubmissionStore::in_memory().unwrap());
        let locks = Arc::new(BountyLocks::new());
        let allocator = WinnerAllocator::new(store.clone(), locks);
        let bounty = store
            .create_bounty(NewBounty {
                sponsor_id: "sponsor-1".to_string(),
                title: "bounty".to_string(),
                rewards: [("1".to_string(), 1000.0), ("2".to_string(), 500.0)]
                    .into_iter()
                    .collect(),
                deadline: Utc::now() + Duration::days(1),
                bounty_type: BountyType::Fixed,
            })
            .unwrap();
        let subs = (0..n_subs)
            .map(|i| {
                store
                    .create_submission(
                        &bounty.id,
                        NewSubmission {
                            talent_id: format!("talent-{i}"),
                            title: format!("entry {i}"),
                            content: String::new(),
                        },
                    )
                    .unwrap()
                    .id
            })
            .collect();
        Fixture {
            store,
            allocator,
            bounty_id: bounty.id,
            subs,
        }
    }

    #[test]
    fn assign_then_conflict_then_second_rank() {
        // Scenario: two submissions racing for two ranks.
        let f = fixture(2);
        let bounty = f
            .allocator
            .assign(&f.bounty_id, &f.subs[0], "1", false)
            .unwrap();
        assert_eq!(bounty.winners_selected, 1);

        let err = f
            .allocator
            .assign(&f.bounty_id, &f.subs[1], "1", false)
            .unwrap_err();
        assert_eq!(err.code(), "position_taken");

        let bounty = f
            .allocator
            .assign(&f.bounty_id, &f.subs[1], "2", false)
            .unwrap();
        assert_eq!(bounty.winners_selected, 2);
    }

    #[test]
    fn invalid_rank_is_rejected() {
        let f = fixture(1);
        let err = f
            .allocator
            .assign(&f.bounty_id, &f.subs[0], "3", false)
            .unwrap_err();
        assert_eq!(err.code(), "invalid_rank");
    }

    #[test]
    fn moving_a_submission_frees_its_old_rank() {
        let f = fixture(2);
        f.allocator
            .assign(&f.bounty_id, &f.subs[0], "1", false)
            .unwrap();
        // Same submission to a different rank is a move, not a conflict.
        let bounty = f
            .allocator
            .assign(&f.bounty_id, &f.subs[0], "2", false)
            .unwrap();
        assert_eq!(bounty.winners_selected, 1);

        // Rank "1" is free again.
        let bounty = f
            .allocator
            .assign(&f.bounty_id, &f.subs[1], "1", false)
            .unwrap();
        assert_eq!(bounty.winners_selected, 2);
    }

    #[test]
    fn paid_winner_cannot_be_revoked() {
        let f = fixture(1);
        f.allocator
            .assign(&f.bounty_id, &f.subs[0], "1", false)
            .unwrap();
        f.store.record_payment(&f.subs[0], true).unwrap();

        let err = f
            .allocator
            .revoke(&f.bounty_id, &f.subs[0], false)
            .unwrap_err();
        assert_eq!(err.code(), "not_paid_revocable");

        // Reverse the payment, then revocation goes through.
        f.store.record_payment(&f.subs[0], false).unwrap();
        let bounty = f.allocator.revoke(&f.bounty_id, &f.subs[0], false).unwrap();
        assert_eq!(bounty.winners_selected, 0);
        assert_eq!(bounty.payments_made, 0);
    }

    #[test]
    fn revoking_a_non_winner_is_a_no_op() {
        let f = fixture(1);
        let bounty = f.allocator.revoke(&f.bounty_id, &f.subs[0], false).unwrap();
        assert_eq!(bounty.winners_selected, 0);
    }

    #[test]
    fn announced_bounty_locks_assignment_without_override() {
        let f = fixture(2);
        f.allocator
            .assign(&f.bounty_id, &f.subs[0], "1", false)
            .unwrap();
        f.store
            .with_tx(|tx| store::set_announced_tx(tx, &f.bounty_id))
            .unwrap();

        let err = f
            .allocator
            .assign(&f.bounty_id, &f.subs[1], "2", false)
            .unwrap_err();
        assert_eq!(err.code(), "announcement_locked");
        let err = f
            .allocator
            .revoke(&f.bounty_id, &f.subs[0], false)
            .unwrap_err();
        assert_eq!(err.code(), "announcement_locked");

        // Explicit reassignment with override authority moves the rank.
        let bounty = f
            .allocator
            .reassign(&f.bounty_id, &f.subs[1], "1", true)
            .unwrap();
        assert_eq!(bounty.winners_selected, 1);
        assert!(!f.store.get_submission(&f.subs[0]).unwrap().is_winner);
        assert_eq!(
            f.store.get_submission(&f.subs[1]).unwrap().winner_position,
            Some("1".to_string())
        );
    }

    #[test]
    fn reassign_refuses_to_displace_a_paid_holder() {
        let f = fixture(2);
        f.allocator
            .assign(&f.bounty_id, &f.subs[0], "1", false)
            .unwrap();
        f.store.record_payment(&f.subs[0], true).unwrap();

        let err = f
            .allocator
            .reassign(&f.bounty_id, &f.subs[1], "1", false)
            .unwrap_err();
        assert_eq!(err.code(), "not_paid_revocable");
    }

    #[test]
    fn failed_assign_leaves_counters_untouched() {
        let f = fixture(2);
        f.allocator
            .assign(&f.bounty_id, &f.subs[0], "1", false)
            .unwrap();
        let _ = f
            .allocator
            .assign(&f.bounty_id, &f.subs[1], "1", false)
            .unwrap_err();
        let bounty = f.store.get_bounty(&f.bounty_id).unwrap();
        assert_eq!(bounty.winners_selected, 1);
    }

    #[test]
    fn concurrent_assigns_never_share_a_position() {
        let f = fixture(8);
        let allocator = Arc::new(f.allocator);
        let handles: Vec<_> = f
            .subs
            .iter()
            .cloned()
            .map(|sub_id| {
                let allocator = allocator.clone();
                let bounty_id = f.bounty_id.clone();
                std::thread::spawn(move || allocator.assign(&bounty_id, &sub_id, "1", false))
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|r| r.is_ok())
            .count();
        assert_eq!(successes, 1);
        let bounty = f.store.get_bounty(&f.bounty_id).unwrap();
        assert_eq!(bounty.winners_selected, 1);
    }
}
