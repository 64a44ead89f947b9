//! Publication gate
//!
//! Draft -> Published state machine for a bounty's announcement cycle.
//! Publishing is terminal for the cycle and idempotent; a second publish
//! returns the existing state without emitting another event.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::arena::BountyLocks;
use crate::error::{ReviewError, Result};
use crate::models::{Bounty, BountyType, PublicationEvent, WinnerEntry};
use crate::rank;
use crate::store::{self, SubmissionStore};

pub struct PublicationGate {
    store: Arc<SubmissionStore>,
    locks: Arc<BountyLocks>,
}

impl PublicationGate {
    pub fn new(store: Arc<SubmissionStore>, locks: Arc<BountyLocks>) -> Self {
        Self { store, locks }
    }

    /// Publishes results, returning the bounty and the event to hand to the
    /// notification dispatcher. `None` means the bounty was already
    /// published and nothing changed.
    ///
    /// Requires at least one winner, or `force` on a rolling bounty.
    pub fn publish(&self, bounty_id: &str, force: bool) -> Result<(Bounty, Option<PublicationEvent>)> {
        let lock = self.locks.for_bounty(bounty_id);
        let _guard = lock.lock();
        self.store.with_tx(|tx| {
            let bounty = store::get_bounty_tx(tx, bounty_id)?;
            if bounty.is_winners_announced {
                return Ok((bounty, None));
            }

            let mut winners = store::winners_tx(tx, bounty_id)?;
            if winners.is_empty() {
                if !force {
                    return Err(ReviewError::PublishBlocked {
                        reason: "no winners selected".to_string(),
                    });
                }
                if bounty.bounty_type != BountyType::Rolling {
                    return Err(ReviewError::PublishBlocked {
                        reason: "force-publishing with zero winners is only allowed for rolling bounties"
                            .to_string(),
                    });
                }
            }

            if bounty.bounty_type == BountyType::Fixed && Utc::now() < bounty.deadline {
                warn!(bounty_id, deadline = %bounty.deadline, "publishing before deadline");
            }

            store::set_announced_tx(tx, bounty_id)?;

            let sequence = rank::ranks_for(&bounty);
            winners.sort_by_key(|(_, label)| rank::rank_index(&sequence, label));
            let event = PublicationEvent {
                bounty_id: bounty_id.to_string(),
                winners: winners
                    .into_iter()
                    .map(|(submission_id, rank_label)| WinnerEntry {
                        submission_id,
                        rank_label,
                    })
                    .collect(),
            };

            info!(bounty_id, winners = event.winners.len(), "results published");
            let bounty = store::get_bounty_tx(tx, bounty_id)?;
            Ok((bounty, Some(event)))
        })
    }
}
