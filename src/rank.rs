//! Rank registry
//!
//! Derives the canonical ordered rank sequence from a bounty's reward map.
//! Numeric tiers ("1", "2", ...) sort ascending and come first; named bonus
//! tiers sort lexically after them. This ordering is the tie-break used
//! everywhere a rank needs a total order.

use crate::error::{ReviewError, Result};
use crate::models::Bounty;

/// Sort rank labels: numeric ascending, then non-numeric lexical.
pub fn sort_rank(mut labels: Vec<String>) -> Vec<String> {
    labels.sort_by(|a, b| match (parse_numeric(a), parse_numeric(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.cmp(b),
    });
    labels
}

fn parse_numeric(label: &str) -> Option<u64> {
    label.trim().parse::<u64>().ok()
}

/// The ordered rank sequence for a bounty.
pub fn ranks_for(bounty: &Bounty) -> Vec<String> {
    sort_rank(bounty.rewards.keys().cloned().collect())
}

/// Checks rank membership, failing with `InvalidRank` otherwise.
pub fn require_valid(bounty: &Bounty, rank: &str) -> Result<()> {
    if bounty.rewards.contains_key(rank) {
        Ok(())
    } else {
        Err(ReviewError::InvalidRank {
            rank: rank.to_string(),
        })
    }
}

/// Position of a label within the bounty's rank sequence, used to order
/// winners for display and publication events.
pub fn rank_index(sequence: &[String], label: &str) -> usize {
    sequence
        .iter()
        .position(|r| r == label)
        .unwrap_or(usize::MAX)
}
