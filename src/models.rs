//! Data structures shared across the review engine
//!
//! Wire names are camelCase to match the dashboard's JSON payloads.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reward tier map: rank label (e.g. "1", "2", "Bonus") to amount.
pub type RewardMap = BTreeMap<String, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BountyType {
    Fixed,
    Rolling,
}

impl BountyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Rolling => "rolling",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "rolling" => Self::Rolling,
            _ => Self::Fixed,
        }
    }
}

/// A sponsor-posted listing accepting submissions.
///
/// `winners_selected`, `payments_made` and `total_submissions` are derived
/// counters; they are only ever written by the ledger aggregator and the
/// submission insert path, never by callers directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounty {
    pub id: String,
    pub sponsor_id: String,
    pub title: String,
    pub rewards: RewardMap,
    pub deadline: DateTime<Utc>,
    #[serde(rename = "type")]
    pub bounty_type: BountyType,
    pub winners_selected: u32,
    pub payments_made: u32,
    pub total_submissions: u32,
    pub is_winners_announced: bool,
    pub created_at: DateTime<Utc>,
}

/// A talent's entry for a bounty.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    pub bounty_id: String,
    pub talent_id: String,
    pub title: String,
    pub content: String,
    pub is_winner: bool,
    pub winner_position: Option<String>,
    pub is_paid: bool,
    pub created_at: DateTime<Utc>,
}

/// One page of submissions plus the unfiltered-by-pagination total.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPage {
    pub items: Vec<Submission>,
    pub total: u32,
}

/// A winning submission and the rank it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinnerEntry {
    pub submission_id: String,
    pub rank_label: String,
}

/// Emitted once per successful publication, consumed by the notification
/// dispatcher. Winners are ordered by the bounty's rank sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicationEvent {
    pub bounty_id: String,
    pub winners: Vec<WinnerEntry>,
}

/// Acting identity for every core operation. The engine never reads an
/// implicit current user; the session provider supplies this explicitly.
#[derive(Debug, Clone)]
pub struct SponsorContext {
    pub sponsor_id: String,
    /// Grants the post-announcement reassignment path.
    pub override_authority: bool,
}

impl SponsorContext {
    pub fn new(sponsor_id: impl Into<String>) -> Self {
        Self {
            sponsor_id: sponsor_id.into(),
            override_authority: false,
        }
    }

    pub fn with_override(sponsor_id: impl Into<String>) -> Self {
        Self {
            sponsor_id: sponsor_id.into(),
            override_authority: true,
        }
    }
}

/// Pagination + search parameters for submission listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(default)]
    pub search_text: String,
    pub take: Option<u32>,
    pub skip: Option<i64>,
}
