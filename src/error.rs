//! Error taxonomy for the review engine
//!
//! Validation failures are recoverable and carry enough detail for the
//! caller to retry with corrected input. `LedgerInconsistent` is fatal for
//! the affected bounty: the operation aborts without writing and the error
//! is surfaced for manual investigation.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("Rank '{rank}' is not part of this bounty's reward tiers")]
    InvalidRank { rank: String },

    #[error("Position '{rank}' is already taken by another winner")]
    PositionTaken { rank: String },

    #[error("Winners are announced; changes require an explicit reassignment with override authority")]
    AnnouncementLocked,

    #[error("Submission has been paid; reverse the payment before revoking")]
    NotPaidRevocable,

    #[error("Cannot publish results: {reason}")]
    PublishBlocked { reason: String },

    #[error("Payment ledger inconsistent for bounty {bounty_id}: {detail}")]
    LedgerInconsistent { bounty_id: String, detail: String },

    #[error("Sponsor does not own this bounty")]
    Forbidden,

    #[error("{what} out of range: {value}")]
    OutOfRange { what: &'static str, value: i64 },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ReviewError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Stable machine-readable code, used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRank { .. } => "invalid_rank",
            Self::PositionTaken { .. } => "position_taken",
            Self::AnnouncementLocked => "announcement_locked",
            Self::NotPaidRevocable => "not_paid_revocable",
            Self::PublishBlocked { .. } => "publish_blocked",
            Self::LedgerInconsistent { .. } => "ledger_inconsistent",
            Self::Forbidden => "forbidden",
            Self::OutOfRange { .. } => "out_of_range",
            Self::NotFound { .. } => "not_found",
            Self::Storage(_) => "storage",
            Self::Serialization(_) => "serialization",
        }
    }
}

pub type Result<T> = std::result::Result<T, ReviewError>;
