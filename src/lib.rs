//! Bounty Review - winner allocation and submission review engine
//!
//! Backend core for a sponsor-facing dashboard that reviews bounty
//! submissions, selects winners and tracks payment bookkeeping.
//!
//! # How it works
//!
//! 1. Sponsors page through a bounty's submissions (searchable, offset
//!    pagination, deterministic ordering)
//! 2. The allocator assigns reward positions to winning submissions; each
//!    rank is held by at most one winner per bounty
//! 3. The ledger aggregator keeps `winnersSelected` / `paymentsMade`
//!    consistent with per-submission state after every mutation
//! 4. The publication gate flips results to announced exactly once and
//!    emits an event for the notification dispatcher
//!
//! # Consistency
//!
//! - Winner mutations and counter recomputes run under a per-bounty lock
//!   and commit in one SQLite transaction; a failed operation writes nothing
//! - A paid submission is always a winner; violations abort loudly instead
//!   of being silently corrected
//! - Announced results only change through explicit reassignment with
//!   override authority

pub mod allocator;
pub mod arena;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod gate;
pub mod ledger;
pub mod models;
pub mod notify;
pub mod rank;
pub mod server;
pub mod store;

pub use allocator::WinnerAllocator;
pub use arena::BountyLocks;
pub use dashboard::{BountyDashboardController, ListRequestTracker, PageLimits};
pub use error::{ReviewError, Result};
pub use gate::PublicationGate;
pub use ledger::PaymentLedgerAggregator;
pub use models::{
    Bounty, BountyType, ListQuery, PublicationEvent, SponsorContext, Submission, SubmissionPage,
    WinnerEntry,
};
pub use notify::{LogNotifier, Notifier};
pub use rank::{ranks_for, sort_rank};
pub use store::{NewBounty, NewSubmission, SubmissionStore};
