//! Dashboard controller
//!
//! Orchestrates the store, allocator, ledger and gate in response to
//! sponsor actions. This is the only component with side effects visible
//! outside the core (notification dispatch). Every operation takes the
//! acting sponsor explicitly and rejects sponsors that do not own the
//! bounty.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::allocator::WinnerAllocator;
use crate::arena::BountyLocks;
use crate::error::{ReviewError, Result};
use crate::gate::PublicationGate;
use crate::ledger::PaymentLedgerAggregator;
use crate::models::{Bounty, ListQuery, SponsorContext, Submission, SubmissionPage};
use crate::notify::{self, Notifier};
use crate::store::{NewBounty, NewSubmission, SubmissionStore};

/// Page-size limits, from configuration.
#[derive(Debug, Clone, Copy)]
pub struct PageLimits {
    pub default_take: u32,
    pub max_take: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_take: 10,
            max_take: 100,
        }
    }
}

/// Monotonic request-generation tokens for submission listing. The UI
/// refetches on every pagination/search change; only the response matching
/// the latest issued token is surfaced, giving last-request-wins semantics
/// without cooperative cancellation.
#[derive(Default)]
pub struct ListRequestTracker {
    latest: AtomicU64,
}

impl ListRequestTracker {
    pub fn begin(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_current(&self, token: u64) -> bool {
        self.latest.load(Ordering::SeqCst) == token
    }
}

pub struct BountyDashboardController {
    store: Arc<SubmissionStore>,
    allocator: WinnerAllocator,
    ledger: PaymentLedgerAggregator,
    gate: PublicationGate,
    notifier: Arc<dyn Notifier>,
    tracker: ListRequestTracker,
    limits: PageLimits,
}

impl BountyDashboardController {
    pub fn new(store: Arc<SubmissionStore>, notifier: Arc<dyn Notifier>, limits: PageLimits) -> Self {
        let locks = Arc::new(BountyLocks::new());
        Self {
            allocator: WinnerAllocator::new(store.clone(), locks.clone()),
            ledger: PaymentLedgerAggregator::new(store.clone(), locks.clone()),
            gate: PublicationGate::new(store.clone(), locks),
            store,
            notifier,
            tracker: ListRequestTracker::default(),
            limits,
        }
    }

    fn owned_bounty(&self, ctx: &SponsorContext, bounty_id: &str) -> Result<Bounty> {
        let bounty = self.store.get_bounty(bounty_id)?;
        if bounty.sponsor_id != ctx.sponsor_id {
            debug!(
                bounty_id,
                sponsor = %ctx.sponsor_id,
                owner = %bounty.sponsor_id,
                "sponsor does not own bounty"
            );
            return Err(ReviewError::Forbidden);
        }
        Ok(bounty)
    }

    pub fn get_bounty(&self, ctx: &SponsorContext, bounty_id: &str) -> Result<Bounty> {
        self.owned_bounty(ctx, bounty_id)
    }

    pub fn list_submissions(
        &self,
        ctx: &SponsorContext,
        bounty_id: &str,
        query: &ListQuery,
    ) -> Result<SubmissionPage> {
        self.owned_bounty(ctx, bounty_id)?;
        let take = query
            .take
            .unwrap_or(self.limits.default_take)
            .min(self.limits.max_take);
        let skip = query.skip.unwrap_or(0);
        self.store.list(bounty_id, &query.search_text, take, skip)
    }

    /// Begins a tracked list request; pair with
    /// [`Self::list_submissions_tracked`].
    pub fn begin_list(&self) -> u64 {
        self.tracker.begin()
    }

    /// Tracked listing: returns `None` when a newer request was begun while
    /// this one ran, so stale pages are discarded instead of surfaced.
    pub fn list_submissions_tracked(
        &self,
        ctx: &SponsorContext,
        bounty_id: &str,
        query: &ListQuery,
        token: u64,
    ) -> Result<Option<SubmissionPage>> {
        let page = self.list_submissions(ctx, bounty_id, query)?;
        if !self.tracker.is_current(token) {
            debug!(bounty_id, token, "discarding stale list response");
            return Ok(None);
        }
        Ok(Some(page))
    }

    pub fn assign_winner(
        &self,
        ctx: &SponsorContext,
        bounty_id: &str,
        submission_id: &str,
        rank_label: &str,
    ) -> Result<Bounty> {
        self.owned_bounty(ctx, bounty_id)?;
        self.allocator
            .assign(bounty_id, submission_id, rank_label, ctx.override_authority)
    }

    pub fn revoke_winner(
        &self,
        ctx: &SponsorContext,
        bounty_id: &str,
        submission_id: &str,
    ) -> Result<Bounty> {
        self.owned_bounty(ctx, bounty_id)?;
        self.allocator
            .revoke(bounty_id, submission_id, ctx.override_authority)
    }

    pub fn reassign_winner(
        &self,
        ctx: &SponsorContext,
        bounty_id: &str,
        submission_id: &str,
        rank_label: &str,
    ) -> Result<Bounty> {
        self.owned_bounty(ctx, bounty_id)?;
        self.allocator
            .reassign(bounty_id, submission_id, rank_label, ctx.override_authority)
    }

    /// Publishes results and hands the event to the notification
    /// dispatcher. Dispatch failures never roll back the publication.
    pub fn publish_results(
        &self,
        ctx: &SponsorContext,
        bounty_id: &str,
        force: bool,
    ) -> Result<Bounty> {
        self.owned_bounty(ctx, bounty_id)?;
        let (bounty, event) = self.gate.publish(bounty_id, force)?;
        if let Some(event) = event {
            notify::dispatch(self.notifier.clone(), event);
        }
        Ok(bounty)
    }

    pub fn recompute_ledger(&self, ctx: &SponsorContext, bounty_id: &str) -> Result<Bounty> {
        self.owned_bounty(ctx, bounty_id)?;
        self.ledger.recompute(bounty_id)
    }

    // Collaborator write paths: listing creation, talent application and
    // payment recording are owned by external systems; these are the
    // inserts they perform against the shared store.

    pub fn create_bounty(&self, new: NewBounty) -> Result<Bounty> {
        self.store.create_bounty(new)
    }

    pub fn create_submission(&self, bounty_id: &str, new: NewSubmission) -> Result<Submission> {
        self.store.create_submission(bounty_id, new)
    }

    pub fn record_payment(&self, submission_id: &str, paid: bool) -> Result<Submission> {
        self.store.record_payment(submission_id, paid)
    }
}
