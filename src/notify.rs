//! Notification dispatch seam
//!
//! Publication events are handed to a dispatcher after the publish commits.
//! Dispatch is fire-and-forget: a dispatcher failure is logged and never
//! rolls back the publication.

use async_trait::async_trait;
use tracing::{error, info};

use crate::models::PublicationEvent;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publication(&self, event: PublicationEvent) -> anyhow::Result<()>;
}

/// Default dispatcher: logs the event. The real email/notification service
/// sits behind the same trait in deployment.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn publication(&self, event: PublicationEvent) -> anyhow::Result<()> {
        info!(
            bounty_id = %event.bounty_id,
            winners = event.winners.len(),
            "publication event dispatched"
        );
        Ok(())
    }
}

/// Spawns the dispatch so the caller never waits on, or fails with, the
/// notification path.
pub fn dispatch(notifier: std::sync::Arc<dyn Notifier>, event: PublicationEvent) {
    tokio::spawn(async move {
        let bounty_id = event.bounty_id.clone();
        if let Err(e) = notifier.publication(event).await {
            error!(bounty_id, "notification dispatch failed: {e}");
        }
    });
}
