use anyhow::{anyhow, Result};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::client::{Notification, Notifier};
use crate::db::models::{PendingDelivery, SubscriptionStatus};
use crate::db::Database;
use crate::football_api::FixtureResult;

/// Outcome counts of one sweep run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Delivers final scores to every subscriber of a finished match.
///
/// A failed delivery keeps `notified_at` unset, so the next run picks the
/// subscription up again. There is no attempt cap.
#[derive(Clone)]
pub struct NotifierService {
    db: Database,
    notifier: Arc<dyn Notifier>,
}

impl NotifierService {
    pub fn new(db: Database, notifier: Arc<dyn Notifier>) -> Self {
        NotifierService { db, notifier }
    }

    pub async fn notify_subscribers(&self) -> Result<SweepReport> {
        let due = self.db.list_undelivered()?;
        if due.is_empty() {
            return Ok(SweepReport::default());
        }
        info!("Delivering results to {} subscription(s)", due.len());

        let deliveries: Vec<_> = due.iter().map(|pending| self.deliver(pending)).collect();
        let results = futures_util::future::join_all(deliveries).await;

        let mut report = SweepReport::default();
        for delivered in results {
            if delivered {
                report.delivered += 1;
            } else {
                report.failed += 1;
            }
        }
        Ok(report)
    }

    /// Deliver one notification and record the outcome. Returns whether the
    /// subscriber accepted it.
    async fn deliver(&self, pending: &PendingDelivery) -> bool {
        let sub = &pending.subscription;

        let sent = match notification_for(pending) {
            Ok(notification) => self.notifier.notify(&notification).await,
            Err(e) => Err(e),
        };

        let (status, notified_at) = match &sent {
            Ok(()) => (SubscriptionStatus::Successful, Some(Utc::now())),
            Err(e) => {
                warn!(
                    "Failed to notify subscription {} of match {}: {:#}",
                    sub.id, sub.match_id, e
                );
                (SubscriptionStatus::Error, None)
            }
        };

        if let Err(e) = self.db.update_delivery_state(sub.id, status, notified_at) {
            error!(
                "Failed to record delivery state {} for subscription {}: {:#}",
                status, sub.id, e
            );
        }
        sent.is_ok()
    }
}

/// Build the webhook call from the final score stored with the match.
fn notification_for(pending: &PendingDelivery) -> Result<Notification> {
    let sub = &pending.subscription;
    let data = pending
        .fixture_data
        .clone()
        .ok_or_else(|| anyhow!("match {} has no fixture snapshot", sub.match_id))?;
    let fixture: FixtureResult = serde_json::from_value(data)
        .map_err(|e| anyhow!("unreadable fixture snapshot of match {}: {}", sub.match_id, e))?;
    let (home, away) = fixture
        .final_score()
        .ok_or_else(|| anyhow!("fixture {} has no final score", fixture.fixture.id))?;

    Ok(Notification {
        url: sub.url.clone(),
        secret_key: sub.key.clone(),
        home,
        away,
    })
}

/// Run [`NotifierService::notify_subscribers`] every `interval` on a background task.
pub fn start_notifier(service: NotifierService, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Notifier started (interval={:?})", interval);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            match service.notify_subscribers().await {
                Ok(report) if report.delivered + report.failed > 0 => info!(
                    "Notification sweep: {} delivered, {} failed",
                    report.delivered, report.failed
                ),
                Ok(_) => {}
                Err(e) => error!("Notification sweep failed: {:#}", e),
            }
        }
    })
}
