use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::poller::PollOutcome;
use super::registry::{TaskKey, TaskRegistry};
use crate::db::models::ResultStatus;
use crate::db::Database;

/// Waits for the single outcome of a poller and applies it to storage.
///
/// Runs detached from any request: failures are logged, never raised.
#[derive(Clone)]
pub struct ResultHandoff {
    db: Database,
    registry: TaskRegistry,
}

impl ResultHandoff {
    pub fn new(db: Database, registry: TaskRegistry) -> Self {
        ResultHandoff { db, registry }
    }

    /// Spawn the listener for `key`.
    pub fn spawn(
        &self,
        key: TaskKey,
        outcome: oneshot::Receiver<PollOutcome>,
        details: String,
    ) -> JoinHandle<()> {
        let handoff = self.clone();
        tokio::spawn(async move {
            match outcome.await {
                Ok(outcome) => handoff.finalize(key, outcome, &details),
                // The poller was cancelled (e.g. the match was deleted) before it
                // produced a result.
                Err(_) => info!("Result acquiring for {} cancelled without outcome", details),
            }
        })
    }

    /// Stop the task and persist the terminal state. Only a match still in
    /// `scheduled` is finalized; anything else means it was finalized or
    /// removed already and the outcome is ignored.
    pub fn finalize(&self, key: TaskKey, outcome: PollOutcome, details: &str) {
        self.registry.cancel(key);
        info!("Scheduled task cancelled for {}", details);

        match outcome {
            PollOutcome::Failed(reason) => {
                match self.db.transition_match_status(
                    key.match_id,
                    ResultStatus::Scheduled,
                    ResultStatus::Error,
                ) {
                    Ok(true) => warn!("Result acquiring failed for {}: {}", details, reason),
                    Ok(false) => warn!("Match of {} is no longer scheduled; failure ignored", details),
                    Err(e) => error!(
                        "Failed to update result status to {} for {}: {:#}",
                        ResultStatus::Error,
                        details,
                        e
                    ),
                }
            }
            PollOutcome::Finished(result) => {
                let data = match serde_json::to_value(&result) {
                    Ok(v) => v,
                    Err(e) => {
                        error!("Failed to encode fixture data for {}: {}", details, e);
                        return;
                    }
                };
                match self.db.complete_match(key.match_id, key.fixture_id, &data) {
                    Ok(true) => info!("Result stored for {}", details),
                    Ok(false) => warn!("Match of {} is no longer scheduled; result ignored", details),
                    Err(e) => error!("Failed to store result for {}: {:#}", details, e),
                }
            }
        }
    }
}
