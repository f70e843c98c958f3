use async_trait::async_trait;
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{info, warn};

use super::registry::PeriodicTask;
use crate::football_api::{FixtureProvider, FixtureResult, FixtureSearch};

/// Terminal result of polling one fixture.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The provider reported the match as finished; carries the final payload.
    Finished(FixtureResult),
    /// Every allowed attempt failed or saw an unfinished match.
    Failed(String),
}

/// Repeating probe that asks the provider whether a fixture has finished.
///
/// The first probe is attempt 1. After a probe that does not observe a
/// finished match, the poller gives up once the attempt number exceeds
/// `max_retries`, so a fixture that never finishes is probed exactly
/// `max_retries + 1` times.
pub struct FixturePoller {
    provider: Arc<dyn FixtureProvider>,
    search: FixtureSearch,
    max_retries: u32,
    attempt: u32,
    details: String,
    outcome: Option<oneshot::Sender<PollOutcome>>,
}

impl FixturePoller {
    /// Build a poller and the receiving end of its single outcome.
    pub fn new(
        provider: Arc<dyn FixtureProvider>,
        search: FixtureSearch,
        max_retries: u32,
        details: String,
    ) -> (Self, oneshot::Receiver<PollOutcome>) {
        let (tx, rx) = oneshot::channel();
        (
            FixturePoller {
                provider,
                search,
                max_retries,
                attempt: 0,
                details,
                outcome: Some(tx),
            },
            rx,
        )
    }

    #[cfg(test)]
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    async fn probe(&self) -> Result<FixtureResult, String> {
        let fixtures = self
            .provider
            .search_fixtures(&self.search)
            .await
            .map_err(|e| format!("fixture search failed: {:#}", e))?;

        let fixture = match self.search.fixture_id {
            Some(id) => fixtures
                .iter()
                .find(|f| f.fixture.id == id)
                .or_else(|| fixtures.first()),
            None => fixtures.first(),
        }
        .ok_or_else(|| "fixture search returned no results".to_string())?;

        if !fixture.is_finished() {
            return Err(format!(
                "status is not finished (got '{}')",
                fixture.fixture.status.long
            ));
        }

        Ok(fixture.clone())
    }

    /// Hand the outcome to the listener. The sender is consumed, so at most one
    /// outcome is ever posted.
    fn post(&mut self, outcome: PollOutcome) {
        match self.outcome.take() {
            Some(tx) => {
                if tx.send(outcome).is_err() {
                    warn!("Result listener for {} is gone; outcome dropped", self.details);
                }
            }
            None => warn!("Outcome for {} already posted; ignoring", self.details),
        }
    }
}

#[async_trait]
impl PeriodicTask for FixturePoller {
    async fn tick(&mut self) -> ControlFlow<()> {
        if self.outcome.is_none() {
            return ControlFlow::Break(());
        }

        self.attempt += 1;
        info!("Attempt {} for {}", self.attempt, self.details);

        match self.probe().await {
            Ok(result) => {
                info!(
                    "Received result {}:{} for {}",
                    fmt_goal(result.score.fulltime.home),
                    fmt_goal(result.score.fulltime.away),
                    self.details
                );
                self.post(PollOutcome::Finished(result));
                ControlFlow::Break(())
            }
            Err(reason) => {
                warn!("Attempt {} for {}: {}", self.attempt, self.details, reason);
                if self.attempt > self.max_retries {
                    let message = format!(
                        "retries limit ({}) reached for {}: {}",
                        self.max_retries, self.details, reason
                    );
                    warn!("{}", message);
                    self.post(PollOutcome::Failed(message));
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            }
        }
    }
}

fn fmt_goal(goal: Option<u32>) -> String {
    goal.map(|g| g.to_string()).unwrap_or_else(|| "-".into())
}
