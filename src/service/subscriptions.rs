use chrono::{DateTime, Utc};
use tracing::{error, info};
use url::Url;

use crate::db::models::{ResultStatus, Subscription, SubscriptionStatus};
use crate::db::Database;
use crate::error::ServiceError;
use crate::scheduler::{TaskKey, TaskRegistry};

#[derive(Debug, Clone)]
pub struct CreateSubscriptionRequest {
    pub match_id: i64,
    pub url: String,
    pub secret_key: String,
}

/// Identifies a subscriber's own subscription by the natural key of its match.
#[derive(Debug, Clone)]
pub struct DeleteSubscriptionRequest {
    pub starts_at: DateTime<Utc>,
    pub alias_home: String,
    pub alias_away: String,
    pub secret_key: String,
    pub url: String,
}

#[derive(Clone)]
pub struct SubscriptionService {
    db: Database,
    registry: TaskRegistry,
}

impl SubscriptionService {
    pub fn new(db: Database, registry: TaskRegistry) -> Self {
        SubscriptionService { db, registry }
    }

    pub fn create(&self, request: CreateSubscriptionRequest) -> Result<Subscription, ServiceError> {
        validate_url(&request.url)?;

        let game = self.db.get_match(request.match_id)?.ok_or_else(|| {
            ServiceError::MatchNotFound(format!("match {} does not exist", request.match_id))
        })?;
        if game.result_status != ResultStatus::Scheduled {
            return Err(ServiceError::MatchNotScheduled(game.id));
        }

        let subscription =
            self.db
                .create_subscription(request.match_id, &request.url, &request.secret_key)?;
        info!(
            "Subscription {} created for match {}",
            subscription.id, subscription.match_id
        );
        Ok(subscription)
    }

    /// Remove the caller's pending subscription. The last subscription of a
    /// match takes the match and its poller with it.
    pub fn delete(&self, request: DeleteSubscriptionRequest) -> Result<(), ServiceError> {
        let home = self
            .db
            .find_alias(&request.alias_home)?
            .ok_or_else(|| ServiceError::AliasNotFound(request.alias_home.clone()))?;
        let away = self
            .db
            .find_alias(&request.alias_away)?
            .ok_or_else(|| ServiceError::AliasNotFound(request.alias_away.clone()))?;

        let game = self
            .db
            .find_match(home.team_id, away.team_id, request.starts_at)?
            .ok_or_else(|| {
                ServiceError::MatchNotFound(format!(
                    "{} - {} at {}",
                    request.alias_home, request.alias_away, request.starts_at
                ))
            })?;

        let subscription = self
            .db
            .find_subscription(game.id, &request.secret_key, &request.url)?
            .filter(|s| s.status == SubscriptionStatus::Pending)
            .ok_or_else(|| {
                ServiceError::SubscriptionNotFound(format!(
                    "no pending subscription for match {} and url {}",
                    game.id, request.url
                ))
            })?;

        self.db.delete_subscription(subscription.id)?;
        info!("Subscription {} deleted", subscription.id);

        let remaining = match self.db.list_subscriptions_by_match(game.id) {
            Ok(remaining) => remaining,
            Err(e) => {
                error!("Failed to list subscriptions of match {}: {:#}", game.id, e);
                return Ok(());
            }
        };
        if !remaining.is_empty() {
            return Ok(());
        }

        // Read before deleting: the snapshot goes with the match.
        let fixture = match self.db.find_fixture_by_match(game.id) {
            Ok(fixture) => fixture,
            Err(e) => {
                error!("Failed to load fixture of match {}: {:#}", game.id, e);
                None
            }
        };

        if let Err(e) = self.db.delete_match(game.id) {
            error!("Failed to delete match {}: {:#}", game.id, e);
            return Ok(());
        }
        info!("Match {} deleted with its last subscription", game.id);

        if let Some(fixture) = fixture {
            if self.registry.cancel(TaskKey::new(game.id, fixture.id)) {
                info!("Result acquiring for match {} cancelled", game.id);
            }
        }
        Ok(())
    }
}

fn validate_url(raw: &str) -> Result<(), ServiceError> {
    match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => Ok(()),
        _ => Err(ServiceError::InvalidUrl(raw.to_string())),
    }
}
