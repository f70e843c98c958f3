use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use super::season::{current_season, season_at};
use crate::db::models::{Alias, Match, ResultStatus, ScheduleCandidate};
use crate::db::Database;
use crate::error::ServiceError;
use crate::football_api::{FixtureProvider, FixtureSearch};
use crate::scheduler::{FixturePoller, PollOutcome, ResultHandoff, TaskKey, TaskRegistry};

/// Cadence of result polling for every scheduled match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollingConfig {
    /// Delay between kickoff and the first probe
    pub first_attempt_delay: Duration,
    /// Fixed delay between probes
    pub interval: Duration,
    /// Probes allowed after the first one
    pub max_retries: u32,
}

impl Default for PollingConfig {
    /// First probe 115 minutes after kickoff (90 minutes plus stoppage and
    /// extra time), then every 15 minutes, 5 retries.
    fn default() -> Self {
        PollingConfig {
            first_attempt_delay: Duration::from_secs(115 * 60),
            interval: Duration::from_secs(15 * 60),
            max_retries: 5,
        }
    }
}

impl PollingConfig {
    pub fn first_attempt_at(&self, starts_at: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::from_std(self.first_attempt_delay)
            .ok()
            .and_then(|delay| starts_at.checked_add_signed(delay))
            .unwrap_or(starts_at)
    }
}

#[derive(Debug, Clone)]
pub struct CreateMatchRequest {
    pub starts_at: DateTime<Utc>,
    pub alias_home: String,
    pub alias_away: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub rescheduled: usize,
    pub failed: usize,
}

/// What the scheduler needs to arm a poller for one match.
struct ScheduleTarget {
    match_id: i64,
    fixture_id: i64,
    starts_at: DateTime<Utc>,
    home: String,
    away: String,
}

impl ScheduleTarget {
    fn details(&self) -> String {
        format!(
            "match with id {} between {} and {} starting at {}",
            self.match_id, self.home, self.away, self.starts_at
        )
    }
}

/// An armed poller whose outcome nobody listens to yet.
struct Armed {
    key: TaskKey,
    outcome: oneshot::Receiver<PollOutcome>,
    details: String,
}

/// Owns the match lifecycle: alias resolution, find-or-create, scheduling of
/// result acquisition and recovery of pollers after a restart.
#[derive(Clone)]
pub struct MatchService {
    db: Database,
    provider: Arc<dyn FixtureProvider>,
    registry: TaskRegistry,
    handoff: ResultHandoff,
    polling: PollingConfig,
    timezone: String,
}

impl MatchService {
    pub fn new(
        db: Database,
        provider: Arc<dyn FixtureProvider>,
        registry: TaskRegistry,
        polling: PollingConfig,
        timezone: &str,
    ) -> Self {
        let handoff = ResultHandoff::new(db.clone(), registry.clone());
        MatchService {
            db,
            provider,
            registry,
            handoff,
            polling,
            timezone: timezone.to_string(),
        }
    }

    /// Find or create the match and schedule acquisition of its result.
    /// Returns the match id.
    pub async fn create(&self, request: CreateMatchRequest) -> Result<i64, ServiceError> {
        let home = self.resolve_alias(&request.alias_home)?;
        let away = self.resolve_alias(&request.alias_away)?;
        let home_external_id = home.1;

        // Known match: no provider call, no second poller.
        if let Some(existing) = self
            .db
            .find_match(home.0.team_id, away.0.team_id, request.starts_at)?
        {
            return Ok(existing.id);
        }

        info!(
            "Match between {} and {} is not stored; searching the football api",
            request.alias_home, request.alias_away
        );

        let date = request.starts_at.format("%Y-%m-%d").to_string();
        let search = FixtureSearch {
            season: current_season(),
            timezone: self.timezone.clone(),
            date: Some(date.clone()),
            team_id: Some(home_external_id),
            fixture_id: None,
        };
        let fixtures = self
            .provider
            .search_fixtures(&search)
            .await
            .map_err(ServiceError::Provider)?;

        let fixture = match fixtures.as_slice() {
            [only] => only.clone(),
            _ => {
                return Err(ServiceError::UnexpectedResultCount(format!(
                    "expected 1 fixture on {} for team {}, got {}",
                    date,
                    home_external_id,
                    fixtures.len()
                )))
            }
        };

        if !fixture.is_not_started() {
            return Err(ServiceError::IncorrectFixtureStatus {
                fixture_id: fixture.fixture.id,
                status: fixture.fixture.status.short.clone(),
            });
        }

        let data = serde_json::to_value(&fixture).context("Failed to encode fixture data")?;
        let (game, stored) = match self.db.create_match_with_fixture(
            home.0.team_id,
            away.0.team_id,
            request.starts_at,
            fixture.fixture.id,
            &data,
        ) {
            Ok(created) => created,
            Err(e) => {
                // A concurrent create for the same match won the insert.
                if let Some(existing) =
                    self.db
                        .find_match(home.0.team_id, away.0.team_id, request.starts_at)?
                {
                    return Ok(existing.id);
                }
                let e = match e.downcast::<ServiceError>() {
                    Ok(typed) => return Err(typed),
                    Err(e) => e,
                };
                return Err(e
                    .context(format!(
                        "failed to create match with team ids {} and {}",
                        home.0.team_id, away.0.team_id
                    ))
                    .into());
            }
        };

        let target = ScheduleTarget {
            match_id: game.id,
            fixture_id: stored.id,
            starts_at: game.starts_at,
            home: home.0.alias,
            away: away.0.alias,
        };

        let armed = match self.arm(&target, search.season) {
            Ok(armed) => armed,
            Err(e) => {
                self.mark_scheduling_error(game.id);
                return Err(e);
            }
        };

        self.confirm_scheduled(game.id, &armed)?;
        self.handoff.spawn(armed.key, armed.outcome, armed.details);

        Ok(game.id)
    }

    /// Re-arm pollers for every match that should have one. Run once at startup;
    /// per-match failures are recorded as `scheduling_error` and do not stop the batch.
    pub fn reconcile(&self) -> Result<ReconcileSummary, ServiceError> {
        info!("Initializing matches to re-schedule");

        let mut candidates = self.db.list_schedule_candidates(ResultStatus::Scheduled)?;
        // Persisted but never confirmed as scheduled (crash mid-create).
        candidates.extend(self.db.list_schedule_candidates(ResultStatus::NotScheduled)?);

        info!("Found {} match(es) to re-schedule", candidates.len());

        let mut summary = ReconcileSummary::default();
        for candidate in &candidates {
            match self.restore(candidate) {
                Ok(()) => summary.rescheduled += 1,
                Err(e) => {
                    error!(
                        "Failed to re-schedule match {} for result acquiring: {}",
                        candidate.game.id, e
                    );
                    self.mark_scheduling_error(candidate.game.id);
                    summary.failed += 1;
                }
            }
        }

        info!(
            "Re-scheduling done: {} rescheduled, {} failed, {} active task(s)",
            summary.rescheduled,
            summary.failed,
            self.registry.len()
        );
        Ok(summary)
    }

    pub fn get(&self, id: i64) -> Result<Match, ServiceError> {
        self.db
            .get_match(id)?
            .ok_or_else(|| ServiceError::MatchNotFound(format!("match {} does not exist", id)))
    }

    fn restore(&self, candidate: &ScheduleCandidate) -> Result<(), ServiceError> {
        let game = &candidate.game;
        let fixture_id = candidate.fixture_id.ok_or_else(|| {
            ServiceError::Internal(anyhow!("match {} has no fixture snapshot", game.id))
        })?;

        let target = ScheduleTarget {
            match_id: game.id,
            fixture_id,
            starts_at: game.starts_at,
            home: candidate
                .home_alias
                .clone()
                .unwrap_or_else(|| format!("team {}", game.home_team_id)),
            away: candidate
                .away_alias
                .clone()
                .unwrap_or_else(|| format!("team {}", game.away_team_id)),
        };

        let armed = self.arm(&target, season_at(game.starts_at))?;
        if game.result_status == ResultStatus::NotScheduled {
            self.confirm_scheduled(game.id, &armed)?;
        }
        self.handoff.spawn(armed.key, armed.outcome, armed.details);
        Ok(())
    }

    /// Register the poller for `target`. Its outcome is not consumed until the
    /// caller spawns the handoff, so no terminal state can be written before the
    /// match is marked scheduled.
    fn arm(&self, target: &ScheduleTarget, season: i32) -> Result<Armed, ServiceError> {
        let details = target.details();
        let key = TaskKey::new(target.match_id, target.fixture_id);
        let first_attempt_at = self.polling.first_attempt_at(target.starts_at);

        info!("Scheduling a task for {}, first attempt at {}", details, first_attempt_at);

        let search = FixtureSearch {
            season,
            timezone: self.timezone.clone(),
            fixture_id: Some(target.fixture_id),
            ..Default::default()
        };
        let (poller, outcome) = FixturePoller::new(
            Arc::clone(&self.provider),
            search,
            self.polling.max_retries,
            details.clone(),
        );

        self.registry
            .schedule(key, poller, self.polling.interval, first_attempt_at)?;

        Ok(Armed {
            key,
            outcome,
            details,
        })
    }

    fn confirm_scheduled(&self, match_id: i64, armed: &Armed) -> Result<(), ServiceError> {
        let confirmed = self.db.transition_match_status(
            match_id,
            ResultStatus::NotScheduled,
            ResultStatus::Scheduled,
        );
        match confirmed {
            Ok(true) => Ok(()),
            Ok(false) => {
                self.registry.cancel(armed.key);
                Err(ServiceError::Internal(anyhow!(
                    "match {} left {} while being scheduled",
                    match_id,
                    ResultStatus::NotScheduled
                )))
            }
            Err(e) => {
                self.registry.cancel(armed.key);
                self.mark_scheduling_error(match_id);
                Err(e
                    .context(format!("failed to set match status to {}", ResultStatus::Scheduled))
                    .into())
            }
        }
    }

    fn mark_scheduling_error(&self, match_id: i64) {
        if let Err(e) = self
            .db
            .update_match_status(match_id, ResultStatus::SchedulingError)
        {
            warn!(
                "Failed to set status {} on match {}: {:#}",
                ResultStatus::SchedulingError,
                match_id,
                e
            );
        }
    }

    /// Resolve an alias that must be linked to a provider team.
    fn resolve_alias(&self, name: &str) -> Result<(Alias, i64), ServiceError> {
        let alias = self
            .db
            .find_alias(name)?
            .ok_or_else(|| ServiceError::AliasNotFound(name.to_string()))?;
        match alias.external_team_id {
            Some(external_id) => Ok((alias, external_id)),
            None => Err(ServiceError::UnlinkedAlias(alias.alias)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::football_api::FixtureResult;
    use crate::scheduler::poller::tests::{finished, fixture, in_play, ScriptedProvider};
    use crate::scheduler::registry::PeriodicTask;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use serde_json::json;
    use std::ops::ControlFlow;

    const FIXTURE_ID: i64 = 1035068;

    fn not_started() -> FixtureResult {
        fixture(FIXTURE_ID, "NS", "Not Started", None)
    }

    struct Setup {
        db: Database,
        registry: TaskRegistry,
        provider: Arc<ScriptedProvider>,
        service: MatchService,
    }

    fn setup(script: Vec<Result<Vec<FixtureResult>, String>>) -> Setup {
        let db = Database::open_in_memory().unwrap();
        db.seed_alias("Dynamo Kyiv", Some(572)).unwrap();
        db.seed_alias("Shakhtar", Some(550)).unwrap();
        db.seed_alias("Obolon", None).unwrap();
        let registry = TaskRegistry::new();
        let provider = ScriptedProvider::new(script);
        let service = MatchService::new(
            db.clone(),
            provider.clone(),
            registry.clone(),
            PollingConfig::default(),
            "UTC",
        );
        Setup {
            db,
            registry,
            provider,
            service,
        }
    }

    fn request(starts_at: DateTime<Utc>) -> CreateMatchRequest {
        CreateMatchRequest {
            starts_at,
            alias_home: "Dynamo Kyiv".into(),
            alias_away: "Shakhtar".into(),
        }
    }

    fn soon() -> DateTime<Utc> {
        Utc::now() + chrono::Duration::minutes(1)
    }

    struct Idle;

    #[async_trait]
    impl PeriodicTask for Idle {
        async fn tick(&mut self) -> ControlFlow<()> {
            ControlFlow::Continue(())
        }
    }

    #[test]
    fn test_first_attempt_lands_115_minutes_after_kickoff() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0).unwrap();
        assert_eq!(
            PollingConfig::default().first_attempt_at(start),
            Utc.with_ymd_and_hms(2024, 5, 1, 19, 55, 0).unwrap()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_schedules_match() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0).unwrap();
        let s = setup(vec![Ok(vec![not_started()])]);

        let id = s.service.create(request(start)).await.unwrap();

        let m = s.db.get_match(id).unwrap().unwrap();
        assert_eq!(m.result_status, ResultStatus::Scheduled);
        assert_eq!(m.starts_at, start);
        assert!(s.registry.is_scheduled(TaskKey::new(id, FIXTURE_ID)));

        let searches = s.provider.searches.lock().unwrap();
        assert_eq!(searches[0].date.as_deref(), Some("2024-05-01"));
        assert_eq!(searches[0].team_id, Some(572));
        assert_eq!(searches[0].season, current_season());
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_is_idempotent() {
        let s = setup(vec![Ok(vec![not_started()])]);
        let start = soon();

        let first = s.service.create(request(start)).await.unwrap();
        let second = s.service.create(request(start)).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(s.provider.calls(), 1);
        assert_eq!(s.registry.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_candidates_is_unexpected_count_and_nothing_persisted() {
        let mut other = not_started();
        other.fixture.id = 77;
        let s = setup(vec![Ok(vec![not_started(), other])]);
        let start = soon();

        let err = s.service.create(request(start)).await.unwrap_err();

        assert!(matches!(err, ServiceError::UnexpectedResultCount(_)));
        let home = s.db.find_alias("Dynamo Kyiv").unwrap().unwrap();
        let away = s.db.find_alias("Shakhtar").unwrap().unwrap();
        assert!(s.db.find_match(home.team_id, away.team_id, start).unwrap().is_none());
        assert_eq!(s.registry.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_candidates_is_unexpected_count() {
        let s = setup(vec![Ok(vec![])]);
        let err = s.service.create(request(soon())).await.unwrap_err();
        assert!(matches!(err, ServiceError::UnexpectedResultCount(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_started_fixture_is_rejected() {
        let s = setup(vec![Ok(vec![in_play(FIXTURE_ID)])]);
        let err = s.service.create(request(soon())).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::IncorrectFixtureStatus { fixture_id: FIXTURE_ID, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_alias_errors() {
        let s = setup(vec![]);

        let mut missing = request(soon());
        missing.alias_away = "Nobody".into();
        assert!(matches!(
            s.service.create(missing).await.unwrap_err(),
            ServiceError::AliasNotFound(name) if name == "Nobody"
        ));

        let mut unlinked = request(soon());
        unlinked.alias_home = "Obolon".into();
        assert!(matches!(
            s.service.create(unlinked).await.unwrap_err(),
            ServiceError::UnlinkedAlias(name) if name == "Obolon"
        ));
        assert_eq!(s.provider.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixture_tracked_under_swapped_aliases_is_conflict() {
        let s = setup(vec![Ok(vec![not_started()])]);
        let start = soon();
        s.service.create(request(start)).await.unwrap();

        let swapped = CreateMatchRequest {
            starts_at: start,
            alias_home: "Shakhtar".into(),
            alias_away: "Dynamo Kyiv".into(),
        };
        let err = s.service.create(swapped).await.unwrap_err();

        assert!(matches!(err, ServiceError::FixtureAlreadyTracked(FIXTURE_ID)));
        assert_eq!(s.registry.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_error_is_surfaced() {
        let s = setup(vec![Err("timeout".into())]);
        let err = s.service.create(request(soon())).await.unwrap_err();
        assert!(matches!(err, ServiceError::Provider(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_registry_rejection_marks_scheduling_error() {
        let s = setup(vec![Ok(vec![not_started()])]);
        // Fresh database: the new match gets id 1.
        s.registry
            .schedule(
                TaskKey::new(1, FIXTURE_ID),
                Idle,
                Duration::from_secs(60),
                Utc::now() + chrono::Duration::hours(1),
            )
            .unwrap();

        let err = s.service.create(request(soon())).await.unwrap_err();

        assert!(matches!(err, ServiceError::Scheduling(_)));
        let m = s.db.get_match(1).unwrap().unwrap();
        assert_eq!(m.result_status, ResultStatus::SchedulingError);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_lifecycle_reaches_successful() {
        let s = setup(vec![
            Ok(vec![not_started()]),
            Ok(vec![in_play(FIXTURE_ID)]),
            Ok(vec![finished(FIXTURE_ID, 2, 1)]),
        ]);
        let id = s.service.create(request(soon())).await.unwrap();

        // Kickoff in one minute, first probe 115 minutes later.
        tokio::time::sleep(Duration::from_secs(115 * 60 + 50)).await;
        assert_eq!(s.provider.calls(), 1);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(s.provider.calls(), 2);
        assert_eq!(s.db.get_match(id).unwrap().unwrap().result_status, ResultStatus::Scheduled);

        tokio::time::sleep(Duration::from_secs(15 * 60)).await;
        assert_eq!(s.provider.calls(), 3);
        assert_eq!(s.db.get_match(id).unwrap().unwrap().result_status, ResultStatus::Successful);
        let stored = s.db.find_fixture_by_match(id).unwrap().unwrap();
        assert_eq!(stored.data["score"]["fulltime"], json!({"home": 2, "away": 1}));
        assert_eq!(s.registry.len(), 0);

        tokio::time::sleep(Duration::from_secs(3 * 60 * 60)).await;
        assert_eq!(s.provider.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_finishing_match_ends_in_error_after_six_probes() {
        let s = setup(vec![Ok(vec![not_started()]), Ok(vec![in_play(FIXTURE_ID)])]);
        let id = s.service.create(request(soon())).await.unwrap();

        tokio::time::sleep(Duration::from_secs(5 * 60 * 60)).await;

        assert_eq!(s.provider.calls(), 1 + 6);
        assert_eq!(s.db.get_match(id).unwrap().unwrap().result_status, ResultStatus::Error);
        assert_eq!(s.registry.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconcile_rearms_scheduled_and_stuck_matches() {
        let s = setup(vec![Ok(vec![in_play(FIXTURE_ID)])]);
        let home = s.db.find_alias("Dynamo Kyiv").unwrap().unwrap();
        let away = s.db.find_alias("Shakhtar").unwrap().unwrap();
        let later = Utc::now() + chrono::Duration::hours(2);

        let (scheduled, _) = s
            .db
            .create_match_with_fixture(home.team_id, away.team_id, later, 1, &json!({}))
            .unwrap();
        s.db.update_match_status(scheduled.id, ResultStatus::Scheduled).unwrap();
        let (stuck, _) = s
            .db
            .create_match_with_fixture(away.team_id, home.team_id, later, 2, &json!({}))
            .unwrap();
        let (done, _) = s
            .db
            .create_match_with_fixture(home.team_id, away.team_id, later + chrono::Duration::days(1), 3, &json!({}))
            .unwrap();
        s.db.update_match_status(done.id, ResultStatus::Successful).unwrap();

        let summary = s.service.reconcile().unwrap();

        assert_eq!(summary, ReconcileSummary { rescheduled: 2, failed: 0 });
        assert!(s.registry.is_scheduled(TaskKey::new(scheduled.id, 1)));
        assert!(s.registry.is_scheduled(TaskKey::new(stuck.id, 2)));
        assert!(!s.registry.is_scheduled(TaskKey::new(done.id, 3)));
        assert_eq!(s.db.get_match(stuck.id).unwrap().unwrap().result_status, ResultStatus::Scheduled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconcile_partial_failure_continues() {
        let s = setup(vec![Ok(vec![in_play(FIXTURE_ID)])]);
        let home = s.db.find_alias("Dynamo Kyiv").unwrap().unwrap();
        let away = s.db.find_alias("Shakhtar").unwrap().unwrap();
        let later = Utc::now() + chrono::Duration::hours(2);

        let (a, _) = s
            .db
            .create_match_with_fixture(home.team_id, away.team_id, later, 10, &json!({}))
            .unwrap();
        let (b, _) = s
            .db
            .create_match_with_fixture(away.team_id, home.team_id, later, 20, &json!({}))
            .unwrap();
        s.db.update_match_status(a.id, ResultStatus::Scheduled).unwrap();
        s.db.update_match_status(b.id, ResultStatus::Scheduled).unwrap();
        // Occupy a's key so its re-registration is rejected.
        s.registry
            .schedule(TaskKey::new(a.id, 10), Idle, Duration::from_secs(60), later)
            .unwrap();

        let summary = s.service.reconcile().unwrap();

        assert_eq!(summary, ReconcileSummary { rescheduled: 1, failed: 1 });
        assert_eq!(s.db.get_match(a.id).unwrap().unwrap().result_status, ResultStatus::SchedulingError);
        assert_eq!(s.db.get_match(b.id).unwrap().unwrap().result_status, ResultStatus::Scheduled);
        assert!(s.registry.is_scheduled(TaskKey::new(b.id, 20)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconcile_match_without_fixture_is_scheduling_error() {
        let s = setup(vec![Ok(vec![in_play(FIXTURE_ID)])]);
        let home = s.db.find_alias("Dynamo Kyiv").unwrap().unwrap();
        let away = s.db.find_alias("Shakhtar").unwrap().unwrap();
        let later = Utc::now() + chrono::Duration::hours(2);

        let bare = s
            .db
            .seed_bare_match(home.team_id, away.team_id, later, ResultStatus::Scheduled)
            .unwrap();
        let (armed, _) = s
            .db
            .create_match_with_fixture(away.team_id, home.team_id, later, 30, &json!({}))
            .unwrap();
        s.db.update_match_status(armed.id, ResultStatus::Scheduled).unwrap();

        let summary = s.service.reconcile().unwrap();

        assert_eq!(summary, ReconcileSummary { rescheduled: 1, failed: 1 });
        assert_eq!(
            s.db.get_match(bare.id).unwrap().unwrap().result_status,
            ResultStatus::SchedulingError
        );
        assert!(s.registry.is_scheduled(TaskKey::new(armed.id, 30)));
        assert_eq!(s.registry.len(), 1);
    }

    #[test]
    fn test_get_unknown_match() {
        let s = setup(vec![]);
        assert!(matches!(s.service.get(42), Err(ServiceError::MatchNotFound(_))));
    }
}
