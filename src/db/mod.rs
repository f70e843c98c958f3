use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

use crate::error::ServiceError;

pub mod models;
use models::*;

/// Thread-safe SQLite handle (single connection with mutex)
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the SQLite database at the given path
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path))?;
        Self::init(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Run schema migrations (idempotent)
    fn run_migrations(&self) -> Result<()> {
        self.conn()?.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database connection mutex poisoned"))
    }

    // ── Aliases ──────────────────────────────────────────────────────────────

    /// Find an alias by its exact name, with the provider team it links to.
    pub fn find_alias(&self, alias: &str) -> Result<Option<Alias>> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                "SELECT a.id, a.team_id, a.alias, et.id
                 FROM aliases a
                 LEFT JOIN external_teams et ON et.team_id = a.team_id
                 WHERE a.alias = ?1",
                params![alias],
                map_alias,
            )
            .optional()?;
        Ok(found)
    }

    /// Case-insensitive substring search over alias names.
    pub fn search_aliases(&self, search: &str, limit: i64) -> Result<Vec<Alias>> {
        let conn = self.conn()?;
        let pattern = format!("%{}%", search.replace('%', "").replace('_', ""));
        let mut stmt = conn.prepare(
            "SELECT a.id, a.team_id, a.alias, et.id
             FROM aliases a
             LEFT JOIN external_teams et ON et.team_id = a.team_id
             WHERE a.alias LIKE ?1
             ORDER BY a.alias LIMIT ?2",
        )?;
        let aliases = stmt
            .query_map(params![pattern, limit], map_alias)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(aliases)
    }

    // ── Matches ──────────────────────────────────────────────────────────────

    /// Insert a match (status `not_scheduled`) and its fixture snapshot atomically.
    pub fn create_match_with_fixture(
        &self,
        home_team_id: i64,
        away_team_id: i64,
        starts_at: DateTime<Utc>,
        fixture_id: i64,
        data: &serde_json::Value,
    ) -> Result<(Match, ExternalFixture)> {
        let payload = serde_json::to_string(data)?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO matches (home_team_id, away_team_id, starts_at, result_status)
             VALUES (?1, ?2, ?3, ?4)",
            params![home_team_id, away_team_id, starts_at, ResultStatus::NotScheduled],
        )?;
        let match_id = tx.last_insert_rowid();
        let inserted = tx.execute(
            "INSERT INTO external_fixtures (id, match_id, data) VALUES (?1, ?2, ?3)",
            params![fixture_id, match_id, payload],
        );
        // The fixture is already tracked under another match.
        if let Err(rusqlite::Error::SqliteFailure(e, _)) = &inserted {
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY {
                return Err(ServiceError::FixtureAlreadyTracked(fixture_id).into());
            }
        }
        inserted?;
        tx.commit()?;

        Ok((
            Match {
                id: match_id,
                home_team_id,
                away_team_id,
                starts_at,
                result_status: ResultStatus::NotScheduled,
            },
            ExternalFixture {
                id: fixture_id,
                match_id,
                data: data.clone(),
            },
        ))
    }

    /// Look up a match by its natural key.
    pub fn find_match(
        &self,
        home_team_id: i64,
        away_team_id: i64,
        starts_at: DateTime<Utc>,
    ) -> Result<Option<Match>> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                "SELECT id, home_team_id, away_team_id, starts_at, result_status
                 FROM matches
                 WHERE home_team_id = ?1 AND away_team_id = ?2 AND starts_at = ?3",
                params![home_team_id, away_team_id, starts_at],
                map_match,
            )
            .optional()?;
        Ok(found)
    }

    pub fn get_match(&self, id: i64) -> Result<Option<Match>> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                "SELECT id, home_team_id, away_team_id, starts_at, result_status
                 FROM matches WHERE id = ?1",
                params![id],
                map_match,
            )
            .optional()?;
        Ok(found)
    }

    /// List matches in the given status together with their fixture id and
    /// one alias per team (for log context).
    pub fn list_schedule_candidates(&self, status: ResultStatus) -> Result<Vec<ScheduleCandidate>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT m.id, m.home_team_id, m.away_team_id, m.starts_at, m.result_status,
                    f.id,
                    (SELECT alias FROM aliases WHERE team_id = m.home_team_id ORDER BY id LIMIT 1),
                    (SELECT alias FROM aliases WHERE team_id = m.away_team_id ORDER BY id LIMIT 1)
             FROM matches m
             LEFT JOIN external_fixtures f ON f.match_id = m.id
             WHERE m.result_status = ?1
             ORDER BY m.starts_at",
        )?;
        let rows = stmt
            .query_map(params![status], |row| {
                Ok(ScheduleCandidate {
                    game: map_match(row)?,
                    fixture_id: row.get(5)?,
                    home_alias: row.get(6)?,
                    away_alias: row.get(7)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Unconditionally set a match's result status. Returns `false` if the
    /// match does not exist.
    pub fn update_match_status(&self, id: i64, status: ResultStatus) -> Result<bool> {
        let conn = self.conn()?;
        let n = conn.execute(
            "UPDATE matches SET result_status = ?1 WHERE id = ?2",
            params![status, id],
        )?;
        Ok(n > 0)
    }

    /// Compare-and-set on the result status. Returns `false` if the match is
    /// missing or no longer in `from`.
    pub fn transition_match_status(
        &self,
        id: i64,
        from: ResultStatus,
        to: ResultStatus,
    ) -> Result<bool> {
        let conn = self.conn()?;
        let n = conn.execute(
            "UPDATE matches SET result_status = ?1 WHERE id = ?2 AND result_status = ?3",
            params![to, id, from],
        )?;
        Ok(n > 0)
    }

    /// Store the final fixture payload and mark the match successful, only if
    /// it is still `scheduled`.
    pub fn complete_match(&self, match_id: i64, fixture_id: i64, data: &serde_json::Value) -> Result<bool> {
        let payload = serde_json::to_string(data)?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let status: Option<ResultStatus> = tx
            .query_row(
                "SELECT result_status FROM matches WHERE id = ?1",
                params![match_id],
                |row| row.get(0),
            )
            .optional()?;
        if status != Some(ResultStatus::Scheduled) {
            return Ok(false);
        }
        let n = tx.execute(
            "UPDATE external_fixtures SET data = ?1 WHERE id = ?2 AND match_id = ?3",
            params![payload, fixture_id, match_id],
        )?;
        if n == 0 {
            anyhow::bail!("fixture {} of match {} not found", fixture_id, match_id);
        }
        tx.execute(
            "UPDATE matches SET result_status = ?1 WHERE id = ?2",
            params![ResultStatus::Successful, match_id],
        )?;
        tx.commit()?;
        Ok(true)
    }

    /// Delete a match (its fixture goes with it). Returns `false` if it did not exist.
    pub fn delete_match(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let n = conn.execute("DELETE FROM matches WHERE id = ?1", params![id])?;
        Ok(n > 0)
    }

    // ── Fixtures ─────────────────────────────────────────────────────────────

    pub fn find_fixture_by_match(&self, match_id: i64) -> Result<Option<ExternalFixture>> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                "SELECT id, match_id, data FROM external_fixtures WHERE match_id = ?1",
                params![match_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;
        match found {
            Some((id, match_id, data)) => Ok(Some(ExternalFixture {
                id,
                match_id,
                data: serde_json::from_str(&data)?,
            })),
            None => Ok(None),
        }
    }

    // ── Subscriptions ────────────────────────────────────────────────────────

    /// Insert a pending subscription. Constraint violations come back as
    /// `ServiceError::WrongMatchId` / `ServiceError::SubscriptionAlreadyExists`.
    pub fn create_subscription(&self, match_id: i64, url: &str, key: &str) -> Result<Subscription> {
        let conn = self.conn()?;
        let created_at = Utc::now();
        let inserted = conn.execute(
            "INSERT INTO subscriptions (url, key, match_id, created_at, status)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![url, key, match_id, created_at, SubscriptionStatus::Pending],
        );
        if let Err(rusqlite::Error::SqliteFailure(e, _)) = &inserted {
            if e.code == ErrorCode::ConstraintViolation {
                match e.extended_code {
                    rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                        return Err(ServiceError::WrongMatchId(match_id).into())
                    }
                    rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE => {
                        return Err(ServiceError::SubscriptionAlreadyExists(match_id).into())
                    }
                    _ => {}
                }
            }
        }
        inserted?;

        Ok(Subscription {
            id: conn.last_insert_rowid(),
            url: url.to_string(),
            key: key.to_string(),
            match_id,
            created_at,
            notified_at: None,
            status: SubscriptionStatus::Pending,
        })
    }

    pub fn find_subscription(&self, match_id: i64, key: &str, url: &str) -> Result<Option<Subscription>> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                "SELECT id, url, key, match_id, created_at, notified_at, status
                 FROM subscriptions WHERE match_id = ?1 AND key = ?2 AND url = ?3",
                params![match_id, key, url],
                map_subscription,
            )
            .optional()?;
        Ok(found)
    }

    pub fn list_subscriptions_by_match(&self, match_id: i64) -> Result<Vec<Subscription>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, url, key, match_id, created_at, notified_at, status
             FROM subscriptions WHERE match_id = ?1 ORDER BY id",
        )?;
        let subs = stmt
            .query_map(params![match_id], map_subscription)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(subs)
    }

    /// Subscriptions never delivered whose match already has a final result.
    pub fn list_undelivered(&self) -> Result<Vec<PendingDelivery>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT s.id, s.url, s.key, s.match_id, s.created_at, s.notified_at, s.status, f.data
             FROM subscriptions s
             JOIN matches m ON m.id = s.match_id
             LEFT JOIN external_fixtures f ON f.match_id = m.id
             WHERE s.notified_at IS NULL AND m.result_status = ?1
             ORDER BY s.id",
        )?;
        let rows = stmt
            .query_map(params![ResultStatus::Successful], |row| {
                Ok((map_subscription(row)?, row.get::<_, Option<String>>(7)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        // A corrupt payload only fails its own deliveries, not the whole list.
        let due = rows
            .into_iter()
            .map(|(subscription, data)| {
                let fixture_data = data.and_then(|d| match serde_json::from_str(&d) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        warn!(
                            "Corrupt fixture payload for match {}: {}",
                            subscription.match_id, e
                        );
                        None
                    }
                });
                PendingDelivery {
                    subscription,
                    fixture_data,
                }
            })
            .collect();
        Ok(due)
    }

    pub fn update_delivery_state(
        &self,
        id: i64,
        status: SubscriptionStatus,
        notified_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE subscriptions SET status = ?1, notified_at = ?2 WHERE id = ?3",
            params![status, notified_at, id],
        )?;
        Ok(())
    }

    pub fn delete_subscription(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM subscriptions WHERE id = ?1", params![id])?;
        Ok(())
    }

    // ── Test fixtures ────────────────────────────────────────────────────────

    /// Insert a match row without a fixture snapshot.
    #[cfg(test)]
    pub fn seed_bare_match(
        &self,
        home_team_id: i64,
        away_team_id: i64,
        starts_at: DateTime<Utc>,
        status: ResultStatus,
    ) -> Result<Match> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO matches (home_team_id, away_team_id, starts_at, result_status)
             VALUES (?1, ?2, ?3, ?4)",
            params![home_team_id, away_team_id, starts_at, status],
        )?;
        Ok(Match {
            id: conn.last_insert_rowid(),
            home_team_id,
            away_team_id,
            starts_at,
            result_status: status,
        })
    }

    /// Insert a team with one alias, optionally linked to a provider team.
    #[cfg(test)]
    pub fn seed_alias(&self, alias: &str, external_team_id: Option<i64>) -> Result<Alias> {
        let conn = self.conn()?;
        conn.execute("INSERT INTO teams DEFAULT VALUES", [])?;
        let team_id = conn.last_insert_rowid();
        conn.execute(
            "INSERT INTO aliases (team_id, alias) VALUES (?1, ?2)",
            params![team_id, alias],
        )?;
        let id = conn.last_insert_rowid();
        if let Some(ext) = external_team_id {
            conn.execute(
                "INSERT INTO external_teams (id, team_id) VALUES (?1, ?2)",
                params![ext, team_id],
            )?;
        }
        Ok(Alias {
            id,
            team_id,
            alias: alias.to_string(),
            external_team_id,
        })
    }
}

// ── SQL helpers ────────────────────────────────────────────────────────────────

fn map_alias(row: &rusqlite::Row) -> rusqlite::Result<Alias> {
    Ok(Alias {
        id: row.get(0)?,
        team_id: row.get(1)?,
        alias: row.get(2)?,
        external_team_id: row.get(3)?,
    })
}

fn map_match(row: &rusqlite::Row) -> rusqlite::Result<Match> {
    Ok(Match {
        id: row.get(0)?,
        home_team_id: row.get(1)?,
        away_team_id: row.get(2)?,
        starts_at: row.get(3)?,
        result_status: row.get(4)?,
    })
}

fn map_subscription(row: &rusqlite::Row) -> rusqlite::Result<Subscription> {
    Ok(Subscription {
        id: row.get(0)?,
        url: row.get(1)?,
        key: row.get(2)?,
        match_id: row.get(3)?,
        created_at: row.get(4)?,
        notified_at: row.get(5)?,
        status: row.get(6)?,
    })
}

/// SQLite schema (idempotent CREATE IF NOT EXISTS)
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS teams (
    id INTEGER PRIMARY KEY AUTOINCREMENT
);

CREATE TABLE IF NOT EXISTS aliases (
    id      INTEGER PRIMARY KEY AUTOINCREMENT,
    team_id INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
    alias   TEXT    NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS external_teams (
    id      INTEGER PRIMARY KEY,
    team_id INTEGER NOT NULL UNIQUE REFERENCES teams(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS matches (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    home_team_id  INTEGER NOT NULL REFERENCES teams(id),
    away_team_id  INTEGER NOT NULL REFERENCES teams(id),
    starts_at     TEXT    NOT NULL,
    result_status TEXT    NOT NULL DEFAULT 'not_scheduled',
    UNIQUE (home_team_id, away_team_id, starts_at)
);

CREATE TABLE IF NOT EXISTS external_fixtures (
    id       INTEGER PRIMARY KEY,
    match_id INTEGER NOT NULL UNIQUE REFERENCES matches(id) ON DELETE CASCADE,
    data     TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS subscriptions (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    url         TEXT    NOT NULL,
    key         TEXT    NOT NULL,
    match_id    INTEGER NOT NULL REFERENCES matches(id) ON DELETE CASCADE,
    created_at  TEXT    NOT NULL,
    notified_at TEXT,
    status      TEXT    NOT NULL DEFAULT 'pending',
    UNIQUE (match_id, key, url)
);

CREATE INDEX IF NOT EXISTS idx_matches_status ON matches(result_status);
CREATE INDEX IF NOT EXISTS idx_subscriptions_undelivered ON subscriptions(notified_at);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn kickoff() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0).unwrap()
    }

    fn seeded_match(db: &Database) -> Match {
        let home = db.seed_alias("Dynamo", Some(572)).unwrap();
        let away = db.seed_alias("Shakhtar", Some(550)).unwrap();
        let (m, _) = db
            .create_match_with_fixture(home.team_id, away.team_id, kickoff(), 1001, &json!({"x": 1}))
            .unwrap();
        m
    }

    #[test]
    fn test_find_alias_with_and_without_link() {
        let db = Database::open_in_memory().unwrap();
        db.seed_alias("Dynamo Kyiv", Some(572)).unwrap();
        db.seed_alias("Obolon", None).unwrap();

        assert_eq!(db.find_alias("Dynamo Kyiv").unwrap().unwrap().external_team_id, Some(572));
        assert_eq!(db.find_alias("Obolon").unwrap().unwrap().external_team_id, None);
        assert!(db.find_alias("Nobody").unwrap().is_none());
    }

    #[test]
    fn test_search_aliases_substring() {
        let db = Database::open_in_memory().unwrap();
        db.seed_alias("Dynamo Kyiv", Some(572)).unwrap();
        db.seed_alias("Dynamo Moscow", None).unwrap();
        db.seed_alias("Shakhtar", Some(550)).unwrap();

        let found = db.search_aliases("dynamo", 10).unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_match_round_trip_by_natural_key() {
        let db = Database::open_in_memory().unwrap();
        let m = seeded_match(&db);
        let found = db.find_match(m.home_team_id, m.away_team_id, kickoff()).unwrap().unwrap();
        assert_eq!(found, m);
        assert_eq!(found.result_status, ResultStatus::NotScheduled);
        assert_eq!(db.find_fixture_by_match(m.id).unwrap().unwrap().id, 1001);
    }

    #[test]
    fn test_failed_fixture_insert_leaves_no_orphan_match() {
        let db = Database::open_in_memory().unwrap();
        let m = seeded_match(&db);
        // Same provider fixture id again violates the primary key.
        let res = db.create_match_with_fixture(
            m.home_team_id,
            m.away_team_id,
            kickoff() + chrono::Duration::days(7),
            1001,
            &json!({}),
        );
        assert!(matches!(
            ServiceError::from(res.unwrap_err()),
            ServiceError::FixtureAlreadyTracked(1001)
        ));
        assert!(db
            .find_match(m.home_team_id, m.away_team_id, kickoff() + chrono::Duration::days(7))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_transition_is_compare_and_set() {
        let db = Database::open_in_memory().unwrap();
        let m = seeded_match(&db);
        assert!(!db
            .transition_match_status(m.id, ResultStatus::Scheduled, ResultStatus::Error)
            .unwrap());
        assert!(db
            .transition_match_status(m.id, ResultStatus::NotScheduled, ResultStatus::Scheduled)
            .unwrap());
        assert_eq!(db.get_match(m.id).unwrap().unwrap().result_status, ResultStatus::Scheduled);
    }

    #[test]
    fn test_complete_match_requires_scheduled() {
        let db = Database::open_in_memory().unwrap();
        let m = seeded_match(&db);
        assert!(!db.complete_match(m.id, 1001, &json!({"final": true})).unwrap());

        db.update_match_status(m.id, ResultStatus::Scheduled).unwrap();
        assert!(db.complete_match(m.id, 1001, &json!({"final": true})).unwrap());
        assert_eq!(db.get_match(m.id).unwrap().unwrap().result_status, ResultStatus::Successful);
        assert_eq!(db.find_fixture_by_match(m.id).unwrap().unwrap().data, json!({"final": true}));

        // A second completion is ignored.
        assert!(!db.complete_match(m.id, 1001, &json!({"final": false})).unwrap());
    }

    #[test]
    fn test_subscription_constraints_are_typed() {
        let db = Database::open_in_memory().unwrap();
        let m = seeded_match(&db);
        db.create_subscription(m.id, "https://example.com/hook", "secret").unwrap();

        let dup = db.create_subscription(m.id, "https://example.com/hook", "secret").unwrap_err();
        assert!(matches!(
            ServiceError::from(dup),
            ServiceError::SubscriptionAlreadyExists(id) if id == m.id
        ));

        let missing = db.create_subscription(9999, "https://example.com/hook", "secret").unwrap_err();
        assert!(matches!(ServiceError::from(missing), ServiceError::WrongMatchId(9999)));
    }

    #[test]
    fn test_list_undelivered_only_for_successful_matches() {
        let db = Database::open_in_memory().unwrap();
        let m = seeded_match(&db);
        let sub = db.create_subscription(m.id, "https://example.com/hook", "secret").unwrap();
        assert!(db.list_undelivered().unwrap().is_empty());

        db.update_match_status(m.id, ResultStatus::Successful).unwrap();
        let due = db.list_undelivered().unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].subscription.id, sub.id);
        assert_eq!(due[0].fixture_data, Some(json!({"x": 1})));

        db.update_delivery_state(sub.id, SubscriptionStatus::Successful, Some(Utc::now()))
            .unwrap();
        assert!(db.list_undelivered().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_payload_does_not_block_other_deliveries() {
        let db = Database::open_in_memory().unwrap();
        let m = seeded_match(&db);
        let other = db
            .create_match_with_fixture(m.away_team_id, m.home_team_id, kickoff(), 1002, &json!({"y": 2}))
            .unwrap()
            .0;
        db.create_subscription(m.id, "https://a.example.com", "ka").unwrap();
        db.create_subscription(other.id, "https://b.example.com", "kb").unwrap();
        db.update_match_status(m.id, ResultStatus::Successful).unwrap();
        db.update_match_status(other.id, ResultStatus::Successful).unwrap();
        db.conn()
            .unwrap()
            .execute("UPDATE external_fixtures SET data = '{not json' WHERE id = 1001", [])
            .unwrap();

        let due = db.list_undelivered().unwrap();

        assert_eq!(due.len(), 2);
        assert_eq!(due[0].subscription.match_id, m.id);
        assert_eq!(due[0].fixture_data, None);
        assert_eq!(due[1].fixture_data, Some(json!({"y": 2})));
    }

    #[test]
    fn test_delete_match_cascades_fixture() {
        let db = Database::open_in_memory().unwrap();
        let m = seeded_match(&db);
        assert!(db.delete_match(m.id).unwrap());
        assert!(db.find_fixture_by_match(m.id).unwrap().is_none());
        assert!(!db.delete_match(m.id).unwrap());
    }
}
