use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A human-entered team name mapped to an internal team and, optionally,
/// to the football provider's team.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alias {
    pub id: i64,
    pub team_id: i64,
    pub alias: String,
    /// Provider team id; `None` until the backfill links the team.
    pub external_team_id: Option<i64>,
}

/// Lifecycle of a match's result acquisition.
///
/// The string forms are persisted and used as storage-level filters, so they
/// must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    NotScheduled,
    Scheduled,
    SchedulingError,
    Error,
    Successful,
}

impl ResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultStatus::NotScheduled => "not_scheduled",
            ResultStatus::Scheduled => "scheduled",
            ResultStatus::SchedulingError => "scheduling_error",
            ResultStatus::Error => "error",
            ResultStatus::Successful => "successful",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "not_scheduled" => Some(ResultStatus::NotScheduled),
            "scheduled" => Some(ResultStatus::Scheduled),
            "scheduling_error" => Some(ResultStatus::SchedulingError),
            "error" => Some(ResultStatus::Error),
            "successful" => Some(ResultStatus::Successful),
            _ => None,
        }
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery state of a webhook subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Pending,
    Successful,
    Error,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Pending => "pending",
            SubscriptionStatus::Successful => "successful",
            SubscriptionStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(SubscriptionStatus::Pending),
            "successful" => Some(SubscriptionStatus::Successful),
            "error" => Some(SubscriptionStatus::Error),
            _ => None,
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

macro_rules! sql_text_enum {
    ($ty:ty) => {
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let s = value.as_str()?;
                <$ty>::parse(s).ok_or_else(|| FromSqlError::Other(format!("unknown status '{}'", s).into()))
            }
        }
    };
}

sql_text_enum!(ResultStatus);
sql_text_enum!(SubscriptionStatus);

/// A tracked match between two internal teams.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Match {
    pub id: i64,
    pub home_team_id: i64,
    pub away_team_id: i64,
    pub starts_at: DateTime<Utc>,
    pub result_status: ResultStatus,
}

/// Last known provider payload for a match. Replaced, never appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExternalFixture {
    /// Provider fixture id
    pub id: i64,
    pub match_id: i64,
    /// Raw provider payload as JSON
    pub data: serde_json::Value,
}

/// A match row joined with what the scheduler needs to (re)arm its poller.
#[derive(Debug, Clone)]
pub struct ScheduleCandidate {
    pub game: Match,
    pub fixture_id: Option<i64>,
    pub home_alias: Option<String>,
    pub away_alias: Option<String>,
}

/// Webhook registration for a match result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subscription {
    pub id: i64,
    pub url: String,
    /// Secret handed back to the subscriber as a bearer credential
    #[serde(skip_serializing)]
    pub key: String,
    pub match_id: i64,
    pub created_at: DateTime<Utc>,
    pub notified_at: Option<DateTime<Utc>>,
    pub status: SubscriptionStatus,
}

/// A subscription that is due for delivery, with its match's final fixture payload.
#[derive(Debug, Clone)]
pub struct PendingDelivery {
    pub subscription: Subscription,
    pub fixture_data: Option<serde_json::Value>,
}
