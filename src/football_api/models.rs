use serde::{Deserialize, Serialize};

/// Short status the provider reports for a fixture that has not kicked off.
pub const STATUS_NOT_STARTED: &str = "NS";
/// Long status the provider reports once a match is over.
pub const STATUS_MATCH_FINISHED: &str = "Match Finished";
/// Short statuses that also mean the final whistle has blown.
const FINISHED_SHORT_STATUSES: [&str; 3] = ["FT", "AET", "PEN"];
/// Short statuses of matches decided after extra time (penalty shootouts included).
const EXTRA_TIME_SHORT_STATUSES: [&str; 2] = ["AET", "PEN"];

/// Envelope of `GET /fixtures`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FixturesResponse {
    #[serde(default)]
    pub response: Vec<FixtureResult>,
}

/// One fixture as returned by the provider. Stored verbatim as the match's
/// fixture snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FixtureResult {
    pub fixture: Fixture,
    #[serde(default)]
    pub teams: Teams,
    #[serde(default)]
    pub goals: Goals,
    #[serde(default)]
    pub score: Score,
}

impl FixtureResult {
    pub fn is_not_started(&self) -> bool {
        self.fixture.status.short == STATUS_NOT_STARTED
    }

    pub fn is_finished(&self) -> bool {
        self.fixture.status.long == STATUS_MATCH_FINISHED
            || FINISHED_SHORT_STATUSES.contains(&self.fixture.status.short.as_str())
    }

    /// Score at the final whistle. `score.fulltime` stops at 90 minutes, so a
    /// match decided after extra time takes the running total in `goals`, or
    /// full time plus extra time when totals are missing. Shootout kicks are
    /// never counted.
    pub fn final_score(&self) -> Option<(u32, u32)> {
        if !EXTRA_TIME_SHORT_STATUSES.contains(&self.fixture.status.short.as_str()) {
            return self.score.fulltime.both();
        }
        self.goals.both().or_else(|| {
            let (ft_home, ft_away) = self.score.fulltime.both()?;
            let (et_home, et_away) = self.score.extratime.both()?;
            Some((ft_home + et_home, ft_away + et_away))
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Fixture {
    pub id: i64,
    /// Kickoff time, RFC 3339
    #[serde(default)]
    pub date: String,
    pub status: Status,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Status {
    #[serde(default)]
    pub long: String,
    pub short: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Teams {
    pub home: Team,
    pub away: Team,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Team {
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

/// Goal counts are null until the provider has data for the period.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Goals {
    pub home: Option<u32>,
    pub away: Option<u32>,
}

impl Goals {
    pub fn both(&self) -> Option<(u32, u32)> {
        Some((self.home?, self.away?))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Score {
    #[serde(default)]
    pub halftime: Goals,
    #[serde(default)]
    pub fulltime: Goals,
    #[serde(default)]
    pub extratime: Goals,
}

/// Query parameters of a fixture search.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FixtureSearch {
    pub season: i32,
    pub timezone: String,
    /// `YYYY-MM-DD`
    pub date: Option<String>,
    /// Provider team id
    pub team_id: Option<i64>,
    /// Provider fixture id
    pub fixture_id: Option<i64>,
}

impl FixtureSearch {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("season", self.season.to_string()),
            ("timezone", self.timezone.clone()),
        ];
        if let Some(date) = &self.date {
            pairs.push(("date", date.clone()));
        }
        if let Some(team) = self.team_id {
            pairs.push(("team", team.to_string()));
        }
        if let Some(id) = self.fixture_id {
            pairs.push(("id", id.to_string()));
        }
        pairs
    }
}
