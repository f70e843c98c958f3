use chrono::{DateTime, Datelike, TimeZone, Utc};

/// Football season a moment belongs to: the current year from June 1 (UTC)
/// onwards, otherwise the previous year.
pub fn season_at(now: DateTime<Utc>) -> i32 {
    let year = now.year();
    match Utc.with_ymd_and_hms(year, 6, 1, 0, 0, 0).single() {
        Some(bound) if now >= bound => year,
        _ => year - 1,
    }
}

pub fn current_season() -> i32 {
    season_at(Utc::now())
}
