//! Weekly bucketing: maps an instant and a time zone onto the Monday that starts its
//! local civil week.
//!
//! Only the civil date in the target zone matters. Once the date is known all arithmetic
//! happens on [`NaiveDate`], so daylight-saving transitions never shift a bucket.

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
pub use chrono_tz::Tz;
use serde::Serialize;
use thiserror::Error;

/// IANA zone used when neither configuration nor the request names one.
pub const DEFAULT_TIME_ZONE: Tz = chrono_tz::Asia::Kolkata;

/// Deterministic identity of a local week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekBucket {
    /// Document title, `DDMMYYYY` of the week's Monday.
    pub title: String,
    /// Document slug, identical to the title.
    pub slug: String,
    /// The week's Monday as `YYYY-MM-DD`.
    pub iso_monday_date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown time zone '{0}'. Expected an IANA name such as Asia/Kolkata.")]
pub struct InvalidTimeZone(pub String);

/// Resolve an IANA time zone name, ignoring surrounding whitespace.
pub fn parse_time_zone(name: &str) -> Result<Tz, InvalidTimeZone> {
    let trimmed = name.trim();
    trimmed
        .parse::<Tz>()
        .map_err(|_| InvalidTimeZone(trimmed.to_string()))
}

/// Compute the bucket of the local week containing `now` as observed in `tz`.
pub fn week_bucket(now: DateTime<Utc>, tz: Tz) -> WeekBucket {
    let local_date = now.with_timezone(&tz).date_naive();
    bucket_for_monday(monday_of(local_date))
}

/// Monday on or before `date`.
pub fn monday_of(date: NaiveDate) -> NaiveDate {
    let days_since_monday = (date.weekday().num_days_from_sunday() + 6) % 7;
    date - Days::new(u64::from(days_since_monday))
}

fn bucket_for_monday(monday: NaiveDate) -> WeekBucket {
    let compact = monday.format("%d%m%Y").to_string();
    WeekBucket {
        title: compact.clone(),
        slug: compact,
        iso_monday_date: monday.format("%Y-%m-%d").to_string(),
    }
}
