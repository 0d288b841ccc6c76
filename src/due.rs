use chrono::{
    DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Overdue,
    Today,
    Tomorrow,
    Future,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueClassification {
    pub label: String,
    pub bucket: Bucket,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DueMode {
    #[default]
    Days,
    Clock,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum LimitError {
    #[error("invalid date (use YYYY-MM-DD): {0}")]
    InvalidDate(String),
    #[error("invalid time (use HH:MM): {0}")]
    InvalidTime(String),
    #[error("a time needs a date")]
    TimeWithoutDate,
    #[error("{0} does not exist in the local time zone")]
    Nonexistent(String),
}

impl DueClassification {
    fn none() -> Self {
        DueClassification {
            label: String::new(),
            bucket: Bucket::None,
        }
    }

    fn new(bucket: Bucket, label: impl Into<String>) -> Self {
        DueClassification {
            label: label.into(),
            bucket,
        }
    }
}

pub fn classify<Tz: TimeZone>(
    mode: DueMode,
    limit: Option<DateTime<Utc>>,
    now: &DateTime<Tz>,
) -> DueClassification {
    match mode {
        DueMode::Days => classify_days(limit, now),
        DueMode::Clock => classify_clock(limit, now),
    }
}

/// Calendar-day classification. Time of day is ignored on both sides.
pub fn classify_days<Tz: TimeZone>(
    limit: Option<DateTime<Utc>>,
    now: &DateTime<Tz>,
) -> DueClassification {
    let Some(limit) = limit else {
        return DueClassification::none();
    };
    let local = limit.with_timezone(&now.timezone());
    let today = now.date_naive();
    let limit_day = local.date_naive();
    let days = limit_day.signed_duration_since(today).num_days();

    match days {
        d if d < 0 => DueClassification::new(
            Bucket::Overdue,
            format!("overdue ({} elapsed)", count(-d, "day")),
        ),
        0 => DueClassification::new(Bucket::Today, "today"),
        1 => DueClassification::new(Bucket::Tomorrow, "tomorrow"),
        d => {
            let date = if limit_day.year() != today.year() {
                format!("{}/{}/{}", limit_day.year(), limit_day.month(), limit_day.day())
            } else {
                format!("{}/{}", limit_day.month(), limit_day.day())
            };
            DueClassification::new(
                Bucket::Future,
                format!("{} ({} remaining)", date, count(d, "day")),
            )
        }
    }
}

/// Clock-time classification: how long until `limit`, in whole minutes.
pub fn classify_clock<Tz: TimeZone>(
    limit: Option<DateTime<Utc>>,
    now: &DateTime<Tz>,
) -> DueClassification {
    let Some(limit) = limit else {
        return DueClassification::none();
    };
    let diff = limit.signed_duration_since(now.with_timezone(&Utc));
    if diff < Duration::zero() {
        return DueClassification::new(Bucket::Overdue, "expired");
    }

    let minutes = diff.num_minutes();
    let days = minutes / (24 * 60);
    let hours = minutes / 60;
    let rem_hours = hours % 24;
    let rem_minutes = minutes % 60;

    if days == 0 {
        let label = if hours == 0 {
            format!("in {}", count(minutes, "minute"))
        } else if rem_minutes == 0 {
            format!("in {}", count(hours, "hour"))
        } else {
            format!("in {} {}", count(hours, "hour"), count(rem_minutes, "minute"))
        };
        DueClassification::new(Bucket::Today, label)
    } else if days == 1 {
        let label = if rem_hours == 0 {
            format!("in {}", count(days, "day"))
        } else {
            format!("in {} {}", count(days, "day"), count(rem_hours, "hour"))
        };
        DueClassification::new(Bucket::Tomorrow, label)
    } else {
        DueClassification::new(Bucket::Future, format!("in {}", count(days, "day")))
    }
}

/// `Y/M/D`, plus ` HH:MM` when the local time of day is not midnight.
pub fn format_limit<Tz: TimeZone>(limit: &DateTime<Utc>, tz: &Tz) -> String {
    let local = limit.with_timezone(tz);
    let date = format!("{}/{}/{}", local.year(), local.month(), local.day());
    if local.hour() == 0 && local.minute() == 0 {
        date
    } else {
        format!("{} {:02}:{:02}", date, local.hour(), local.minute())
    }
}

/// Parses draft date (`YYYY-MM-DD`) and optional time (`HH:MM`) fields as a
/// local instant. An empty date means "no due date".
pub fn parse_limit<Tz: TimeZone>(
    date: &str,
    time: &str,
    tz: &Tz,
) -> Result<Option<DateTime<Utc>>, LimitError> {
    let date = date.trim();
    let time = time.trim();
    if date.is_empty() {
        if time.is_empty() {
            return Ok(None);
        }
        return Err(LimitError::TimeWithoutDate);
    }
    let day = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| LimitError::InvalidDate(date.to_string()))?;
    let clock = if time.is_empty() {
        NaiveTime::MIN
    } else {
        NaiveTime::parse_from_str(time, "%H:%M")
            .map_err(|_| LimitError::InvalidTime(time.to_string()))?
    };
    let naive = day.and_time(clock);
    let local = tz
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| LimitError::Nonexistent(format!("{} {}", date, time)))?;
    Ok(Some(local.with_timezone(&Utc)))
}

/// Inverse of [`parse_limit`] for prefilling a draft. The time is empty when
/// the limit falls on local midnight.
pub fn split_limit<Tz: TimeZone>(limit: Option<&DateTime<Utc>>, tz: &Tz) -> (String, String) {
    let Some(limit) = limit else {
        return (String::new(), String::new());
    };
    let local = limit.with_timezone(tz);
    let date = format!("{:04}-{:02}-{:02}", local.year(), local.month(), local.day());
    let time = if local.hour() == 0 && local.minute() == 0 {
        String::new()
    } else {
        format!("{:02}:{:02}", local.hour(), local.minute())
    };
    (date, time)
}

fn count(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", n, unit)
    }
}
