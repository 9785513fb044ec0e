use chrono::{DateTime, Utc};

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const WEEK: i64 = 7 * DAY;

/// Short engagement counts: `999`, `1.2K`, `3M`. A trailing `.0` is dropped.
pub fn format_count(n: u64) -> String {
    fn scaled(n: u64, unit: u64, suffix: &str) -> String {
        let s = format!("{:.1}", n as f64 / unit as f64);
        let s = s.strip_suffix(".0").unwrap_or(&s);
        format!("{s}{suffix}")
    }

    if n >= 1_000_000 {
        scaled(n, 1_000_000, "M")
    } else if n >= 1_000 {
        scaled(n, 1_000, "K")
    } else {
        n.to_string()
    }
}

fn elapsed_seconds(then: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - then).num_seconds()
}

/// Compact age used in comment threads: `now`, `5m`, `3h`, `2d`, `4w`.
pub fn format_elapsed_compact(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = elapsed_seconds(then, now);
    if secs < MINUTE {
        "now".to_string()
    } else if secs < HOUR {
        format!("{}m", secs / MINUTE)
    } else if secs < DAY {
        format!("{}h", secs / HOUR)
    } else if secs < WEEK {
        format!("{}d", secs / DAY)
    } else {
        format!("{}w", secs / WEEK)
    }
}

/// Age used in notifications: `just now`, `5m ago`, `3h ago`, `2d ago`, then the date
/// (`Mar 4`) once a week has passed.
pub fn format_time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = elapsed_seconds(then, now);
    if secs < MINUTE {
        "just now".to_string()
    } else if secs < HOUR {
        format!("{}m ago", secs / MINUTE)
    } else if secs < DAY {
        format!("{}h ago", secs / HOUR)
    } else if secs < WEEK {
        format!("{}d ago", secs / DAY)
    } else {
        then.format("%b %-d").to_string()
    }
}

/// Parses an RFC 3339 timestamp as the backend returns it.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
