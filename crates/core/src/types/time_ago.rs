use chrono::{DateTime, Utc};

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const WEEK: i64 = 7 * DAY;

/// Short relative label for recent timestamps, absolute date after a week.
/// Timestamps in the future (clock skew) read as "just now".
pub fn time_ago(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = now.signed_duration_since(created_at).num_seconds();
    if secs < MINUTE {
        return "just now".to_string();
    }
    if secs < HOUR {
        return format!("{}m", secs / MINUTE);
    }
    if secs < DAY {
        return format!("{}h", secs / HOUR);
    }
    if secs < WEEK {
        return format!("{}d", secs / DAY);
    }
    created_at.format("%d/%m/%Y").to_string()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::time_ago;

    #[test]
    fn relative_buckets() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        assert_eq!(time_ago(now - Duration::seconds(5), now), "just now");
        assert_eq!(time_ago(now - Duration::seconds(150), now), "2m");
        assert_eq!(time_ago(now - Duration::seconds(3 * 3600 + 10), now), "3h");
        assert_eq!(time_ago(now - Duration::seconds(2 * 86400), now), "2d");
    }

    #[test]
    fn old_and_future_timestamps() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        let old = Utc.with_ymd_and_hms(2024, 1, 5, 8, 0, 0).unwrap();
        assert_eq!(time_ago(old, now), "05/01/2024");
        assert_eq!(time_ago(now + Duration::seconds(90), now), "just now");
    }
}
