//! Human-friendly article timestamps

use chrono::{DateTime, Utc};

/// "12 min ago", "3 hrs ago", "2 days ago"; a week or more shows the date.
/// Times in the future read as "0 min ago".
pub fn format_relative_time(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = (now - at).max(chrono::Duration::zero());
    let minutes = elapsed.num_minutes();
    let hours = elapsed.num_hours();
    let days = elapsed.num_days();

    if minutes < 60 {
        format!("{} min ago", minutes)
    } else if hours < 24 {
        format!("{} hr{} ago", hours, if hours > 1 { "s" } else { "" })
    } else if days < 7 {
        format!("{} day{} ago", days, if days > 1 { "s" } else { "" })
    } else {
        at.format("%b %-d, %Y").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_minutes_hours_days() {
        assert_eq!(format_relative_time(now() - Duration::seconds(30), now()), "0 min ago");
        assert_eq!(format_relative_time(now() - Duration::minutes(59), now()), "59 min ago");
        assert_eq!(format_relative_time(now() - Duration::minutes(60), now()), "1 hr ago");
        assert_eq!(format_relative_time(now() - Duration::hours(5), now()), "5 hrs ago");
        assert_eq!(format_relative_time(now() - Duration::hours(24), now()), "1 day ago");
        assert_eq!(format_relative_time(now() - Duration::days(6), now()), "6 days ago");
    }

    #[test]
    fn test_old_and_future_times() {
        assert_eq!(format_relative_time(now() - Duration::days(7), now()), "Oct 12, 2026");
        assert_eq!(format_relative_time(now() + Duration::hours(2), now()), "0 min ago");
    }
}
