use chrono::{Datelike, Duration, NaiveDate};

pub fn format_duration(seconds: i64) -> String {
    let days = seconds / 86400;
    let hours = (seconds % 86400) / 3600;
    let mins = (seconds % 3600) / 60;
    let secs = seconds % 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{}d", days));
    }
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if mins > 0 {
        parts.push(format!("{}m", mins));
    }
    if secs > 0 || (days == 0 && hours == 0 && mins == 0) {
        parts.push(format!("{}s", secs));
    }

    parts.join(" ")
}

/// Countdown display, `MM:SS`.
pub fn format_clock(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Study time display, `2h 5min` or `45min`.
pub fn format_minutes(minutes: i64) -> String {
    let hours = minutes / 60;
    let rest = minutes % 60;
    if hours > 0 {
        format!("{}h {}min", hours, rest)
    } else {
        format!("{}min", rest)
    }
}

/// Monday of the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(59), "59s");
        assert_eq!(format_duration(61), "1m 1s");
        assert_eq!(format_duration(3661), "1h 1m 1s");
        assert_eq!(format_duration(86400 + 3600 + 60 + 1), "1d 1h 1m 1s");
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(25 * 60), "25:00");
        assert_eq!(format_clock(61), "01:01");
        assert_eq!(format_clock(120 * 60), "120:00");
    }

    #[test]
    fn test_format_minutes() {
        assert_eq!(format_minutes(0), "0min");
        assert_eq!(format_minutes(45), "45min");
        assert_eq!(format_minutes(125), "2h 5min");
    }

    #[test]
    fn test_week_start() {
        let sunday = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let monday = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        assert_eq!(week_start(sunday), monday);
        assert_eq!(week_start(monday), monday);
    }
}
