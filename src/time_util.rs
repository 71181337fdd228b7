use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::str::FromStr;

/// Get the local timezone as a chrono_tz::Tz
/// If configured_timezone is provided, it will be used
/// Otherwise, falls back to the system timezone from iana-time-zone
/// If both fail, defaults to UTC
pub fn get_local_timezone(configured_timezone: Option<&str>) -> Tz {
    // First try to use the configured timezone if provided
    if let Some(tz_str) = configured_timezone {
        if let Ok(tz) = Tz::from_str(tz_str) {
            return tz;
        }
    }

    // Otherwise try to get the system timezone
    match iana_time_zone::get_timezone() {
        Ok(tz_str) => Tz::from_str(&tz_str).unwrap_or(chrono_tz::UTC),
        Err(_) => chrono_tz::UTC,
    }
}

/// `YYYY-MM-DD HH:MM:SS` in `timezone`.
pub fn format_local(timestamp: DateTime<Utc>, timezone: Tz) -> String {
    timestamp
        .with_timezone(&timezone)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}
