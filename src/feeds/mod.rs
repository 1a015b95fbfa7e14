//! Background cache workers. Each owns its store exclusively, runs a
//! periodic fetch cycle with a cooperative stop signal, and serves the
//! read paths (feed, search, language fan-out) with priority pinning and
//! strict topic filtering.

pub mod news;
pub mod video;

use std::time::{SystemTime, UNIX_EPOCH};

pub(crate) fn now_ts() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Human-friendly age used on feed read paths.
pub(crate) fn format_relative(timestamp: f64, now: f64) -> String {
    let diff = now - timestamp;
    if diff < 60.0 {
        return "Just now".to_string();
    }
    if diff < 3600.0 {
        return format!("{} mins ago", (diff / 60.0) as u64);
    }
    if diff < 86_400.0 {
        return format!("{} hours ago", (diff / 3600.0) as u64);
    }
    if diff < 604_800.0 {
        return format!("{} days ago", (diff / 86_400.0) as u64);
    }
    chrono::DateTime::from_timestamp(timestamp as i64, 0)
        .map(|dt| dt.format("%d %b %Y").to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_time_buckets() {
        let now = 1_700_000_000.0;
        assert_eq!(format_relative(now - 10.0, now), "Just now");
        assert_eq!(format_relative(now - 120.0, now), "2 mins ago");
        assert_eq!(format_relative(now - 7_200.0, now), "2 hours ago");
        assert_eq!(format_relative(now - 172_800.0, now), "2 days ago");
        assert!(format_relative(now - 2_600_000.0, now).contains("20"));
    }
}
