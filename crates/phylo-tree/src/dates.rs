use chrono::{TimeZone, Utc};

/// Format epoch seconds in UTC; out-of-range values render as the raw number.
pub fn format_timestamp(ts: i64, fmt: &str) -> String {
    match Utc.timestamp_opt(ts, 0).single() {
        Some(dt) => dt.format(fmt).to_string(),
        None => ts.to_string(),
    }
}

/// `YYYY-MM-DD`
pub fn format_day(ts: i64) -> String {
    format_timestamp(ts, "%Y-%m-%d")
}

/// `YYYY-MM`
pub fn format_month(ts: i64) -> String {
    format_timestamp(ts, "%Y-%m")
}

/// A single month, or `start → end` when the range crosses months.
pub fn month_range(min_ts: i64, max_ts: i64) -> String {
    let (start, end) = (format_month(min_ts), format_month(max_ts));
    if start == end {
        start
    } else {
        format!("{start} → {end}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_in_utc() {
        assert_eq!(format_day(0), "1970-01-01");
        assert_eq!(format_day(1_700_000_000), "2023-11-14");
        assert_eq!(month_range(1_700_000_000, 1_700_086_400), "2023-11");
        assert_eq!(month_range(1_700_000_000, 1_710_000_000), "2023-11 → 2024-03");
    }
}
