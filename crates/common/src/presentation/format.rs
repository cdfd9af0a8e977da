//! Display formatters shared by the table views

use chrono::{DateTime, Utc};

/// Placeholder for an absent value
pub const EMPTY: &str = "—";

/// `"1h 5m"` from an hour up, else `"12m"`
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

/// Whole dollars from cents, e.g. `4900` → `"$49"`
pub fn format_currency(cents: i64) -> String {
    format!("${:.0}", (cents as f64 / 100.0).round())
}

/// `"Jan 5, 2025"`
pub fn format_date(date: Option<DateTime<Utc>>) -> String {
    date.map(|d| d.format("%b %-d, %Y").to_string())
        .unwrap_or_else(|| EMPTY.to_string())
}

pub fn format_rating(rating: Option<f64>) -> String {
    rating
        .map(|r| format!("{:.1}", r))
        .unwrap_or_else(|| EMPTY.to_string())
}

/// The value, or the placeholder when missing or empty
pub fn or_placeholder(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => EMPTY.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0m");
        assert_eq!(format_duration(720), "12m");
        assert_eq!(format_duration(3900), "1h 5m");
        assert_eq!(format_duration(-5), "0m");
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(4900), "$49");
        assert_eq!(format_currency(0), "$0");
        assert_eq!(format_currency(1950), "$20");
    }

    #[test]
    fn test_format_date() {
        let date = Utc.with_ymd_and_hms(2025, 1, 5, 18, 30, 0).unwrap();
        assert_eq!(format_date(Some(date)), "Jan 5, 2025");
        assert_eq!(format_date(None), "—");
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(or_placeholder(Some("")), "—");
        assert_eq!(or_placeholder(Some("x")), "x");
        assert_eq!(format_rating(Some(4.56)), "4.6");
        assert_eq!(format_rating(None), "—");
    }
}
