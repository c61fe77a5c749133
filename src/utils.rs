//! Utility functions for date handling, ordering, and log formatting.
//!
//! Small pure helpers used across the stages:
//! - Start-date extraction for raw file naming
//! - Timestamp parsing for the silver normalization pass
//! - Null-last ordering for gold aggregate keys
//! - String truncation for logging response bodies

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use std::cmp::Ordering;

/// Extract the date part of an ISO-8601 timestamp string.
///
/// Raw files are keyed by the window's start date, so
/// `2024-03-05T00:00:00` becomes `2024-03-05`. A value with no time
/// component is returned unchanged.
pub fn start_date_key(start_time: &str) -> &str {
    start_time.split('T').next().unwrap_or(start_time)
}

/// Parse a publishedAt value into a timestamp.
///
/// The search API sends RFC-3339 (`2024-03-05T10:00:00Z`), but bronze
/// snapshots written by hand or by older tooling may carry offset-less
/// timestamps or bare dates, so those are accepted too.
///
/// # Returns
///
/// The parsed timestamp, or `None` when the value matches no known shape.
pub fn parse_published_at(value: &str) -> Option<NaiveDateTime> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.naive_utc());
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(parsed);
    }
    if let Ok(parsed) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(parsed.and_time(NaiveTime::MIN));
    }
    None
}

/// Order optional keys ascending with `None` sorted last.
///
/// Gold aggregates keep null group keys (they form their own group) but
/// list them after every concrete key.
pub fn cmp_nulls_last<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` bytes with an ellipsis and byte
/// count indicator appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…(+{} bytes)", &s[..end], s.len() - end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_date_key_strips_time() {
        assert_eq!(start_date_key("2024-03-05T00:00:00"), "2024-03-05");
        assert_eq!(start_date_key("2024-03-05T10:30:00Z"), "2024-03-05");
    }

    #[test]
    fn test_start_date_key_passes_bare_date_through() {
        assert_eq!(start_date_key("2024-03-05"), "2024-03-05");
    }

    #[test]
    fn test_parse_published_at_rfc3339() {
        let parsed = parse_published_at("2024-03-05T10:00:00Z").unwrap();
        assert_eq!(parsed.to_string(), "2024-03-05 10:00:00");

        let parsed = parse_published_at("2024-03-05T10:00:00+03:00").unwrap();
        assert_eq!(parsed.to_string(), "2024-03-05 07:00:00");
    }

    #[test]
    fn test_parse_published_at_offsetless() {
        let parsed = parse_published_at("2024-03-05T10:00:00").unwrap();
        assert_eq!(parsed.to_string(), "2024-03-05 10:00:00");

        let parsed = parse_published_at("2024-03-05T10:00:00.250").unwrap();
        assert_eq!(parsed.date().to_string(), "2024-03-05");
    }

    #[test]
    fn test_parse_published_at_bare_date() {
        let parsed = parse_published_at("2024-03-05").unwrap();
        assert_eq!(parsed.to_string(), "2024-03-05 00:00:00");
    }

    #[test]
    fn test_parse_published_at_rejects_garbage() {
        assert!(parse_published_at("05/03/2024").is_none());
        assert!(parse_published_at("").is_none());
    }

    #[test]
    fn test_cmp_nulls_last() {
        let some_a = Some("a".to_string());
        let some_b = Some("b".to_string());
        let none: Option<String> = None;

        assert_eq!(cmp_nulls_last(&some_a, &some_b), Ordering::Less);
        assert_eq!(cmp_nulls_last(&some_b, &none), Ordering::Less);
        assert_eq!(cmp_nulls_last(&none, &some_a), Ordering::Greater);
        assert_eq!(cmp_nulls_last(&none, &none), Ordering::Equal);
    }

    #[test]
    fn test_truncate_for_log_short_string() {
        assert_eq!(truncate_for_log("Hello, world!", 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_respects_char_boundaries() {
        // "é" is two bytes; cutting at 1 must back off instead of panicking.
        let result = truncate_for_log("éé", 1);
        assert!(result.contains("bytes)"));
    }
}
