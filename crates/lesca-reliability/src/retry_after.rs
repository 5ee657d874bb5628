//! Parses a driver or upstream-server `Retry-After` hint into a clamped
//! backoff duration.

use chrono::{DateTime, Utc};

const DEFAULT_MAX_MS: u64 = 120_000;

/// Parses `value` as either an integer count of seconds or an RFC 1123 HTTP
/// date, returning a backoff in milliseconds clamped to `max_ms`
/// (default [`DEFAULT_MAX_MS`] when `None`). Returns `None` if `value`
/// parses as neither, or resolves to a date already in the past.
pub fn parse_retry_after(value: &str, max_ms: Option<u64>) -> Option<u64> {
    let max_ms = max_ms.unwrap_or(DEFAULT_MAX_MS);
    let value = value.trim();

    if let Ok(seconds) = value.parse::<u64>() {
        return Some((seconds * 1000).min(max_ms));
    }

    let when = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    let now = Utc::now();
    let delta_ms = when.signed_duration_since(now).num_milliseconds();
    if delta_ms <= 0 {
        return None;
    }
    Some((delta_ms as u64).min(max_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_integer_seconds() {
        assert_eq!(parse_retry_after("5", None), Some(5000));
    }

    #[test]
    fn clamps_to_max() {
        assert_eq!(parse_retry_after("99999", Some(1000)), Some(1000));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_retry_after("not-a-date", None), None);
    }

    #[test]
    fn rejects_past_http_date() {
        assert_eq!(parse_retry_after("Sun, 06 Nov 1994 08:49:37 GMT", None), None);
    }
}
