//! Small time helpers shared by the pool, session store and manager crates.

use chrono::Utc;

/// Milliseconds since the Unix epoch, per the coordination layer's timestamp
/// convention (session records, metric events and cookie expiry all use it).
pub fn now_unix_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Seconds since the Unix epoch, for APIs that want second resolution.
pub fn now_unix_secs() -> i64 {
    Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millis_are_monotonic_enough() {
        let a = now_unix_millis();
        let b = now_unix_millis();
        assert!(b >= a);
    }
}
