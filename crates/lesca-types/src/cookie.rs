//! Cookie wire format and the millisecond/second conversion rule used when
//! exchanging cookies with the driver.

use serde::{Deserialize, Serialize};

/// A cookie exactly as it is persisted in a session file.
///
/// `expires` is a Unix timestamp in **seconds**, or `-1` for a session
/// cookie. This is the wire format; drivers that report millisecond-epoch
/// timestamps must go through [`expires_from_driver_millis`]/[`expires_to_driver_millis`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub expires: i64,
    #[serde(rename = "httpOnly")]
    pub http_only: bool,
    pub secure: bool,
    #[serde(rename = "sameSite", skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
}

impl Cookie {
    /// A stable identity for conflict resolution during session merges:
    /// (name, domain, path).
    pub fn merge_key(&self) -> (String, String, String) {
        (self.name.clone(), self.domain.clone(), self.path.clone())
    }

    pub fn is_session_cookie(&self) -> bool {
        self.expires == -1
    }
}

/// Converts a driver-reported expiry (milliseconds since epoch, or absent
/// for a session cookie) into the wire format's seconds-or-`-1`.
///
/// Implementations converting from a millisecond-epoch internal
/// representation must divide by 1000 and preserve `-1` unchanged.
pub fn expires_from_driver_millis(expires_ms: Option<i64>) -> i64 {
    match expires_ms {
        None => -1,
        Some(-1) => -1,
        Some(ms) => ms / 1000,
    }
}

/// The inverse conversion, used when injecting a stored cookie back into a
/// driver that expects millisecond timestamps.
pub fn expires_to_driver_millis(expires_secs: i64) -> Option<i64> {
    if expires_secs == -1 {
        None
    } else {
        Some(expires_secs * 1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millis_roundtrip_preserves_session_cookie() {
        assert_eq!(expires_from_driver_millis(None), -1);
        assert_eq!(expires_to_driver_millis(-1), None);
    }

    #[test]
    fn millis_roundtrip_divides_and_multiplies() {
        let wire = expires_from_driver_millis(Some(1_700_000_000_000));
        assert_eq!(wire, 1_700_000_000);
        assert_eq!(expires_to_driver_millis(wire), Some(1_700_000_000_000));
    }
}
