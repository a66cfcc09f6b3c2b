use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Wall-clock time of an update, in milliseconds since the UNIX epoch.
///
/// Timestamps are recorded in each update commit and are informational:
/// ordering within a chain comes from commit parentage, never from these
/// values.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    /// The current wall-clock time.
    pub fn now() -> Self {
        let ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self(ms)
    }

    /// The zero timestamp (epoch).
    pub const fn zero() -> Self {
        Self(0)
    }

    pub const fn as_millis(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({}ms)", self.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_after_2020() {
        // 2020-01-01T00:00:00Z
        assert!(Timestamp::now().as_millis() > 1_577_836_800_000);
    }

    #[test]
    fn zero_is_smallest() {
        assert!(Timestamp::zero() < Timestamp::from_millis(1));
        assert_eq!(Timestamp::default(), Timestamp::zero());
    }

    #[test]
    fn serde_is_transparent_number() {
        let ts = Timestamp::from_millis(1_700_000_000_123);
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "1700000000123");
        let parsed: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(ts, parsed);
    }
}
