use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use thiserror::Error;

/// chrono format of a snapshot id: UTC, millisecond precision, fixed width.
///
/// Fixed width makes lexicographic order equal chronological order.
pub const SNAPSHOT_ID_FORMAT: &str = "%Y%m%dT%H%M%S%3fZ";

/// Last millisecond value handed out by [`SnapshotId::generate`] in this process.
static LAST_ISSUED_MS: AtomicI64 = AtomicI64::new(i64::MIN);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid snapshot id '{0}' (expected e.g. 20250924T131500123Z)")]
pub struct SnapshotIdError(pub String);

/// Identifier of one extraction round.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SnapshotId(String);

impl SnapshotId {
    /// Generate a fresh id for a round starting at `now`.
    ///
    /// The result is strictly greater than every id previously generated in
    /// this process and strictly greater than `floor` (the last completed
    /// round on disk), even if the wall clock went backwards.
    pub fn generate(now: DateTime<Utc>, floor: Option<&SnapshotId>) -> Self {
        let mut candidate = now.timestamp_millis();
        if let Some(floor) = floor {
            candidate = candidate.max(floor.timestamp_millis().saturating_add(1));
        }

        let previous = LAST_ISSUED_MS
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(candidate.max(last.saturating_add(1)))
            })
            .unwrap_or(i64::MIN);
        let issued = candidate.max(previous.saturating_add(1));

        let at = DateTime::<Utc>::from_timestamp_millis(issued).unwrap_or(now);
        Self::from_datetime(at)
    }

    /// Format an instant as a snapshot id (no monotonic guard).
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(at.format(SNAPSHOT_ID_FORMAT).to_string())
    }

    /// Parse and canonicality-check a snapshot id.
    pub fn parse(s: &str) -> Result<Self, SnapshotIdError> {
        let naive = NaiveDateTime::parse_from_str(s, SNAPSHOT_ID_FORMAT)
            .map_err(|_| SnapshotIdError(s.to_string()))?;
        let id = Self::from_datetime(naive.and_utc());
        if id.0 != s {
            return Err(SnapshotIdError(s.to_string()));
        }
        Ok(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Instant this id encodes.
    pub fn timestamp_millis(&self) -> i64 {
        NaiveDateTime::parse_from_str(&self.0, SNAPSHOT_ID_FORMAT)
            .map(|n| n.and_utc().timestamp_millis())
            .unwrap_or(i64::MIN)
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for SnapshotId {
    type Error = SnapshotIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SnapshotId> for String {
    fn from(id: SnapshotId) -> Self {
        id.0
    }
}

impl std::str::FromStr for SnapshotId {
    type Err = SnapshotIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    #[test]
    fn format_is_fixed_width_millis() {
        let id = SnapshotId::from_datetime(Utc.with_ymd_and_hms(2025, 9, 24, 13, 15, 0).unwrap());
        assert_eq!(id.as_str(), "20250924T131500000Z");
    }

    #[test]
    fn parse_roundtrips_and_rejects_garbage() {
        let id = SnapshotId::parse("20250924T131500123Z").unwrap();
        assert_eq!(id.to_string(), "20250924T131500123Z");
        assert!(SnapshotId::parse("20250924T131500Z").is_err());
        assert!(SnapshotId::parse("latest").is_err());
        assert!(SnapshotId::parse("").is_err());
    }

    #[test]
    fn generate_is_strictly_increasing_for_same_clock_reading() {
        let now = at(1_727_000_000_000);
        let a = SnapshotId::generate(now, None);
        let b = SnapshotId::generate(now, None);
        let c = SnapshotId::generate(now, None);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn generate_stays_above_floor_when_clock_is_behind() {
        let floor = SnapshotId::from_datetime(at(4_000_000_000_000));
        let id = SnapshotId::generate(at(1_000_000_000_000), Some(&floor));
        assert!(id > floor);
    }

    #[test]
    fn serde_uses_plain_string() {
        let id = SnapshotId::parse("20250924T131500123Z").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"20250924T131500123Z\"");
        let back: SnapshotId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<SnapshotId>("\"nope\"").is_err());
    }

    #[test]
    fn timestamp_millis_matches_source_instant() {
        let id = SnapshotId::from_datetime(at(1_727_000_000_123));
        assert_eq!(id.timestamp_millis(), 1_727_000_000_123);
    }
}
