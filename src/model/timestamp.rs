use std::cmp::Ordering;

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

/// A point in time with nanosecond precision, normalized so that
/// `0 <= nanos < 1_000_000_000`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: u32,
}

impl Timestamp {
    pub fn new(seconds: i64, nanos: i64) -> Self {
        let extra = nanos.div_euclid(1_000_000_000);
        Self {
            seconds: seconds + extra,
            nanos: nanos.rem_euclid(1_000_000_000) as u32,
        }
    }

    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    pub fn from_datetime(datetime: DateTime<Utc>) -> Self {
        Self {
            seconds: datetime.timestamp(),
            nanos: datetime.timestamp_subsec_nanos().min(999_999_999),
        }
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.seconds, self.nanos)
            .single()
            .unwrap_or_else(|| Utc.timestamp_opt(0, 0).unwrap())
    }

    /// RFC 3339 rendering used by the JSON bridge.
    pub fn to_rfc3339(&self) -> String {
        self.to_datetime()
            .to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }

    pub fn parse_rfc3339(input: &str) -> Option<Self> {
        DateTime::parse_from_rfc3339(input)
            .ok()
            .map(|parsed| Self::from_datetime(parsed.with_timezone(&Utc)))
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.seconds.cmp(&other.seconds) {
            Ordering::Equal => self.nanos.cmp(&other.nanos),
            ordering => ordering,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_nanoseconds() {
        let timestamp = Timestamp::new(1, 1_500_000_000);
        assert_eq!(timestamp.seconds, 2);
        assert_eq!(timestamp.nanos, 500_000_000);
    }

    #[test]
    fn ordering() {
        let earlier = Timestamp::new(1, 0);
        let later = Timestamp::new(1, 1);
        assert!(earlier < later);
    }

    #[test]
    fn rfc3339_roundtrip() {
        let timestamp = Timestamp::new(1_700_000_000, 0);
        let rendered = timestamp.to_rfc3339();
        assert_eq!(Timestamp::parse_rfc3339(&rendered), Some(timestamp));
    }
}
