//! Fixed-width time buckets.
//!
//! A bucket is the interval `(start, end]`: an event stamped exactly at a
//! bucket start belongs to the previous bucket. Buckets tile the configured
//! range `[range_start, range_end)` contiguously.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::error::{Error, Result};

const MINUTE_SECS: i64 = 60;
const HOUR_SECS: i64 = 60 * MINUTE_SECS;
const DAY_SECS: i64 = 24 * HOUR_SECS;

/// Width of every bucket in a run.
///
/// Parsed from `hour`, `day`, or `<n>m` / `<n>h` / `<n>d`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct BucketWidth {
    secs: i64,
}

impl BucketWidth {
    pub const HOUR: BucketWidth = BucketWidth { secs: HOUR_SECS };
    pub const DAY: BucketWidth = BucketWidth { secs: DAY_SECS };

    /// Widths must be positive and representable as a chrono `Duration`.
    pub fn from_secs(secs: i64) -> Result<Self> {
        if secs <= 0 || Duration::try_seconds(secs).is_none() {
            return Err(Error::InvalidBucketWidth(format!("{}s", secs)));
        }
        Ok(Self { secs })
    }

    pub fn as_secs(&self) -> i64 {
        self.secs
    }

    pub fn duration(&self) -> Duration {
        // In range, checked by from_secs
        Duration::try_seconds(self.secs).unwrap_or(Duration::MAX)
    }

    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidBucketWidth(s.to_string());
        let trimmed = s.trim().to_ascii_lowercase();

        match trimmed.as_str() {
            "hour" | "hourly" => return Ok(Self::HOUR),
            "day" | "daily" => return Ok(Self::DAY),
            _ => {},
        }

        let unit_secs = match trimmed.chars().last() {
            Some('m') => MINUTE_SECS,
            Some('h') => HOUR_SECS,
            Some('d') => DAY_SECS,
            _ => return Err(invalid()),
        };
        let count: i64 = trimmed[..trimmed.len() - 1]
            .parse()
            .map_err(|_| invalid())?;

        let secs = count.checked_mul(unit_secs).ok_or_else(invalid)?;
        Self::from_secs(secs).map_err(|_| invalid())
    }
}

impl Default for BucketWidth {
    fn default() -> Self {
        Self::DAY
    }
}

impl TryFrom<String> for BucketWidth {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        BucketWidth::parse(&value)
    }
}

impl fmt::Display for BucketWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.secs % DAY_SECS == 0 {
            write!(f, "{}d", self.secs / DAY_SECS)
        } else if self.secs % HOUR_SECS == 0 {
            write!(f, "{}h", self.secs / HOUR_SECS)
        } else if self.secs % MINUTE_SECS == 0 {
            write!(f, "{}m", self.secs / MINUTE_SECS)
        } else {
            write!(f, "{}s", self.secs)
        }
    }
}

/// Left-open, right-closed interval `(start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Bucket {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Bucket {
    #[inline]
    pub fn contains(&self, instant: &DateTime<Utc>) -> bool {
        self.start < *instant && *instant <= self.end
    }
}

/// Enumerate the buckets covering `[range_start, range_end)`.
///
/// Unless `allow_partial_last_bucket` is set the width must evenly divide the
/// range, otherwise `MisalignedRange` is returned. With it set, the last
/// bucket is cut short at `range_end`.
pub fn enumerate_buckets(
    range_start: DateTime<Utc>,
    range_end: DateTime<Utc>,
    width: BucketWidth,
    allow_partial_last_bucket: bool,
) -> Result<Vec<Bucket>> {
    if range_end < range_start {
        return Err(Error::InvalidRange {
            start: range_start,
            end: range_end,
        });
    }

    let span = range_end - range_start;
    let aligned = span.subsec_nanos() == 0 && span.num_seconds() % width.as_secs() == 0;
    if !aligned && !allow_partial_last_bucket {
        return Err(Error::MisalignedRange {
            start: range_start,
            end: range_end,
            width_secs: width.as_secs(),
        });
    }

    let step = width.duration();
    let mut buckets = Vec::new();
    let mut start = range_start;

    while start < range_end {
        // Past the representable calendar counts as past range_end
        let end = match start.checked_add_signed(step) {
            Some(end) if end < range_end => end,
            _ => range_end,
        };
        buckets.push(Bucket { start, end });
        start = end;
    }

    Ok(buckets)
}

/// Index of the bucket containing `instant`, if any.
///
/// `buckets` must be the contiguous output of [`enumerate_buckets`].
pub fn locate_bucket(buckets: &[Bucket], instant: &DateTime<Utc>) -> Option<usize> {
    let first = buckets.first()?;
    let last = buckets.last()?;
    if *instant <= first.start || *instant > last.end {
        return None;
    }

    // First bucket whose end is at or after the instant
    let idx = buckets.partition_point(|bucket| bucket.end < *instant);
    buckets.get(idx).filter(|bucket| bucket.contains(instant)).map(|_| idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_widths() {
        assert_eq!(BucketWidth::parse("day").unwrap(), BucketWidth::DAY);
        assert_eq!(BucketWidth::parse("Hour").unwrap(), BucketWidth::HOUR);
        assert_eq!(BucketWidth::parse("4h").unwrap().as_secs(), 4 * 3600);
        assert_eq!(BucketWidth::parse("15m").unwrap().as_secs(), 900);
        assert_eq!(BucketWidth::parse("7d").unwrap().as_secs(), 7 * 86400);

        for bad in ["", "h", "0h", "-1d", "3w", "xh", "5é"] {
            assert!(
                matches!(BucketWidth::parse(bad), Err(Error::InvalidBucketWidth(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_width_display() {
        assert_eq!(BucketWidth::DAY.to_string(), "1d");
        assert_eq!(BucketWidth::parse("90m").unwrap().to_string(), "90m");
        assert_eq!(BucketWidth::from_secs(45).unwrap().to_string(), "45s");
    }

    #[test]
    fn test_daily_buckets_tile_range() {
        let buckets = enumerate_buckets(day(1), day(4), BucketWidth::DAY, false).unwrap();

        assert_eq!(buckets.len(), 3);
        assert_eq!(buckets[0].start, day(1));
        assert_eq!(buckets[2].end, day(4));
        for pair in buckets.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn test_hourly_buckets() {
        let buckets = enumerate_buckets(day(1), day(2), BucketWidth::HOUR, false).unwrap();
        assert_eq!(buckets.len(), 24);
    }

    #[test]
    fn test_misaligned_range() {
        let end = day(2) + Duration::hours(5);

        assert!(matches!(
            enumerate_buckets(day(1), end, BucketWidth::DAY, false),
            Err(Error::MisalignedRange { width_secs: 86400, .. })
        ));

        let buckets = enumerate_buckets(day(1), end, BucketWidth::DAY, true).unwrap();
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[1].start, day(2));
        assert_eq!(buckets[1].end, end);
    }

    #[test]
    fn test_huge_widths_never_panic() {
        // Too wide for a chrono Duration
        assert!(matches!(
            BucketWidth::parse("9999999999999d"),
            Err(Error::InvalidBucketWidth(_))
        ));
        assert!(BucketWidth::from_secs(i64::MAX).is_err());

        // Fits a Duration but a bucket end would pass the last representable date
        let width = BucketWidth::parse("100000000d").unwrap();
        assert!(enumerate_buckets(day(1), day(1), width, false)
            .unwrap()
            .is_empty());
        assert!(matches!(
            enumerate_buckets(day(1), day(8), width, false),
            Err(Error::MisalignedRange { .. })
        ));

        let buckets = enumerate_buckets(day(1), day(8), width, true).unwrap();
        assert_eq!(buckets, vec![Bucket { start: day(1), end: day(8) }]);
    }

    #[test]
    fn test_empty_and_inverted_ranges() {
        assert!(enumerate_buckets(day(1), day(1), BucketWidth::DAY, false)
            .unwrap()
            .is_empty());
        assert!(matches!(
            enumerate_buckets(day(2), day(1), BucketWidth::DAY, false),
            Err(Error::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_bucket_is_left_open_right_closed() {
        let bucket = Bucket {
            start: day(1),
            end: day(2),
        };
        assert!(!bucket.contains(&day(1)));
        assert!(bucket.contains(&(day(1) + Duration::seconds(1))));
        assert!(bucket.contains(&day(2)));
        assert!(!bucket.contains(&(day(2) + Duration::seconds(1))));
    }

    #[test]
    fn test_locate_bucket_boundaries() {
        let buckets = enumerate_buckets(day(1), day(4), BucketWidth::DAY, false).unwrap();

        // Left edge of the whole range belongs nowhere
        assert_eq!(locate_bucket(&buckets, &day(1)), None);
        // Interior boundary belongs to the bucket that ends there
        assert_eq!(locate_bucket(&buckets, &day(2)), Some(0));
        assert_eq!(locate_bucket(&buckets, &day(3)), Some(1));
        assert_eq!(locate_bucket(&buckets, &day(4)), Some(2));
        assert_eq!(locate_bucket(&buckets, &(day(4) + Duration::seconds(1))), None);
        assert_eq!(locate_bucket(&buckets, &(day(2) + Duration::hours(13))), Some(1));
        assert_eq!(locate_bucket(&[], &day(2)), None);
    }
}
