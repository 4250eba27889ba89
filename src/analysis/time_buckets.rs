//! Time Bucket Semantics
//!
//! Single source of truth for mapping snapshot timestamps onto experiment
//! buckets. Both martingale modes and the dataset description go through the
//! functions in this module.
//!
//! # Canonical Rule
//!
//! For any timestamp `t` (nanoseconds since the Unix epoch) and a bucket
//! width `W`:
//! - `bucket_index = floor_div(t, W)`
//! - `bucket_start = bucket_index * W`
//! - `bucket_end = bucket_start + W`
//!
//! The bucket is **half-open**: `[bucket_start, bucket_end)`. With the
//! default width of 60 seconds this is exactly "truncate to
//! year/month/day/hour/minute": seconds and sub-seconds are discarded.

use crate::analysis::error::AnalysisError;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Nanoseconds since Unix epoch (1970-01-01 00:00:00 UTC).
pub type Nanos = i64;

pub const NANOS_PER_SEC: i64 = 1_000_000_000;
pub const NANOS_PER_MIN: i64 = 60 * NANOS_PER_SEC;

/// Default bucket width in seconds (one calendar minute).
pub const DEFAULT_BUCKET_SECS: u64 = 60;

/// Naive layouts accepted when a key carries no UTC offset.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Fixed-width, epoch-aligned bucketing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BucketGranularity {
    width_ns: Nanos,
}

impl BucketGranularity {
    /// Build a granularity from a width in seconds. Zero is rejected.
    pub fn from_secs(secs: u64) -> Result<Self, AnalysisError> {
        if secs == 0 {
            return Err(AnalysisError::Config {
                message: "bucket width must be at least one second".to_string(),
            });
        }
        let width_ns = i64::try_from(secs)
            .ok()
            .and_then(|s| s.checked_mul(NANOS_PER_SEC))
            .ok_or_else(|| AnalysisError::Config {
                message: format!("bucket width of {} seconds overflows", secs),
            })?;
        Ok(Self { width_ns })
    }

    /// One calendar minute.
    pub const fn minute() -> Self {
        Self {
            width_ns: NANOS_PER_MIN,
        }
    }

    #[inline]
    pub const fn width_ns(&self) -> Nanos {
        self.width_ns
    }

    /// Zero-based bucket index containing `t`. Floor division, so timestamps
    /// before the epoch still land in the bucket that starts at or before them.
    #[inline]
    pub fn index(&self, t: Nanos) -> i64 {
        t.div_euclid(self.width_ns)
    }

    /// Start of the bucket containing `t` (inclusive).
    #[inline]
    pub fn bucket_start(&self, t: Nanos) -> Nanos {
        self.index(t) * self.width_ns
    }

    /// Bounds of the bucket containing `t`.
    #[inline]
    pub fn bounds(&self, t: Nanos) -> BucketBounds {
        let start = self.bucket_start(t);
        BucketBounds {
            start,
            end: start + self.width_ns,
        }
    }
}

impl Default for BucketGranularity {
    fn default() -> Self {
        Self::minute()
    }
}

/// Half-open `[start, end)` bucket bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BucketBounds {
    pub start: Nanos,
    pub end: Nanos,
}

impl BucketBounds {
    #[inline]
    pub fn contains(&self, t: Nanos) -> bool {
        t >= self.start && t < self.end
    }
}

/// Parse a snapshot or trade timestamp.
///
/// RFC 3339 strings keep their offset; naive strings are read as UTC.
pub fn parse_timestamp(raw: &str) -> Result<Nanos, AnalysisError> {
    let trimmed = raw.trim();
    let parsed = DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NAIVE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
                .map(|naive| Utc.from_utc_datetime(&naive))
        })
        .ok_or_else(|| AnalysisError::MalformedInput {
            context: "timestamp".to_string(),
            message: format!("unrecognised timestamp '{}'", raw),
        })?;

    parsed
        .timestamp_nanos_opt()
        .ok_or_else(|| AnalysisError::MalformedInput {
            context: "timestamp".to_string(),
            message: format!("timestamp '{}' is outside the representable range", raw),
        })
}

/// Render nanos as an RFC 3339 UTC string (millisecond precision).
pub fn format_nanos(t: Nanos) -> String {
    DateTime::<Utc>::from_timestamp_nanos(t).to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Round half to even at `decimals` places, applied on the scaled value.
#[inline]
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round_ties_even() / scale
}

/// Round the exact binary value to `decimals` places.
///
/// Unlike [`round_to`], no scaling happens first, so a product such as
/// `0.00125 * 1e4` cannot turn into a false `.5` tie.
pub fn round_exact(value: f64, decimals: u32) -> f64 {
    format!("{:.*}", decimals as usize, value)
        .parse()
        .unwrap_or(value)
}
