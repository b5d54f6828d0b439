//! Core data types used throughout the keyword archive backend
//!
//! # Key Types
//!
//! - **`KeywordKind`**: whether a keyword stores scalar or string samples
//! - **`SeriesName`**: the `service.keyword` identity of one channel
//! - **`TimeRange`**: absolute query window with sub-second precision
//! - **`Series`**: ordered-by-time samples for one sub-query
//! - **`DataQuery`** / **`QueryModel`**: one sub-query of a batch, as the
//!   host delivers it and as this crate understands it
//!
//! # Example
//!
//! ```rust
//! use keyword_archive::types::SeriesName;
//!
//! let name: SeriesName = "dcs.AXELVOLT".parse().unwrap();
//! assert_eq!(name.service, "dcs");
//! assert_eq!(name.keyword, "AXELVOLT");
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ArchiveError, Result};

/// Metadata marker the archive stores for string-valued keywords
pub const STRING_TYPE_MARKER: &str = "KTL_STRING";

/// Stored value kind of a keyword, fixed by the metadata relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeywordKind {
    /// Samples parse as float64
    Scalar,
    /// Samples are opaque strings, never parsed numerically
    StringValued,
}

impl KeywordKind {
    /// Map the metadata `type` column onto a kind
    ///
    /// Anything other than the string marker is treated as scalar; the
    /// archive uses a family of numeric type names and only the string
    /// marker changes decoding behavior.
    pub fn from_type_marker(marker: &str) -> Self {
        if marker == STRING_TYPE_MARKER {
            Self::StringValued
        } else {
            Self::Scalar
        }
    }

    /// Whether samples of this kind bypass numeric parsing
    pub fn is_string(&self) -> bool {
        matches!(self, Self::StringValued)
    }
}

/// Absolute time window for a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Inclusive start of the window
    pub from: DateTime<Utc>,
    /// Inclusive end of the window
    pub to: DateTime<Utc>,
}

impl TimeRange {
    /// Create a new time range
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    /// Window endpoints as floating-point Unix seconds, the archive's
    /// native time representation
    ///
    /// Built from whole seconds plus subsecond nanoseconds, so every
    /// representable instant converts, not just those inside the
    /// nanosecond-epoch range.
    pub fn as_unix_seconds(&self) -> (f64, f64) {
        fn to_unix(t: DateTime<Utc>) -> f64 {
            t.timestamp() as f64 + t.timestamp_subsec_nanos() as f64 * 1e-9
        }
        (to_unix(self.from), to_unix(self.to))
    }
}

/// Parsed `service.keyword` identity of one telemetry channel
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesName {
    /// Namespace grouping keywords; one archive relation per service
    pub service: String,
    /// Keyword name within the service
    pub keyword: String,
}

impl FromStr for SeriesName {
    type Err = ArchiveError;

    /// Split `service.keyword` on the first dot
    ///
    /// Fewer than two segments is a malformed query, reported per sub-query
    /// rather than aborting the batch.
    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('.') {
            Some((service, keyword)) if !service.is_empty() && !keyword.is_empty() => Ok(Self {
                service: service.to_string(),
                keyword: keyword.to_string(),
            }),
            _ => Err(ArchiveError::MalformedQuery(format!(
                "expected service.keyword, got '{}'",
                s
            ))),
        }
    }
}

impl fmt::Display for SeriesName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.service, self.keyword)
    }
}

/// One undecoded archive row: Unix time plus the trimmed stored value
#[derive(Debug, Clone, PartialEq)]
pub struct RawSample {
    /// Floating-point Unix timestamp with sub-second precision
    pub time: f64,
    /// Raw stored representation, whitespace already trimmed
    pub binvalue: String,
}

/// Value column of a series, typed by the owning keyword's kind
#[derive(Debug, Clone, PartialEq)]
pub enum SeriesValues {
    /// Float64 samples of a scalar keyword
    Scalar(Vec<f64>),
    /// Verbatim samples of a string-valued keyword
    Text(Vec<String>),
}

impl SeriesValues {
    /// Number of values
    pub fn len(&self) -> usize {
        match self {
            Self::Scalar(v) => v.len(),
            Self::Text(v) => v.len(),
        }
    }

    /// Whether the value column is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Time-ascending sample sequence for one sub-query
///
/// `times` and `values` are parallel arrays; equal length is an invariant
/// that holds from fetch through transform to frame assembly. Transforms may
/// shorten a series but never reorder it.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    /// Sample instants, ascending
    pub times: Vec<DateTime<Utc>>,
    /// Sample values, parallel to `times`
    pub values: SeriesValues,
}

impl Series {
    /// Empty series of the given kind
    pub fn empty(kind: KeywordKind) -> Self {
        let values = match kind {
            KeywordKind::Scalar => SeriesValues::Scalar(Vec::new()),
            KeywordKind::StringValued => SeriesValues::Text(Vec::new()),
        };
        Self {
            times: Vec::new(),
            values,
        }
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Whether the series holds no samples
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Kind of the value column
    pub fn kind(&self) -> KeywordKind {
        match self.values {
            SeriesValues::Scalar(_) => KeywordKind::Scalar,
            SeriesValues::Text(_) => KeywordKind::StringValued,
        }
    }

    /// Check the parallel-array invariant
    pub fn is_consistent(&self) -> bool {
        self.times.len() == self.values.len()
    }
}

/// Decode a floating-point Unix timestamp into an absolute instant
///
/// The archive stores time as `double`; the whole part becomes seconds and
/// the fractional part nanoseconds, preserving sub-second precision. Returns
/// a scan error for timestamps outside the representable range.
pub fn instant_from_unix(ts: f64) -> Result<DateTime<Utc>> {
    if !ts.is_finite() {
        return Err(ArchiveError::Scan(format!("non-finite timestamp {}", ts)));
    }
    let secs = ts.div_euclid(1.0) as i64;
    let nanos = (ts.rem_euclid(1.0) * 1e9) as u32;
    // float rounding can land exactly on the next second
    let (secs, nanos) = if nanos >= 1_000_000_000 {
        (secs + 1, 0)
    } else {
        (secs, nanos)
    };
    DateTime::<Utc>::from_timestamp(secs, nanos)
        .ok_or_else(|| ArchiveError::Scan(format!("timestamp {} out of range", ts)))
}

/// Wire payload of one sub-query, exactly as the host serializes it
///
/// The conversion and transform selectors arrive as small integer codes and
/// are promoted to closed enums inside the pipeline, so an unrecognized code
/// becomes a named per-query error instead of silent fallthrough.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryModel {
    /// Requested channel as `service.keyword`; empty means no-op query
    pub query_text: String,
    /// Unit conversion selector code
    pub unit_conversion: i32,
    /// Transform selector code
    pub transform: i32,
    /// Requested response format; only informational
    pub format: String,
    /// Suggested sampling interval from the host, unused
    pub interval_ms: i64,
    /// Point budget hint from the host, unused
    pub max_data_points: i64,
    /// Caller-supplied identifier correlating the response slot
    pub ref_id: String,
    /// Suppress output for this sub-query
    pub hide: bool,
}

/// One sub-query of a batch as delivered by the host
#[derive(Debug, Clone)]
pub struct DataQuery {
    /// Identifier keying this query's slot in the batch response
    pub ref_id: String,
    /// Absolute window to fetch
    pub time_range: TimeRange,
    /// Unparsed [`QueryModel`] payload
    pub json: serde_json::Value,
}
