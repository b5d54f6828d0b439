//! Output frames and per-query responses
//!
//! A [`Frame`] is the container handed back to the caller for one sub-query:
//! a `time` column and a value column of the keyword's kind, tagged with the
//! originating refId and the query text as display name. Three shapes exist:
//!
//! - a data frame built from a (possibly transformed) series
//! - a successful boundary frame holding only the requested window endpoints,
//!   used when there is no metadata or no rows to return
//! - a failure-tagged response carrying an error next to best-effort data

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

use crate::error::ArchiveError;
use crate::types::{Series, SeriesValues, TimeRange};

/// Name given to every frame; the display name lives in `name`'s sibling
/// fields and the host keys responses by refId
const FRAME_NAME: &str = "response";

/// Value column of a frame
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FrameValues {
    /// Boundary frame: no value column at all
    Empty,
    /// Scalar samples
    Scalar(Vec<f64>),
    /// String samples
    Text(Vec<String>),
}

impl FrameValues {
    /// Number of values; a missing column counts as zero
    pub fn len(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Scalar(v) => v.len(),
            Self::Text(v) => v.len(),
        }
    }

    /// Whether the column holds no values
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Final time/value container for one sub-query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    /// Fixed frame name
    pub name: String,
    /// RefId of the originating sub-query
    #[serde(rename = "refId")]
    pub ref_id: String,
    /// Display name, the query text of the originating sub-query
    #[serde(rename = "displayName")]
    pub display_name: String,
    /// The `time` column
    pub time: Vec<DateTime<Utc>>,
    /// The value column, unnamed on the wire
    pub values: FrameValues,
}

impl Frame {
    /// Boundary frame: the requested window endpoints and no values
    ///
    /// Success-shaped output for missing metadata, zero rows, or an empty
    /// query text, and the best-effort payload attached to per-query errors.
    pub fn boundary(range: &TimeRange) -> Self {
        Self {
            name: FRAME_NAME.to_string(),
            ref_id: String::new(),
            display_name: String::new(),
            time: vec![range.from, range.to],
            values: FrameValues::Empty,
        }
    }

    /// Data frame from a fetched (and possibly transformed) series
    pub fn from_series(ref_id: &str, display_name: &str, series: Series) -> Self {
        let Series { times, values } = series;
        let values = match values {
            SeriesValues::Scalar(v) => FrameValues::Scalar(v),
            SeriesValues::Text(v) => FrameValues::Text(v),
        };
        Self {
            name: FRAME_NAME.to_string(),
            ref_id: ref_id.to_string(),
            display_name: display_name.to_string(),
            time: times,
            values,
        }
    }

    /// Number of rows in the frame
    pub fn len(&self) -> usize {
        self.time.len()
    }

    /// Whether the frame holds no rows
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Check the parallel-array invariant; boundary frames are exempt since
    /// they carry no value column
    pub fn is_consistent(&self) -> bool {
        match &self.values {
            FrameValues::Empty => true,
            other => self.time.len() == other.len(),
        }
    }
}

fn serialize_error<S>(err: &Option<ArchiveError>, s: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match err {
        Some(e) => s.serialize_some(&e.to_string()),
        None => s.serialize_none(),
    }
}

/// Result for one sub-query: zero or more frames plus an optional error
///
/// Both can be present at once; row-iteration failures attach an error to an
/// otherwise populated frame.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryResponse {
    /// Frames produced for this sub-query
    pub frames: Vec<Frame>,
    /// Error confined to this sub-query, if any
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<ArchiveError>,
}

impl QueryResponse {
    /// Empty response, the slot reserved for hidden sub-queries
    pub fn empty() -> Self {
        Self::default()
    }

    /// Successful response with one frame
    pub fn with_frame(frame: Frame) -> Self {
        Self {
            frames: vec![frame],
            error: None,
        }
    }

    /// Failed response carrying a best-effort frame next to the error
    pub fn failed(error: ArchiveError, frame: Frame) -> Self {
        Self {
            frames: vec![frame],
            error: Some(error),
        }
    }

    /// Failed response with no data at all
    pub fn error_only(error: ArchiveError) -> Self {
        Self {
            frames: Vec::new(),
            error: Some(error),
        }
    }
}

/// Batch result: responses keyed by refId
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchResponse {
    /// One slot per sub-query, including hidden and failed ones
    pub responses: BTreeMap<String, QueryResponse>,
}
