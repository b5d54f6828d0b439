//! Keyword archive query backend
//!
//! Answers time-range queries against an archive of tagged telemetry values
//! keyed by `service.keyword`, where each keyword stores either scalar or
//! string samples. The heart of the crate is the per-query
//! retrieval-and-transform pipeline:
//!
//! - resolve the keyword's stored kind from the metadata relation
//! - fetch an ordered sample window with a count-then-fetch snapshot protocol
//! - unit-convert scalar samples as they are decoded
//! - apply an optional differencing transform (derivative variants or delta)
//! - assemble the result into a time/value frame keyed by refId
//!
//! Batches run sequentially; per-query failures never touch sibling queries,
//! and only an unreachable store fails a batch outright. A cancellation
//! token aborts in-flight store calls and marks unprocessed sub-queries as
//! cancelled.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod convert;
pub mod error;
pub mod frame;
pub mod pipeline;
pub mod store;
pub mod transform;
pub mod types;

pub use config::ArchiveConfig;
pub use error::{ArchiveError, Result};
pub use frame::{BatchResponse, Frame, QueryResponse};
pub use pipeline::QueryPipeline;
pub use store::{check_health, ArchiveStore, HealthStatus, PostgresStore};
pub use types::{DataQuery, KeywordKind, Series, TimeRange};
