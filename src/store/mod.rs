//! Archive store access
//!
//! [`ArchiveStore`] is the seam between the query pipeline and the backing
//! Postgres archive: metadata resolution, the two-phase counted fetch, and
//! the thin collaborator endpoints (service/keyword listings, health ping).
//! The pipeline only ever talks to the trait, which keeps every pipeline
//! path testable against an in-memory store.

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::types::{KeywordKind, RawSample, TimeRange};

pub mod fetch;
pub mod postgres;

pub use fetch::fetch_series;
pub use postgres::{check_health, HealthStatus, PostgresStore};

/// Result of one ordered row fetch
///
/// `iteration_error` carries a failure the row stream reported after rows
/// had already been buffered; the buffered rows stay usable and the caller
/// attaches the error to the response as a partial success.
#[derive(Debug, Clone, Default)]
pub struct RawBatch {
    /// Rows in ascending time order
    pub rows: Vec<RawSample>,
    /// Failure reported by the stream after the loop, if any
    pub iteration_error: Option<String>,
}

/// Backend access used by the query pipeline
///
/// All methods are synchronous from the pipeline's perspective: each call
/// suspends the worker until the store answers. Implementations must not
/// retain per-call state; every batch acquires and releases its own
/// connections.
#[async_trait]
pub trait ArchiveStore: Send + Sync {
    /// Resolve the stored kind of a keyword
    ///
    /// `Ok(None)` means no metadata row exists, which is not an error: the
    /// pipeline answers with a successful empty frame.
    async fn resolve_kind(&self, service: &str, keyword: &str) -> Result<Option<KeywordKind>>;

    /// Count rows matching the keyword inside the window
    ///
    /// The count sizes the subsequent fetch and bounds it: rows inserted
    /// after the count runs are invisible to the same query.
    async fn count_samples(&self, service: &str, keyword: &str, range: &TimeRange) -> Result<i64>;

    /// Fetch up to `limit` rows in ascending time order
    async fn fetch_raw(
        &self,
        service: &str,
        keyword: &str,
        range: &TimeRange,
        limit: i64,
    ) -> Result<RawBatch>;

    /// Distinct services, ascending, as a name-to-name map
    async fn list_services(&self) -> Result<BTreeMap<String, String>>;

    /// Keywords of one service, ascending, keyed by bare keyword with the
    /// `service.keyword` display label as value
    async fn list_keywords(&self, service: &str) -> Result<BTreeMap<String, String>>;

    /// Probe store reachability
    async fn ping(&self) -> Result<()>;
}
