//! Batch query orchestration
//!
//! [`QueryPipeline`] runs a batch of sub-queries sequentially against an
//! [`ArchiveStore`]. Per-query control flow: parse the payload, resolve the
//! keyword's kind, run the counted fetch with per-sample unit conversion,
//! apply the requested transform, assemble the frame. Every failure inside
//! that chain is confined to the owning refId's response slot; only an
//! unreachable store aborts the whole batch, before any per-query work.
//!
//! Cancellation is cooperative: a cancelled token aborts the in-flight store
//! call and marks the remaining sub-queries cancelled instead of silently
//! finishing work the caller no longer wants.

use std::collections::BTreeMap;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::convert::UnitConversion;
use crate::error::{ArchiveError, Result};
use crate::frame::{BatchResponse, Frame, QueryResponse};
use crate::store::{fetch_series, ArchiveStore};
use crate::transform::Transform;
use crate::types::{DataQuery, QueryModel, SeriesName};

/// Sequential per-batch query runner over an archive store
pub struct QueryPipeline<S> {
    store: S,
}

impl<S: ArchiveStore> QueryPipeline<S> {
    /// Create a pipeline over a connected store
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Borrow the underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run one batch
    ///
    /// Pings the store first; an unreachable store is fatal and returns
    /// `Err` before any sub-query runs. Afterwards every sub-query gets a
    /// response slot keyed by its refId, holding data, an error, or both.
    pub async fn run(
        &self,
        queries: &[DataQuery],
        cancel: &CancellationToken,
    ) -> Result<BatchResponse> {
        self.store.ping().await?;

        let mut responses = BTreeMap::new();

        for query in queries {
            let response = if cancel.is_cancelled() {
                QueryResponse::error_only(ArchiveError::Cancelled)
            } else {
                match cancel.run_until_cancelled(self.query_one(query)).await {
                    Some(response) => response,
                    None => QueryResponse::error_only(ArchiveError::Cancelled),
                }
            };
            responses.insert(query.ref_id.clone(), response);
        }

        Ok(BatchResponse { responses })
    }

    /// Process a single sub-query; never fails the batch
    async fn query_one(&self, query: &DataQuery) -> QueryResponse {
        let range = &query.time_range;

        let model: QueryModel = match serde_json::from_value(query.json.clone()) {
            Ok(model) => model,
            Err(e) => {
                error!(ref_id = %query.ref_id, error = %e, "unparsable query payload");
                return QueryResponse::error_only(ArchiveError::MalformedQuery(e.to_string()));
            }
        };

        // hidden queries keep their slot but produce nothing
        if model.hide {
            return QueryResponse::empty();
        }

        if model.query_text.is_empty() {
            return QueryResponse::with_frame(Frame::boundary(range));
        }

        if model.format.is_empty() {
            warn!(ref_id = %model.ref_id, "format is empty, defaulting to time series");
        }

        let name: SeriesName = match model.query_text.parse() {
            Ok(name) => name,
            Err(e) => return QueryResponse::failed(e, Frame::boundary(range)),
        };

        let conversion = match UnitConversion::try_from(model.unit_conversion) {
            Ok(conversion) => conversion,
            Err(e) => return QueryResponse::failed(e, Frame::boundary(range)),
        };

        let transform = match Transform::try_from(model.transform) {
            Ok(transform) => transform,
            Err(e) => return QueryResponse::failed(e, Frame::boundary(range)),
        };

        let kind = match self.store.resolve_kind(&name.service, &name.keyword).await {
            Ok(Some(kind)) => kind,
            // no metadata is not an error, just nothing to plot
            Ok(None) => return QueryResponse::with_frame(Frame::boundary(range)),
            Err(e) => {
                error!(ref_id = %model.ref_id, error = %e, "metadata lookup failed");
                return QueryResponse::failed(e, Frame::boundary(range));
            }
        };

        let fetched = fetch_series(
            &self.store,
            &name.service,
            &name.keyword,
            kind,
            conversion,
            range,
        )
        .await;

        let (series, iteration_error) = match fetched {
            Ok(pair) => pair,
            Err(e) => {
                error!(ref_id = %model.ref_id, error = %e, "series fetch failed");
                return QueryResponse::failed(e, Frame::boundary(range));
            }
        };

        if series.is_empty() {
            return QueryResponse {
                frames: vec![Frame::boundary(range)],
                error: iteration_error,
            };
        }

        let series = transform.apply(series);
        debug_assert!(series.is_consistent());

        debug!(
            ref_id = %model.ref_id,
            query = %model.query_text,
            rows = series.len(),
            "sub-query complete"
        );

        let frame = Frame::from_series(&model.ref_id, &model.query_text, series);
        QueryResponse {
            frames: vec![frame],
            error: iteration_error,
        }
    }
}
