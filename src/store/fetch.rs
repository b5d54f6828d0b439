//! Counted series fetch and row decoding
//!
//! The archive is written concurrently with reads, so a fetch runs in two
//! phases: a count query sizes the result, then the ordered fetch consumes
//! at most that many rows. No transaction spans the phases; the count is a
//! read-time snapshot, and rows that arrive in between stay invisible to
//! this query. That gap is accepted behavior, not a locking bug.

use tracing::debug;

use crate::convert::UnitConversion;
use crate::error::{ArchiveError, Result};
use crate::store::ArchiveStore;
use crate::types::{instant_from_unix, KeywordKind, Series, SeriesValues, TimeRange};

/// Fetch and decode the sample window for one keyword
///
/// Scalar samples are unit-converted one by one as they are decoded; string
/// samples bypass numeric parsing entirely. A decode failure on any row
/// discards the partial buffer and fails the whole fetch with a scan error.
/// Zero rows yield an empty series, not an error.
///
/// Returns the series plus an optional row-iteration error the store
/// reported after rows had been buffered; the caller attaches that error to
/// an otherwise populated response.
pub async fn fetch_series<S: ArchiveStore + ?Sized>(
    store: &S,
    service: &str,
    keyword: &str,
    kind: KeywordKind,
    conversion: UnitConversion,
    range: &TimeRange,
) -> Result<(Series, Option<ArchiveError>)> {
    let count = store.count_samples(service, keyword, range).await?;
    debug!(service, keyword, count, "count query finished");

    if count <= 0 {
        return Ok((Series::empty(kind), None));
    }

    let batch = store.fetch_raw(service, keyword, range, count).await?;

    // capacity hint only; the store decides how many rows actually arrive
    let mut times = Vec::with_capacity(batch.rows.len());
    let mut floats = Vec::new();
    let mut strings = Vec::new();
    if kind.is_string() {
        strings.reserve(batch.rows.len());
    } else {
        floats.reserve(batch.rows.len());
    }

    for row in &batch.rows {
        times.push(instant_from_unix(row.time)?);

        if kind.is_string() {
            strings.push(row.binvalue.clone());
        } else {
            let value = row.binvalue.parse::<f64>().map_err(|e| {
                ArchiveError::Scan(format!(
                    "value '{}' for {}.{} is not numeric: {}",
                    row.binvalue, service, keyword, e
                ))
            })?;
            floats.push(conversion.apply(value));
        }
    }

    let values = if kind.is_string() {
        SeriesValues::Text(strings)
    } else {
        SeriesValues::Scalar(floats)
    };

    debug!(service, keyword, rows = times.len(), "fetch finished");

    let iteration_error = batch.iteration_error.map(ArchiveError::RowIteration);
    Ok((Series { times, values }, iteration_error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RawBatch;
    use crate::types::RawSample;
    use async_trait::async_trait;
    use std::collections::BTreeMap;

    /// Minimal store stub: fixed count, fixed rows, honors the limit
    struct StubStore {
        count: i64,
        rows: Vec<RawSample>,
        iteration_error: Option<String>,
    }

    #[async_trait]
    impl ArchiveStore for StubStore {
        async fn resolve_kind(&self, _: &str, _: &str) -> Result<Option<KeywordKind>> {
            Ok(Some(KeywordKind::Scalar))
        }

        async fn count_samples(&self, _: &str, _: &str, _: &TimeRange) -> Result<i64> {
            Ok(self.count)
        }

        async fn fetch_raw(
            &self,
            _: &str,
            _: &str,
            _: &TimeRange,
            limit: i64,
        ) -> Result<RawBatch> {
            Ok(RawBatch {
                rows: self.rows.iter().take(limit as usize).cloned().collect(),
                iteration_error: self.iteration_error.clone(),
            })
        }

        async fn list_services(&self) -> Result<BTreeMap<String, String>> {
            Ok(BTreeMap::new())
        }

        async fn list_keywords(&self, _: &str) -> Result<BTreeMap<String, String>> {
            Ok(BTreeMap::new())
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }
    }

    fn raw(time: f64, binvalue: &str) -> RawSample {
        RawSample {
            time,
            binvalue: binvalue.to_string(),
        }
    }

    fn window() -> TimeRange {
        TimeRange::new(
            instant_from_unix(1_700_000_000.0).unwrap(),
            instant_from_unix(1_700_003_600.0).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_scalar_fetch_decodes_and_converts() {
        let store = StubStore {
            count: 2,
            rows: vec![raw(1_700_000_000.0, "180"), raw(1_700_000_001.5, "90")],
            iteration_error: None,
        };
        let (series, iter_err) = fetch_series(
            &store,
            "dcs",
            "AZ",
            KeywordKind::Scalar,
            UnitConversion::DegToRad,
            &window(),
        )
        .await
        .unwrap();

        assert!(iter_err.is_none());
        assert_eq!(series.len(), 2);
        assert!(series.is_consistent());
        match series.values {
            SeriesValues::Scalar(v) => {
                assert!((v[0] - std::f64::consts::PI).abs() < 1e-12);
                assert!((v[1] - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
            }
            _ => panic!("expected scalar values"),
        }
        assert_eq!(series.times[1].timestamp_subsec_nanos(), 500_000_000);
    }

    #[tokio::test]
    async fn test_count_bounds_the_fetch() {
        // a third row arrived between count and fetch; it must stay invisible
        let store = StubStore {
            count: 2,
            rows: vec![
                raw(1_700_000_000.0, "1"),
                raw(1_700_000_001.0, "2"),
                raw(1_700_000_002.0, "3"),
            ],
            iteration_error: None,
        };
        let (series, _) = fetch_series(
            &store,
            "dcs",
            "AZ",
            KeywordKind::Scalar,
            UnitConversion::None,
            &window(),
        )
        .await
        .unwrap();
        assert_eq!(series.len(), 2);
    }

    #[tokio::test]
    async fn test_zero_rows_is_empty_series() {
        let store = StubStore {
            count: 0,
            rows: vec![],
            iteration_error: None,
        };
        let (series, iter_err) = fetch_series(
            &store,
            "dcs",
            "AZ",
            KeywordKind::Scalar,
            UnitConversion::None,
            &window(),
        )
        .await
        .unwrap();
        assert!(series.is_empty());
        assert!(iter_err.is_none());
    }

    #[tokio::test]
    async fn test_bad_scalar_value_is_scan_error() {
        let store = StubStore {
            count: 2,
            rows: vec![raw(1_700_000_000.0, "1.5"), raw(1_700_000_001.0, "OPEN")],
            iteration_error: None,
        };
        let err = fetch_series(
            &store,
            "dcs",
            "AZ",
            KeywordKind::Scalar,
            UnitConversion::None,
            &window(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ArchiveError::Scan(_)));
    }

    #[tokio::test]
    async fn test_string_kind_bypasses_parsing() {
        let store = StubStore {
            count: 2,
            rows: vec![raw(1_700_000_000.0, "OPEN"), raw(1_700_000_001.0, "CLOSED")],
            iteration_error: None,
        };
        let (series, _) = fetch_series(
            &store,
            "dcs",
            "SHUTTER",
            KeywordKind::StringValued,
            UnitConversion::None,
            &window(),
        )
        .await
        .unwrap();
        assert_eq!(
            series.values,
            SeriesValues::Text(vec!["OPEN".into(), "CLOSED".into()])
        );
    }

    #[tokio::test]
    async fn test_iteration_error_keeps_buffered_rows() {
        let store = StubStore {
            count: 2,
            rows: vec![raw(1_700_000_000.0, "1.0"), raw(1_700_000_001.0, "2.0")],
            iteration_error: Some("connection reset".into()),
        };
        let (series, iter_err) = fetch_series(
            &store,
            "dcs",
            "AZ",
            KeywordKind::Scalar,
            UnitConversion::None,
            &window(),
        )
        .await
        .unwrap();
        assert_eq!(series.len(), 2);
        assert!(matches!(iter_err, Some(ArchiveError::RowIteration(_))));
    }
}
