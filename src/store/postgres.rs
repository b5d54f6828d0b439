//! Postgres-backed archive store
//!
//! One [`PostgresStore`] owns a connection pool for one datasource instance;
//! [`PostgresStore::connect`] and [`PostgresStore::close`] are the explicit
//! lifecycle entry points, so nothing here depends on ambient process state.
//! Each per-service relation holds `(time double, keyword text,
//! binvalue text)` rows and the metadata relation maps `(service, keyword)`
//! to a stored type marker.
//!
//! Service and metadata relation names are interpolated into SQL (they name
//! tables, which cannot be bound), so both pass through identifier quoting
//! first.

use futures::TryStreamExt;
use serde::Serialize;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error};

use crate::config::ArchiveConfig;
use crate::error::{ArchiveError, Result};
use crate::store::{ArchiveStore, RawBatch};
use crate::types::{KeywordKind, RawSample, TimeRange};

/// Quote a SQL identifier, doubling any embedded quotes
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn lookup_err(e: sqlx::Error) -> ArchiveError {
    ArchiveError::Lookup(e.to_string())
}

fn scan_err(e: sqlx::Error) -> ArchiveError {
    ArchiveError::Scan(e.to_string())
}

/// Archive store backed by a Postgres connection pool
pub struct PostgresStore {
    pool: PgPool,
    meta_table: String,
}

impl PostgresStore {
    /// Open a pool against the configured archive
    ///
    /// Validates settings first; both a bad config and an unreachable
    /// server are fatal to the caller's batch.
    pub async fn connect(config: &ArchiveConfig) -> Result<Self> {
        config.validate()?;

        let pool = PgPoolOptions::new()
            .max_connections(config.pool.max_connections)
            .acquire_timeout(Duration::from_secs(config.pool.acquire_timeout_secs))
            .connect(&config.connection_url())
            .await
            .map_err(|e| ArchiveError::Connection(e.to_string()))?;

        debug!(server = %config.server, database = %config.database, "archive pool opened");

        Ok(Self {
            pool,
            meta_table: config.meta_table.clone(),
        })
    }

    /// Close the pool, waiting for checked-out connections to return
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl ArchiveStore for PostgresStore {
    async fn resolve_kind(&self, service: &str, keyword: &str) -> Result<Option<KeywordKind>> {
        let sql = format!(
            "select type from {} where service = $1 and keyword = $2 limit 1",
            quote_identifier(&self.meta_table)
        );

        let row = sqlx::query(&sql)
            .bind(service)
            .bind(keyword)
            .fetch_optional(&self.pool)
            .await
            .map_err(lookup_err)?;

        match row {
            Some(row) => {
                let marker: String = row.try_get("type").map_err(lookup_err)?;
                debug!(service, keyword, %marker, "resolved keyword type");
                Ok(Some(KeywordKind::from_type_marker(&marker)))
            }
            None => {
                debug!(service, keyword, "no metadata row");
                Ok(None)
            }
        }
    }

    async fn count_samples(&self, service: &str, keyword: &str, range: &TimeRange) -> Result<i64> {
        let sql = format!(
            "select count(time) from {} where keyword = $1 and time >= $2 and time <= $3",
            quote_identifier(service)
        );
        let (from, to) = range.as_unix_seconds();

        let row = sqlx::query(&sql)
            .bind(keyword)
            .bind(from)
            .bind(to)
            .fetch_one(&self.pool)
            .await
            .map_err(lookup_err)?;

        row.try_get::<i64, _>(0).map_err(lookup_err)
    }

    async fn fetch_raw(
        &self,
        service: &str,
        keyword: &str,
        range: &TimeRange,
        limit: i64,
    ) -> Result<RawBatch> {
        // trim in SQL so whitespace never reaches the float parser
        let sql = format!(
            "select time, trim(binvalue) as binvalue from {} \
             where keyword = $1 and time >= $2 and time <= $3 \
             order by time asc limit $4",
            quote_identifier(service)
        );
        let (from, to) = range.as_unix_seconds();

        let mut stream = sqlx::query(&sql)
            .bind(keyword)
            .bind(from)
            .bind(to)
            .bind(limit)
            .fetch(&self.pool);

        let capacity = usize::try_from(limit).unwrap_or(0).min(65_536);
        let mut rows: Vec<RawSample> = Vec::with_capacity(capacity);

        loop {
            match stream.try_next().await {
                Ok(Some(row)) => {
                    let time: f64 = row.try_get("time").map_err(scan_err)?;
                    let binvalue: String = row.try_get("binvalue").map_err(scan_err)?;
                    rows.push(RawSample { time, binvalue });
                }
                Ok(None) => break,
                Err(e) if rows.is_empty() => {
                    // nothing buffered yet, the whole fetch failed
                    error!(service, keyword, error = %e, "row fetch failed");
                    return Err(lookup_err(e));
                }
                Err(e) => {
                    // keep what arrived, surface the failure as partial success
                    error!(service, keyword, error = %e, "row stream broke mid-fetch");
                    return Ok(RawBatch {
                        rows,
                        iteration_error: Some(e.to_string()),
                    });
                }
            }
        }

        Ok(RawBatch {
            rows,
            iteration_error: None,
        })
    }

    async fn list_services(&self) -> Result<BTreeMap<String, String>> {
        let sql = format!(
            "select distinct service from {} order by service asc",
            quote_identifier(&self.meta_table)
        );

        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(lookup_err)?;

        let mut services = BTreeMap::new();
        for row in rows {
            let service: String = row.try_get("service").map_err(lookup_err)?;
            services.insert(service.clone(), service);
        }
        Ok(services)
    }

    async fn list_keywords(&self, service: &str) -> Result<BTreeMap<String, String>> {
        let sql = format!(
            "select keyword from {} where service = $1 order by keyword asc",
            quote_identifier(&self.meta_table)
        );

        let rows = sqlx::query(&sql)
            .bind(service)
            .fetch_all(&self.pool)
            .await
            .map_err(lookup_err)?;

        let mut keywords = BTreeMap::new();
        for row in rows {
            let keyword: String = row.try_get("keyword").map_err(lookup_err)?;
            let label = format!("{}.{}", service, keyword);
            keywords.insert(keyword, label);
        }
        Ok(keywords)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("select 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| ArchiveError::Connection(e.to_string()))
    }
}

/// Result of a health probe, shaped for the host's test button
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// Whether the archive answered
    pub ok: bool,
    /// Human-readable outcome
    pub message: String,
}

/// Validate settings and probe archive reachability
///
/// Never fails: every outcome is folded into the returned status so the
/// host can show it verbatim.
pub async fn check_health(config: &ArchiveConfig) -> HealthStatus {
    if let Err(e) = config.validate() {
        return HealthStatus {
            ok: false,
            message: format!("invalid config: {}", e),
        };
    }

    let store = match PostgresStore::connect(config).await {
        Ok(store) => store,
        Err(e) => {
            return HealthStatus {
                ok: false,
                message: format!("failure to open archive: {}", e),
            }
        }
    };

    let status = match store.ping().await {
        Ok(()) => HealthStatus {
            ok: true,
            message: format!(
                "confirmed: {}:{}:{}:{}",
                config.server, config.role, config.database, config.meta_table
            ),
        },
        Err(e) => HealthStatus {
            ok: false,
            message: format!("failure to ping archive: {}", e),
        },
    };

    store.close().await;
    status
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("dcs"), "\"dcs\"");
        assert_eq!(quote_identifier("ktlmeta"), "\"ktlmeta\"");
        // embedded quotes double, injection attempts stay inert
        assert_eq!(
            quote_identifier("bad\"; drop table x; --"),
            "\"bad\"\"; drop table x; --\""
        );
    }

    #[tokio::test]
    async fn test_check_health_rejects_bad_config() {
        let config = ArchiveConfig {
            role: String::new(),
            ..ArchiveConfig::default()
        };
        let status = check_health(&config).await;
        assert!(!status.ok);
        assert!(status.message.contains("invalid config"));
    }
}
