//! Connection settings for the archive store
//!
//! Settings arrive as a JSON blob from the hosting process, one per
//! datasource instance. Parsing and validation happen once, before any
//! query work; a bad blob is a fatal configuration error for the batch.

use serde::{Deserialize, Serialize};

use crate::error::{ArchiveError, Result};

/// Archive connection settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArchiveConfig {
    /// Postgres host name or address
    #[serde(default = "default_server")]
    pub server: String,

    /// Postgres port, kept as a string to match the host's payload
    #[serde(default = "default_port")]
    pub port: String,

    /// Database role to connect as
    #[serde(default)]
    pub role: String,

    /// Database holding the archive relations
    #[serde(default)]
    pub database: String,

    /// Relation holding `(service, keyword, type)` metadata rows
    #[serde(default = "default_meta_table", rename = "metatable")]
    pub meta_table: String,

    /// Connection pool tuning, not part of the host payload
    #[serde(default, skip)]
    pub pool: PoolConfig,
}

/// Pool tuning knobs with conservative defaults
#[derive(Debug, Clone, Serialize)]
pub struct PoolConfig {
    /// Maximum pooled connections
    pub max_connections: u32,

    /// Seconds to wait for a connection before giving up
    pub acquire_timeout_secs: u64,
}

fn default_server() -> String {
    "localhost".to_string()
}
fn default_port() -> String {
    "5432".to_string()
}
fn default_meta_table() -> String {
    "ktlmeta".to_string()
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 4,
            acquire_timeout_secs: 10,
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            port: default_port(),
            role: String::new(),
            database: String::new(),
            meta_table: default_meta_table(),
            pool: PoolConfig::default(),
        }
    }
}

impl ArchiveConfig {
    /// Parse settings from the host-supplied JSON blob
    pub fn from_json(raw: &[u8]) -> Result<Self> {
        serde_json::from_slice(raw)
            .map_err(|e| ArchiveError::Config(format!("error reading settings: {}", e)))
    }

    /// Validate the settings before opening any connection
    pub fn validate(&self) -> Result<()> {
        if self.server.is_empty() {
            return Err(ArchiveError::Config("server cannot be empty".into()));
        }
        match self.port.parse::<u16>() {
            Ok(0) | Err(_) => {
                return Err(ArchiveError::Config(format!(
                    "port '{}' is not a valid port number",
                    self.port
                )))
            }
            Ok(_) => {}
        }
        if self.role.is_empty() {
            return Err(ArchiveError::Config("role cannot be empty".into()));
        }
        if self.database.is_empty() {
            return Err(ArchiveError::Config("database cannot be empty".into()));
        }
        if self.meta_table.is_empty() {
            return Err(ArchiveError::Config("metadata table cannot be empty".into()));
        }
        Ok(())
    }

    /// Connection URL for the archive
    ///
    /// The archive listens on a trusted internal network without TLS.
    pub fn connection_url(&self) -> String {
        format!(
            "postgres://{}@{}:{}/{}?sslmode=disable",
            self.role, self.server, self.port, self.database
        )
    }
}
