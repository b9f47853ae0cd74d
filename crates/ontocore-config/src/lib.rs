// crates/ontocore-config/src/lib.rs
// ============================================================================
// Crate: ontocore-config
// Description: Configuration model, loading and validation for the identity
//              & ontology core.
// Purpose: Own every setting enumerated in spec §6 in one validated place.
// Dependencies: ontocore-core, serde, thiserror, toml
// ============================================================================

//! ## Overview
//! Mirrors the CLI's `DecisionGateConfig::load(path)` convention: a TOML
//! file, overridable by an environment variable, deserialized then
//! validated before any server or CLI command uses it. `DRY_RUN_DEFAULT`
//! is pinned `true` and rejected at load time if a config file attempts to
//! disable it globally, matching spec §6's "cannot be disabled globally".

use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// Environment variable naming an override config file path.
pub const CONFIG_ENV: &str = "ONTOCORE_CONFIG";
/// Default config file name, resolved relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "ontocore.toml";

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The config file could not be parsed as TOML.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Path that failed to parse.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: Box<toml::de::Error>,
    },
    /// The config failed a validation rule.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Journal mode for the SQLite-backed ledger store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalMode {
    /// Write-ahead logging; the default for concurrent readers/writer.
    Wal,
    /// Classic rollback journal.
    Delete,
}

impl Default for JournalMode {
    fn default() -> Self {
        Self::Wal
    }
}

/// Ledger storage connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Path to the SQLite database file.
    pub path: PathBuf,
    /// `PRAGMA busy_timeout` in milliseconds.
    pub busy_timeout_ms: u64,
    /// Journal mode.
    pub journal_mode: JournalMode,
    /// Capacity of the writer-gateway queue.
    pub writer_queue_capacity: usize,
    /// Number of pooled read connections.
    pub read_pool_size: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("ontocore.sqlite3"),
            busy_timeout_ms: 5_000,
            journal_mode: JournalMode::Wal,
            writer_queue_capacity: 1_024,
            read_pool_size: 4,
        }
    }
}

/// Graph-store projection target settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphStoreConfig {
    /// Base URL of the graph store's HTTP endpoint.
    pub endpoint: String,
    /// Request timeout in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for GraphStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:7474".to_string(),
            request_timeout_ms: 5_000,
        }
    }
}

/// HTTP server bind settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (host:port).
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
        }
    }
}

/// The complete, validated configuration (spec §6 "Configuration
/// (enumerated)").
///
/// # Invariants
/// - `dry_run_default` is always `true`; [`OntocoreConfig::validate`]
///   rejects any config file that sets it otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OntocoreConfig {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Ledger storage settings.
    pub ledger: LedgerConfig,
    /// Graph-store projection settings.
    pub graph_store: GraphStoreConfig,
    /// Whether dry-run is the default for mutating operations. Must be
    /// `true`; present in the file only so operators can see the
    /// invariant, not so they can flip it.
    pub dry_run_default: bool,
    /// Advisory lock acquisition timeout in milliseconds.
    pub advisory_lock_timeout_ms: u64,
    /// Projection sync batch size.
    pub sync_batch_size: u32,
    /// Projection sync retry base delay in milliseconds.
    pub sync_retry_base_ms: u64,
    /// Projection sync retry backoff factor.
    pub sync_retry_factor: u32,
    /// Projection sync retry delay cap in milliseconds.
    pub sync_retry_cap_ms: u64,
    /// Projection sync maximum retry attempts.
    pub sync_retry_max_attempts: u32,
    /// Bounded-hop limit for canonical chain resolution.
    pub readiness_max_hops: u32,
    /// Candidate backlog count threshold for the operational gate.
    pub backlog_threshold_count: u32,
    /// Candidate backlog age threshold, in days, for the operational gate.
    pub backlog_threshold_days: u32,
    /// Idempotency record time-to-live, in seconds.
    pub idempotency_ttl_secs: u64,
    /// Whether `merge_pairs` may rewrite catalog rows directly (Open
    /// Question resolution in `SPEC_FULL.md`).
    pub allow_catalog_row_merge: bool,
}

impl Default for OntocoreConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            ledger: LedgerConfig::default(),
            graph_store: GraphStoreConfig::default(),
            dry_run_default: true,
            advisory_lock_timeout_ms: 5_000,
            sync_batch_size: 200,
            sync_retry_base_ms: 1_000,
            sync_retry_factor: 2,
            sync_retry_cap_ms: 30_000,
            sync_retry_max_attempts: 3,
            readiness_max_hops: 10,
            backlog_threshold_count: 50,
            backlog_threshold_days: 3,
            idempotency_ttl_secs: 24 * 60 * 60,
            allow_catalog_row_merge: false,
        }
    }
}

impl OntocoreConfig {
    /// Loads configuration from `path`, or from [`CONFIG_ENV`], or from
    /// [`DEFAULT_CONFIG_FILE`] if neither is set and the default file
    /// exists, falling back to [`OntocoreConfig::default`] otherwise.
    ///
    /// # Errors
    /// Returns [`ConfigError::Read`]/[`ConfigError::Parse`] if an explicit
    /// or discovered file fails to read or parse, and
    /// [`ConfigError::Invalid`] if the loaded config fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = path.map(Path::to_path_buf).or_else(|| {
            std::env::var_os(CONFIG_ENV).map(PathBuf::from).or_else(|| {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                default_path.is_file().then_some(default_path)
            })
        });

        let config = match resolved {
            Some(file_path) => {
                let text = std::fs::read_to_string(&file_path)
                    .map_err(|source| ConfigError::Read { path: file_path.clone(), source })?;
                toml::from_str::<Self>(&text).map_err(|source| ConfigError::Parse {
                    path: file_path,
                    source: Box::new(source),
                })?
            }
            None => Self::default(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates cross-field invariants not expressible through `serde`
    /// alone.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] describing the first violated rule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.dry_run_default {
            return Err(ConfigError::Invalid(
                "dry_run_default cannot be disabled globally".to_string(),
            ));
        }
        if self.sync_batch_size == 0 {
            return Err(ConfigError::Invalid("sync_batch_size must be > 0".to_string()));
        }
        if self.sync_retry_factor < 1 {
            return Err(ConfigError::Invalid("sync_retry_factor must be >= 1".to_string()));
        }
        if self.readiness_max_hops == 0 {
            return Err(ConfigError::Invalid("readiness_max_hops must be > 0".to_string()));
        }
        if self.ledger.read_pool_size == 0 {
            return Err(ConfigError::Invalid("ledger.read_pool_size must be > 0".to_string()));
        }
        Ok(())
    }
}
