use chrono::{DateTime, Utc};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::agg::{BucketWidth, DensityMode};
use crate::utils::deserialize_instant;

/// Time range, bucketing and density of an aggregation run.
#[derive(Debug, Deserialize, Clone)]
pub struct AggregationSettings {
    #[serde(deserialize_with = "deserialize_instant")]
    pub range_start: DateTime<Utc>,
    #[serde(deserialize_with = "deserialize_instant")]
    pub range_end: DateTime<Utc>,
    #[serde(default)]
    pub bucket_width: BucketWidth,
    #[serde(default)]
    pub density_mode: DensityMode,
    /// Replace per-bucket action counts with running totals
    #[serde(default)]
    pub apply_cumulative_pass: bool,
    /// Let the last bucket end early instead of failing on a misaligned range
    #[serde(default)]
    pub allow_partial_last_bucket: bool,
}

/// Statement generation.
///
/// Controls upsert batching and the optional maintenance statements.
#[derive(Debug, Deserialize, Clone)]
pub struct StatementSettings {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_true")]
    pub emit_index_statement: bool,
    #[serde(default)]
    pub emit_truncate_statement: bool,
    #[serde(default = "default_statistics_table")]
    pub statistics_table: String,
    #[serde(default = "default_users_table")]
    pub users_table: String,
    #[serde(default = "default_rollup_table")]
    pub rollup_table: String,
    /// When false, a run producing no rows fails with `EmptyInput`
    #[serde(default = "default_true")]
    pub allow_empty: bool,
}

impl Default for StatementSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            emit_index_statement: true,
            emit_truncate_statement: false,
            statistics_table: default_statistics_table(),
            users_table: default_users_table(),
            rollup_table: default_rollup_table(),
            allow_empty: true,
        }
    }
}

fn default_batch_size() -> usize {
    100_000
}

fn default_true() -> bool {
    true
}

fn default_statistics_table() -> String {
    "public.statistics".to_string()
}

fn default_users_table() -> String {
    "users".to_string()
}

fn default_rollup_table() -> String {
    "public.statistics_rollup".to_string()
}

/// Input and output file locations.
#[derive(Debug, Deserialize, Clone)]
pub struct IoSettings {
    #[serde(default = "default_events_path")]
    pub events_path: String,
    /// Defaults to `rows-{start}-{end}.csv`
    #[serde(default)]
    pub rows_csv_path: Option<String>,
    #[serde(default = "default_sql_dir")]
    pub sql_dir: String,
    #[serde(default = "default_sql_file_prefix")]
    pub sql_file_prefix: String,
}

impl Default for IoSettings {
    fn default() -> Self {
        Self {
            events_path: default_events_path(),
            rows_csv_path: None,
            sql_dir: default_sql_dir(),
            sql_file_prefix: default_sql_file_prefix(),
        }
    }
}

fn default_events_path() -> String {
    "events.json".to_string()
}

fn default_sql_dir() -> String {
    ".".to_string()
}

fn default_sql_file_prefix() -> String {
    "update-statistics".to_string()
}

/// PostgreSQL database connection configuration.
///
/// Only used when `apply` is set; otherwise statements are just written to disk.
#[derive(Debug, Deserialize, Clone)]
pub struct PostgresSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Connection attempts before giving up
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
    /// Base delay between attempts, doubled after each failure
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default)]
    pub apply: bool,
}

fn default_pool_size() -> usize {
    4
}

fn default_connect_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    200
}

/// Root application configuration.
///
/// Loaded from `config.yaml` (or any format the `config` crate understands)
/// with `TALLY__SECTION__KEY` environment overrides.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    pub aggregation: AggregationSettings,
    #[serde(default)]
    pub statements: StatementSettings,
    #[serde(default)]
    pub io: IoSettings,
    #[serde(default)]
    pub postgres: Option<PostgresSettings>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_file("config")
    }

    pub fn from_file(name: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(name))
            .add_source(
                Environment::with_prefix("TALLY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = s.try_deserialize()?;

        Ok(settings)
    }

    /// CSV path, derived from the range when not configured.
    pub fn rows_csv_path(&self) -> String {
        self.io.rows_csv_path.clone().unwrap_or_else(|| {
            format!(
                "rows-{}-{}.csv",
                self.aggregation.range_start.format("%Y-%m-%d"),
                self.aggregation.range_end.format("%Y-%m-%d")
            )
        })
    }
}
