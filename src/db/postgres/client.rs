use std::time::{Duration, Instant};

use anyhow::Context;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use log::{error, info, warn};
use tokio_postgres::NoTls;

use crate::config::PostgresSettings;
use crate::db::statements::Statement;

/// PostgreSQL client with connection pooling.
///
/// Applies generated statements to the statistics database. Each statement
/// runs on its own; no transaction spans a run.
#[derive(Clone)]
pub struct PostgresClient {
    pub pool: Pool,
}

impl PostgresClient {
    /// Build the pool and check out one connection, retrying with exponential
    /// backoff up to `connect_attempts` times.
    pub async fn new(settings: PostgresSettings) -> anyhow::Result<Self> {
        info!(
            "[PG] Connecting to {}:{}/{} (up to {} attempts)",
            settings.host, settings.port, settings.database, settings.connect_attempts
        );

        let attempts = settings.connect_attempts.max(1);
        let mut attempt = 0;

        loop {
            let pool = build_pool(&settings)?;
            attempt += 1;

            let err = match pool.get().await {
                Ok(_conn) => {
                    info!("[PG] Connected on attempt {}", attempt);
                    return Ok(Self { pool });
                },
                Err(e) => e,
            };

            if attempt >= attempts {
                return Err(anyhow::anyhow!(
                    "Failed to connect to PostgreSQL at {}:{} after {} attempts: {}",
                    settings.host,
                    settings.port,
                    attempt,
                    err
                ));
            }

            let delay = retry_delay(settings.retry_delay_ms, attempt);
            warn!(
                "[PG] Connection attempt {}/{} failed ({}), retrying in {:?}",
                attempt, attempts, err, delay
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Execute statements in emission order, stopping at the first failure.
    pub async fn execute_statements(&self, statements: &[Statement]) -> anyhow::Result<()> {
        let client = self.pool.get().await?;
        let start = Instant::now();

        for (idx, statement) in statements.iter().enumerate() {
            client.batch_execute(&statement.sql).await.map_err(|e| {
                error!(
                    "Failed to apply statement {} ({}, {} rows): {:?}",
                    idx,
                    statement.kind.as_str(),
                    statement.row_count,
                    e
                );
                e
            })?;

            info!(
                "Applied statement {}/{} ({}, {} rows)",
                idx + 1,
                statements.len(),
                statement.kind.as_str(),
                statement.row_count
            );
        }

        info!(
            "Applied {} statements in {:?}",
            statements.len(),
            start.elapsed()
        );
        Ok(())
    }
}

fn build_pool(settings: &PostgresSettings) -> anyhow::Result<Pool> {
    let mut pg_config = tokio_postgres::Config::new();
    pg_config
        .host(&settings.host)
        .port(settings.port)
        .user(&settings.user)
        .password(&settings.password)
        .dbname(&settings.database);

    let mgr_config = ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    };

    let mgr = Manager::from_config(pg_config, NoTls, mgr_config);
    Pool::builder(mgr)
        .max_size(settings.pool_size)
        .build()
        .context("Failed to create PostgreSQL connection pool")
}

/// Delay before the attempt following `attempt` failures: `base_ms * 2^(attempt - 1)`.
fn retry_delay(base_ms: u64, attempt: u32) -> Duration {
    let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(factor))
}
