//! Batched, conflict-safe write statements for aggregated rows.
//!
//! Statements are plain SQL text. Nothing here talks to a database; see
//! [`crate::db::PostgresClient`] for applying them.

use std::collections::BTreeSet;

use log::{info, warn};
use rustc_hash::FxHashMap;

use crate::config::StatementSettings;
use crate::db::models::{AggregateKey, AggregateRow};
use crate::error::{Error, Result};
use crate::utils::{format_decimal, format_instant};

/// Conflict key of the statistics table.
const CONFLICT_COLUMNS: &str = "timestamp, pool_type, user_address";

/// Counter columns overwritten on conflict.
const COUNTER_COLUMNS: [&str; 6] = [
    "action_count_longs",
    "action_count_shorts",
    "action_count_lps",
    "volume_longs",
    "volume_shorts",
    "volume_lps",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    RegisterUsers,
    EnsureIndex,
    UpsertStatistics,
    TruncateRollup,
}

impl StatementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementKind::RegisterUsers => "register_users",
            StatementKind::EnsureIndex => "ensure_index",
            StatementKind::UpsertStatistics => "upsert_statistics",
            StatementKind::TruncateRollup => "truncate_rollup",
        }
    }
}

/// One batch of SQL, ready to be written out or executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub kind: StatementKind,
    pub sql: String,
    /// Rows (or addresses) carried by the statement. Zero for maintenance statements.
    pub row_count: usize,
}

pub struct StatementBuilder {
    settings: StatementSettings,
}

impl StatementBuilder {
    pub fn new(settings: StatementSettings) -> Result<Self> {
        if settings.batch_size == 0 {
            return Err(Error::InvalidBatchSize);
        }
        Ok(Self { settings })
    }

    /// Build every statement for a run, in emission order:
    /// actor registration, index ensure, upsert batches, rollup truncate.
    ///
    /// Empty `rows` yield no statements at all, or `EmptyInput` when empty
    /// results are disallowed.
    pub fn build<'a, I>(&self, rows: &[AggregateRow], actors: I) -> Result<Vec<Statement>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        if rows.is_empty() {
            if !self.settings.allow_empty {
                return Err(Error::EmptyInput);
            }
            info!("[SQL] No rows aggregated, no statements generated");
            return Ok(vec![]);
        }

        let mut statements = Vec::new();

        statements.extend(self.register_users(actors));

        if self.settings.emit_index_statement {
            statements.push(self.ensure_index());
        }

        let upserts = self.upsert_statistics(rows);
        let batches = upserts.len();
        statements.extend(upserts);

        if self.settings.emit_truncate_statement {
            statements.push(self.truncate_rollup());
        }

        info!(
            "[SQL] Generated {} statements ({} upsert batches of up to {} rows)",
            statements.len(),
            batches,
            self.settings.batch_size
        );

        Ok(statements)
    }

    /// Insert-or-skip for actor addresses, deduplicated case-sensitively.
    pub fn register_users<'a, I>(&self, actors: I) -> Option<Statement>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let unique: BTreeSet<&str> = actors.into_iter().collect();
        if unique.is_empty() {
            return None;
        }

        let values: Vec<String> = unique
            .iter()
            .map(|address| format!("({})", quote_literal(address)))
            .collect();

        let table = &self.settings.users_table;
        let sql = format!(
            r#"
INSERT INTO {table} (address)
SELECT x.address FROM (VALUES {values}) AS x(address)
WHERE NOT EXISTS (
    SELECT 1 FROM {table} u WHERE u.address = x.address
);
"#,
            table = table,
            values = values.join(",\n"),
        );

        Some(Statement {
            kind: StatementKind::RegisterUsers,
            sql,
            row_count: unique.len(),
        })
    }

    /// Batched upserts, `batch_size` rows per statement.
    ///
    /// On conflict every counter is overwritten with the incoming value, so
    /// replaying a batch leaves the table unchanged. Repeated keys in `rows`
    /// collapse to their last occurrence.
    pub fn upsert_statistics(&self, rows: &[AggregateRow]) -> Vec<Statement> {
        let rows = last_write_wins(rows);

        let columns = format!("{}, {}", CONFLICT_COLUMNS, COUNTER_COLUMNS.join(", "));
        let assignments: Vec<String> = COUNTER_COLUMNS
            .iter()
            .map(|column| format!("    {column} = EXCLUDED.{column}"))
            .collect();
        let assignments = assignments.join(",\n");

        rows.chunks(self.settings.batch_size)
            .map(|chunk| {
                let values: Vec<String> = chunk.iter().map(|row| render_row(row)).collect();

                let sql = format!(
                    r#"
INSERT INTO {table}
    ({columns})
VALUES
{values}
ON CONFLICT ({conflict}) DO UPDATE SET
{assignments};
"#,
                    table = self.settings.statistics_table,
                    columns = columns,
                    values = values.join(",\n"),
                    conflict = CONFLICT_COLUMNS,
                    assignments = assignments,
                );

                Statement {
                    kind: StatementKind::UpsertStatistics,
                    sql,
                    row_count: chunk.len(),
                }
            })
            .collect()
    }

    /// Unique index backing the upsert conflict target.
    pub fn ensure_index(&self) -> Statement {
        let table = &self.settings.statistics_table;
        let sql = format!(
            "\nCREATE UNIQUE INDEX IF NOT EXISTS idx_{}_on_timestamp_pool_user ON {} ({});\n",
            unqualified(table),
            table,
            CONFLICT_COLUMNS
        );

        Statement {
            kind: StatementKind::EnsureIndex,
            sql,
            row_count: 0,
        }
    }

    /// Empties the downstream rollup table so it is rebuilt from fresh statistics.
    pub fn truncate_rollup(&self) -> Statement {
        Statement {
            kind: StatementKind::TruncateRollup,
            sql: format!("\nTRUNCATE TABLE {};\n", self.settings.rollup_table),
            row_count: 0,
        }
    }
}

/// Distinct actor addresses across `rows`, sorted.
pub fn distinct_actors(rows: &[AggregateRow]) -> Vec<&str> {
    let unique: BTreeSet<&str> = rows.iter().map(|row| row.key.address.as_str()).collect();
    unique.into_iter().collect()
}

/// Keep only the last row for each key, preserving the position of that row.
fn last_write_wins(rows: &[AggregateRow]) -> Vec<&AggregateRow> {
    let mut last: FxHashMap<&AggregateKey, usize> = FxHashMap::default();
    for (idx, row) in rows.iter().enumerate() {
        last.insert(&row.key, idx);
    }

    if last.len() != rows.len() {
        warn!(
            "[SQL] {} duplicate row keys collapsed (last write wins)",
            rows.len() - last.len()
        );
    }

    rows.iter()
        .enumerate()
        .filter(|(idx, row)| last.get(&row.key) == Some(idx))
        .map(|(_, row)| row)
        .collect()
}

fn render_row(row: &AggregateRow) -> String {
    format!(
        "({}, {}, {}, {}, {}, {}, {}, {}, {})",
        quote_literal(&format_instant(&row.key.bucket_start)),
        quote_literal(&row.key.owner),
        quote_literal(&row.key.address),
        row.action_count_longs,
        row.action_count_shorts,
        row.action_count_lps,
        format_decimal(&row.volume_longs),
        format_decimal(&row.volume_shorts),
        format_decimal(&row.volume_lps),
    )
}

/// Sanitize a string for PostgreSQL by removing null bytes (0x00)
/// which are invalid in UTF-8 text columns
fn sanitize_string(s: &str) -> String {
    s.replace('\0', "")
}

/// Render a single-quoted SQL string literal.
fn quote_literal(s: &str) -> String {
    format!("'{}'", sanitize_string(s).replace('\'', "''"))
}

fn unqualified(table: &str) -> &str {
    table.rsplit('.').next().unwrap_or(table)
}
