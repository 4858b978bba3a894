//! File sinks and sources around the aggregation core.
//!
//! - events JSON in: `{ "<owner>": [ { "_type", "block_timestamp", ... } ] }`
//! - rows CSV out, one [`StatisticRecord`] per row
//! - one `.sql` file per statement, numbered in emission order

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use log::info;

use crate::agg::EventsByOwner;
use crate::db::models::{AggregateRow, EventRecord, RawEvent, StatisticRecord};
use crate::db::Statement;
use crate::error::Result;

/// Convert decoded records into events, failing on the first invalid record.
pub fn records_to_events(records: BTreeMap<String, Vec<EventRecord>>) -> Result<EventsByOwner> {
    records
        .into_iter()
        .map(|(owner, owner_records)| -> Result<(String, Vec<RawEvent>)> {
            let events = owner_records
                .into_iter()
                .map(RawEvent::try_from)
                .collect::<Result<Vec<_>>>()?;
            Ok((owner, events))
        })
        .collect()
}

/// Read the events file written by the event dump tool.
pub fn load_events(path: impl AsRef<Path>) -> anyhow::Result<EventsByOwner> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read events file {}", path.display()))?;

    let records: BTreeMap<String, Vec<EventRecord>> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to decode events file {}", path.display()))?;

    let events = records_to_events(records)
        .with_context(|| format!("Invalid event in {}", path.display()))?;

    info!(
        "Loaded {} events for {} owners from {}",
        events.values().map(Vec::len).sum::<usize>(),
        events.len(),
        path.display()
    );

    Ok(events)
}

/// Write rows as CSV with the stable statistics header.
///
/// The header is written even when there are no rows.
pub fn write_rows_csv(path: impl AsRef<Path>, rows: &[AggregateRow]) -> anyhow::Result<()> {
    let path = path.as_ref();
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    writer.write_record(StatisticRecord::HEADER)?;
    for row in rows {
        writer.serialize(StatisticRecord::from(row))?;
    }
    writer.flush()?;

    info!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

/// Write each statement to `{dir}/{prefix}-{index}.sql`.
pub fn write_statements(
    dir: impl AsRef<Path>,
    prefix: &str,
    statements: &[Statement],
) -> anyhow::Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let mut paths = Vec::with_capacity(statements.len());
    for (idx, statement) in statements.iter().enumerate() {
        let path = dir.join(format!("{}-{}.sql", prefix, idx));
        fs::write(&path, &statement.sql)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        paths.push(path);
    }

    info!("Wrote {} statement files to {}", paths.len(), dir.display());
    Ok(paths)
}
