//! Bucketed per-actor aggregation.
//!
//! Each owner entity is aggregated independently:
//!
//! 1. Every event is normalized up front, so a malformed amount anywhere in
//!    the input aborts the run even if the event would fall outside the range.
//! 2. In dense mode, the full actor set of the owner is collected and a zero
//!    row is seeded for every (bucket, actor) pair.
//! 3. Events inside a bucket increment the matching category counters.
//!    Events at or before `range_start` or after `range_end` are skipped.

use std::collections::BTreeMap;

use log::{debug, info};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Deserialize;

use crate::agg::bucket::{enumerate_buckets, locate_bucket, Bucket};
use crate::config::AggregationSettings;
use crate::db::models::{AggregateKey, AggregateRow, NormalizedEvent, RawEvent};
use crate::error::Result;

/// Raw events grouped by owner entity identifier.
pub type EventsByOwner = BTreeMap<String, Vec<RawEvent>>;

/// Row materialization policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DensityMode {
    /// One row per known actor per bucket, zero-filled when idle.
    #[default]
    Dense,
    /// Rows only where at least one event landed.
    Sparse,
}

/// Row accumulator for one owner entity, keyed by (bucket index, actor).
type OwnerRows = FxHashMap<(usize, String), AggregateRow>;

pub struct Aggregator {
    buckets: Vec<Bucket>,
    density: DensityMode,
}

impl Aggregator {
    pub fn new(settings: &AggregationSettings) -> Result<Self> {
        let buckets = enumerate_buckets(
            settings.range_start,
            settings.range_end,
            settings.bucket_width,
            settings.allow_partial_last_bucket,
        )?;

        info!(
            "[AGG] {} buckets of {} covering {} .. {} ({:?})",
            buckets.len(),
            settings.bucket_width,
            settings.range_start,
            settings.range_end,
            settings.density_mode
        );

        Ok(Self::with_buckets(buckets, settings.density_mode))
    }

    pub fn with_buckets(buckets: Vec<Bucket>, density: DensityMode) -> Self {
        Self { buckets, density }
    }

    /// Aggregate every owner entity.
    ///
    /// Rows come out grouped by owner, then bucket, then actor address.
    pub fn aggregate(&self, events: &EventsByOwner) -> Result<Vec<AggregateRow>> {
        let mut rows = Vec::new();

        for (owner, owner_events) in events {
            rows.extend(self.aggregate_owner(owner, owner_events)?);
        }

        info!(
            "[AGG] Aggregated {} owners into {} rows",
            events.len(),
            rows.len()
        );

        Ok(rows)
    }

    /// Aggregate the events of a single owner entity.
    pub fn aggregate_owner(&self, owner: &str, events: &[RawEvent]) -> Result<Vec<AggregateRow>> {
        let normalized = events
            .iter()
            .map(RawEvent::normalize)
            .collect::<Result<Vec<NormalizedEvent>>>()?;

        let mut rows: OwnerRows = FxHashMap::default();

        if self.density == DensityMode::Dense {
            let actors = known_actors(&normalized);
            self.seed_zero_rows(owner, &actors, &mut rows);
        }

        let mut skipped = 0usize;
        for event in &normalized {
            let Some(idx) = locate_bucket(&self.buckets, &event.timestamp) else {
                skipped += 1;
                continue;
            };

            rows.entry((idx, event.address.clone()))
                .or_insert_with(|| {
                    AggregateRow::zero(AggregateKey::new(
                        owner,
                        self.buckets[idx].start,
                        &event.address,
                    ))
                })
                .record(event.category, &event.amount);
        }

        let mut rows: Vec<AggregateRow> = rows.into_values().collect();
        rows.sort_by(|a, b| a.key.cmp(&b.key));

        debug!(
            "[AGG] {}: {} events, {} outside range, {} rows",
            owner,
            events.len(),
            skipped,
            rows.len()
        );

        Ok(rows)
    }

    /// Dense mode: one zero row per (bucket, actor) for every actor of the owner.
    fn seed_zero_rows(&self, owner: &str, actors: &[&str], rows: &mut OwnerRows) {
        rows.reserve(self.buckets.len() * actors.len());

        for (idx, bucket) in self.buckets.iter().enumerate() {
            for actor in actors {
                rows.insert(
                    (idx, actor.to_string()),
                    AggregateRow::zero(AggregateKey::new(owner, bucket.start, actor)),
                );
            }
        }
    }
}

/// Every actor that appears anywhere in the owner's events, in or out of range.
fn known_actors(events: &[NormalizedEvent]) -> Vec<&str> {
    let unique: FxHashSet<&str> = events.iter().map(|e| e.address.as_str()).collect();
    let mut actors: Vec<&str> = unique.into_iter().collect();
    actors.sort_unstable();
    actors
}
