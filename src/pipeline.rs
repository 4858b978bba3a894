//! One aggregation run: events -> rows -> (cumulative pass) -> statements.
//!
//! The cumulative pass completes over the whole row set before any statement
//! is built.

use log::info;

use crate::agg::{apply_cumulative_pass, Aggregator, EventsByOwner};
use crate::config::{AggregationSettings, StatementSettings};
use crate::db::models::AggregateRow;
use crate::db::{distinct_actors, Statement, StatementBuilder};
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub rows: Vec<AggregateRow>,
    pub statements: Vec<Statement>,
}

pub fn run(
    aggregation: &AggregationSettings,
    statements: &StatementSettings,
    events: &EventsByOwner,
) -> Result<RunOutput> {
    let builder = StatementBuilder::new(statements.clone())?;
    let aggregator = Aggregator::new(aggregation)?;

    let mut rows = aggregator.aggregate(events)?;

    if aggregation.apply_cumulative_pass {
        apply_cumulative_pass(&mut rows);
        info!("[AGG] Cumulative pass applied to {} rows", rows.len());
    }

    let statements = builder.build(&rows, distinct_actors(&rows))?;

    Ok(RunOutput { rows, statements })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agg::{BucketWidth, DensityMode};
    use crate::db::models::{AggregateKey, EventKind, RawEvent};
    use crate::db::StatementKind;
    use crate::error::Error;
    use bigdecimal::BigDecimal;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::collections::BTreeMap;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, 0, 0, 0).unwrap()
    }

    fn aggregation(end: u32, density_mode: DensityMode, cumulative: bool) -> AggregationSettings {
        AggregationSettings {
            range_start: day(1),
            range_end: day(end),
            bucket_width: BucketWidth::DAY,
            density_mode,
            apply_cumulative_pass: cumulative,
            allow_partial_last_bucket: false,
        }
    }

    fn events() -> EventsByOwner {
        BTreeMap::from([(
            "pool1".to_string(),
            vec![
                RawEvent::new(
                    EventKind::OpenLong,
                    day(1) + Duration::minutes(13 * 60 + 30),
                    100,
                    "0xA",
                    "2000000000000000000",
                ),
                RawEvent::new(
                    EventKind::OpenShort,
                    day(2) + Duration::hours(8),
                    200,
                    "0xA",
                    "1000000000000000000",
                ),
                RawEvent::new(
                    EventKind::CloseLong,
                    day(3) + Duration::hours(8),
                    300,
                    "0xA",
                    "500000000000000000",
                ),
            ],
        )])
    }

    #[test]
    fn test_sparse_run_single_day() {
        let output = run(
            &aggregation(2, DensityMode::Sparse, false),
            &StatementSettings::default(),
            &events(),
        )
        .unwrap();

        assert_eq!(output.rows.len(), 1);
        let row = &output.rows[0];
        assert_eq!(row.key, AggregateKey::new("pool1", day(1), "0xa"));
        assert_eq!(row.action_counts(), [1, 0, 0]);
        assert_eq!(row.volume_longs, BigDecimal::from(2));

        let kinds: Vec<StatementKind> = output.statements.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                StatementKind::RegisterUsers,
                StatementKind::EnsureIndex,
                StatementKind::UpsertStatistics
            ]
        );
    }

    #[test]
    fn test_dense_run_zero_fills_following_day() {
        let output = run(
            &aggregation(4, DensityMode::Dense, false),
            &StatementSettings::default(),
            &events(),
        )
        .unwrap();

        assert_eq!(output.rows.len(), 3);
        assert_eq!(output.rows[0].action_counts(), [1, 0, 0]);
        assert_eq!(output.rows[1].action_counts(), [0, 1, 0]);
        assert_eq!(output.rows[2].action_counts(), [1, 0, 0]);
    }

    #[test]
    fn test_cumulative_run_keeps_volumes_per_bucket() {
        let output = run(
            &aggregation(4, DensityMode::Dense, true),
            &StatementSettings::default(),
            &events(),
        )
        .unwrap();

        assert_eq!(output.rows[0].action_counts(), [1, 0, 0]);
        assert_eq!(output.rows[1].action_counts(), [1, 1, 0]);
        assert_eq!(output.rows[2].action_counts(), [2, 1, 0]);
        assert_eq!(output.rows[2].volume_longs, "0.5".parse::<BigDecimal>().unwrap());
        assert!(output.statements[2].sql.contains("'0xa', 2, 1, 0, 0.5, 0, 0)"));
    }

    #[test]
    fn test_empty_run_policy() {
        let no_events: EventsByOwner = BTreeMap::new();

        let output = run(
            &aggregation(2, DensityMode::Dense, false),
            &StatementSettings::default(),
            &no_events,
        )
        .unwrap();
        assert!(output.rows.is_empty());
        assert!(output.statements.is_empty());

        let strict = StatementSettings {
            allow_empty: false,
            ..StatementSettings::default()
        };
        assert!(matches!(
            run(&aggregation(2, DensityMode::Dense, false), &strict, &no_events),
            Err(Error::EmptyInput)
        ));
    }

    #[test]
    fn test_repeat_runs_are_identical() {
        let settings = aggregation(4, DensityMode::Dense, true);
        let first = run(&settings, &StatementSettings::default(), &events()).unwrap();
        let second = run(&settings, &StatementSettings::default(), &events()).unwrap();

        assert_eq!(first.rows, second.rows);
        assert_eq!(first.statements, second.statements);
    }
}
