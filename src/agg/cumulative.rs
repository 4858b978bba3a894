//! Running action totals.
//!
//! Replaces each row's action counts with the running total for its
//! (owner, actor) pair through and including the row's bucket. Volumes stay
//! per-bucket. Rows are grouped and sorted internally, so callers may pass
//! them in any order; the order of the slice itself is left untouched.

use log::debug;

use crate::db::models::AggregateRow;

pub fn apply_cumulative_pass(rows: &mut [AggregateRow]) {
    let mut order: Vec<usize> = (0..rows.len()).collect();
    order.sort_by(|&a, &b| {
        let (ka, kb) = (&rows[a].key, &rows[b].key);
        (&ka.owner, &ka.address, ka.bucket_start).cmp(&(&kb.owner, &kb.address, kb.bucket_start))
    });

    let mut groups = 0usize;
    let mut totals = [0u64; 3];
    let mut current: Option<(String, String)> = None;

    for idx in order {
        let row = &mut rows[idx];

        let same_group = matches!(
            &current,
            Some((owner, address)) if *owner == row.key.owner && *address == row.key.address
        );
        if !same_group {
            totals = [0; 3];
            current = Some((row.key.owner.clone(), row.key.address.clone()));
            groups += 1;
        }

        totals[0] += row.action_count_longs;
        totals[1] += row.action_count_shorts;
        totals[2] += row.action_count_lps;

        row.action_count_longs = totals[0];
        row.action_count_shorts = totals[1];
        row.action_count_lps = totals[2];
    }

    debug!(
        "[AGG] Cumulative pass over {} rows in {} (owner, actor) groups",
        rows.len(),
        groups
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{AggregateKey, Category};
    use bigdecimal::BigDecimal;
    use chrono::{DateTime, TimeZone, Utc};

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, 0, 0, 0).unwrap()
    }

    fn row(owner: &str, d: u32, address: &str, longs: u64, lps: u64) -> AggregateRow {
        let mut row = AggregateRow::zero(AggregateKey::new(owner, day(d), address));
        for _ in 0..longs {
            row.record(Category::Longs, &BigDecimal::from(1));
        }
        for _ in 0..lps {
            row.record(Category::Lps, &BigDecimal::from(10));
        }
        row
    }

    fn find<'a>(rows: &'a [AggregateRow], owner: &str, d: u32, address: &str) -> &'a AggregateRow {
        let key = AggregateKey::new(owner, day(d), address);
        rows.iter().find(|r| r.key == key).unwrap()
    }

    #[test]
    fn test_running_totals_per_actor() {
        let mut rows = vec![
            row("pool1", 1, "0xa", 2, 0),
            row("pool1", 2, "0xa", 0, 0),
            row("pool1", 3, "0xa", 3, 1),
            row("pool1", 1, "0xb", 1, 0),
        ];

        apply_cumulative_pass(&mut rows);

        assert_eq!(find(&rows, "pool1", 1, "0xa").action_counts(), [2, 0, 0]);
        assert_eq!(find(&rows, "pool1", 2, "0xa").action_counts(), [2, 0, 0]);
        assert_eq!(find(&rows, "pool1", 3, "0xa").action_counts(), [5, 0, 1]);
        assert_eq!(find(&rows, "pool1", 1, "0xb").action_counts(), [1, 0, 0]);
    }

    #[test]
    fn test_volumes_stay_per_bucket() {
        let mut rows = vec![row("pool1", 1, "0xa", 0, 1), row("pool1", 2, "0xa", 0, 2)];

        apply_cumulative_pass(&mut rows);

        assert_eq!(rows[0].volume_lps, BigDecimal::from(10));
        assert_eq!(rows[1].volume_lps, BigDecimal::from(20));
        assert_eq!(rows[1].action_count_lps, 3);
    }

    #[test]
    fn test_unordered_input_is_sorted_internally() {
        let mut rows = vec![
            row("pool1", 3, "0xa", 1, 0),
            row("pool2", 1, "0xa", 4, 0),
            row("pool1", 1, "0xa", 1, 0),
            row("pool1", 2, "0xa", 1, 0),
        ];

        apply_cumulative_pass(&mut rows);

        // Slice order is preserved
        assert_eq!(rows[0].key.bucket_start, day(3));
        assert_eq!(rows[0].action_count_longs, 3);
        assert_eq!(rows[2].action_count_longs, 1);
        assert_eq!(rows[3].action_count_longs, 2);
        // Owners do not share totals
        assert_eq!(rows[1].action_count_longs, 4);
    }

    #[test]
    fn test_monotonic_and_final_total_matches_sum() {
        let raw = [3u64, 0, 1, 0, 5, 2];
        let mut rows: Vec<AggregateRow> = raw
            .iter()
            .enumerate()
            .map(|(i, &n)| row("pool1", i as u32 + 1, "0xa", n, 0))
            .collect();

        apply_cumulative_pass(&mut rows);

        let series: Vec<u64> = rows.iter().map(|r| r.action_count_longs).collect();
        assert!(series.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*series.last().unwrap(), raw.iter().sum::<u64>());
    }

    #[test]
    fn test_empty_input() {
        let mut rows: Vec<AggregateRow> = Vec::new();
        apply_cumulative_pass(&mut rows);
        assert!(rows.is_empty());
    }
}
