use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use num_traits::Zero;
use serde::Serialize;
use uuid::Uuid;

use crate::db::models::Category;
use crate::utils::{format_decimal, format_instant};

/// Identity of one statistics row.
///
/// Ordering is owner entity, then bucket start, then actor address, which is
/// also the order rows are emitted in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AggregateKey {
    pub owner: String,
    pub bucket_start: DateTime<Utc>,
    pub address: String,
}

impl AggregateKey {
    pub fn new(owner: &str, bucket_start: DateTime<Utc>, address: &str) -> Self {
        Self {
            owner: owner.to_string(),
            bucket_start,
            address: address.to_string(),
        }
    }

    /// Deterministic synthetic identifier for the row.
    pub fn row_id(&self) -> Uuid {
        let name = format!(
            "{}|{}|{}",
            self.owner,
            format_instant(&self.bucket_start),
            self.address
        );
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
    }
}

/// Per-(owner, bucket, actor) activity counters.
///
/// Primary Key: (timestamp, pool_type, user_address)
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow {
    pub key: AggregateKey,

    // Action counts
    pub action_count_longs: u64,
    pub action_count_shorts: u64,
    pub action_count_lps: u64,

    // Volumes (exact, scaled by 1e-18)
    pub volume_longs: BigDecimal,
    pub volume_shorts: BigDecimal,
    pub volume_lps: BigDecimal,
}

impl AggregateRow {
    pub fn zero(key: AggregateKey) -> Self {
        Self {
            key,
            action_count_longs: 0,
            action_count_shorts: 0,
            action_count_lps: 0,
            volume_longs: BigDecimal::zero(),
            volume_shorts: BigDecimal::zero(),
            volume_lps: BigDecimal::zero(),
        }
    }

    /// Count one action of `category` and add its volume.
    pub fn record(&mut self, category: Category, amount: &BigDecimal) {
        match category {
            Category::Longs => {
                self.action_count_longs += 1;
                self.volume_longs += amount;
            },
            Category::Shorts => {
                self.action_count_shorts += 1;
                self.volume_shorts += amount;
            },
            Category::Lps => {
                self.action_count_lps += 1;
                self.volume_lps += amount;
            },
        }
    }

    pub fn action_counts(&self) -> [u64; 3] {
        [
            self.action_count_longs,
            self.action_count_shorts,
            self.action_count_lps,
        ]
    }

    /// True when every counter and every volume is zero.
    pub fn is_zero(&self) -> bool {
        self.action_counts().iter().all(|count| *count == 0)
            && self.volume_longs.is_zero()
            && self.volume_shorts.is_zero()
            && self.volume_lps.is_zero()
    }
}

/// Flat row written to the CSV sink.
///
/// Field order is the column order and must stay stable for downstream loaders.
#[derive(Debug, Clone, Serialize)]
pub struct StatisticRecord {
    pub id: Uuid,
    pub timestamp: String,
    pub pool_type: String,
    pub user_address: String,
    pub action_count_longs: u64,
    pub action_count_shorts: u64,
    pub action_count_lps: u64,
    pub volume_longs: String,
    pub volume_shorts: String,
    pub volume_lps: String,
}

impl StatisticRecord {
    pub const HEADER: [&'static str; 10] = [
        "id",
        "timestamp",
        "pool_type",
        "user_address",
        "action_count_longs",
        "action_count_shorts",
        "action_count_lps",
        "volume_longs",
        "volume_shorts",
        "volume_lps",
    ];
}

impl From<&AggregateRow> for StatisticRecord {
    fn from(row: &AggregateRow) -> Self {
        Self {
            id: row.key.row_id(),
            timestamp: format_instant(&row.key.bucket_start),
            pool_type: row.key.owner.clone(),
            user_address: row.key.address.clone(),
            action_count_longs: row.action_count_longs,
            action_count_shorts: row.action_count_shorts,
            action_count_lps: row.action_count_lps,
            volume_longs: format_decimal(&row.volume_longs),
            volume_shorts: format_decimal(&row.volume_shorts),
            volume_lps: format_decimal(&row.volume_lps),
        }
    }
}
