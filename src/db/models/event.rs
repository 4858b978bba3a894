use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};
use crate::utils::{parse_instant, to_decimal};

/// Protocol event kinds emitted by a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    OpenLong,
    CloseLong,
    OpenShort,
    CloseShort,
    Initialize,
    AddLiquidity,
    RemoveLiquidity,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::OpenLong => "OpenLong",
            EventKind::CloseLong => "CloseLong",
            EventKind::OpenShort => "OpenShort",
            EventKind::CloseShort => "CloseShort",
            EventKind::Initialize => "Initialize",
            EventKind::AddLiquidity => "AddLiquidity",
            EventKind::RemoveLiquidity => "RemoveLiquidity",
        }
    }

    /// Activity category this kind contributes to.
    pub fn category(&self) -> Category {
        match self {
            EventKind::OpenLong | EventKind::CloseLong => Category::Longs,
            EventKind::OpenShort | EventKind::CloseShort => Category::Shorts,
            EventKind::Initialize | EventKind::AddLiquidity | EventKind::RemoveLiquidity => {
                Category::Lps
            },
        }
    }

    pub fn all() -> [EventKind; 7] {
        [
            EventKind::OpenLong,
            EventKind::CloseLong,
            EventKind::OpenShort,
            EventKind::CloseShort,
            EventKind::Initialize,
            EventKind::AddLiquidity,
            EventKind::RemoveLiquidity,
        ]
    }
}

impl FromStr for EventKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        EventKind::all()
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::UnknownEventKind(s.to_string()))
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Activity category. Each one owns an action counter and a volume counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Longs,
    Shorts,
    Lps,
}

/// Classify a raw event tag.
pub fn classify(tag: &str) -> Result<Category> {
    Ok(tag.parse::<EventKind>()?.category())
}

/// Event record as written by the event dump tool.
///
/// Format of each element of the per-pool arrays in the events file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(rename = "_type")]
    pub kind: String,
    pub block_timestamp: String,
    /// Written as a JSON number or a numeric string depending on the dump.
    #[serde(deserialize_with = "deserialize_block_number")]
    pub block_number: u64,
    pub address: String,
    pub base_amount: String,
}

fn deserialize_block_number<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BlockNumber {
        Number(u64),
        Text(String),
    }

    match BlockNumber::deserialize(deserializer)? {
        BlockNumber::Number(number) => Ok(number),
        BlockNumber::Text(text) => text.trim().parse().map_err(|_| {
            serde::de::Error::custom(format!("invalid block_number {:?}", text))
        }),
    }
}

/// Validated protocol event. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    pub block_number: u64,
    pub address: String,
    pub base_amount: String,
}

impl RawEvent {
    pub fn new(
        kind: EventKind,
        timestamp: DateTime<Utc>,
        block_number: u64,
        address: &str,
        base_amount: &str,
    ) -> Self {
        Self {
            kind,
            timestamp,
            block_number,
            address: address.to_lowercase(),
            base_amount: base_amount.to_string(),
        }
    }

    /// Scale the base amount and resolve the category.
    pub fn normalize(&self) -> Result<NormalizedEvent> {
        Ok(NormalizedEvent {
            category: self.kind.category(),
            timestamp: self.timestamp,
            address: self.address.clone(),
            amount: to_decimal(&self.base_amount)?,
        })
    }
}

impl TryFrom<EventRecord> for RawEvent {
    type Error = Error;

    fn try_from(record: EventRecord) -> Result<Self> {
        let kind = record.kind.parse::<EventKind>()?;
        let timestamp = parse_instant(&record.block_timestamp)?;

        Ok(RawEvent::new(
            kind,
            timestamp,
            record.block_number,
            &record.address,
            &record.base_amount,
        ))
    }
}

/// Event with its amount scaled to an exact decimal.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEvent {
    pub category: Category,
    pub timestamp: DateTime<Utc>,
    pub address: String,
    pub amount: BigDecimal,
}
