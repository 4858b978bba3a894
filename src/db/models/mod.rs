mod event;
mod statistic;

pub use event::{classify, Category, EventKind, EventRecord, NormalizedEvent, RawEvent};
pub use statistic::{AggregateKey, AggregateRow, StatisticRecord};
