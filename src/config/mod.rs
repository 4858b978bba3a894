#[allow(clippy::module_inception)]
mod config;

pub use self::config::{
    AggregationSettings, IoSettings, PostgresSettings, Settings, StatementSettings,
};
