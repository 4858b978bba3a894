pub mod agg;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod utils;

pub use agg::{Aggregator, DensityMode, EventsByOwner};
pub use crate::config::Settings;
pub use db::{PostgresClient, Statement, StatementBuilder};
pub use error::{Error, Result};
