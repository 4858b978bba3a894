//! Aggregation engine: buckets, per-actor counters and the cumulative pass.

pub mod aggregator;
pub mod bucket;
pub mod cumulative;

pub use aggregator::{Aggregator, DensityMode, EventsByOwner};
pub use bucket::{enumerate_buckets, locate_bucket, Bucket, BucketWidth};
pub use cumulative::apply_cumulative_pass;
