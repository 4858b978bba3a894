//! Utility functions for Tally.
//!
//! - [`conversion`] - Base-unit amount normalization and decimal formatting
//! - [`time`] - Instant parsing and rendering

mod conversion;
mod time;

// ============================================
// Re-exports
// ============================================

// Conversion utilities
pub use conversion::{format_decimal, to_base_units, to_decimal, DECIMAL_SCALE, MAX_AMOUNT_DIGITS};

// Time utilities
pub use time::{deserialize_instant, format_instant, parse_instant};
