//! Base-unit amount conversion.
//!
//! On-chain amounts arrive as unsigned integers scaled by 10^18 and encoded as
//! decimal strings. They are converted into exact `BigDecimal` values; binary
//! floating point is never involved.

use std::str::FromStr;

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use once_cell::sync::Lazy;

use crate::error::{Error, Result};

// ============================================
// Constants
// ============================================

/// Fixed exponent applied to every base amount.
pub const DECIMAL_SCALE: i64 = 18;

/// A uint256 never has more than 78 decimal digits.
pub const MAX_AMOUNT_DIGITS: usize = 78;

// ============================================
// Base Units -> Decimal
// ============================================

/// Convert a base-unit integer literal into an exact decimal equal to
/// `value / 10^18`.
///
/// Only plain ASCII digit strings are accepted. Signs, whitespace, decimal
/// points and exponents are rejected rather than coerced.
///
/// # Example
/// ```ignore
/// let amount = to_decimal("2000000000000000000")?; // 2
/// ```
pub fn to_decimal(base_amount: &str) -> Result<BigDecimal> {
    let malformed = |reason: &'static str| Error::MalformedAmount {
        value: base_amount.to_string(),
        reason,
    };

    if base_amount.is_empty() {
        return Err(malformed("empty amount"));
    }
    if base_amount.starts_with('-') {
        return Err(malformed("negative amounts are not allowed"));
    }
    if !base_amount.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed("not a non-negative integer literal"));
    }

    let significant = base_amount.trim_start_matches('0');
    if significant.len() > MAX_AMOUNT_DIGITS {
        return Err(malformed("more than 78 significant digits"));
    }

    let digits = BigInt::from_str(base_amount).map_err(|_| malformed("unparseable integer"))?;

    Ok(BigDecimal::new(digits, DECIMAL_SCALE))
}

// ============================================
// Decimal -> Base Units
// ============================================

/// Scale a decimal amount back into base units.
///
/// Returns `None` when the value carries precision finer than 10^-18 and so
/// has no exact base-unit representation.
pub fn to_base_units(amount: &BigDecimal) -> Option<BigInt> {
    let scaled = amount * big_pow10(DECIMAL_SCALE as u8);
    let integral = scaled.with_scale(0);

    if integral != scaled {
        return None;
    }

    let (digits, _) = integral.into_bigint_and_exponent();
    Some(digits)
}

// ============================================
// Formatting
// ============================================

/// Render a decimal without exponent notation and without trailing zeros.
///
/// Used for CSV cells and SQL literals so output is stable across runs.
pub fn format_decimal(value: &BigDecimal) -> String {
    value.normalized().to_plain_string()
}

// ============================================
// Internal Helpers
// ============================================

static POW10_CACHE: Lazy<[BigDecimal; 25]> =
    Lazy::new(|| std::array::from_fn(|i| BigDecimal::from(BigInt::from(10u32).pow(i as u32))));

/// Compute 10^exp as BigDecimal.
pub(crate) fn big_pow10(exp: u8) -> BigDecimal {
    if (exp as usize) < POW10_CACHE.len() {
        POW10_CACHE[exp as usize].clone()
    } else {
        BigDecimal::from(BigInt::from(10u32).pow(exp as u32))
    }
}
