//! Type conversion and formatting utilities.
//!
//! Functions for converting between numeric representations (U256, f64,
//! decimal text) with proper decimal handling and precision preservation.

use alloy::primitives::{hex, U256};
use bigdecimal::BigDecimal;
use clickhouse::types::UInt256;
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use once_cell::sync::Lazy;
use std::str::FromStr;

// ============================================
// Hex Encoding
// ============================================

/// Encode bytes as a lowercase hex string with 0x prefix.
pub fn hex_encode(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

// ============================================
// U256 Conversions
// ============================================

/// Convert alloy U256 to clickhouse UInt256.
pub fn into_u256(v: alloy::primitives::U256) -> UInt256 {
    UInt256::from_le_bytes(v.to_le_bytes())
}

/// Convert U256 to f64 with decimal adjustment using BigDecimal for precision.
///
/// This avoids the precision loss of a direct cast for values above 2^53.
/// Returns 0.0 if the conversion fails.
///
/// # Example
/// ```ignore
/// let value = U256::from(1_000_000_000_000_000_000u128); // 1e18
/// let adjusted = u256_to_f64(value, 18); // Returns 1.0
/// ```
pub fn u256_to_f64(value: U256, decimals: u8) -> f64 {
    u256_to_f64_safe(value, decimals).unwrap_or(0.0)
}

/// Convert U256 to f64 with decimal adjustment, returning Option for error handling.
///
/// Returns None if the value cannot be converted to a finite f64.
pub fn u256_to_f64_safe(value: U256, decimals: u8) -> Option<f64> {
    // Convert U256 to BigDecimal via bytes (faster than string parsing)
    let bytes: [u8; 32] = value.to_le_bytes();
    let big_int = BigInt::from_bytes_le(num_bigint::Sign::Plus, &bytes);
    let big_value = BigDecimal::from(big_int);

    let adjusted = big_value / big_pow10(decimals);

    let result = adjusted.to_f64()?;

    if result.is_finite() {
        Some(result)
    } else {
        None
    }
}

/// Parse a decimal text column back into U256.
///
/// Token amounts are stored in Postgres as exact decimal TEXT. Malformed or
/// out-of-range values fall back to zero rather than aborting a load.
pub fn u256_from_text(value: &str) -> U256 {
    U256::from_str_radix(value, 10).unwrap_or(U256::ZERO)
}

// ============================================
// Time Bucketing
// ============================================

const SECONDS_PER_DAY: i64 = 86_400;

/// Truncate a unix timestamp to its UTC day boundary (midnight).
pub fn day_start(timestamp: i64) -> i64 {
    timestamp - timestamp.rem_euclid(SECONDS_PER_DAY)
}

/// The UTC day boundary immediately after the given day boundary.
pub fn next_day(day: i64) -> i64 {
    day + SECONDS_PER_DAY
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u256_to_f64_adjusts_decimals() {
        let one_token = U256::from(10u64).pow(U256::from(18u64));
        assert_eq!(u256_to_f64(one_token, 18), 1.0);
        assert_eq!(u256_to_f64(U256::ZERO, 18), 0.0);
    }

    #[test]
    fn test_u256_text_round_trip() {
        let v = U256::from_str("340282366920938463463374607431768211455").unwrap();
        assert_eq!(u256_from_text(&v.to_string()), v);
        assert_eq!(u256_from_text("not a number"), U256::ZERO);
    }

    #[test]
    fn test_day_start_truncates_to_midnight() {
        // 2024-01-15 13:45:00 UTC -> 2024-01-15 00:00:00 UTC
        assert_eq!(day_start(1705326300), 1705276800);
        assert_eq!(day_start(1705276800), 1705276800);
        assert_eq!(next_day(1705276800), 1705363200);
    }
}
