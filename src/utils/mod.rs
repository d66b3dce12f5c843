//! Utility functions shared across the indexer.

mod conversion;

// ============================================
// Common Constants
// ============================================

/// The Ethereum zero address (0x0000000000000000000000000000000000000000)
pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

// ============================================
// Re-exports
// ============================================

pub use conversion::{
    day_start, hex_encode, into_u256, next_day, u256_from_text, u256_to_f64, u256_to_f64_safe,
};
