use alloy::primitives::U256;
use clickhouse::{types::UInt256, Row};
use serde::Serialize;
use time::OffsetDateTime;

use crate::utils::{into_u256, u256_to_f64};

/// Decoded staking event stored append-only in ClickHouse.
///
/// One row per on-chain log, in stream order. This is the raw audit trail
/// behind the derived aggregates; duplicates from replay after a crash are
/// tolerated by the ReplacingMergeTree key.
#[derive(Debug, Clone, Serialize, Row)]
pub struct StakingEvent {
    // Identifiers
    pub chain_id: u64,
    pub block_number: u64,
    pub tx_hash: String,
    pub log_index: u32,
    #[serde(with = "clickhouse::serde::time::datetime")]
    pub timestamp: OffsetDateTime,

    // Topology
    pub contract: String,
    pub event_type: String, // 'stake', 'unstake', 'force_unstake', 'evict', 'checkpoint', 'claim', 'deposit', 'withdraw'
    pub service_id: u64,    // 0 for contract-level events
    pub epoch: u64,

    // Amounts (raw and 18-decimals adjusted)
    pub amount: UInt256,
    pub amount_adjusted: f64,
}

impl StakingEvent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        chain_id: u64,
        block_number: u64,
        tx_hash: String,
        log_index: u32,
        block_timestamp: u64,
        contract: String,
        event_type: &str,
        service_id: u64,
        epoch: u64,
        amount: U256,
        decimals: u8,
    ) -> Self {
        let timestamp = OffsetDateTime::from_unix_timestamp(block_timestamp as i64)
            .unwrap_or(OffsetDateTime::UNIX_EPOCH);

        Self {
            chain_id,
            block_number,
            tx_hash,
            log_index,
            timestamp,
            contract,
            event_type: event_type.to_string(),
            service_id,
            epoch,
            amount: into_u256(amount),
            amount_adjusted: u256_to_f64(amount, decimals),
        }
    }
}
