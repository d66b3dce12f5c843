use alloy::primitives::U256;
use clickhouse::{types::UInt256, Row};
use serde::Serialize;
use time::OffsetDateTime;

use crate::utils::{into_u256, u256_to_f64};

/// Append-only reward-update audit entry (ClickHouse).
///
/// One "Claimable" row per processed checkpoint, recording the total amount
/// attributed that epoch on that contract.
#[derive(Debug, Clone, Serialize, Row)]
pub struct RewardUpdate {
    pub chain_id: u64,
    pub block_number: u64,
    pub tx_hash: String,
    #[serde(with = "clickhouse::serde::time::datetime")]
    pub timestamp: OffsetDateTime,

    pub contract: String,
    pub epoch: u64,
    pub update_type: String, // 'Claimable'

    pub amount: UInt256,
    pub amount_adjusted: f64,
    pub num_services_rewarded: u64,
}

impl RewardUpdate {
    #[allow(clippy::too_many_arguments)]
    pub fn claimable(
        chain_id: u64,
        block_number: u64,
        tx_hash: String,
        block_timestamp: u64,
        contract: String,
        epoch: u64,
        amount: U256,
        num_services_rewarded: u64,
        decimals: u8,
    ) -> Self {
        let timestamp = OffsetDateTime::from_unix_timestamp(block_timestamp as i64)
            .unwrap_or(OffsetDateTime::UNIX_EPOCH);

        Self {
            chain_id,
            block_number,
            tx_hash,
            timestamp,
            contract,
            epoch,
            update_type: String::from("Claimable"),
            amount: into_u256(amount),
            amount_adjusted: u256_to_f64(amount, decimals),
            num_services_rewarded,
        }
    }
}
