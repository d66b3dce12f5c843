use alloy::primitives::U256;
use chrono::{DateTime, Utc};

/// A staking-proxy instance deployed by the factory (PostgreSQL).
///
/// Primary Key: (chain_id, address)
///
/// Parameter fields are read from the instance contract at creation time via
/// multicall. They are None when the read reverted; valuation updates that
/// depend on them are skipped for such instances rather than guessed.
#[derive(Debug, Clone)]
pub struct StakingContract {
    pub chain_id: u64,
    pub address: String,
    pub implementation: String,

    // On-chain parameters (immutable after deployment)
    pub max_num_services: Option<u64>,
    pub rewards_per_second: Option<U256>,
    pub min_staking_deposit: Option<U256>,
    pub num_agent_instances: Option<u64>,
    pub liveness_period: Option<u64>,

    // Aggregates maintained by the cron contract_stats job
    pub num_services_staked: u64,
    pub total_rewards_distributed: U256,

    // Discovery metadata
    pub created_block: u64,
    pub tx_hash: String,
    pub updated_at: Option<DateTime<Utc>>,
}

impl StakingContract {
    pub fn new(
        chain_id: u64,
        address: String,
        implementation: String,
        created_block: u64,
        tx_hash: String,
    ) -> Self {
        Self {
            chain_id,
            // Always lowercase addresses for consistent comparisons
            address: address.to_lowercase(),
            implementation: implementation.to_lowercase(),
            max_num_services: None,
            rewards_per_second: None,
            min_staking_deposit: None,
            num_agent_instances: None,
            liveness_period: None,
            num_services_staked: 0,
            total_rewards_distributed: U256::ZERO,
            created_block,
            tx_hash,
            updated_at: None,
        }
    }

    /// Deposit locked per stake action: the service bond plus one bond per
    /// required agent instance. None when the instance parameters are unknown.
    pub fn stake_deposit(&self) -> Option<U256> {
        let deposit = self.min_staking_deposit?;
        let slots = self.num_agent_instances?.checked_add(1)?;
        deposit.checked_mul(U256::from(slots))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stake_deposit_requires_both_params() {
        let mut c = StakingContract::new(1, "0xA".into(), "0xB".into(), 100, "0xdead".into());
        assert_eq!(c.stake_deposit(), None);

        c.min_staking_deposit = Some(U256::from(50u64));
        assert_eq!(c.stake_deposit(), None);

        c.num_agent_instances = Some(3);
        // bond for the service itself plus 3 agent instances
        assert_eq!(c.stake_deposit(), Some(U256::from(200u64)));
    }

    #[test]
    fn test_stake_deposit_rejects_wrapping_agent_count() {
        let mut c = StakingContract::new(1, "0xA".into(), "0xB".into(), 100, "0xdead".into());
        c.min_staking_deposit = Some(U256::from(50u64));
        c.num_agent_instances = Some(u64::MAX);
        // a hostile instance must not value the deposit at zero via wraparound
        assert_eq!(c.stake_deposit(), None);
    }
}
