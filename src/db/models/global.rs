use alloy::primitives::U256;
use chrono::{DateTime, Utc};

/// Network-wide staking aggregate (PostgreSQL, one row per chain).
///
/// All totals are cumulative and monotonic; the currently-staked amount is the
/// difference between staked and unstaked. `last_active_day` anchors the daily
/// snapshot forward-fill so event-less days report the last known values.
#[derive(Debug, Clone)]
pub struct StakingGlobal {
    pub chain_id: u64,
    /// Cumulative deposits staked across all contracts.
    pub total_staked: U256,
    /// Cumulative deposits unstaked across all contracts.
    pub total_unstaked: U256,
    /// Total rewards ever checkpointed.
    pub total_rewards_distributed: U256,
    /// Number of services ever registered.
    pub num_services: u64,
    /// UTC day-start timestamp of the most recent day with a snapshot write.
    pub last_active_day: Option<i64>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl StakingGlobal {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            total_staked: U256::ZERO,
            total_unstaked: U256::ZERO,
            total_rewards_distributed: U256::ZERO,
            num_services: 0,
            last_active_day: None,
            updated_at: None,
        }
    }

    pub fn add_staked(&mut self, amount: U256) {
        self.total_staked = self.total_staked.saturating_add(amount);
        self.updated_at = Some(Utc::now());
    }

    pub fn add_unstaked(&mut self, amount: U256) {
        self.total_unstaked = self.total_unstaked.saturating_add(amount);
        self.updated_at = Some(Utc::now());
    }

    pub fn add_rewards(&mut self, amount: U256) {
        self.total_rewards_distributed = self.total_rewards_distributed.saturating_add(amount);
        self.updated_at = Some(Utc::now());
    }

    /// Currently staked = staked - unstaked, floored at zero.
    pub fn current_staked(&self) -> U256 {
        self.total_staked.saturating_sub(self.total_unstaked)
    }
}
