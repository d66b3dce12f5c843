use alloy::primitives::U256;
use chrono::{DateTime, Utc};

/// A staked service's durable reward record (PostgreSQL).
///
/// Primary Key: (chain_id, service_id)
///
/// Created on the first stake event and never deleted: after a service unstakes
/// its cumulative counters remain as the historical record. Earned and claimed
/// are strictly additive across any sequence of stake/unstake/checkpoint/claim
/// events, independent of re-stakes or contract migrations.
#[derive(Debug, Clone)]
pub struct Service {
    pub chain_id: u64,
    pub service_id: u64,

    /// Cumulative rewards checkpointed to this service. Monotonic.
    pub olas_rewards_earned: U256,
    /// Cumulative rewards paid out (unstake/claim). Monotonic, may lag earned.
    pub olas_rewards_claimed: U256,

    /// Staking contract the service is currently staked on.
    /// None means not staked anywhere right now.
    pub latest_staking_contract: Option<String>,

    /// Incremented once per stake action (not per epoch elapsed).
    pub total_epochs_participated: u64,

    pub updated_at: Option<DateTime<Utc>>,
}

impl Service {
    pub fn new(chain_id: u64, service_id: u64) -> Self {
        Self {
            chain_id,
            service_id,
            olas_rewards_earned: U256::ZERO,
            olas_rewards_claimed: U256::ZERO,
            latest_staking_contract: None,
            total_epochs_participated: 0,
            updated_at: None,
        }
    }

    /// Add a checkpointed reward. Saturating, so the counter can never wrap
    /// or decrease no matter what amounts the chain delivers.
    pub fn add_earned(&mut self, reward: U256) {
        self.olas_rewards_earned = self.olas_rewards_earned.saturating_add(reward);
        self.updated_at = Some(Utc::now());
    }

    /// Add a claimed/paid-out reward. Saturating for the same reason.
    pub fn add_claimed(&mut self, reward: U256) {
        self.olas_rewards_claimed = self.olas_rewards_claimed.saturating_add(reward);
        self.updated_at = Some(Utc::now());
    }
}
