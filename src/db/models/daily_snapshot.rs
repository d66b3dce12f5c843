use alloy::primitives::U256;
use chrono::{DateTime, Utc};

/// Daily snapshot of the global staking aggregate (PostgreSQL).
///
/// Primary Key: (chain_id, day) where day is the UTC day-start unix timestamp.
///
/// Days with no checkpoint events are forward-filled from the most recent prior
/// active day, so sparse event streams still produce a continuous time series.
#[derive(Debug, Clone)]
pub struct DailySnapshot {
    pub chain_id: u64,
    /// UTC day boundary (unix timestamp, midnight).
    pub day: i64,
    /// Total rewards distributed to date.
    pub total_rewards: U256,
    /// Number of services contributing to the median.
    pub num_services: u64,
    /// Median of cumulative earned rewards across all services.
    pub median_rewards_earned: U256,
    pub updated_at: Option<DateTime<Utc>>,
}

impl DailySnapshot {
    pub fn new(chain_id: u64, day: i64) -> Self {
        Self {
            chain_id,
            day,
            total_rewards: U256::ZERO,
            num_services: 0,
            median_rewards_earned: U256::ZERO,
            updated_at: None,
        }
    }

    /// Seed a new day from the previous active day's values.
    pub fn forward_filled_from(chain_id: u64, day: i64, prior: &DailySnapshot) -> Self {
        Self {
            chain_id,
            day,
            total_rewards: prior.total_rewards,
            num_services: prior.num_services,
            median_rewards_earned: prior.median_rewards_earned,
            updated_at: Some(Utc::now()),
        }
    }
}
