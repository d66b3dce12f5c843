use alloy::primitives::U256;
use chrono::{DateTime, Utc};

/// Per-service per-epoch reward record (PostgreSQL).
///
/// Primary Key: (chain_id, service_id, contract, epoch)
///
/// Exactly one row exists per triple for the lifetime of the system. A row with
/// a zero reward after its epoch's checkpoint is a first-class signal: the
/// service was staked but failed its KPI, as opposed to not being tracked at
/// all. The checkpoint overwrites the amount rather than accumulating; a second
/// finalization for the same epoch is an anomaly worth logging upstream.
#[derive(Debug, Clone)]
pub struct RewardHistory {
    pub chain_id: u64,
    pub service_id: u64,
    pub contract: String,
    pub epoch: u64,
    pub reward: U256,
    /// Set when the epoch's checkpoint wrote this row.
    pub finalized: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

impl RewardHistory {
    pub fn new(chain_id: u64, service_id: u64, contract: String, epoch: u64) -> Self {
        Self {
            chain_id,
            service_id,
            contract,
            epoch,
            reward: U256::ZERO,
            finalized: false,
            updated_at: None,
        }
    }

    /// Overwrite the reward for this epoch. Returns whether the row had already
    /// been finalized, so the caller can log the anomaly.
    pub fn finalize(&mut self, reward: U256) -> bool {
        let was_finalized = self.finalized;
        self.reward = reward;
        self.finalized = true;
        self.updated_at = Some(Utc::now());
        was_finalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finalize_overwrites_and_reports_prior_finalization() {
        let mut h = RewardHistory::new(1, 7, "0xabc".into(), 3);
        assert!(!h.finalize(U256::from(100u64)));
        // second finalization replaces the amount, never accumulates
        assert!(h.finalize(U256::from(40u64)));
        assert_eq!(h.reward, U256::from(40u64));
        assert!(h.finalized);
    }
}
