//! Job to refresh per-contract aggregates in PostgreSQL.
//!
//! Recomputes num_services_staked from the latest tracked epoch membership and
//! total_rewards_distributed from the reward history, per staking contract.
//! The worker never touches these columns; they exist for dashboards and are
//! cheap to rebuild from the relational state.

use anyhow::Result;
use log::info;

use crate::db::Database;

pub async fn run(db: &Database, chain_id: u64) -> Result<()> {
    let start = std::time::Instant::now();

    let updated = db.postgres.refresh_contract_stats(chain_id).await?;

    info!(
        "Chain {}: refreshed stats for {} staking contracts in {:?}",
        chain_id,
        updated,
        start.elapsed()
    );
    Ok(())
}
