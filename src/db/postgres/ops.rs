use chrono::{DateTime, Utc};
use log::error;

use crate::db::models::{
    DailySnapshot, EpochMembership, RewardHistory, Service, StakingContract, StakingGlobal,
    SyncCheckpoint,
};
use crate::db::postgres::PostgresClient;
use crate::utils::u256_from_text;

impl PostgresClient {
    // ==================== STAKING CONTRACTS ====================

    /// Get every staking contract instance known for a chain.
    pub async fn get_staking_contracts(
        &self,
        chain_id: u64,
    ) -> anyhow::Result<Vec<StakingContract>> {
        let client = self.pool.get().await?;
        let query = r#"
            SELECT
                chain_id, address, implementation, max_num_services, rewards_per_second,
                min_staking_deposit, num_agent_instances, liveness_period,
                num_services_staked, total_rewards_distributed, created_block, tx_hash, updated_at
            FROM indexer.staking_contracts
            WHERE chain_id = $1
        "#;

        let rows = client.query(query, &[&(chain_id as i64)]).await?;
        Ok(rows.iter().map(row_to_staking_contract).collect())
    }

    /// Batch insert/update staking contracts (multi-row VALUES)
    pub async fn set_staking_contracts(
        &self,
        contracts: &[&StakingContract],
    ) -> anyhow::Result<()> {
        if contracts.is_empty() {
            return Ok(());
        }

        const COLS_PER_ROW: usize = 13;
        const BATCH_SIZE: usize = 500;

        let client = self.pool.get().await?;

        for chunk in contracts.chunks(BATCH_SIZE) {
            let values_clauses = values_placeholders(chunk.len(), COLS_PER_ROW);

            let query = format!(
                r#"
                INSERT INTO indexer.staking_contracts (
                    chain_id, address, implementation, max_num_services, rewards_per_second,
                    min_staking_deposit, num_agent_instances, liveness_period,
                    num_services_staked, total_rewards_distributed, created_block, tx_hash, updated_at
                ) VALUES {}
                ON CONFLICT (chain_id, address) DO UPDATE SET
                    max_num_services = EXCLUDED.max_num_services,
                    rewards_per_second = EXCLUDED.rewards_per_second,
                    min_staking_deposit = EXCLUDED.min_staking_deposit,
                    num_agent_instances = EXCLUDED.num_agent_instances,
                    liveness_period = EXCLUDED.liveness_period,
                    num_services_staked = EXCLUDED.num_services_staked,
                    total_rewards_distributed = EXCLUDED.total_rewards_distributed,
                    updated_at = EXCLUDED.updated_at
                "#,
                values_clauses
            );

            // Owned conversions (u64 -> i64, U256 -> decimal text) for ToSql refs
            struct Converted {
                chain_id: i64,
                max_num_services: Option<i64>,
                rewards_per_second: Option<String>,
                min_staking_deposit: Option<String>,
                num_agent_instances: Option<i64>,
                liveness_period: Option<i64>,
                num_services_staked: i64,
                total_rewards_distributed: String,
                created_block: i64,
            }
            let converted: Vec<Converted> = chunk
                .iter()
                .map(|c| Converted {
                    chain_id: c.chain_id as i64,
                    max_num_services: c.max_num_services.map(|v| v as i64),
                    rewards_per_second: c.rewards_per_second.map(|v| v.to_string()),
                    min_staking_deposit: c.min_staking_deposit.map(|v| v.to_string()),
                    num_agent_instances: c.num_agent_instances.map(|v| v as i64),
                    liveness_period: c.liveness_period.map(|v| v as i64),
                    num_services_staked: c.num_services_staked as i64,
                    total_rewards_distributed: c.total_rewards_distributed.to_string(),
                    created_block: c.created_block as i64,
                })
                .collect();

            let mut params: Vec<&(dyn tokio_postgres::types::ToSql + Sync)> =
                Vec::with_capacity(chunk.len() * COLS_PER_ROW);

            for (i, contract) in chunk.iter().enumerate() {
                params.push(&converted[i].chain_id);
                params.push(&contract.address);
                params.push(&contract.implementation);
                params.push(&converted[i].max_num_services);
                params.push(&converted[i].rewards_per_second);
                params.push(&converted[i].min_staking_deposit);
                params.push(&converted[i].num_agent_instances);
                params.push(&converted[i].liveness_period);
                params.push(&converted[i].num_services_staked);
                params.push(&converted[i].total_rewards_distributed);
                params.push(&converted[i].created_block);
                params.push(&contract.tx_hash);
                params.push(&contract.updated_at);
            }

            client.execute(&query, &params).await.map_err(|e| {
                error!("Failed to batch insert {} staking contracts: {:?}", chunk.len(), e);
                e
            })?;
        }

        Ok(())
    }

    // ==================== SERVICES ====================

    /// Get every service record for a chain (seeds the ledger at startup).
    pub async fn get_services(&self, chain_id: u64) -> anyhow::Result<Vec<Service>> {
        let client = self.pool.get().await?;
        let query = r#"
            SELECT
                chain_id, service_id, olas_rewards_earned, olas_rewards_claimed,
                latest_staking_contract, total_epochs_participated, updated_at
            FROM indexer.services
            WHERE chain_id = $1
        "#;

        let rows = client.query(query, &[&(chain_id as i64)]).await?;
        Ok(rows.iter().map(row_to_service).collect())
    }

    /// Batch insert/update services (multi-row VALUES)
    pub async fn set_services(&self, services: &[&Service]) -> anyhow::Result<()> {
        if services.is_empty() {
            return Ok(());
        }

        const COLS_PER_ROW: usize = 7;
        const BATCH_SIZE: usize = 1000;

        let client = self.pool.get().await?;

        for chunk in services.chunks(BATCH_SIZE) {
            let values_clauses = values_placeholders(chunk.len(), COLS_PER_ROW);

            let query = format!(
                r#"
                INSERT INTO indexer.services (
                    chain_id, service_id, olas_rewards_earned, olas_rewards_claimed,
                    latest_staking_contract, total_epochs_participated, updated_at
                ) VALUES {}
                ON CONFLICT (chain_id, service_id) DO UPDATE SET
                    olas_rewards_earned = EXCLUDED.olas_rewards_earned,
                    olas_rewards_claimed = EXCLUDED.olas_rewards_claimed,
                    latest_staking_contract = EXCLUDED.latest_staking_contract,
                    total_epochs_participated = EXCLUDED.total_epochs_participated,
                    updated_at = EXCLUDED.updated_at
                "#,
                values_clauses
            );

            struct Converted {
                chain_id: i64,
                service_id: i64,
                earned: String,
                claimed: String,
                epochs: i64,
            }
            let converted: Vec<Converted> = chunk
                .iter()
                .map(|s| Converted {
                    chain_id: s.chain_id as i64,
                    service_id: s.service_id as i64,
                    earned: s.olas_rewards_earned.to_string(),
                    claimed: s.olas_rewards_claimed.to_string(),
                    epochs: s.total_epochs_participated as i64,
                })
                .collect();

            let mut params: Vec<&(dyn tokio_postgres::types::ToSql + Sync)> =
                Vec::with_capacity(chunk.len() * COLS_PER_ROW);

            for (i, service) in chunk.iter().enumerate() {
                params.push(&converted[i].chain_id);
                params.push(&converted[i].service_id);
                params.push(&converted[i].earned);
                params.push(&converted[i].claimed);
                params.push(&service.latest_staking_contract);
                params.push(&converted[i].epochs);
                params.push(&service.updated_at);
            }

            client.execute(&query, &params).await.map_err(|e| {
                error!("Failed to batch insert {} services: {:?}", chunk.len(), e);
                e
            })?;
        }

        Ok(())
    }

    // ==================== ACTIVE SERVICE EPOCHS ====================

    /// Get membership rows for the given (contract, epoch) keys.
    pub async fn get_memberships(
        &self,
        chain_id: u64,
        keys: &[(String, u64)],
    ) -> anyhow::Result<Vec<EpochMembership>> {
        if keys.is_empty() {
            return Ok(vec![]);
        }

        let client = self.pool.get().await?;
        let contracts: Vec<String> = keys.iter().map(|(c, _)| c.clone()).collect();
        let epochs: Vec<i64> = keys.iter().map(|(_, e)| *e as i64).collect();

        let query = r#"
            SELECT chain_id, contract, epoch, service_ids, updated_at
            FROM indexer.active_service_epochs
            WHERE chain_id = $1
              AND (contract, epoch) IN (SELECT * FROM UNNEST($2::text[], $3::bigint[]))
        "#;

        let rows = client
            .query(query, &[&(chain_id as i64), &contracts, &epochs])
            .await?;
        Ok(rows.iter().map(row_to_membership).collect())
    }

    /// Batch insert/update membership rows (multi-row VALUES)
    pub async fn set_memberships(&self, memberships: &[&EpochMembership]) -> anyhow::Result<()> {
        if memberships.is_empty() {
            return Ok(());
        }

        const COLS_PER_ROW: usize = 5;
        const BATCH_SIZE: usize = 1000;

        let client = self.pool.get().await?;

        for chunk in memberships.chunks(BATCH_SIZE) {
            let values_clauses = values_placeholders(chunk.len(), COLS_PER_ROW);

            let query = format!(
                r#"
                INSERT INTO indexer.active_service_epochs (
                    chain_id, contract, epoch, service_ids, updated_at
                ) VALUES {}
                ON CONFLICT (chain_id, contract, epoch) DO UPDATE SET
                    service_ids = EXCLUDED.service_ids,
                    updated_at = EXCLUDED.updated_at
                "#,
                values_clauses
            );

            struct Converted {
                chain_id: i64,
                epoch: i64,
                service_ids: Vec<i64>,
            }
            let converted: Vec<Converted> = chunk
                .iter()
                .map(|m| Converted {
                    chain_id: m.chain_id as i64,
                    epoch: m.epoch as i64,
                    service_ids: m.service_ids.iter().map(|&id| id as i64).collect(),
                })
                .collect();

            let mut params: Vec<&(dyn tokio_postgres::types::ToSql + Sync)> =
                Vec::with_capacity(chunk.len() * COLS_PER_ROW);

            for (i, membership) in chunk.iter().enumerate() {
                params.push(&converted[i].chain_id);
                params.push(&membership.contract);
                params.push(&converted[i].epoch);
                params.push(&converted[i].service_ids);
                params.push(&membership.updated_at);
            }

            client.execute(&query, &params).await.map_err(|e| {
                error!("Failed to batch insert {} memberships: {:?}", chunk.len(), e);
                e
            })?;
        }

        Ok(())
    }

    // ==================== SERVICE REWARDS HISTORY ====================

    /// Get reward history rows for the given (service, contract, epoch) keys.
    pub async fn get_reward_histories(
        &self,
        chain_id: u64,
        keys: &[(u64, String, u64)],
    ) -> anyhow::Result<Vec<RewardHistory>> {
        if keys.is_empty() {
            return Ok(vec![]);
        }

        let client = self.pool.get().await?;
        let service_ids: Vec<i64> = keys.iter().map(|(s, _, _)| *s as i64).collect();
        let contracts: Vec<String> = keys.iter().map(|(_, c, _)| c.clone()).collect();
        let epochs: Vec<i64> = keys.iter().map(|(_, _, e)| *e as i64).collect();

        let query = r#"
            SELECT chain_id, service_id, contract, epoch, reward, finalized, updated_at
            FROM indexer.service_rewards_history
            WHERE chain_id = $1
              AND (service_id, contract, epoch) IN
                  (SELECT * FROM UNNEST($2::bigint[], $3::text[], $4::bigint[]))
        "#;

        let rows = client
            .query(query, &[&(chain_id as i64), &service_ids, &contracts, &epochs])
            .await?;
        Ok(rows.iter().map(row_to_reward_history).collect())
    }

    /// Batch insert/update reward history rows (multi-row VALUES)
    pub async fn set_reward_histories(&self, histories: &[&RewardHistory]) -> anyhow::Result<()> {
        if histories.is_empty() {
            return Ok(());
        }

        const COLS_PER_ROW: usize = 7;
        const BATCH_SIZE: usize = 1000;

        let client = self.pool.get().await?;

        for chunk in histories.chunks(BATCH_SIZE) {
            let values_clauses = values_placeholders(chunk.len(), COLS_PER_ROW);

            let query = format!(
                r#"
                INSERT INTO indexer.service_rewards_history (
                    chain_id, service_id, contract, epoch, reward, finalized, updated_at
                ) VALUES {}
                ON CONFLICT (chain_id, service_id, contract, epoch) DO UPDATE SET
                    reward = EXCLUDED.reward,
                    finalized = EXCLUDED.finalized,
                    updated_at = EXCLUDED.updated_at
                "#,
                values_clauses
            );

            struct Converted {
                chain_id: i64,
                service_id: i64,
                epoch: i64,
                reward: String,
            }
            let converted: Vec<Converted> = chunk
                .iter()
                .map(|h| Converted {
                    chain_id: h.chain_id as i64,
                    service_id: h.service_id as i64,
                    epoch: h.epoch as i64,
                    reward: h.reward.to_string(),
                })
                .collect();

            let mut params: Vec<&(dyn tokio_postgres::types::ToSql + Sync)> =
                Vec::with_capacity(chunk.len() * COLS_PER_ROW);

            for (i, history) in chunk.iter().enumerate() {
                params.push(&converted[i].chain_id);
                params.push(&converted[i].service_id);
                params.push(&history.contract);
                params.push(&converted[i].epoch);
                params.push(&converted[i].reward);
                params.push(&history.finalized);
                params.push(&history.updated_at);
            }

            client.execute(&query, &params).await.map_err(|e| {
                error!("Failed to batch insert {} reward histories: {:?}", chunk.len(), e);
                e
            })?;
        }

        Ok(())
    }

    // ==================== STAKING GLOBAL ====================

    pub async fn get_staking_global(&self, chain_id: u64) -> anyhow::Result<Option<StakingGlobal>> {
        let client = self.pool.get().await?;
        let query = r#"
            SELECT chain_id, total_staked, total_unstaked, total_rewards_distributed,
                   num_services, last_active_day, updated_at
            FROM indexer.staking_globals
            WHERE chain_id = $1
        "#;

        let row = client.query_opt(query, &[&(chain_id as i64)]).await?;
        Ok(row.as_ref().map(row_to_global))
    }

    pub async fn set_staking_global(&self, global: &StakingGlobal) -> anyhow::Result<()> {
        let client = self.pool.get().await?;
        let query = r#"
            INSERT INTO indexer.staking_globals (
                chain_id, total_staked, total_unstaked, total_rewards_distributed,
                num_services, last_active_day, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (chain_id) DO UPDATE SET
                total_staked = EXCLUDED.total_staked,
                total_unstaked = EXCLUDED.total_unstaked,
                total_rewards_distributed = EXCLUDED.total_rewards_distributed,
                num_services = EXCLUDED.num_services,
                last_active_day = EXCLUDED.last_active_day,
                updated_at = EXCLUDED.updated_at
        "#;

        client
            .execute(
                query,
                &[
                    &(global.chain_id as i64),
                    &global.total_staked.to_string(),
                    &global.total_unstaked.to_string(),
                    &global.total_rewards_distributed.to_string(),
                    &(global.num_services as i64),
                    &global.last_active_day,
                    &global.updated_at,
                ],
            )
            .await
            .map_err(|e| {
                error!("Failed to upsert staking global for chain {}: {:?}", global.chain_id, e);
                e
            })?;

        Ok(())
    }

    // ==================== DAILY SNAPSHOTS ====================

    pub async fn get_daily_snapshot(
        &self,
        chain_id: u64,
        day: i64,
    ) -> anyhow::Result<Option<DailySnapshot>> {
        let client = self.pool.get().await?;
        let query = r#"
            SELECT chain_id, day, total_rewards, num_services, median_rewards_earned, updated_at
            FROM indexer.daily_snapshots
            WHERE chain_id = $1 AND day = $2
        "#;

        let row = client.query_opt(query, &[&(chain_id as i64), &day]).await?;
        Ok(row.as_ref().map(row_to_snapshot))
    }

    /// Batch insert/update daily snapshots (multi-row VALUES)
    pub async fn set_daily_snapshots(&self, snapshots: &[&DailySnapshot]) -> anyhow::Result<()> {
        if snapshots.is_empty() {
            return Ok(());
        }

        const COLS_PER_ROW: usize = 6;
        const BATCH_SIZE: usize = 1000;

        let client = self.pool.get().await?;

        for chunk in snapshots.chunks(BATCH_SIZE) {
            let values_clauses = values_placeholders(chunk.len(), COLS_PER_ROW);

            let query = format!(
                r#"
                INSERT INTO indexer.daily_snapshots (
                    chain_id, day, total_rewards, num_services, median_rewards_earned, updated_at
                ) VALUES {}
                ON CONFLICT (chain_id, day) DO UPDATE SET
                    total_rewards = EXCLUDED.total_rewards,
                    num_services = EXCLUDED.num_services,
                    median_rewards_earned = EXCLUDED.median_rewards_earned,
                    updated_at = EXCLUDED.updated_at
                "#,
                values_clauses
            );

            struct Converted {
                chain_id: i64,
                total_rewards: String,
                num_services: i64,
                median: String,
            }
            let converted: Vec<Converted> = chunk
                .iter()
                .map(|s| Converted {
                    chain_id: s.chain_id as i64,
                    total_rewards: s.total_rewards.to_string(),
                    num_services: s.num_services as i64,
                    median: s.median_rewards_earned.to_string(),
                })
                .collect();

            let mut params: Vec<&(dyn tokio_postgres::types::ToSql + Sync)> =
                Vec::with_capacity(chunk.len() * COLS_PER_ROW);

            for (i, snapshot) in chunk.iter().enumerate() {
                params.push(&converted[i].chain_id);
                params.push(&snapshot.day);
                params.push(&converted[i].total_rewards);
                params.push(&converted[i].num_services);
                params.push(&converted[i].median);
                params.push(&snapshot.updated_at);
            }

            client.execute(&query, &params).await.map_err(|e| {
                error!("Failed to batch insert {} daily snapshots: {:?}", chunk.len(), e);
                e
            })?;
        }

        Ok(())
    }

    // ==================== CONTRACT STATS ====================

    /// Refresh per-contract aggregates from the reward history and membership
    /// tables. Run from cron, not from the hot indexing path.
    pub async fn refresh_contract_stats(&self, chain_id: u64) -> anyhow::Result<u64> {
        let client = self.pool.get().await?;
        let query = r#"
            UPDATE indexer.staking_contracts c
            SET num_services_staked = COALESCE(m.active_count, 0),
                total_rewards_distributed = COALESCE(r.total, '0'),
                updated_at = NOW()
            FROM indexer.staking_contracts c2
            LEFT JOIN LATERAL (
                SELECT cardinality(service_ids) AS active_count
                FROM indexer.active_service_epochs a
                WHERE a.chain_id = c2.chain_id AND a.contract = c2.address
                ORDER BY a.epoch DESC
                LIMIT 1
            ) m ON TRUE
            LEFT JOIN LATERAL (
                SELECT SUM(reward::numeric)::text AS total
                FROM indexer.service_rewards_history h
                WHERE h.chain_id = c2.chain_id AND h.contract = c2.address
            ) r ON TRUE
            WHERE c.chain_id = c2.chain_id AND c.address = c2.address AND c.chain_id = $1
        "#;

        let updated = client.execute(query, &[&(chain_id as i64)]).await.map_err(|e| {
            error!("Failed to refresh contract stats for chain {}: {:?}", chain_id, e);
            e
        })?;

        Ok(updated)
    }

    // ==================== SYNC CHECKPOINT ====================

    /// Get sync checkpoint for a chain
    pub async fn get_sync_checkpoint(
        &self,
        chain_id: u64,
    ) -> anyhow::Result<Option<SyncCheckpoint>> {
        let client = self.pool.get().await?;
        let query = "SELECT chain_id, last_indexed_block, updated_at FROM indexer.sync_checkpoints WHERE chain_id = $1";

        let row = client.query_opt(query, &[&(chain_id as i64)]).await?;

        Ok(row.map(|r| SyncCheckpoint {
            chain_id: r.get::<_, i64>("chain_id") as u64,
            last_indexed_block: r.get::<_, i64>("last_indexed_block") as u64,
            updated_at: r.get("updated_at"),
        }))
    }

    /// Set sync checkpoint for a chain
    pub async fn set_sync_checkpoint(&self, checkpoint: &SyncCheckpoint) -> anyhow::Result<()> {
        let client = self.pool.get().await?;
        let query = r#"
            INSERT INTO indexer.sync_checkpoints (chain_id, last_indexed_block, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (chain_id) DO UPDATE SET
                last_indexed_block = EXCLUDED.last_indexed_block,
                updated_at = EXCLUDED.updated_at
        "#;

        client
            .execute(
                query,
                &[
                    &(checkpoint.chain_id as i64),
                    &(checkpoint.last_indexed_block as i64),
                    &checkpoint.updated_at,
                ],
            )
            .await
            .map_err(|e| {
                error!(
                    "Failed to insert sync checkpoint for chain {}: {:?}",
                    checkpoint.chain_id, e
                );
                e
            })?;

        Ok(())
    }

    // ==================== CRON CHECKPOINTS ====================

    /// Get last run timestamp for a cron job
    pub async fn get_cron_checkpoint(
        &self,
        job_name: &str,
    ) -> anyhow::Result<Option<time::OffsetDateTime>> {
        let client = self.pool.get().await?;
        let query = "SELECT last_run_at FROM indexer.cron_checkpoints WHERE job_name = $1";

        let row = client.query_opt(query, &[&job_name]).await?;

        if let Some(row) = row {
            // Convert from chrono::DateTime<Utc> (postgres) to time::OffsetDateTime (application)
            let last_run_at: Option<chrono::DateTime<chrono::Utc>> = row.get("last_run_at");

            if let Some(last_run) = last_run_at {
                let ts = time::OffsetDateTime::from_unix_timestamp(last_run.timestamp())?
                    .replace_nanosecond(last_run.timestamp_subsec_nanos())?;
                return Ok(Some(ts));
            }
        }

        Ok(None)
    }

    /// Set last run timestamp for a cron job
    pub async fn set_cron_checkpoint(
        &self,
        job_name: &str,
        last_run_at: time::OffsetDateTime,
    ) -> anyhow::Result<()> {
        let client = self.pool.get().await?;
        let query = r#"
            INSERT INTO indexer.cron_checkpoints (job_name, last_run_at, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (job_name) DO UPDATE SET
                last_run_at = EXCLUDED.last_run_at,
                updated_at = NOW()
        "#;

        // Convert from time::OffsetDateTime to chrono::DateTime<Utc>
        let last_run_chrono = chrono::DateTime::<chrono::Utc>::from_timestamp(
            last_run_at.unix_timestamp(),
            last_run_at.nanosecond(),
        )
        .unwrap_or_default();

        client
            .execute(query, &[&job_name, &last_run_chrono])
            .await
            .map_err(|e| {
                error!(
                    "Failed to update checkpoint for cron job {}: {:?}",
                    job_name, e
                );
                e
            })?;

        Ok(())
    }
}

// ==================== HELPER FUNCTIONS ====================

/// Build VALUES placeholders: ($1,$2,...), ($n+1,...), ...
fn values_placeholders(rows: usize, cols: usize) -> String {
    (0..rows)
        .map(|i| {
            let start = i * cols + 1;
            let placeholders: Vec<String> =
                (start..start + cols).map(|n| format!("${}", n)).collect();
            format!("({})", placeholders.join(", "))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn row_to_staking_contract(row: &tokio_postgres::Row) -> StakingContract {
    // Lowercase addresses for consistent comparisons
    let address: String = row.get("address");
    let implementation: String = row.get("implementation");
    StakingContract {
        chain_id: row.get::<_, i64>("chain_id") as u64,
        address: address.to_lowercase(),
        implementation: implementation.to_lowercase(),
        max_num_services: row.get::<_, Option<i64>>("max_num_services").map(|v| v as u64),
        rewards_per_second: row
            .get::<_, Option<String>>("rewards_per_second")
            .map(|v| u256_from_text(&v)),
        min_staking_deposit: row
            .get::<_, Option<String>>("min_staking_deposit")
            .map(|v| u256_from_text(&v)),
        num_agent_instances: row.get::<_, Option<i64>>("num_agent_instances").map(|v| v as u64),
        liveness_period: row.get::<_, Option<i64>>("liveness_period").map(|v| v as u64),
        num_services_staked: row.get::<_, i64>("num_services_staked") as u64,
        total_rewards_distributed: u256_from_text(
            &row.get::<_, String>("total_rewards_distributed"),
        ),
        created_block: row.get::<_, i64>("created_block") as u64,
        tx_hash: row.get("tx_hash"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_service(row: &tokio_postgres::Row) -> Service {
    Service {
        chain_id: row.get::<_, i64>("chain_id") as u64,
        service_id: row.get::<_, i64>("service_id") as u64,
        olas_rewards_earned: u256_from_text(&row.get::<_, String>("olas_rewards_earned")),
        olas_rewards_claimed: u256_from_text(&row.get::<_, String>("olas_rewards_claimed")),
        latest_staking_contract: row
            .get::<_, Option<String>>("latest_staking_contract")
            .map(|c| c.to_lowercase()),
        total_epochs_participated: row.get::<_, i64>("total_epochs_participated") as u64,
        updated_at: row.get("updated_at"),
    }
}

fn row_to_membership(row: &tokio_postgres::Row) -> EpochMembership {
    let contract: String = row.get("contract");
    let mut service_ids: Vec<u64> = row
        .get::<_, Vec<i64>>("service_ids")
        .into_iter()
        .map(|id| id as u64)
        .collect();
    // Stored sorted, but guard against manual edits
    service_ids.sort_unstable();
    service_ids.dedup();

    EpochMembership {
        chain_id: row.get::<_, i64>("chain_id") as u64,
        contract: contract.to_lowercase(),
        epoch: row.get::<_, i64>("epoch") as u64,
        service_ids,
        updated_at: row.get("updated_at"),
    }
}

fn row_to_reward_history(row: &tokio_postgres::Row) -> RewardHistory {
    let contract: String = row.get("contract");
    RewardHistory {
        chain_id: row.get::<_, i64>("chain_id") as u64,
        service_id: row.get::<_, i64>("service_id") as u64,
        contract: contract.to_lowercase(),
        epoch: row.get::<_, i64>("epoch") as u64,
        reward: u256_from_text(&row.get::<_, String>("reward")),
        finalized: row.get("finalized"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_global(row: &tokio_postgres::Row) -> StakingGlobal {
    StakingGlobal {
        chain_id: row.get::<_, i64>("chain_id") as u64,
        total_staked: u256_from_text(&row.get::<_, String>("total_staked")),
        total_unstaked: u256_from_text(&row.get::<_, String>("total_unstaked")),
        total_rewards_distributed: u256_from_text(
            &row.get::<_, String>("total_rewards_distributed"),
        ),
        num_services: row.get::<_, i64>("num_services") as u64,
        last_active_day: row.get("last_active_day"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_snapshot(row: &tokio_postgres::Row) -> DailySnapshot {
    DailySnapshot {
        chain_id: row.get::<_, i64>("chain_id") as u64,
        day: row.get("day"),
        total_rewards: u256_from_text(&row.get::<_, String>("total_rewards")),
        num_services: row.get::<_, i64>("num_services") as u64,
        median_rewards_earned: u256_from_text(&row.get::<_, String>("median_rewards_earned")),
        updated_at: row.get("updated_at"),
    }
}
