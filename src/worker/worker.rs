use alloy::{primitives::U256, sol_types::SolEvent};
use anyhow::Context;
use chrono::Utc;
use hypersync_client::{
    net_types::{BlockField, LogField, LogFilter, Query},
    Client, ClientConfig, SerializationFormat, StreamConfig,
};
use log::{info, warn};
use rustc_hash::FxHashMap;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    abis::{factory, staking},
    config::Settings,
    db::{
        clickhouse::ops::StakingBatchMessage,
        models::{RewardUpdate, StakingContract, StakingEvent, SyncCheckpoint},
        IngestMessage,
    },
    staking::Ledger,
    utils::{hex_encode, ZERO_ADDRESS},
    worker::{
        instance_reader::InstanceReader,
        parser::{self, as_u64, ParsedLog},
    },
    Database,
};

/// Interval for logging progress updates (10 seconds)
const PROGRESS_LOG_INTERVAL: Duration = Duration::from_secs(10);

/// Timeout for receiving data from HyperSync stream (5 minutes)
/// If no data is received within this time, reconnect the stream
const STREAM_RECV_TIMEOUT: Duration = Duration::from_secs(300);

/// Main staking indexer worker for a single chain.
///
/// Streams factory and staking-instance logs from HyperSync and processes
/// them in batches:
/// - Registers newly deployed staking instances and reads their parameters
/// - Applies stake/unstake/eviction/checkpoint/claim events to the ledger
/// - Flushes derived state to PostgreSQL, then advances the sync checkpoint
/// - Sends the raw event stream to ClickHouse via channels
pub struct StakingWorker {
    historical_sender: mpsc::Sender<IngestMessage>,
    live_sender: mpsc::Sender<IngestMessage>,
    chain_id: u64,
    client: Arc<Client>,
    db: Arc<Database>,
    filters: LogFilter,
    reader: InstanceReader,
    factory: String,
    start_block: u64,
    token_decimals: u8,
    tip_poll_interval: Duration,
}

impl StakingWorker {
    pub fn new(
        settings: &Settings,
        historical_sender: mpsc::Sender<IngestMessage>,
        live_sender: mpsc::Sender<IngestMessage>,
        db: Arc<Database>,
    ) -> anyhow::Result<Self> {
        let network = &settings.network;

        let url = network
            .hypersync_url
            .parse()
            .context("Invalid HyperSync URL")?;

        let client_config = ClientConfig {
            serialization_format: SerializationFormat::CapnProto {
                should_cache_queries: false,
            },
            http_req_timeout_millis: 120_000,
            url,
            api_token: settings.indexer.hypersync_bearer_token.clone(),
            max_num_retries: 5,
            ..Default::default()
        };

        let client =
            Arc::new(Client::new(client_config).context("Failed to create HyperSync client")?);

        let reader = InstanceReader::new(&network.rpc_url, db.clone())?;

        Ok(Self {
            historical_sender,
            live_sender,
            chain_id: network.chain_id,
            client,
            db,
            filters: LogFilter::all().and_topic0([
                factory::InstanceCreated::SIGNATURE_HASH.0,
                staking::ServiceStaked::SIGNATURE_HASH.0,
                staking::ServiceUnstaked::SIGNATURE_HASH.0,
                staking::ServiceForceUnstaked::SIGNATURE_HASH.0,
                staking::ServicesEvicted::SIGNATURE_HASH.0,
                staking::Checkpoint::SIGNATURE_HASH.0,
                staking::RewardClaimed::SIGNATURE_HASH.0,
                staking::Deposit::SIGNATURE_HASH.0,
                staking::Withdraw::SIGNATURE_HASH.0,
            ])?,
            reader,
            factory: network.staking_factory.to_lowercase(),
            start_block: network.start_block,
            token_decimals: network.token_decimals,
            tip_poll_interval: Duration::from_millis(
                settings.indexer.tip_poll_interval_milliseconds,
            ),
        })
    }

    /// Supervision loop. A stream timeout or persistence failure tears down
    /// the in-memory state; the next pass reseeds the ledger from PostgreSQL
    /// and re-enters from the sync checkpoint, replaying at most one batch.
    pub async fn run(&self, cancellation_token: CancellationToken) -> anyhow::Result<()> {
        loop {
            if cancellation_token.is_cancelled() {
                info!(
                    "Indexer for chain {} received cancellation signal",
                    self.chain_id
                );
                return Ok(());
            }

            match self.sync(&cancellation_token).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(
                        "Chain {}: indexing error: {:?}. Reconnecting in {:?}",
                        self.chain_id, e, self.tip_poll_interval
                    );
                    tokio::time::sleep(self.tip_poll_interval).await;
                },
            }
        }
    }

    /// One indexing session: seed the ledger and known instances, then stream
    /// from the sync checkpoint until cancellation or an error.
    async fn sync(&self, cancellation_token: &CancellationToken) -> anyhow::Result<()> {
        let mut last_progress_log = Instant::now();

        // Seed the ledger with persisted state. Services and the global
        // aggregate stay resident for the whole run; memberships and reward
        // histories are prefetched per batch.
        let mut ledger = Ledger::new(self.chain_id);

        for service in self.db.postgres.get_services(self.chain_id).await? {
            ledger.seed_service(service);
        }
        if let Some(global) = self.db.postgres.get_staking_global(self.chain_id).await? {
            if let Some(day) = global.last_active_day {
                if let Some(snapshot) =
                    self.db.postgres.get_daily_snapshot(self.chain_id, day).await?
                {
                    ledger.seed_snapshot(snapshot);
                }
            }
            ledger.seed_global(global);
        }

        // Known staking instances, keyed by lowercased address. Events from
        // addresses outside this set are spoofed or unrelated and are dropped.
        let mut known: FxHashMap<String, StakingContract> = self
            .db
            .postgres
            .get_staking_contracts(self.chain_id)
            .await?
            .into_iter()
            .map(|c| (c.address.clone(), c))
            .collect();

        info!(
            "Chain {}: ledger seeded with {} services, {} staking instances",
            self.chain_id,
            ledger.global().num_services,
            known.len()
        );

        loop {
            // Check cancellation at the start of each loop
            if cancellation_token.is_cancelled() {
                info!(
                    "Indexer for chain {} received cancellation signal",
                    self.chain_id
                );
                break;
            }

            let mut last_synced_block: u64 =
                match self.db.postgres.get_sync_checkpoint(self.chain_id).await {
                    Ok(Some(checkpoint)) => checkpoint.last_indexed_block,
                    Ok(None) => self.start_block,
                    Err(e) => {
                        warn!(
                            "Failed to fetch last block from postgres: {:?}. Starting from block {}.",
                            e, self.start_block
                        );
                        self.start_block
                    },
                };

            let config = StreamConfig {
                ..Default::default()
            };

            let query = Query::new()
                .from_block(last_synced_block)
                .where_logs(self.filters.clone())
                .select_block_fields([BlockField::Number, BlockField::Timestamp])
                .select_log_fields([
                    LogField::BlockNumber,
                    LogField::TransactionHash,
                    LogField::LogIndex,
                    LogField::Address,
                    LogField::Data,
                    LogField::Topic0,
                    LogField::Topic1,
                    LogField::Topic2,
                    LogField::Topic3,
                ]);

            let mut stream = self.client.stream(query, config).await?;

            // Start the log stream
            while let Some(res) = tokio::time::timeout(STREAM_RECV_TIMEOUT, stream.recv())
                .await
                .map_err(|_| {
                    anyhow::anyhow!("Stream recv timeout after {:?}", STREAM_RECV_TIMEOUT)
                })?
            {
                let res = res.context("Stream error")?;

                // Get block timestamps for the log batch
                let block_timestamps: FxHashMap<u64, u64> = res
                    .data
                    .blocks
                    .iter()
                    .flatten()
                    .filter_map(|b| {
                        let n = b.number?;
                        let t = U256::from_be_slice(b.timestamp.as_ref()?).to::<u64>();
                        Some((n, t))
                    })
                    .collect();

                // Estimate log count for capacity hints (avoid reallocations)
                let log_count_estimate = res.data.logs.iter().flatten().count();

                // Phase 1 -> Parse all logs in a single pass. Returns parsed
                // logs in sequential order plus the entity keys they touch.
                let parse_result = parser::parse_logs(
                    res.data.logs.into_iter().flatten(),
                    &block_timestamps,
                    log_count_estimate,
                );

                let parsed_logs = parse_result.parsed_logs;

                // Phase 2 -> Register staking instances deployed in this batch.
                // Must happen before event processing so that stake events on a
                // freshly deployed instance in the same batch pass the
                // known-instance filter.
                let mut discovered: Vec<StakingContract> = Vec::new();

                for parsed_log in &parsed_logs {
                    if let ParsedLog::InstanceCreated {
                        event,
                        factory,
                        block_number,
                        tx_hash,
                        ..
                    } = parsed_log
                    {
                        // Only the configured factory can register instances
                        if factory != &self.factory {
                            continue;
                        }
                        let address = hex_encode(event.instance.as_slice()).to_lowercase();
                        if address == ZERO_ADDRESS || known.contains_key(&address) {
                            continue;
                        }
                        let contract = StakingContract::new(
                            self.chain_id,
                            address,
                            hex_encode(event.implementation.as_slice()),
                            *block_number,
                            tx_hash.clone(),
                        );
                        known.insert(contract.address.clone(), contract.clone());
                        discovered.push(contract);
                    }
                }

                if !discovered.is_empty() {
                    // Parameter reads degrade to None fields inside the reader;
                    // an Err here is a failed Postgres persist. The batch must
                    // abort before the checkpoint advances, or the instance's
                    // creation block falls behind the checkpoint and it is
                    // never rediscovered after a restart.
                    let populated = self
                        .reader
                        .register_instances(discovered)
                        .await
                        .context("Failed to persist staking contracts")?;
                    for contract in populated {
                        known.insert(contract.address.clone(), contract);
                    }
                }

                // Phase 3 -> Prefetch the membership and reward-history rows
                // this batch touches, restricted to known instances.
                let mut membership_keys: Vec<(String, u64)> = parse_result
                    .membership_keys
                    .into_iter()
                    .filter(|(contract, _)| known.contains_key(contract))
                    .collect();
                membership_keys.sort();
                membership_keys.dedup();

                for membership in self
                    .db
                    .postgres
                    .get_memberships(self.chain_id, &membership_keys)
                    .await?
                {
                    ledger.load_membership(membership);
                }

                // Checkpoint zero-backfill writes a history row for every
                // member of the epoch, so those keys are only known once the
                // memberships are loaded.
                let mut history_keys: Vec<(u64, String, u64)> = parse_result
                    .history_keys
                    .into_iter()
                    .filter(|(_, contract, _)| known.contains_key(contract))
                    .collect();

                for parsed_log in &parsed_logs {
                    if let ParsedLog::Checkpoint { event, contract, .. } = parsed_log {
                        if !known.contains_key(contract) {
                            continue;
                        }
                        let Some(epoch) = as_u64(event.epoch) else {
                            continue;
                        };
                        if let Some(membership) = ledger.membership(contract, epoch) {
                            for &service_id in &membership.service_ids {
                                history_keys.push((service_id, contract.clone(), epoch));
                            }
                        }
                    }
                }
                history_keys.sort();
                history_keys.dedup();

                for history in self
                    .db
                    .postgres
                    .get_reward_histories(self.chain_id, &history_keys)
                    .await?
                {
                    ledger.load_history(history);
                }

                // Phase 4 -> Apply all events to the ledger in stream order,
                // building the append-only rows for ClickHouse alongside.
                // IMPORTANT: parsed_logs maintains sequential order from the
                // original log stream; cumulative counters depend on it.
                let mut events: Vec<StakingEvent> = Vec::with_capacity(log_count_estimate);
                let mut reward_updates: Vec<RewardUpdate> =
                    Vec::with_capacity(log_count_estimate / 10);

                for parsed_log in parsed_logs {
                    match parsed_log {
                        ParsedLog::InstanceCreated { .. } => {}, // handled in Phase 2
                        ParsedLog::Staked {
                            event,
                            contract,
                            block_number,
                            log_index,
                            tx_hash,
                            block_timestamp,
                        } => {
                            if !known.contains_key(&contract) {
                                continue;
                            }
                            let (Some(epoch), Some(service_id)) =
                                (as_u64(event.epoch), as_u64(event.serviceId))
                            else {
                                warn!("stake on {} with out-of-range epoch/service id", contract);
                                continue;
                            };
                            let deposit =
                                known.get(&contract).and_then(StakingContract::stake_deposit);
                            ledger.handle_stake(&contract, epoch, service_id, deposit);
                            events.push(StakingEvent::new(
                                self.chain_id,
                                block_number,
                                tx_hash,
                                log_index,
                                block_timestamp,
                                contract,
                                "stake",
                                service_id,
                                epoch,
                                deposit.unwrap_or(U256::ZERO),
                                self.token_decimals,
                            ));
                        },
                        ParsedLog::Unstaked {
                            event,
                            contract,
                            block_number,
                            log_index,
                            tx_hash,
                            block_timestamp,
                        } => {
                            if !known.contains_key(&contract) {
                                continue;
                            }
                            let (Some(epoch), Some(service_id)) =
                                (as_u64(event.epoch), as_u64(event.serviceId))
                            else {
                                warn!("unstake on {} with out-of-range epoch/service id", contract);
                                continue;
                            };
                            let deposit =
                                known.get(&contract).and_then(StakingContract::stake_deposit);
                            ledger.handle_unstake(
                                &contract,
                                epoch,
                                service_id,
                                event.reward,
                                deposit,
                            );
                            events.push(StakingEvent::new(
                                self.chain_id,
                                block_number,
                                tx_hash,
                                log_index,
                                block_timestamp,
                                contract,
                                "unstake",
                                service_id,
                                epoch,
                                event.reward,
                                self.token_decimals,
                            ));
                        },
                        ParsedLog::ForceUnstaked {
                            event,
                            contract,
                            block_number,
                            log_index,
                            tx_hash,
                            block_timestamp,
                        } => {
                            if !known.contains_key(&contract) {
                                continue;
                            }
                            let (Some(epoch), Some(service_id)) =
                                (as_u64(event.epoch), as_u64(event.serviceId))
                            else {
                                warn!(
                                    "force unstake on {} with out-of-range epoch/service id",
                                    contract
                                );
                                continue;
                            };
                            let deposit =
                                known.get(&contract).and_then(StakingContract::stake_deposit);
                            ledger.handle_unstake(
                                &contract,
                                epoch,
                                service_id,
                                event.reward,
                                deposit,
                            );
                            events.push(StakingEvent::new(
                                self.chain_id,
                                block_number,
                                tx_hash,
                                log_index,
                                block_timestamp,
                                contract,
                                "force_unstake",
                                service_id,
                                epoch,
                                event.reward,
                                self.token_decimals,
                            ));
                        },
                        ParsedLog::Evicted {
                            event,
                            contract,
                            block_number,
                            log_index,
                            tx_hash,
                            block_timestamp,
                        } => {
                            if !known.contains_key(&contract) {
                                continue;
                            }
                            let Some(epoch) = as_u64(event.epoch) else {
                                warn!("eviction on {} with out-of-range epoch", contract);
                                continue;
                            };
                            let service_ids: Vec<u64> = event
                                .serviceIds
                                .iter()
                                .filter_map(|id| as_u64(*id))
                                .collect();
                            ledger.handle_evictions(&contract, epoch, &service_ids);
                            for service_id in service_ids {
                                events.push(StakingEvent::new(
                                    self.chain_id,
                                    block_number,
                                    tx_hash.clone(),
                                    log_index,
                                    block_timestamp,
                                    contract.clone(),
                                    "evict",
                                    service_id,
                                    epoch,
                                    U256::ZERO,
                                    self.token_decimals,
                                ));
                            }
                        },
                        ParsedLog::Checkpoint {
                            event,
                            contract,
                            block_number,
                            log_index,
                            tx_hash,
                            block_timestamp,
                        } => {
                            if !known.contains_key(&contract) {
                                continue;
                            }
                            let Some(epoch) = as_u64(event.epoch) else {
                                warn!("checkpoint on {} with out-of-range epoch", contract);
                                continue;
                            };
                            // Keep the parallel arrays aligned while dropping
                            // ids that overflow u64
                            let mut service_ids: Vec<u64> =
                                Vec::with_capacity(event.serviceIds.len());
                            let mut rewards: Vec<U256> = Vec::with_capacity(event.rewards.len());
                            for (id, reward) in event.serviceIds.iter().zip(event.rewards.iter()) {
                                if let Some(service_id) = as_u64(*id) {
                                    service_ids.push(service_id);
                                    rewards.push(*reward);
                                } else {
                                    warn!("checkpoint on {} with out-of-range service id", contract);
                                }
                            }
                            let outcome = ledger.process_checkpoint(
                                &contract,
                                epoch,
                                &service_ids,
                                &rewards,
                                block_timestamp,
                            );
                            reward_updates.push(RewardUpdate::claimable(
                                self.chain_id,
                                block_number,
                                tx_hash.clone(),
                                block_timestamp,
                                contract.clone(),
                                epoch,
                                outcome.total_rewards,
                                outcome.num_services_rewarded,
                                self.token_decimals,
                            ));
                            events.push(StakingEvent::new(
                                self.chain_id,
                                block_number,
                                tx_hash,
                                log_index,
                                block_timestamp,
                                contract,
                                "checkpoint",
                                0,
                                epoch,
                                outcome.total_rewards,
                                self.token_decimals,
                            ));
                        },
                        ParsedLog::Claimed {
                            event,
                            contract,
                            block_number,
                            log_index,
                            tx_hash,
                            block_timestamp,
                        } => {
                            if !known.contains_key(&contract) {
                                continue;
                            }
                            let (Some(epoch), Some(service_id)) =
                                (as_u64(event.epoch), as_u64(event.serviceId))
                            else {
                                warn!("claim on {} with out-of-range epoch/service id", contract);
                                continue;
                            };
                            ledger.handle_claim(service_id, event.reward);
                            events.push(StakingEvent::new(
                                self.chain_id,
                                block_number,
                                tx_hash,
                                log_index,
                                block_timestamp,
                                contract,
                                "claim",
                                service_id,
                                epoch,
                                event.reward,
                                self.token_decimals,
                            ));
                        },
                        ParsedLog::Deposit {
                            event,
                            contract,
                            block_number,
                            log_index,
                            tx_hash,
                            block_timestamp,
                        } => {
                            if !known.contains_key(&contract) {
                                continue;
                            }
                            events.push(StakingEvent::new(
                                self.chain_id,
                                block_number,
                                tx_hash,
                                log_index,
                                block_timestamp,
                                contract,
                                "deposit",
                                0,
                                0,
                                event.amount,
                                self.token_decimals,
                            ));
                        },
                        ParsedLog::Withdraw {
                            event,
                            contract,
                            block_number,
                            log_index,
                            tx_hash,
                            block_timestamp,
                        } => {
                            if !known.contains_key(&contract) {
                                continue;
                            }
                            events.push(StakingEvent::new(
                                self.chain_id,
                                block_number,
                                tx_hash,
                                log_index,
                                block_timestamp,
                                contract,
                                "withdraw",
                                0,
                                0,
                                event.amount,
                                self.token_decimals,
                            ));
                        },
                    }
                }

                // Phase 5 -> Flush derived state to PostgreSQL.
                // IMPORTANT: any failure here aborts the run before the sync
                // checkpoint advances, so a restart replays the batch instead
                // of silently losing counter updates.
                let dirty = ledger.drain_dirty();

                if !dirty.is_empty() {
                    let services: Vec<_> = dirty.services.iter().collect();
                    let memberships: Vec<_> = dirty.memberships.iter().collect();
                    let histories: Vec<_> = dirty.histories.iter().collect();
                    let snapshots: Vec<_> = dirty.snapshots.iter().collect();

                    let (services_res, memberships_res, histories_res, snapshots_res) = tokio::join!(
                        self.db.postgres.set_services(&services),
                        self.db.postgres.set_memberships(&memberships),
                        self.db.postgres.set_reward_histories(&histories),
                        self.db.postgres.set_daily_snapshots(&snapshots),
                    );

                    services_res.context("Failed to flush services")?;
                    memberships_res.context("Failed to flush epoch memberships")?;
                    histories_res.context("Failed to flush reward histories")?;
                    snapshots_res.context("Failed to flush daily snapshots")?;

                    if let Some(global) = dirty.global.as_ref() {
                        self.db
                            .postgres
                            .set_staking_global(global)
                            .await
                            .context("Failed to flush global aggregate")?;
                    }
                }

                // Phase 6 -> Send events to ClickHouse
                // NOTE: This only queues the data. On crash, we may re-process
                // some blocks (causing duplicates in ClickHouse). This is
                // acceptable: ClickHouse's ReplacingMergeTree handles them.
                let batch = StakingBatchMessage {
                    chain_id: self.chain_id,
                    events,
                    reward_updates,
                };

                // Tip detection: use timestamp-based approach for chain-agnostic detection
                // If the latest block is within 60 seconds of current time, we're at the tip
                let current_timestamp = Utc::now().timestamp() as u64;
                let latest_block_timestamp = block_timestamps.values().max().copied().unwrap_or(0);
                let seconds_behind = current_timestamp.saturating_sub(latest_block_timestamp);
                let is_at_tip = seconds_behind < 60;

                if !batch.is_empty() {
                    if is_at_tip {
                        // Tip data also fans out to the pub/sub topics
                        self.live_sender
                            .send(IngestMessage::BatchData(batch))
                            .await?;
                    } else {
                        self.historical_sender
                            .send(IngestMessage::BatchData(batch))
                            .await?;
                    }
                }

                // Update checkpoint ONLY after PostgreSQL writes complete
                let next_block = res.next_block;
                last_synced_block = next_block;
                let checkpoint = SyncCheckpoint::new(self.chain_id, next_block);

                // Synchronously update checkpoint - errors are critical
                if let Err(e) = self.db.postgres.set_sync_checkpoint(&checkpoint).await {
                    // Don't continue if checkpoint update fails - this could cause
                    // the indexer to skip blocks on restart
                    return Err(anyhow::anyhow!(
                        "Failed to update checkpoint for chain {}: {:?}",
                        self.chain_id,
                        e
                    ));
                }

                // Drop per-batch prefetched rows; services, the global
                // aggregate and the latest snapshot stay resident
                ledger.end_batch();

                // Log progress every PROGRESS_LOG_INTERVAL seconds to reduce noise
                if last_progress_log.elapsed() >= PROGRESS_LOG_INTERVAL {
                    info!(
                        "Chain {} synced to block {} ({} services, {} staked)",
                        self.chain_id,
                        next_block,
                        ledger.global().num_services,
                        ledger.global().current_staked()
                    );
                    last_progress_log = Instant::now();
                }
            }

            // HEARTBEAT: Update checkpoint timestamp even if no new blocks/logs were processed
            // This ensures lag monitors don't trigger false positives during quiet periods.
            let checkpoint = SyncCheckpoint::new(self.chain_id, last_synced_block);
            if let Err(e) = self.db.postgres.set_sync_checkpoint(&checkpoint).await {
                warn!(
                    "Failed to update heartbeat checkpoint for chain {}: {:?}",
                    self.chain_id, e
                );
            }

            // Sleep before next poll
            tokio::time::sleep(self.tip_poll_interval).await;
        }

        Ok(())
    }
}
