use anyhow::Context;
use log::info;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::db::{
    clickhouse::client::BatchIngestor,
    models::{RewardUpdate, StakingEvent},
};

/// Batch of append-only rows from the indexer to be inserted into ClickHouse.
/// Also used for Redpanda pub/sub streaming of live data at chain tip.
#[derive(Debug, Clone)]
pub struct StakingBatchMessage {
    /// Chain ID for this batch (used for Redpanda topic partitioning)
    pub chain_id: u64,
    pub events: Vec<StakingEvent>,
    pub reward_updates: Vec<RewardUpdate>,
}

impl StakingBatchMessage {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.reward_updates.is_empty()
    }
}

pub enum IngestMessage {
    /// Real-time batch data from indexer
    BatchData(StakingBatchMessage),
    /// Shutdown signal
    Shutdown,
}

impl BatchIngestor {
    pub async fn run(mut self, cancellation_token: CancellationToken) -> anyhow::Result<()> {
        loop {
            // Sleep until the next time-based commit is due, across inserters
            let sleep_duration = self.min_time_left().unwrap_or(Duration::from_secs(1));

            tokio::select! {
                biased; // Check cancellation first

                _ = cancellation_token.cancelled() => {
                    info!("[{}] Batch inserter received cancellation signal", self.label);
                    self.end_all().await?;
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(IngestMessage::BatchData(batch)) => {
                            for event in &batch.events {
                                self.staking_event_inserter.write(event).await
                                    .context("Failed to write staking event")?;
                            }

                            for update in &batch.reward_updates {
                                self.reward_update_inserter.write(update).await
                                    .context("Failed to write reward update")?;
                            }

                            // Publish to Redpanda if enabled (fire-and-forget)
                            if let Some(ref publisher) = self.redpanda_publisher {
                                publisher.publish_batch(batch.chain_id, &batch).await;
                            }

                            // Commit checks thresholds and flushes if needed
                            self.commit_all().await?;
                        }
                        Some(IngestMessage::Shutdown) => {
                            info!("[{}] Batch inserter received shutdown signal", self.label);
                            self.end_all().await?;
                            break;
                        }
                        None => {
                            info!("[{}] Batch inserter channel closed", self.label);
                            self.end_all().await?;
                            break;
                        }
                    }
                }

                // Periodic commit check - the inserters handle time-based flushing internally
                _ = tokio::time::sleep(sleep_duration) => {
                    self.commit_all().await?;
                }
            }
        }

        info!("[{}] Batch inserter stopped", self.label);
        Ok(())
    }

    /// Get the minimum time_left across all inserters
    fn min_time_left(&mut self) -> Option<Duration> {
        [
            self.staking_event_inserter.time_left(),
            self.reward_update_inserter.time_left(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Commit all inserters - checks thresholds and flushes if needed
    async fn commit_all(&mut self) -> anyhow::Result<()> {
        let event_stats = self.staking_event_inserter.commit().await?;
        let update_stats = self.reward_update_inserter.commit().await?;

        let total_rows = event_stats.rows + update_stats.rows;
        let total_transactions = event_stats.transactions + update_stats.transactions;

        if total_transactions > 0 {
            let mut parts = Vec::new();
            if event_stats.rows > 0 {
                parts.push(format!("StakingEvents:{}", event_stats.rows));
            }
            if update_stats.rows > 0 {
                parts.push(format!("RewardUpdates:{}", update_stats.rows));
            }

            info!(
                "[{}] Committed {} rows in {} txns [{}]",
                self.label,
                total_rows,
                total_transactions,
                parts.join(" ")
            );
        }

        Ok(())
    }

    /// Force end all inserters - used on shutdown
    async fn end_all(&mut self) -> anyhow::Result<()> {
        // Force commit any remaining data
        let _ = self.staking_event_inserter.force_commit().await;
        let _ = self.reward_update_inserter.force_commit().await;

        info!("[{}] All inserters flushed", self.label);
        Ok(())
    }
}
