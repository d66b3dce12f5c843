//! Cron scheduler for periodic background tasks.
//!
//! Runs jobs like:
//! - Refreshing per-contract aggregates (services staked, rewards distributed)
//! - Forward-filling daily snapshots over event-less days

use std::sync::Arc;

use anyhow::Result;
use log::{error, info};
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;

use crate::db::Database;

use super::jobs;

/// Cron scheduler that manages periodic background jobs.
pub struct CronScheduler {
    db: Arc<Database>,
    chain_id: u64,
    settings: Arc<CronSettings>,
}

/// Configuration for cron job intervals
#[derive(Debug, Clone)]
pub struct CronSettings {
    /// Interval for refreshing per-contract aggregates - default 15 minutes
    pub contract_stats_interval_secs: u64,
    /// Interval for the daily snapshot rollover check - default 1 hour
    pub daily_rollover_interval_secs: u64,
}

impl Default for CronSettings {
    fn default() -> Self {
        Self {
            contract_stats_interval_secs: 900,  // 15 minutes
            daily_rollover_interval_secs: 3600, // 1 hour
        }
    }
}

impl CronScheduler {
    pub fn new(db: Arc<Database>, chain_id: u64, settings: CronSettings) -> Self {
        Self {
            db,
            chain_id,
            settings: Arc::new(settings),
        }
    }

    /// Starts the cron scheduler and runs until cancellation.
    pub async fn run(&self, cancellation_token: CancellationToken) -> Result<()> {
        let mut scheduler = JobScheduler::new().await?;

        // Register all jobs
        self.register_contract_stats_job(&scheduler).await?;
        self.register_daily_rollover_job(&scheduler).await?;

        // Start the scheduler
        scheduler.start().await?;
        info!("Cron scheduler started with {} jobs", 2);

        // Wait for cancellation
        cancellation_token.cancelled().await;
        info!("Cron scheduler shutting down...");

        scheduler.shutdown().await?;
        Ok(())
    }

    async fn register_contract_stats_job(&self, scheduler: &JobScheduler) -> Result<()> {
        let db = self.db.clone();
        let chain_id = self.chain_id;
        let interval = self.settings.contract_stats_interval_secs;

        let job = Job::new_repeated_async(
            std::time::Duration::from_secs(interval),
            move |_uuid, _lock| {
                let db = db.clone();
                Box::pin(async move {
                    if let Err(e) = jobs::contract_stats::run(&db, chain_id).await {
                        error!("Failed to refresh contract stats: {:#}", e);
                    }
                })
            },
        )?;

        scheduler.add(job).await?;
        info!("Registered contract_stats job (every {}s)", interval);
        Ok(())
    }

    async fn register_daily_rollover_job(&self, scheduler: &JobScheduler) -> Result<()> {
        let db = self.db.clone();
        let chain_id = self.chain_id;
        let interval = self.settings.daily_rollover_interval_secs;

        let job = Job::new_repeated_async(
            std::time::Duration::from_secs(interval),
            move |_uuid, _lock| {
                let db = db.clone();
                Box::pin(async move {
                    if let Err(e) = jobs::daily_rollover::run(&db, chain_id).await {
                        error!("Failed to roll over daily snapshots: {:#}", e);
                    }
                })
            },
        )?;

        scheduler.add(job).await?;
        info!("Registered daily_rollover job (every {}s)", interval);
        Ok(())
    }
}
