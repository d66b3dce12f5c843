//! Job to forward-fill daily snapshots over event-less days.
//!
//! The worker only writes a snapshot when a checkpoint lands, so a quiet chain
//! leaves gaps in the daily series. This job copies the last active day's
//! values into every missing day up to yesterday, keeping the series
//! continuous for downstream consumers.

use anyhow::Result;
use log::{info, warn};

use crate::db::{models::DailySnapshot, Database};
use crate::utils::{day_start, next_day};

const JOB_NAME: &str = "daily_rollover";

/// Seconds in one UTC day.
const DAY_SECS: i64 = 86_400;

pub async fn run(db: &Database, chain_id: u64) -> Result<()> {
    let start = std::time::Instant::now();
    let now = time::OffsetDateTime::now_utc();

    // At most one fill per UTC day; the writes are idempotent upserts but
    // there is no point repeating them every interval
    if let Some(last_run) = db.postgres.get_cron_checkpoint(JOB_NAME).await? {
        if day_start(last_run.unix_timestamp()) == day_start(now.unix_timestamp()) {
            return Ok(());
        }
    }

    let Some(global) = db.postgres.get_staking_global(chain_id).await? else {
        // Nothing indexed yet
        db.postgres.set_cron_checkpoint(JOB_NAME, now).await?;
        return Ok(());
    };
    let Some(last_active_day) = global.last_active_day else {
        db.postgres.set_cron_checkpoint(JOB_NAME, now).await?;
        return Ok(());
    };

    // Fill closed days only; today stays owned by the worker, which seeds it
    // from the last active day when the next checkpoint arrives
    let yesterday = day_start(now.unix_timestamp()) - DAY_SECS;
    if last_active_day >= yesterday {
        db.postgres.set_cron_checkpoint(JOB_NAME, now).await?;
        return Ok(());
    }

    let Some(prior) = db.postgres.get_daily_snapshot(chain_id, last_active_day).await? else {
        warn!(
            "Chain {}: last active day {} has no snapshot row, skipping rollover",
            chain_id, last_active_day
        );
        return Ok(());
    };

    let mut filled: Vec<DailySnapshot> = Vec::new();
    let mut day = next_day(last_active_day);
    while day <= yesterday {
        filled.push(DailySnapshot::forward_filled_from(chain_id, day, &prior));
        day += DAY_SECS;
    }

    let refs: Vec<&DailySnapshot> = filled.iter().collect();
    db.postgres.set_daily_snapshots(&refs).await?;
    db.postgres.set_cron_checkpoint(JOB_NAME, now).await?;

    info!(
        "Chain {}: forward-filled {} daily snapshots in {:?}",
        chain_id,
        filled.len(),
        start.elapsed()
    );
    Ok(())
}
