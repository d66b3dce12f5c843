use chrono::Utc;

use crate::db::models::DailySnapshot;
use crate::utils::day_start;

use super::ledger::Ledger;

impl Ledger {
    /// Refresh the daily snapshot for the event's UTC day.
    ///
    /// The first touch of a new day seeds it from the most recent prior active
    /// day, so a gap of event-less days still reports the last known values.
    /// The recompute then reads the median tracker, which already reflects
    /// every reward applied this checkpoint.
    pub(super) fn upsert_daily_snapshot(&mut self, timestamp: u64) {
        let day = day_start(timestamp as i64);
        let chain_id = self.chain_id();

        if !self.snapshots_mut().contains_key(&day) {
            let seeded = match self.prior_snapshot(day) {
                Some(prior) => DailySnapshot::forward_filled_from(chain_id, day, prior),
                None => DailySnapshot::new(chain_id, day),
            };
            self.snapshots_mut().insert(day, seeded);
        }

        let total = self.global.total_rewards_distributed;
        let num_services = self.median.len() as u64;
        let median = self.median.median();

        if let Some(snapshot) = self.snapshots_mut().get_mut(&day) {
            snapshot.total_rewards = total;
            snapshot.num_services = num_services;
            snapshot.median_rewards_earned = median;
            snapshot.updated_at = Some(Utc::now());
        }
        self.dirty_snapshots.insert(day);

        self.global.last_active_day = Some(day);
        self.global_dirty = true;
    }

    /// The resident snapshot of the most recent active day strictly before `day`.
    fn prior_snapshot(&self, day: i64) -> Option<&DailySnapshot> {
        let last = self.global.last_active_day?;
        if last >= day {
            return None;
        }
        self.snapshot(last)
    }
}
