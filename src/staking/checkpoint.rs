use alloy::primitives::U256;
use rustc_hash::FxHashSet;

use super::ledger::Ledger;

/// Summary of one processed checkpoint, used by the worker to build the
/// append-only reward-update audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointOutcome {
    pub total_rewards: U256,
    pub num_services_rewarded: u64,
}

impl Ledger {
    /// Finalize reward distribution for one epoch on one contract.
    ///
    /// `service_ids` and `rewards` are the event's parallel arrays, aligned
    /// 1:1 by index with no ordering guarantee on the ids. The steps are:
    /// attribute rewards to the listed services, backfill explicit zero rows
    /// for members that failed their KPI, roll membership forward into the
    /// next epoch as a union, then update the global total and the daily
    /// median snapshot.
    pub fn process_checkpoint(
        &mut self,
        contract: &str,
        epoch: u64,
        service_ids: &[u64],
        rewards: &[U256],
        timestamp: u64,
    ) -> CheckpointOutcome {
        if service_ids.len() != rewards.len() {
            log::warn!(
                "checkpoint on {contract} epoch {epoch}: {} ids vs {} rewards, \
                 processing the aligned prefix",
                service_ids.len(),
                rewards.len()
            );
        }

        let members = match self.membership(contract, epoch) {
            Some(m) => m.service_ids.clone(),
            None => {
                if !service_ids.is_empty() {
                    // Rewards with no tracked stake means the tracker drifted;
                    // still attribute them below.
                    log::warn!(
                        "checkpoint on {contract} epoch {epoch} rewards {} services \
                         but no membership is tracked",
                        service_ids.len()
                    );
                }
                Vec::new()
            }
        };

        let mut total = U256::ZERO;
        let mut num_rewarded: u64 = 0;
        let mut seen: FxHashSet<u64> = FxHashSet::default();

        for (&service_id, &reward) in service_ids.iter().zip(rewards.iter()) {
            if !seen.insert(service_id) {
                log::warn!(
                    "checkpoint on {contract} epoch {epoch}: duplicate reward entry \
                     for service {service_id}, keeping the first"
                );
                continue;
            }
            if self.service(service_id).is_none() {
                log::warn!(
                    "checkpoint on {contract} epoch {epoch} rewards unknown \
                     service {service_id}, skipping"
                );
                continue;
            }
            if members.binary_search(&service_id).is_err() {
                log::warn!(
                    "checkpoint on {contract} epoch {epoch} rewards service \
                     {service_id} outside the tracked membership"
                );
            }

            if self.history_mut(service_id, contract, epoch).finalize(reward) {
                log::warn!(
                    "reward history for service {service_id} on {contract} epoch \
                     {epoch} finalized twice, overwriting"
                );
            }
            self.mark_history_dirty(service_id, contract, epoch);
            self.add_earned_tracked(service_id, reward);

            total = total.saturating_add(reward);
            num_rewarded += 1;
        }

        // Members that did not meet their KPI get an explicit zero row, unless
        // they have since migrated to another contract: a stale checkpoint
        // must not contaminate the new contract's history with spurious zeros.
        for &service_id in &members {
            if seen.contains(&service_id) {
                continue;
            }
            let still_here = self
                .service(service_id)
                .and_then(|s| s.latest_staking_contract.as_deref())
                .is_some_and(|c| c == contract);
            if !still_here {
                log::debug!(
                    "service {service_id} migrated off {contract}, no zero row \
                     for epoch {epoch}"
                );
                continue;
            }
            if self.history_mut(service_id, contract, epoch).finalize(U256::ZERO) {
                log::warn!(
                    "reward history for service {service_id} on {contract} epoch \
                     {epoch} finalized twice, overwriting"
                );
            }
            self.mark_history_dirty(service_id, contract, epoch);
        }

        // Union roll-forward: services that staked directly into epoch + 1
        // before this checkpoint fired must survive the carry-over.
        if !members.is_empty() {
            self.membership_mut(contract, epoch + 1).merge_from(&members);
            self.mark_membership_dirty(contract, epoch + 1);
        }

        self.global.add_rewards(total);
        self.global_dirty = true;
        self.upsert_daily_snapshot(timestamp);

        CheckpointOutcome {
            total_rewards: total,
            num_services_rewarded: num_rewarded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::day_start;

    const C1: &str = "0xaaa1";
    const C2: &str = "0xbbb2";
    const DAY1_NOON: u64 = 1705319100; // 2024-01-15 ~11:45 UTC
    const DEPOSIT: Option<U256> = Some(U256::from_limbs([100, 0, 0, 0]));

    fn u(v: u64) -> U256 {
        U256::from(v)
    }

    #[test]
    fn test_roll_forward_is_union_not_overwrite() {
        let mut ledger = Ledger::new(1);
        ledger.handle_stake(C1, 4, 1, DEPOSIT);
        ledger.handle_stake(C1, 4, 2, DEPOSIT);
        // service 3 stakes directly into the next epoch before the checkpoint
        ledger.handle_stake(C1, 5, 3, DEPOSIT);

        ledger.process_checkpoint(C1, 4, &[1, 2], &[u(10), u(20)], DAY1_NOON);

        let next = ledger.membership(C1, 5).expect("next epoch membership");
        assert_eq!(next.service_ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_zero_reward_backfill_for_unrewarded_members() {
        let mut ledger = Ledger::new(1);
        ledger.handle_stake(C1, 7, 1, DEPOSIT);
        ledger.handle_stake(C1, 7, 2, DEPOSIT);

        ledger.process_checkpoint(C1, 7, &[1], &[u(500)], DAY1_NOON);

        let rewarded = ledger.history(1, C1, 7).expect("rewarded row");
        assert_eq!(rewarded.reward, u(500));
        assert!(rewarded.finalized);

        let zeroed = ledger.history(2, C1, 7).expect("zero row");
        assert_eq!(zeroed.reward, U256::ZERO);
        assert!(zeroed.finalized);
    }

    #[test]
    fn test_cumulative_counters_never_decrease() {
        let mut ledger = Ledger::new(1);
        ledger.handle_stake(C1, 1, 9, DEPOSIT);
        ledger.process_checkpoint(C1, 1, &[9], &[u(300)], DAY1_NOON);
        ledger.handle_unstake(C1, 2, 9, u(300), DEPOSIT);
        ledger.handle_stake(C1, 3, 9, DEPOSIT);
        ledger.process_checkpoint(C1, 3, &[9], &[u(50)], DAY1_NOON);
        ledger.handle_claim(9, u(50));

        let service = ledger.service(9).expect("service");
        assert_eq!(service.olas_rewards_earned, u(350));
        assert_eq!(service.olas_rewards_claimed, u(350));
        assert_eq!(ledger.global().total_rewards_distributed, u(350));
    }

    #[test]
    fn test_migrated_service_gets_no_zero_row() {
        let mut ledger = Ledger::new(1);
        ledger.handle_stake(C1, 2, 1, DEPOSIT);
        ledger.handle_stake(C1, 2, 2, DEPOSIT);
        // service 2 leaves contract 1 and stakes on contract 2, but the
        // eviction/unstake path on contract 1 never fired so it is still in
        // contract 1's tracked set for epoch 2
        ledger.service_mut(2).latest_staking_contract = Some(C2.to_string());

        ledger.process_checkpoint(C1, 2, &[1], &[u(100)], DAY1_NOON);

        assert!(ledger.history(1, C1, 2).is_some_and(|h| h.finalized));
        // no spurious zero row written for the migrated service
        assert!(ledger.history(2, C1, 2).is_none_or(|h| !h.finalized));
    }

    #[test]
    fn test_unknown_rewarded_service_is_skipped() {
        let mut ledger = Ledger::new(1);
        ledger.handle_stake(C1, 1, 1, DEPOSIT);

        let outcome = ledger.process_checkpoint(C1, 1, &[1, 999], &[u(10), u(90)], DAY1_NOON);

        assert_eq!(outcome.num_services_rewarded, 1);
        assert_eq!(outcome.total_rewards, u(10));
        assert!(ledger.service(999).is_none());
    }

    #[test]
    fn test_snapshot_updates_with_checkpoint() {
        let mut ledger = Ledger::new(1);
        ledger.handle_stake(C1, 1, 1, DEPOSIT);
        ledger.handle_stake(C1, 1, 2, DEPOSIT);
        ledger.handle_stake(C1, 1, 3, DEPOSIT);

        ledger.process_checkpoint(C1, 1, &[1, 2, 3], &[u(250), u(1000), u(1750)], DAY1_NOON);

        let day = day_start(DAY1_NOON as i64);
        let snap = ledger.snapshot(day).expect("snapshot for event day");
        assert_eq!(snap.num_services, 3);
        assert_eq!(snap.median_rewards_earned, u(1000));
        assert_eq!(snap.total_rewards, u(3000));
        assert_eq!(ledger.global().last_active_day, Some(day));
    }

    #[test]
    fn test_event_less_day_forward_fills_prior_values() {
        let mut ledger = Ledger::new(1);
        ledger.handle_stake(C1, 1, 1, DEPOSIT);
        ledger.handle_stake(C1, 1, 2, DEPOSIT);
        ledger.process_checkpoint(C1, 1, &[1, 2], &[u(1000), u(3000)], DAY1_NOON);

        // three days later a checkpoint fires with empty reward arrays; the
        // new day's snapshot must carry the last known values, not zeros
        let later = DAY1_NOON + 3 * 86_400;
        ledger.process_checkpoint(C1, 2, &[], &[], later);

        let snap = ledger.snapshot(day_start(later as i64)).expect("snapshot");
        assert_eq!(snap.num_services, 2);
        assert_eq!(snap.median_rewards_earned, u(2000));
        assert_eq!(snap.total_rewards, u(4000));
    }

    #[test]
    fn test_refinalized_epoch_overwrites_instead_of_summing() {
        let mut ledger = Ledger::new(1);
        ledger.handle_stake(C1, 1, 1, DEPOSIT);
        ledger.process_checkpoint(C1, 1, &[1], &[u(100)], DAY1_NOON);
        // redelivered checkpoint for an already finalized epoch
        ledger.process_checkpoint(C1, 1, &[1], &[u(40)], DAY1_NOON);

        let row = ledger.history(1, C1, 1).expect("history row");
        assert_eq!(row.reward, u(40));
        assert!(row.finalized);
    }

    #[test]
    fn test_replay_from_checkpoint_on_reseeded_ledger() {
        // first batch flushed successfully
        let mut ledger = Ledger::new(1);
        ledger.handle_stake(C1, 1, 1, DEPOSIT);
        ledger.process_checkpoint(C1, 1, &[1], &[u(100)], DAY1_NOON);
        let persisted = ledger.drain_dirty();

        // second batch applied in memory but its flush failed; the worker
        // tears the ledger down, reseeds from the persisted rows and replays
        ledger.process_checkpoint(C1, 2, &[1], &[u(50)], DAY1_NOON);
        let _ = ledger.drain_dirty();

        let mut reseeded = Ledger::new(1);
        for service in persisted.services {
            reseeded.seed_service(service);
        }
        if let Some(global) = persisted.global {
            reseeded.seed_global(global);
        }
        reseeded.process_checkpoint(C1, 2, &[1], &[u(50)], DAY1_NOON);

        let service = reseeded.service(1).expect("service");
        assert_eq!(service.olas_rewards_earned, u(150));
        assert_eq!(reseeded.global().total_rewards_distributed, u(150));
        assert_eq!(reseeded.global().num_services, 1);
    }

    #[test]
    fn test_restake_and_migration_end_to_end() {
        let mut ledger = Ledger::new(1);

        ledger.handle_stake(C1, 1, 1, DEPOSIT);
        ledger.process_checkpoint(C1, 1, &[], &[], DAY1_NOON);
        ledger.handle_unstake(C1, 3, 1, U256::ZERO, DEPOSIT);
        ledger.handle_stake(C1, 5, 1, DEPOSIT);
        ledger.process_checkpoint(C1, 5, &[1], &[u(1000)], DAY1_NOON);
        ledger.handle_stake(C2, 6, 1, DEPOSIT);
        ledger.process_checkpoint(C2, 6, &[1], &[u(500)], DAY1_NOON);

        let service = ledger.service(1).expect("service");
        assert_eq!(service.total_epochs_participated, 3);
        assert_eq!(service.olas_rewards_earned, u(1500));
        assert_eq!(service.olas_rewards_claimed, U256::ZERO);
        assert_eq!(service.latest_staking_contract.as_deref(), Some(C2));
    }
}
