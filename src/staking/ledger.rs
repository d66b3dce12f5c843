use alloy::primitives::U256;
use chrono::Utc;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::db::models::{DailySnapshot, EpochMembership, RewardHistory, Service, StakingGlobal};

use super::median::MedianTracker;

/// (contract address, epoch)
pub type MembershipKey = (String, u64);
/// (service id, contract address, epoch)
pub type HistoryKey = (u64, String, u64);

/// Dirty entities accumulated since the last flush, cloned out for persistence.
#[derive(Debug, Default)]
pub struct DirtyBatch {
    pub services: Vec<Service>,
    pub memberships: Vec<EpochMembership>,
    pub histories: Vec<RewardHistory>,
    pub snapshots: Vec<DailySnapshot>,
    pub global: Option<StakingGlobal>,
}

impl DirtyBatch {
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
            && self.memberships.is_empty()
            && self.histories.is_empty()
            && self.snapshots.is_empty()
            && self.global.is_none()
    }
}

/// In-memory staking reward ledger, the single writer of all derived state.
///
/// The worker seeds services and the global aggregate at startup, prefetches
/// the memberships and reward histories each batch touches, then applies the
/// batch's events through the handlers below. Handlers are synchronous and
/// never fail: a malformed or stale event degrades only its own data point
/// (logged and skipped), never the stream.
pub struct Ledger {
    chain_id: u64,

    services: FxHashMap<u64, Service>,
    memberships: FxHashMap<MembershipKey, EpochMembership>,
    histories: FxHashMap<HistoryKey, RewardHistory>,
    snapshots: FxHashMap<i64, DailySnapshot>,
    pub(super) global: StakingGlobal,

    /// Sorted view of every service's cumulative earned rewards.
    pub(super) median: MedianTracker,

    dirty_services: FxHashSet<u64>,
    dirty_memberships: FxHashSet<MembershipKey>,
    dirty_histories: FxHashSet<HistoryKey>,
    pub(super) dirty_snapshots: FxHashSet<i64>,
    pub(super) global_dirty: bool,
}

impl Ledger {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            services: FxHashMap::default(),
            memberships: FxHashMap::default(),
            histories: FxHashMap::default(),
            snapshots: FxHashMap::default(),
            global: StakingGlobal::new(chain_id),
            median: MedianTracker::new(),
            dirty_services: FxHashSet::default(),
            dirty_memberships: FxHashSet::default(),
            dirty_histories: FxHashSet::default(),
            dirty_snapshots: FxHashSet::default(),
            global_dirty: false,
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    // ============================================
    // Startup seeding / per-batch prefetch
    // ============================================

    /// Load a persisted service into the ledger without marking it dirty.
    pub fn seed_service(&mut self, service: Service) {
        self.median.insert(service.olas_rewards_earned);
        self.services.insert(service.service_id, service);
    }

    pub fn seed_global(&mut self, global: StakingGlobal) {
        self.global = global;
    }

    pub fn seed_snapshot(&mut self, snapshot: DailySnapshot) {
        self.snapshots.insert(snapshot.day, snapshot);
    }

    /// Insert a prefetched membership row for the current batch.
    pub fn load_membership(&mut self, membership: EpochMembership) {
        if membership.chain_id != self.chain_id {
            log::error!(
                "membership for chain {} loaded into chain {} ledger, dropping",
                membership.chain_id,
                self.chain_id
            );
            return;
        }
        let key = (membership.contract.clone(), membership.epoch);
        self.memberships.entry(key).or_insert(membership);
    }

    /// Insert a prefetched reward history row for the current batch.
    pub fn load_history(&mut self, history: RewardHistory) {
        if history.chain_id != self.chain_id {
            log::error!(
                "reward history for chain {} loaded into chain {} ledger, dropping",
                history.chain_id,
                self.chain_id
            );
            return;
        }
        let key = (history.service_id, history.contract.clone(), history.epoch);
        self.histories.entry(key).or_insert(history);
    }

    // ============================================
    // Event handlers
    // ============================================

    /// A service staked into `epoch` on `contract`.
    ///
    /// `deposit` is the valuation of the locked stake, None when the contract's
    /// parameters could not be read at instance creation; the global staked
    /// total is left untouched in that case rather than guessed.
    pub fn handle_stake(&mut self, contract: &str, epoch: u64, service_id: u64, deposit: Option<U256>) {
        let service = self.service_mut(service_id);
        service.latest_staking_contract = Some(contract.to_string());
        service.total_epochs_participated += 1;
        service.updated_at = Some(Utc::now());
        self.dirty_services.insert(service_id);

        self.membership_mut(contract, epoch).add(service_id);
        self.dirty_memberships.insert((contract.to_string(), epoch));

        // One history row exists per (service, contract, epoch) from the first
        // stake onward; the checkpoint finalizes its amount later.
        self.history_mut(service_id, contract, epoch);
        self.dirty_histories.insert((service_id, contract.to_string(), epoch));

        if let Some(amount) = deposit {
            self.global.add_staked(amount);
            self.global_dirty = true;
        }
    }

    /// A service unstaked (voluntarily or forced), taking `reward` with it.
    pub fn handle_unstake(
        &mut self,
        contract: &str,
        epoch: u64,
        service_id: u64,
        reward: U256,
        deposit: Option<U256>,
    ) {
        let Some(service) = self.services.get_mut(&service_id) else {
            log::warn!("unstake for unknown service {service_id} on {contract}, skipping");
            return;
        };
        service.add_claimed(reward);
        service.latest_staking_contract = None;
        self.dirty_services.insert(service_id);

        self.membership_mut(contract, epoch).remove(service_id);
        self.dirty_memberships.insert((contract.to_string(), epoch));

        if let Some(amount) = deposit {
            self.global.add_unstaked(amount);
            self.global_dirty = true;
        }
    }

    /// A service claimed accrued rewards without unstaking.
    pub fn handle_claim(&mut self, service_id: u64, reward: U256) {
        let Some(service) = self.services.get_mut(&service_id) else {
            log::warn!("claim for unknown service {service_id}, skipping");
            return;
        };
        service.add_claimed(reward);
        self.dirty_services.insert(service_id);
    }

    /// Services evicted for failing liveness checks. Removes them from the
    /// current epoch's membership only; history already written stays.
    pub fn handle_evictions(&mut self, contract: &str, epoch: u64, service_ids: &[u64]) {
        let membership = self.membership_mut(contract, epoch);
        for &id in service_ids {
            membership.remove(id);
        }
        self.dirty_memberships.insert((contract.to_string(), epoch));
    }

    // ============================================
    // Internal access
    // ============================================

    /// Load-or-create a service record. New services register a zero entry in
    /// the median tracker and bump the global count.
    pub(super) fn service_mut(&mut self, service_id: u64) -> &mut Service {
        if !self.services.contains_key(&service_id) {
            self.median.insert(U256::ZERO);
            self.global.num_services += 1;
            self.global_dirty = true;
            self.dirty_services.insert(service_id);
        }
        self.services
            .entry(service_id)
            .or_insert_with(|| Service::new(self.chain_id, service_id))
    }

    pub fn service(&self, service_id: u64) -> Option<&Service> {
        self.services.get(&service_id)
    }

    pub(super) fn membership_mut(&mut self, contract: &str, epoch: u64) -> &mut EpochMembership {
        let key = (contract.to_string(), epoch);
        self.memberships
            .entry(key)
            .or_insert_with(|| EpochMembership::new(self.chain_id, contract.to_string(), epoch))
    }

    pub fn membership(&self, contract: &str, epoch: u64) -> Option<&EpochMembership> {
        self.memberships.get(&(contract.to_string(), epoch))
    }

    pub(super) fn history_mut(&mut self, service_id: u64, contract: &str, epoch: u64) -> &mut RewardHistory {
        let key = (service_id, contract.to_string(), epoch);
        self.histories.entry(key).or_insert_with(|| {
            RewardHistory::new(self.chain_id, service_id, contract.to_string(), epoch)
        })
    }

    pub fn history(&self, service_id: u64, contract: &str, epoch: u64) -> Option<&RewardHistory> {
        self.histories.get(&(service_id, contract.to_string(), epoch))
    }

    pub fn snapshot(&self, day: i64) -> Option<&DailySnapshot> {
        self.snapshots.get(&day)
    }

    pub(super) fn snapshots_mut(&mut self) -> &mut FxHashMap<i64, DailySnapshot> {
        &mut self.snapshots
    }

    pub fn global(&self) -> &StakingGlobal {
        &self.global
    }

    /// Apply a checkpointed reward, keeping the median tracker in sync.
    pub(super) fn add_earned_tracked(&mut self, service_id: u64, reward: U256) {
        if let Some(service) = self.services.get_mut(&service_id) {
            let old = service.olas_rewards_earned;
            service.add_earned(reward);
            self.median.update(old, service.olas_rewards_earned);
            self.dirty_services.insert(service_id);
        }
    }

    pub(super) fn mark_membership_dirty(&mut self, contract: &str, epoch: u64) {
        self.dirty_memberships.insert((contract.to_string(), epoch));
    }

    pub(super) fn mark_history_dirty(&mut self, service_id: u64, contract: &str, epoch: u64) {
        self.dirty_histories.insert((service_id, contract.to_string(), epoch));
    }

    // ============================================
    // Flush
    // ============================================

    /// Clone out everything mutated since the last flush and reset dirty sets.
    pub fn drain_dirty(&mut self) -> DirtyBatch {
        let mut batch = DirtyBatch::default();

        for id in self.dirty_services.drain() {
            if let Some(s) = self.services.get(&id) {
                batch.services.push(s.clone());
            }
        }
        for key in self.dirty_memberships.drain() {
            if let Some(m) = self.memberships.get(&key) {
                batch.memberships.push(m.clone());
            }
        }
        for key in self.dirty_histories.drain() {
            if let Some(h) = self.histories.get(&key) {
                batch.histories.push(h.clone());
            }
        }
        for day in self.dirty_snapshots.drain() {
            if let Some(s) = self.snapshots.get(&day) {
                batch.snapshots.push(s.clone());
            }
        }
        if self.global_dirty {
            batch.global = Some(self.global.clone());
            self.global_dirty = false;
        }

        batch
    }

    /// Drop per-batch prefetched state after a successful flush. Services, the
    /// global aggregate and the most recent snapshot stay resident.
    pub fn end_batch(&mut self) {
        self.memberships.clear();
        self.histories.clear();
        let keep = self.global.last_active_day;
        self.snapshots.retain(|day, _| Some(*day) == keep);
    }
}
