use chrono::{DateTime, Utc};

/// The set of services staked on one contract during one epoch (PostgreSQL).
///
/// Primary Key: (chain_id, contract, epoch)
///
/// Membership is a set: the ids vector is kept sorted and deduplicated so that
/// add/remove are idempotent and the checkpoint roll-forward union is cheap.
/// Records are never deleted; past epochs remain as an audit trail.
#[derive(Debug, Clone)]
pub struct EpochMembership {
    pub chain_id: u64,
    pub contract: String,
    pub epoch: u64,
    /// Sorted, deduplicated service ids.
    pub service_ids: Vec<u64>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl EpochMembership {
    pub fn new(chain_id: u64, contract: String, epoch: u64) -> Self {
        Self {
            chain_id,
            contract,
            epoch,
            service_ids: Vec::new(),
            updated_at: None,
        }
    }

    /// Idempotent set insertion, preserving sort order.
    pub fn add(&mut self, service_id: u64) {
        if let Err(pos) = self.service_ids.binary_search(&service_id) {
            self.service_ids.insert(pos, service_id);
            self.updated_at = Some(Utc::now());
        }
    }

    /// Idempotent set removal; no-op if the id is absent.
    pub fn remove(&mut self, service_id: u64) {
        if let Ok(pos) = self.service_ids.binary_search(&service_id) {
            self.service_ids.remove(pos);
            self.updated_at = Some(Utc::now());
        }
    }

    pub fn contains(&self, service_id: u64) -> bool {
        self.service_ids.binary_search(&service_id).is_ok()
    }

    /// Union-merge another epoch's member set into this one.
    ///
    /// Used by the checkpoint roll-forward: services that staked directly into
    /// the next epoch before the checkpoint fired must survive the carry-over,
    /// and carried-over services must not be dropped by the early stakers.
    pub fn merge_from(&mut self, other: &[u64]) {
        for &id in other {
            self.add(id);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.service_ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.service_ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_is_idempotent_and_sorted() {
        let mut m = EpochMembership::new(1, "0xabc".into(), 3);
        m.add(7);
        m.add(2);
        m.add(7);
        m.add(5);
        assert_eq!(m.service_ids, vec![2, 5, 7]);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut m = EpochMembership::new(1, "0xabc".into(), 3);
        m.add(2);
        m.remove(9);
        m.remove(2);
        m.remove(2);
        assert!(m.is_empty());
    }

    #[test]
    fn test_merge_deduplicates() {
        let mut next = EpochMembership::new(1, "0xabc".into(), 4);
        next.add(10);
        next.add(3);
        next.merge_from(&[3, 5, 10, 11]);
        assert_eq!(next.service_ids, vec![3, 5, 10, 11]);
    }
}
