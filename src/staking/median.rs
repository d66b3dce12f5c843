use alloy::primitives::U256;

/// Incrementally maintained sorted array of cumulative per-service rewards.
///
/// Recomputing the median by re-sorting every service on each checkpoint is
/// O(n log n) per event; keeping the values sorted and repositioning the one
/// that changed is O(n) worst case and close to O(1) for the small deltas a
/// single checkpoint produces.
#[derive(Debug, Default)]
pub struct MedianTracker {
    values: Vec<U256>,
}

impl MedianTracker {
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Register a newly created service (cumulative rewards start at zero).
    pub fn insert(&mut self, value: U256) {
        let pos = self.values.partition_point(|v| *v < value);
        self.values.insert(pos, value);
    }

    /// Reposition a service whose cumulative rewards moved from `old` to `new`.
    pub fn update(&mut self, old: U256, new: U256) {
        if old == new {
            return;
        }
        match self.values.binary_search(&old) {
            Ok(pos) => {
                self.values.remove(pos);
            }
            // Out of sync with the service registry; recoverable by insert
            Err(_) => log::debug!("median tracker missing prior value {old}"),
        }
        self.insert(new);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Median of the tracked values. Middle element for odd counts, integer
    /// average of the two middle elements for even counts, zero when empty.
    pub fn median(&self) -> U256 {
        let n = self.values.len();
        if n == 0 {
            return U256::ZERO;
        }
        if n % 2 == 1 {
            self.values[n / 2]
        } else {
            let a = self.values[n / 2 - 1];
            let b = self.values[n / 2];
            // floor((a + b) / 2) without overflowing the intermediate sum
            (a & b) + ((a ^ b) >> 1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker_of(values: &[u64]) -> MedianTracker {
        let mut t = MedianTracker::new();
        for &v in values {
            t.insert(U256::from(v));
        }
        t
    }

    #[test]
    fn test_median_single_element() {
        assert_eq!(tracker_of(&[1000]).median(), U256::from(1000u64));
    }

    #[test]
    fn test_median_even_count_averages_middle_pair() {
        assert_eq!(tracker_of(&[1000, 3000]).median(), U256::from(2000u64));
        // integer division truncates
        assert_eq!(tracker_of(&[1, 2]).median(), U256::from(1u64));
    }

    #[test]
    fn test_median_odd_count_takes_middle() {
        assert_eq!(tracker_of(&[250, 1000, 1750]).median(), U256::from(1000u64));
        // insertion order must not matter
        assert_eq!(tracker_of(&[1750, 250, 1000]).median(), U256::from(1000u64));
    }

    #[test]
    fn test_median_empty_is_zero() {
        assert_eq!(MedianTracker::new().median(), U256::ZERO);
    }

    #[test]
    fn test_update_repositions_value() {
        let mut t = tracker_of(&[100, 200, 300]);
        t.update(U256::from(100u64), U256::from(500u64));
        assert_eq!(t.median(), U256::from(300u64));
        assert_eq!(t.len(), 3);
    }

    #[test]
    fn test_even_average_does_not_overflow() {
        let mut t = MedianTracker::new();
        t.insert(U256::MAX);
        t.insert(U256::MAX - U256::from(2u64));
        assert_eq!(t.median(), U256::MAX - U256::from(1u64));
    }
}
