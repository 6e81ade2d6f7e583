// Repetition filter — drop objects too few accounts shared to ever matter.
//
// Runs before any timestamp work. Counting distinct accounts is O(n) per
// object; the matcher is O(n²) worst case.

use tracing::debug;

use crate::events::store::ObjectBucket;

/// Objects with fewer distinct accounts than this cannot produce an edge.
pub const MIN_ACCOUNTS_FOR_EDGE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepetitionFilter {
    min_repetition: usize,
}

/// Buckets that survived, plus how many did not.
#[derive(Debug, Clone, Default)]
pub struct FilterOutcome<'a> {
    pub kept: Vec<&'a ObjectBucket>,
    pub dropped: usize,
}

impl RepetitionFilter {
    pub fn new(min_repetition: usize) -> Self {
        Self { min_repetition }
    }

    /// The threshold actually applied, never below two.
    pub fn threshold(&self) -> usize {
        self.min_repetition.max(MIN_ACCOUNTS_FOR_EDGE)
    }

    pub fn qualifies(&self, bucket: &ObjectBucket) -> bool {
        bucket.distinct_accounts() >= self.threshold()
    }

    /// Keep the buckets whose distinct-account count meets the threshold.
    ///
    /// Input order is preserved.
    pub fn apply<'a>(&self, buckets: &'a [ObjectBucket]) -> FilterOutcome<'a> {
        let kept: Vec<&ObjectBucket> = buckets.iter().filter(|b| self.qualifies(b)).collect();
        let dropped = buckets.len() - kept.len();
        debug!(
            threshold = self.threshold(),
            kept = kept.len(),
            dropped,
            "Repetition filter applied"
        );
        FilterOutcome { kept, dropped }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::models::Event;

    fn bucket(object_id: &str, accounts: &[&str]) -> ObjectBucket {
        ObjectBucket {
            object_id: object_id.to_string(),
            events: accounts
                .iter()
                .enumerate()
                .map(|(i, a)| Event::at_secs(*a, object_id, i as i64))
                .collect(),
        }
    }

    #[test]
    fn test_counts_distinct_accounts_not_events() {
        let filter = RepetitionFilter::new(3);
        let spammy = bucket("x", &["a", "a", "a", "b"]);
        let spread = bucket("y", &["a", "b", "c"]);
        assert!(!filter.qualifies(&spammy));
        assert!(filter.qualifies(&spread));
    }

    #[test]
    fn test_single_account_always_dropped() {
        let filter = RepetitionFilter::new(0);
        assert_eq!(filter.threshold(), 2);
        assert!(!filter.qualifies(&bucket("x", &["a", "a"])));
    }

    #[test]
    fn test_apply_preserves_order() {
        let buckets = vec![
            bucket("a", &["u1", "u2"]),
            bucket("b", &["u1"]),
            bucket("c", &["u3", "u4"]),
        ];
        let outcome = RepetitionFilter::new(2).apply(&buckets);
        let ids: Vec<&str> = outcome.kept.iter().map(|b| b.object_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(outcome.dropped, 1);
    }
}
