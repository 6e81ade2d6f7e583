// Pairwise coordination matcher — temporal proximity within one object.
//
// Buckets arrive sorted by timestamp, so for each event we only walk forward
// while the gap is still inside the window and stop at the first event past
// it: everything later is further away. Clustered shares make this far
// cheaper than all-pairs; a bucket that fits in one window is still O(n²).

use chrono::TimeDelta;
use tracing::trace;

use super::edge::CoordinationEdge;
use crate::events::store::ObjectBucket;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairwiseCoordinationMatcher {
    window: TimeDelta,
}

impl PairwiseCoordinationMatcher {
    pub fn new(window: TimeDelta) -> Self {
        Self { window }
    }

    pub fn window(&self) -> TimeDelta {
        self.window
    }

    /// All cross-account event pairs within the window for one object.
    ///
    /// Same-account pairs are skipped. Repeated shares are not collapsed:
    /// each valid cross-account time pair is its own edge.
    pub fn match_bucket(&self, bucket: &ObjectBucket) -> Vec<CoordinationEdge> {
        let mut edges = Vec::new();
        let events = &bucket.events;

        for (i, earlier) in events.iter().enumerate() {
            for later in events.iter().skip(i + 1) {
                let gap = later.timestamp - earlier.timestamp;
                if gap > self.window {
                    break;
                }
                if later.account_id == earlier.account_id {
                    continue;
                }
                edges.push(CoordinationEdge {
                    account_a: earlier.account_id.clone(),
                    account_b: later.account_id.clone(),
                    object_id: bucket.object_id.clone(),
                    post_a: earlier.post_key(),
                    post_b: later.post_key(),
                    time_delta_ms: gap.num_milliseconds(),
                });
            }
        }

        trace!(
            object = bucket.object_id.as_str(),
            events = events.len(),
            edges = edges.len(),
            "Matched bucket"
        );
        edges
    }

    /// Match every bucket in order, concatenating their edges.
    pub fn match_all<'a>(
        &self,
        buckets: impl IntoIterator<Item = &'a ObjectBucket>,
    ) -> Vec<CoordinationEdge> {
        buckets
            .into_iter()
            .flat_map(|bucket| self.match_bucket(bucket))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::models::Event;

    fn bucket(events: Vec<Event>) -> ObjectBucket {
        let mut events = events;
        events.sort_by_key(|e| e.timestamp);
        ObjectBucket {
            object_id: "x".to_string(),
            events,
        }
    }

    #[test]
    fn test_window_is_inclusive() {
        let matcher = PairwiseCoordinationMatcher::new(TimeDelta::seconds(10));
        let edges = matcher.match_bucket(&bucket(vec![
            Event::at_secs("a", "x", 0),
            Event::at_secs("b", "x", 10),
            Event::at_secs("c", "x", 21),
        ]));
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].account_a, "a");
        assert_eq!(edges[0].account_b, "b");
        assert_eq!(edges[0].time_delta_ms, 10_000);
    }

    #[test]
    fn test_self_pairs_skipped() {
        let matcher = PairwiseCoordinationMatcher::new(TimeDelta::seconds(60));
        let edges = matcher.match_bucket(&bucket(vec![
            Event::at_secs("a", "x", 0),
            Event::at_secs("a", "x", 1),
            Event::at_secs("a", "x", 2),
        ]));
        assert!(edges.is_empty());
    }

    #[test]
    fn test_repeats_produce_one_edge_per_time_pair() {
        // a posts twice, b once, all within the window: (a0,b) and (a1,b)
        let matcher = PairwiseCoordinationMatcher::new(TimeDelta::seconds(10));
        let edges = matcher.match_bucket(&bucket(vec![
            Event::at_secs("a", "x", 0),
            Event::at_secs("a", "x", 2),
            Event::at_secs("b", "x", 5),
        ]));
        assert_eq!(edges.len(), 2);
        assert!(edges.iter().all(|e| e.account_a == "a" && e.account_b == "b"));
    }

    #[test]
    fn test_stops_after_window_but_continues_from_next_event() {
        let matcher = PairwiseCoordinationMatcher::new(TimeDelta::seconds(5));
        let edges = matcher.match_bucket(&bucket(vec![
            Event::at_secs("a", "x", 0),
            Event::at_secs("b", "x", 100),
            Event::at_secs("c", "x", 103),
        ]));
        assert_eq!(edges.len(), 1);
        assert_eq!((edges[0].account_a.as_str(), edges[0].account_b.as_str()), ("b", "c"));
    }
}
