// Statistics aggregation — read-only views over the finished graph and groups.
//
// Pure: nothing here mutates its inputs or touches the outside world. The
// only failure is an empty event set, which is distinct from "events but no
// coordination" (a valid, empty result).

pub mod groups;
pub mod objects;
pub mod users;

use serde::{Deserialize, Serialize};

use crate::detection::graph::CoordinationGraph;
use crate::detection::groups::GroupExtraction;
use crate::error::DetectionError;
use crate::events::models::Event;

pub use groups::{GroupStatistics, ObjectCount};
pub use objects::ObjectStatistics;
pub use users::UserStatistics;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub users: Vec<UserStatistics>,
    pub groups: Vec<GroupStatistics>,
    pub objects: Vec<ObjectStatistics>,
}

impl Statistics {
    pub fn user(&self, account_id: &str) -> Option<&UserStatistics> {
        self.users
            .binary_search_by(|u| u.account_id.as_str().cmp(account_id))
            .ok()
            .and_then(|i| self.users.get(i))
    }
}

/// Compute user, group and object statistics.
pub fn aggregate(
    graph: &CoordinationGraph,
    groups: &GroupExtraction,
    events: &[Event],
) -> Result<Statistics, DetectionError> {
    if events.is_empty() {
        return Err(DetectionError::EmptyInput);
    }
    Ok(Statistics {
        users: users::user_statistics(graph, groups, events),
        groups: groups::group_statistics(graph, groups),
        objects: objects::object_statistics(graph),
    })
}

fn mean_secs(total_ms: i64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        total_ms as f64 / count as f64 / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WeightPolicy;
    use crate::detection::groups::GroupExtractor;
    use crate::detection::graph::CoordinationGraphBuilder;
    use crate::detection::matcher::PairwiseCoordinationMatcher;
    use crate::events::store::EventStore;
    use chrono::TimeDelta;

    fn run(events: Vec<Event>) -> (CoordinationGraph, GroupExtraction, EventStore) {
        let store = EventStore::from_events(events, false);
        let matcher = PairwiseCoordinationMatcher::new(TimeDelta::seconds(10));
        let mut builder = CoordinationGraphBuilder::new(WeightPolicy::Linear);
        builder.extend(&matcher.match_all(store.buckets()));
        let graph = builder.build();
        let groups = GroupExtractor::default().extract(&graph);
        (graph, groups, store)
    }

    #[test]
    fn test_empty_events_is_error() {
        let err = aggregate(
            &CoordinationGraph::default(),
            &GroupExtraction::default(),
            &[],
        )
        .unwrap_err();
        assert_eq!(err, DetectionError::EmptyInput);
    }

    #[test]
    fn test_no_coordination_is_empty_ok() {
        let (graph, groups, store) = run(vec![
            Event::at_secs("a", "x", 0),
            Event::at_secs("b", "x", 100),
        ]);
        let stats = aggregate(&graph, &groups, store.events()).unwrap();
        assert!(stats.users.is_empty());
        assert!(stats.groups.is_empty());
        assert!(stats.objects.is_empty());
    }

    #[test]
    fn test_triangle_stats() {
        let (graph, groups, store) = run(vec![
            Event::at_secs("a", "x", 0).with_content("p1"),
            Event::at_secs("b", "x", 2).with_content("p2"),
            Event::at_secs("c", "x", 4).with_content("p3"),
            Event::at_secs("a", "y", 50).with_content("p4"),
            Event::at_secs("b", "y", 51).with_content("p5"),
            Event::at_secs("c", "z", 500),
        ]);
        let stats = aggregate(&graph, &groups, store.events()).unwrap();

        let a = stats.user("a").unwrap();
        assert_eq!(a.total_events, 2);
        assert_eq!(a.distinct_posts, 2);
        assert_eq!(a.coordinated_objects, 2);
        assert_eq!(a.group_id, Some(0));
        assert_eq!(a.groups, 1);
        // a-b: x and y; a-c: x
        assert_eq!(a.total_edge_weight, 3);
        assert_eq!(a.degree, 2);

        let c = stats.user("c").unwrap();
        assert_eq!(c.total_events, 2);
        assert_eq!(c.coordinated_objects, 1);

        let g = &stats.groups[0];
        assert_eq!(g.member_count, 3);
        assert_eq!(g.internal_edges, 3);
        assert_eq!(g.total_internal_weight, 4);
        assert!((g.density - 1.0).abs() < f64::EPSILON);
        assert_eq!(g.top_objects[0].object_id, "x");
        assert_eq!(g.top_objects[0].occurrences, 3);

        let x = stats.objects.iter().find(|o| o.object_id == "x").unwrap();
        assert_eq!(x.users, 3);
        assert_eq!(x.posts, 3);
        // gaps: a-b 2s, a-c 4s, b-c 2s
        assert!((x.mean_time_delta_secs - 8.0 / 3.0).abs() < 1e-9);
        // y is tighter (1s), so it sorts first
        assert_eq!(stats.objects[0].object_id, "y");
    }

    #[test]
    fn test_posts_count_only_coordinated_shares() {
        let (graph, groups, store) = run(vec![
            Event::at_secs("a", "x", 0).with_content("p1"),
            Event::at_secs("b", "x", 3).with_content("p2"),
            Event::at_secs("a", "x", 200).with_content("p3"),
            Event::at_secs("b", "x", 400),
        ]);
        let stats = aggregate(&graph, &groups, store.events()).unwrap();

        let a = stats.user("a").unwrap();
        assert_eq!(a.total_events, 2);
        assert_eq!(a.distinct_posts, 1);
        assert_eq!(stats.user("b").unwrap().distinct_posts, 1);
        assert_eq!(stats.objects[0].posts, 2);
    }

    #[test]
    fn test_unlabeled_shares_are_distinct_posts() {
        let (graph, groups, store) = run(vec![
            Event::at_secs("a", "x", 0),
            Event::at_secs("b", "x", 1),
            Event::at_secs("a", "x", 2),
        ]);
        let stats = aggregate(&graph, &groups, store.events()).unwrap();
        assert_eq!(stats.user("a").unwrap().distinct_posts, 2);
        assert_eq!(stats.objects[0].posts, 3);
    }
}
