// Per-account statistics for coordinated accounts.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::detection::graph::CoordinationGraph;
use crate::detection::groups::GroupExtraction;
use crate::events::models::Event;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStatistics {
    pub account_id: String,
    /// Every ingested event by this account, coordinated or not.
    pub total_events: usize,
    /// Distinct posts by this account that took part in an edge.
    pub distinct_posts: usize,
    /// Objects through which this account has at least one edge.
    pub coordinated_objects: usize,
    pub group_id: Option<usize>,
    /// Number of groups the account participates in (0 or 1).
    pub groups: usize,
    pub degree: usize,
    pub total_edge_weight: usize,
    /// Mean gap across every qualifying occurrence touching this account.
    pub mean_time_delta_secs: f64,
}

/// One row per graph node, in ascending account order.
pub fn user_statistics(
    graph: &CoordinationGraph,
    groups: &GroupExtraction,
    events: &[Event],
) -> Vec<UserStatistics> {
    let mut totals: BTreeMap<&str, usize> = BTreeMap::new();
    for event in events {
        if graph.contains_node(&event.account_id) {
            *totals.entry(event.account_id.as_str()).or_default() += 1;
        }
    }

    graph
        .nodes()
        .map(|account| {
            let mut objects: BTreeSet<&str> = BTreeSet::new();
            let mut posts: BTreeSet<&str> = BTreeSet::new();
            let mut occurrences = 0usize;
            let mut delta_ms = 0i64;
            for other in graph.neighbors(account) {
                if let Some(edge) = graph.edge(account, other) {
                    for (object, contribution) in &edge.objects {
                        objects.insert(object.as_str());
                        posts.extend(
                            contribution
                                .posts
                                .iter()
                                .filter(|post| post.account_id == account)
                                .map(|post| post.post_id.as_str()),
                        );
                    }
                    occurrences += edge.occurrences;
                    delta_ms += edge.total_time_delta_ms;
                }
            }

            let group_id = groups.group_of(account);
            UserStatistics {
                account_id: account.to_string(),
                total_events: totals.get(account).copied().unwrap_or(0),
                distinct_posts: posts.len(),
                coordinated_objects: objects.len(),
                group_id,
                groups: usize::from(group_id.is_some()),
                degree: graph.degree(account),
                total_edge_weight: graph.total_weight(account),
                mean_time_delta_secs: super::mean_secs(delta_ms, occurrences),
            }
        })
        .collect()
}
