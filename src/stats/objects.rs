// Per-object statistics — which shared objects drove coordination.
//
// For every object that produced at least one edge: how many accounts were
// coordinated through it, how many of their posts of it fell inside the
// window, and how tight the timing was. Sorted tightest first.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::detection::edge::PostRef;
use crate::detection::graph::CoordinationGraph;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectStatistics {
    pub object_id: String,
    /// Accounts linked through this object.
    pub users: usize,
    /// Distinct posts of this object that took part in an edge.
    pub posts: usize,
    /// Qualifying occurrences across all pairs.
    pub occurrences: usize,
    pub mean_time_delta_secs: f64,
}

#[derive(Default)]
struct ObjectTally<'a> {
    accounts: BTreeSet<&'a str>,
    posts: BTreeSet<&'a PostRef>,
    occurrences: usize,
    delta_ms: i64,
}

pub fn object_statistics(graph: &CoordinationGraph) -> Vec<ObjectStatistics> {
    let mut tallies: BTreeMap<&str, ObjectTally> = BTreeMap::new();
    for (pair, edge) in graph.edges() {
        for (object, contribution) in &edge.objects {
            let tally = tallies.entry(object.as_str()).or_default();
            tally.accounts.insert(pair.low.as_str());
            tally.accounts.insert(pair.high.as_str());
            tally.posts.extend(&contribution.posts);
            tally.occurrences += contribution.occurrences;
            tally.delta_ms += contribution.total_time_delta_ms;
        }
    }

    let mut stats: Vec<ObjectStatistics> = tallies
        .into_iter()
        .map(|(object_id, tally)| ObjectStatistics {
            object_id: object_id.to_string(),
            users: tally.accounts.len(),
            posts: tally.posts.len(),
            occurrences: tally.occurrences,
            mean_time_delta_secs: super::mean_secs(tally.delta_ms, tally.occurrences),
        })
        .collect();

    stats.sort_by(|a, b| {
        a.mean_time_delta_secs
            .partial_cmp(&b.mean_time_delta_secs)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.object_id.cmp(&b.object_id))
    });
    stats
}
