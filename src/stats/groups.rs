// Per-group statistics: size, internal weight, density, top objects.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::detection::graph::CoordinationGraph;
use crate::detection::groups::GroupExtraction;

/// How many contributing objects to keep per group.
pub const TOP_OBJECTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectCount {
    pub object_id: String,
    /// Qualifying occurrences this object contributed inside the group.
    pub occurrences: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupStatistics {
    pub group_id: usize,
    pub member_count: usize,
    /// Edges with both endpoints in the group.
    pub internal_edges: usize,
    pub total_internal_weight: usize,
    /// internal_edges / (n(n-1)/2); 0 for groups under two members.
    pub density: f64,
    pub mean_time_delta_secs: f64,
    /// Heaviest contributors first, ties by object id.
    pub top_objects: Vec<ObjectCount>,
}

pub fn group_statistics(graph: &CoordinationGraph, groups: &GroupExtraction) -> Vec<GroupStatistics> {
    groups
        .groups
        .iter()
        .map(|group| {
            let mut internal_edges = 0usize;
            let mut total_internal_weight = 0usize;
            let mut occurrences = 0usize;
            let mut delta_ms = 0i64;
            let mut by_object: BTreeMap<&str, usize> = BTreeMap::new();

            for member in &group.members {
                for other in graph.neighbors(member) {
                    // Count each edge once, from its lower endpoint.
                    if other <= member.as_str() || !group.contains(other) {
                        continue;
                    }
                    let Some(edge) = graph.edge(member, other) else {
                        continue;
                    };
                    internal_edges += 1;
                    total_internal_weight += edge.weight;
                    occurrences += edge.occurrences;
                    delta_ms += edge.total_time_delta_ms;
                    for (object, contribution) in &edge.objects {
                        *by_object.entry(object.as_str()).or_default() += contribution.occurrences;
                    }
                }
            }

            let n = group.members.len();
            let possible_pairs = n * n.saturating_sub(1) / 2;
            let density = if possible_pairs == 0 {
                0.0
            } else {
                internal_edges as f64 / possible_pairs as f64
            };

            let mut top_objects: Vec<ObjectCount> = by_object
                .into_iter()
                .map(|(object_id, occurrences)| ObjectCount {
                    object_id: object_id.to_string(),
                    occurrences,
                })
                .collect();
            top_objects.sort_by(|a, b| {
                b.occurrences
                    .cmp(&a.occurrences)
                    .then_with(|| a.object_id.cmp(&b.object_id))
            });
            top_objects.truncate(TOP_OBJECTS);

            GroupStatistics {
                group_id: group.id,
                member_count: n,
                internal_edges,
                total_internal_weight,
                density,
                mean_time_delta_secs: super::mean_secs(delta_ms, occurrences),
                top_objects,
            }
        })
        .collect()
}
