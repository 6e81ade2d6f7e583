// Coordination graph — weighted, undirected, accounts as nodes.
//
// The builder is the only shared mutable state in the pipeline. Parallel
// runs give each worker its own builder and fold them together with
// `merge` on a single thread, so weights never interleave.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::debug;

use super::edge::{AccountPair, CoordinationEdge, PostRef};
use crate::config::WeightPolicy;

/// Aggregated evidence for one account pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EdgeWeight {
    /// Weight under the configured policy. Always ≥ 1 for a stored edge.
    pub weight: usize,
    /// Qualifying (object, timestamp pair) occurrences, regardless of policy.
    pub occurrences: usize,
    /// Contributing objects, for auditability.
    pub objects: BTreeMap<String, ObjectContribution>,
    /// Sum of the time gaps of all occurrences, for averaging.
    pub total_time_delta_ms: i64,
}

/// What one object contributed to one edge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ObjectContribution {
    pub occurrences: usize,
    pub total_time_delta_ms: i64,
    /// Distinct posts of this object, by either account, that fell inside
    /// the window.
    pub posts: BTreeSet<PostRef>,
}

impl EdgeWeight {
    pub fn mean_time_delta_secs(&self) -> f64 {
        if self.occurrences == 0 {
            return 0.0;
        }
        self.total_time_delta_ms as f64 / self.occurrences as f64 / 1000.0
    }
}

/// Accumulates edges from any number of objects.
#[derive(Debug, Clone, Default)]
pub struct CoordinationGraphBuilder {
    policy: WeightPolicy,
    edges: BTreeMap<AccountPair, EdgeWeight>,
}

impl CoordinationGraphBuilder {
    pub fn new(policy: WeightPolicy) -> Self {
        Self {
            policy,
            edges: BTreeMap::new(),
        }
    }

    pub fn add_edge(&mut self, edge: &CoordinationEdge) {
        // Self-edges are not evidence of anything.
        let Some(pair) = edge.pair() else {
            return;
        };
        let entry = self.edges.entry(pair).or_default();
        entry.occurrences += 1;
        entry.total_time_delta_ms += edge.time_delta_ms;
        let contribution = entry.objects.entry(edge.object_id.clone()).or_default();
        contribution.occurrences += 1;
        contribution.total_time_delta_ms += edge.time_delta_ms;
        contribution.posts.extend(edge.posts());
    }

    pub fn extend<'a>(&mut self, edges: impl IntoIterator<Item = &'a CoordinationEdge>) {
        for edge in edges {
            self.add_edge(edge);
        }
    }

    /// Fold a partial accumulator (e.g. one worker's) into this one.
    pub fn merge(&mut self, other: CoordinationGraphBuilder) {
        for (pair, weight) in other.edges {
            let entry = self.edges.entry(pair).or_default();
            entry.occurrences += weight.occurrences;
            entry.total_time_delta_ms += weight.total_time_delta_ms;
            for (object, contribution) in weight.objects {
                let slot = entry.objects.entry(object).or_default();
                slot.occurrences += contribution.occurrences;
                slot.total_time_delta_ms += contribution.total_time_delta_ms;
                slot.posts.extend(contribution.posts);
            }
        }
    }

    pub fn build(self) -> CoordinationGraph {
        let policy = self.policy;
        let mut adjacency: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut edges = BTreeMap::new();

        for (pair, mut weight) in self.edges {
            weight.weight = match policy {
                WeightPolicy::Linear => weight.occurrences,
                WeightPolicy::PerObject => weight.objects.len(),
            };
            if weight.weight == 0 {
                continue;
            }
            adjacency
                .entry(pair.low.clone())
                .or_default()
                .insert(pair.high.clone());
            adjacency
                .entry(pair.high.clone())
                .or_default()
                .insert(pair.low.clone());
            edges.insert(pair, weight);
        }

        debug!(
            nodes = adjacency.len(),
            edges = edges.len(),
            policy = %policy,
            "Coordination graph built"
        );

        CoordinationGraph {
            policy,
            adjacency,
            edges,
        }
    }
}

/// The final coordination network.
///
/// Only accounts with at least one edge are nodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(into = "GraphSnapshot")]
pub struct CoordinationGraph {
    policy: WeightPolicy,
    adjacency: BTreeMap<String, BTreeSet<String>>,
    edges: BTreeMap<AccountPair, EdgeWeight>,
}

impl CoordinationGraph {
    pub fn policy(&self) -> WeightPolicy {
        self.policy
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Accounts in ascending id order.
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.adjacency.keys().map(String::as_str)
    }

    pub fn contains_node(&self, account: &str) -> bool {
        self.adjacency.contains_key(account)
    }

    /// Edges in ascending pair order.
    pub fn edges(&self) -> impl Iterator<Item = (&AccountPair, &EdgeWeight)> {
        self.edges.iter()
    }

    pub fn neighbors(&self, account: &str) -> impl Iterator<Item = &str> {
        self.adjacency
            .get(account)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    pub fn edge(&self, a: &str, b: &str) -> Option<&EdgeWeight> {
        AccountPair::new(a, b).and_then(|pair| self.edges.get(&pair))
    }

    /// Edge weight between two accounts; 0 when unconnected.
    pub fn weight(&self, a: &str, b: &str) -> usize {
        self.edge(a, b).map_or(0, |e| e.weight)
    }

    pub fn degree(&self, account: &str) -> usize {
        self.adjacency.get(account).map_or(0, BTreeSet::len)
    }

    /// Sum of the weights of all edges touching `account`.
    pub fn total_weight(&self, account: &str) -> usize {
        self.neighbors(account)
            .map(|other| self.weight(account, other))
            .sum()
    }

    /// Sum of all edge weights.
    pub fn graph_weight(&self) -> usize {
        self.edges.values().map(|e| e.weight).sum()
    }
}

/// Flat, serializable view of the graph (JSON maps need string keys).
#[derive(Debug, Clone, Serialize)]
pub struct GraphSnapshot {
    pub policy: WeightPolicy,
    pub nodes: Vec<String>,
    pub edges: Vec<GraphEdge>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphEdge {
    pub account_a: String,
    pub account_b: String,
    #[serde(flatten)]
    pub weight: EdgeWeight,
}

impl From<CoordinationGraph> for GraphSnapshot {
    fn from(graph: CoordinationGraph) -> Self {
        Self {
            policy: graph.policy,
            nodes: graph.adjacency.into_keys().collect(),
            edges: graph
                .edges
                .into_iter()
                .map(|(pair, weight)| GraphEdge {
                    account_a: pair.low,
                    account_b: pair.high,
                    weight,
                })
                .collect(),
        }
    }
}
