// Louvain modularity optimization over an index-based weighted graph.
//
// Used to split one large connected component into denser sub-groups.
// Two phases repeat until nothing moves: (1) local moving, where each node
// joins the neighboring community with the best modularity gain, visited in
// a seeded shuffled order; (2) aggregation, where every community collapses
// into a single node carrying its internal weight as a self-loop.
//
// Ties are broken deterministically (strictly-better gain only, neighbors
// visited in ascending community id), so the seed fully determines output.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Local-moving sweeps per level before giving up on convergence.
pub const MAX_PASSES: usize = 64;

/// Aggregation levels before giving up.
pub const MAX_LEVELS: usize = 32;

/// Minimum modularity gain that counts as an improvement.
const GAIN_EPSILON: f64 = 1e-12;

/// Undirected weighted graph on nodes `0..n`.
#[derive(Debug, Clone, Default)]
pub struct WeightedGraph {
    adjacency: Vec<BTreeMap<usize, f64>>,
    self_loops: Vec<f64>,
}

impl WeightedGraph {
    pub fn with_nodes(n: usize) -> Self {
        Self {
            adjacency: vec![BTreeMap::new(); n],
            self_loops: vec![0.0; n],
        }
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Add weight between `a` and `b`; `a == b` adds to the self-loop.
    /// Out-of-range indices are ignored.
    pub fn add_edge(&mut self, a: usize, b: usize, weight: f64) {
        if a >= self.node_count() || b >= self.node_count() {
            return;
        }
        if a == b {
            self.self_loops[a] += weight;
            return;
        }
        *self.adjacency[a].entry(b).or_default() += weight;
        *self.adjacency[b].entry(a).or_default() += weight;
    }

    /// Weighted degree; a self-loop counts twice.
    fn degree(&self, node: usize) -> f64 {
        self.adjacency[node].values().sum::<f64>() + 2.0 * self.self_loops[node]
    }

    /// Sum of all edge weights, each undirected edge counted once.
    pub fn total_weight(&self) -> f64 {
        let mut total = self.self_loops.iter().sum::<f64>();
        for (a, neighbors) in self.adjacency.iter().enumerate() {
            total += neighbors
                .iter()
                .filter(|(&b, _)| b > a)
                .map(|(_, w)| w)
                .sum::<f64>();
        }
        total
    }
}

/// Iteration caps for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LouvainLimits {
    pub max_passes: usize,
    /// At least one level always runs.
    pub max_levels: usize,
}

impl Default for LouvainLimits {
    fn default() -> Self {
        Self {
            max_passes: MAX_PASSES,
            max_levels: MAX_LEVELS,
        }
    }
}

/// Result of a Louvain run.
#[derive(Debug, Clone, PartialEq)]
pub struct LouvainOutcome {
    /// Community id per original node, renumbered densely from 0 in order
    /// of each community's lowest node index.
    pub assignment: Vec<usize>,
    pub community_count: usize,
    pub modularity: f64,
    /// False if a level hit `max_passes` or the run hit `max_levels`.
    pub converged: bool,
    pub levels: usize,
}

/// Modularity of a partition: Σ_c [ L_c / m − (d_c / 2m)² ].
pub fn modularity(graph: &WeightedGraph, assignment: &[usize]) -> f64 {
    let m = graph.total_weight();
    if m <= 0.0 {
        return 0.0;
    }
    let mut internal: BTreeMap<usize, f64> = BTreeMap::new();
    let mut degree: BTreeMap<usize, f64> = BTreeMap::new();

    for node in 0..graph.node_count() {
        let c = assignment[node];
        *degree.entry(c).or_default() += graph.degree(node);
        *internal.entry(c).or_default() += graph.self_loops[node];
        for (&other, &w) in &graph.adjacency[node] {
            if other > node && assignment[other] == c {
                *internal.entry(c).or_default() += w;
            }
        }
    }

    degree
        .iter()
        .map(|(c, d)| {
            let l = internal.get(c).copied().unwrap_or(0.0);
            l / m - (d / (2.0 * m)).powi(2)
        })
        .sum()
}

/// Run Louvain with a fixed seed.
pub fn louvain(graph: &WeightedGraph, seed: u64, limits: LouvainLimits) -> LouvainOutcome {
    let max_levels = limits.max_levels.max(1);
    let n = graph.node_count();
    let mut rng = StdRng::seed_from_u64(seed);

    // Maps each original node to its node at the current level.
    let mut membership: Vec<usize> = (0..n).collect();
    let mut level_graph = graph.clone();
    let mut converged = true;
    let mut levels = 0;

    while levels < max_levels {
        let (local, level_converged) = local_moving(&level_graph, &mut rng, limits.max_passes);
        if !level_converged {
            converged = false;
        }
        let (renumbered, count) = renumber(&local);
        levels += 1;

        for slot in membership.iter_mut() {
            *slot = renumbered[*slot];
        }

        if count == level_graph.node_count() {
            // Nothing merged at this level.
            break;
        }
        level_graph = aggregate(&level_graph, &renumbered, count);
        if levels == max_levels {
            converged = false;
        }
    }

    let (assignment, community_count) = renumber(&membership);
    LouvainOutcome {
        modularity: modularity(graph, &assignment),
        assignment,
        community_count,
        converged,
        levels,
    }
}

/// Phase one. Returns the community per node and whether it settled.
fn local_moving(
    graph: &WeightedGraph,
    rng: &mut StdRng,
    max_passes: usize,
) -> (Vec<usize>, bool) {
    let n = graph.node_count();
    let m2 = 2.0 * graph.total_weight();
    let mut community: Vec<usize> = (0..n).collect();
    if m2 <= 0.0 {
        return (community, true);
    }

    let degrees: Vec<f64> = (0..n).map(|i| graph.degree(i)).collect();
    let mut totals: Vec<f64> = degrees.clone();
    let mut order: Vec<usize> = (0..n).collect();

    for _pass in 0..max_passes {
        order.shuffle(rng);
        let mut moved = false;

        for &node in &order {
            let current = community[node];
            let k = degrees[node];

            let mut links: BTreeMap<usize, f64> = BTreeMap::new();
            for (&other, &w) in &graph.adjacency[node] {
                *links.entry(community[other]).or_default() += w;
            }

            totals[current] -= k;
            let mut best = current;
            let mut best_gain =
                links.get(&current).copied().unwrap_or(0.0) - totals[current] * k / m2;

            for (&candidate, &w) in &links {
                let gain = w - totals[candidate] * k / m2;
                if gain > best_gain + GAIN_EPSILON {
                    best = candidate;
                    best_gain = gain;
                }
            }

            totals[best] += k;
            if best != current {
                community[node] = best;
                moved = true;
            }
        }

        if !moved {
            return (community, true);
        }
    }

    (community, false)
}

/// Renumber labels densely in order of first appearance.
fn renumber(labels: &[usize]) -> (Vec<usize>, usize) {
    let mut mapping: BTreeMap<usize, usize> = BTreeMap::new();
    let renumbered = labels
        .iter()
        .map(|label| {
            let next = mapping.len();
            *mapping.entry(*label).or_insert(next)
        })
        .collect();
    (renumbered, mapping.len())
}

/// Phase two: collapse communities into nodes.
fn aggregate(graph: &WeightedGraph, community: &[usize], count: usize) -> WeightedGraph {
    let mut next = WeightedGraph::with_nodes(count);
    for node in 0..graph.node_count() {
        let c = community[node];
        next.add_edge(c, c, graph.self_loops[node]);
        for (&other, &w) in &graph.adjacency[node] {
            if other > node {
                next.add_edge(c, community[other], w);
            }
        }
    }
    next
}
