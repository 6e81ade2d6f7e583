// Group extraction — partition the coordination graph into groups.
//
// Default mode is connected components: any two accounts joined by a path
// share a group. It's deterministic and linear in nodes + edges, and is the
// reproducible baseline. Refined mode runs Louvain inside each component to
// split loose chains into denser communities; its output is fixed by the
// seed, which is logged.
//
// Group ids are assigned after extraction, in ascending order of each
// group's smallest account id, so they never depend on how the graph was
// built. Accounts without edges are never in a group.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::graph::CoordinationGraph;
use super::louvain::{louvain, LouvainLimits, WeightedGraph};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum GroupingMode {
    #[default]
    Components,
    Refined {
        seed: u64,
    },
}

/// A coordinated group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: usize,
    /// Sorted ascending.
    pub members: Vec<String>,
}

impl Group {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, account: &str) -> bool {
        self.members
            .binary_search_by(|m| m.as_str().cmp(account))
            .is_ok()
    }
}

/// Groups plus the reverse index and any refinement warnings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupExtraction {
    pub groups: Vec<Group>,
    pub membership: BTreeMap<String, usize>,
    /// Non-fatal refinement problems (e.g. no convergence).
    pub warnings: Vec<String>,
    /// Modularity of the final partition, refined mode only.
    pub modularity: Option<f64>,
}

impl GroupExtraction {
    pub fn group_of(&self, account: &str) -> Option<usize> {
        self.membership.get(account).copied()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GroupExtractor {
    mode: GroupingMode,
    limits: LouvainLimits,
}

impl GroupExtractor {
    pub fn new(mode: GroupingMode) -> Self {
        Self {
            mode,
            limits: LouvainLimits::default(),
        }
    }

    /// Override the refinement iteration caps.
    pub fn with_limits(mut self, limits: LouvainLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn extract(&self, graph: &CoordinationGraph) -> GroupExtraction {
        let nodes: Vec<&str> = graph.nodes().collect();
        let components = connected_components(graph, &nodes);

        let mut warnings = Vec::new();
        let mut modularity = None;

        let member_sets: Vec<Vec<String>> = match self.mode {
            GroupingMode::Components => components,
            GroupingMode::Refined { seed } => {
                info!(seed, components = components.len(), "Refining groups with Louvain");
                let mut refined = Vec::new();
                for component in components {
                    let (parts, warning) = refine_component(graph, component, seed, self.limits);
                    if let Some(w) = warning {
                        warn!(warning = w.as_str(), "Refinement did not converge");
                        warnings.push(w);
                    }
                    refined.extend(parts);
                }
                modularity = Some(partition_modularity(graph, &nodes, &refined));
                refined
            }
        };

        let extraction = assign_ids(member_sets, warnings, modularity);
        info!(
            groups = extraction.groups.len(),
            accounts = extraction.membership.len(),
            "Groups extracted"
        );
        extraction
    }
}

/// Union-find with path halving and union by size.
struct DisjointSet {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (mut ra, mut rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        if self.size[ra] < self.size[rb] {
            std::mem::swap(&mut ra, &mut rb);
        }
        self.parent[rb] = ra;
        self.size[ra] += self.size[rb];
    }
}

fn index_of(nodes: &[&str], account: &str) -> Option<usize> {
    nodes.binary_search(&account).ok()
}

/// Components as sorted member lists. `nodes` must be sorted ascending.
fn connected_components(graph: &CoordinationGraph, nodes: &[&str]) -> Vec<Vec<String>> {
    let mut set = DisjointSet::new(nodes.len());
    for (pair, _) in graph.edges() {
        if let (Some(a), Some(b)) = (index_of(nodes, &pair.low), index_of(nodes, &pair.high)) {
            set.union(a, b);
        }
    }

    let mut by_root: BTreeMap<usize, Vec<String>> = BTreeMap::new();
    for (i, node) in nodes.iter().enumerate() {
        let root = set.find(i);
        by_root.entry(root).or_default().push(node.to_string());
    }
    // Nodes were visited in ascending order, so each list is already sorted.
    by_root.into_values().collect()
}

/// Split one component with Louvain.
///
/// Singleton communities are folded into the neighboring community they
/// share the most weight with, so every connected account stays grouped.
fn refine_component(
    graph: &CoordinationGraph,
    component: Vec<String>,
    seed: u64,
    limits: LouvainLimits,
) -> (Vec<Vec<String>>, Option<String>) {
    if component.len() <= 2 {
        return (vec![component], None);
    }

    let names: Vec<&str> = component.iter().map(String::as_str).collect();
    let mut weighted = WeightedGraph::with_nodes(names.len());
    for (i, a) in names.iter().enumerate() {
        for b in graph.neighbors(a) {
            if let Some(j) = index_of(&names, b) {
                if j > i {
                    weighted.add_edge(i, j, graph.weight(a, b) as f64);
                }
            }
        }
    }

    let outcome = louvain(&weighted, seed, limits);
    let mut assignment = outcome.assignment.clone();

    let mut sizes = vec![0usize; outcome.community_count];
    for &c in &assignment {
        sizes[c] += 1;
    }
    for i in 0..names.len() {
        if sizes[assignment[i]] != 1 {
            continue;
        }
        // Strongest neighboring community; ties go to the lower community id.
        let mut link: BTreeMap<usize, usize> = BTreeMap::new();
        for b in graph.neighbors(names[i]) {
            if let Some(j) = index_of(&names, b) {
                *link.entry(assignment[j]).or_default() += graph.weight(names[i], b);
            }
        }
        let target = link
            .iter()
            .filter(|(&c, _)| c != assignment[i])
            .max_by(|x, y| x.1.cmp(y.1).then_with(|| y.0.cmp(x.0)))
            .map(|(&c, _)| c);
        if let Some(target) = target {
            sizes[assignment[i]] -= 1;
            sizes[target] += 1;
            assignment[i] = target;
        }
    }

    let mut parts: BTreeMap<usize, Vec<String>> = BTreeMap::new();
    for (i, &c) in assignment.iter().enumerate() {
        parts.entry(c).or_default().push(names[i].to_string());
    }

    let warning = (!outcome.converged).then(|| {
        format!(
            "community detection did not converge for component starting at '{}' \
             ({} accounts, {} levels); using best partition found (modularity {:.3})",
            names.first().copied().unwrap_or_default(),
            names.len(),
            outcome.levels,
            outcome.modularity
        )
    });

    (parts.into_values().collect(), warning)
}

fn partition_modularity(graph: &CoordinationGraph, nodes: &[&str], parts: &[Vec<String>]) -> f64 {
    let mut weighted = WeightedGraph::with_nodes(nodes.len());
    for (pair, edge) in graph.edges() {
        if let (Some(a), Some(b)) = (index_of(nodes, &pair.low), index_of(nodes, &pair.high)) {
            weighted.add_edge(a, b, edge.weight as f64);
        }
    }
    let mut assignment = vec![0; nodes.len()];
    for (c, part) in parts.iter().enumerate() {
        for member in part {
            if let Some(i) = index_of(nodes, member) {
                assignment[i] = c;
            }
        }
    }
    super::louvain::modularity(&weighted, &assignment)
}

fn assign_ids(
    mut member_sets: Vec<Vec<String>>,
    warnings: Vec<String>,
    modularity: Option<f64>,
) -> GroupExtraction {
    member_sets.retain(|m| !m.is_empty());
    for members in member_sets.iter_mut() {
        members.sort();
    }
    member_sets.sort_by(|a, b| a[0].cmp(&b[0]));

    let mut membership = BTreeMap::new();
    let groups: Vec<Group> = member_sets
        .into_iter()
        .enumerate()
        .map(|(id, members)| {
            for m in &members {
                membership.insert(m.clone(), id);
            }
            Group { id, members }
        })
        .collect();

    GroupExtraction {
        groups,
        membership,
        warnings,
        modularity,
    }
}
