//! Dependency graph construction from task links.

use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;
use tracing::debug;

use crate::config::LinkRules;
use crate::models::{DependencyConstraint, DependencyEdge, LinkDirection, Task};

/// Structural problems in a dependency graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Edge {source_id} -> {target_id} references a task missing from the graph")]
    DanglingEdge { source_id: String, target_id: String },
    #[error("Unknown task: {0}")]
    UnknownTask(String),
}

/// Reverse index: prerequisite id -> edges of the tasks that depend on it,
/// in graph order.
pub type DependentsMap<'a> = FxHashMap<&'a str, Vec<&'a DependencyEdge>>;

/// Mapping from every task id to the edges it owns (`source` depends on
/// `target`). Built fresh per request.
#[derive(Clone, Debug, Default)]
pub struct DependencyGraph {
    order: Vec<String>,
    edges: FxHashMap<String, Vec<DependencyEdge>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Graph with the given nodes and no edges.
    pub fn with_tasks<'a>(ids: impl IntoIterator<Item = &'a str>) -> Self {
        let mut graph = Self::new();
        for id in ids {
            graph.add_task(id);
        }
        graph
    }

    /// Add a node. Adding an existing node is a no-op.
    pub fn add_task(&mut self, id: &str) {
        if !self.edges.contains_key(id) {
            self.order.push(id.to_string());
            self.edges.insert(id.to_string(), Vec::new());
        }
    }

    /// Append an edge to its source's list. The source must be a node; the
    /// target is not checked (see [`DependencyGraph::validate`]).
    pub fn add_edge(&mut self, edge: DependencyEdge) -> Result<(), GraphError> {
        match self.edges.get_mut(&edge.source_id) {
            Some(list) => {
                list.push(edge);
                Ok(())
            }
            None => Err(GraphError::UnknownTask(edge.source_id)),
        }
    }

    /// Copy of this graph with one more edge, for what-if analysis.
    pub fn with_edge(&self, edge: DependencyEdge) -> Result<Self, GraphError> {
        let mut graph = self.clone();
        graph.add_edge(edge)?;
        Ok(graph)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.edges.contains_key(id)
    }

    /// Edges owned by `id`; empty for unknown ids.
    pub fn edges(&self, id: &str) -> &[DependencyEdge] {
        self.edges.get(id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Node ids in insertion order.
    pub fn task_ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    /// Every edge, grouped by source in insertion order.
    pub fn all_edges(&self) -> impl Iterator<Item = &DependencyEdge> {
        self.order.iter().flat_map(move |id| self.edges(id).iter())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(|v| v.len()).sum()
    }

    /// Check that every edge points at a node of this graph.
    pub fn validate(&self) -> Result<(), GraphError> {
        match self.all_edges().find(|e| !self.contains(&e.target_id)) {
            Some(edge) => Err(GraphError::DanglingEdge {
                source_id: edge.source_id.clone(),
                target_id: edge.target_id.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Build the reverse index used by scheduling traversals.
    pub fn dependents_map(&self) -> DependentsMap<'_> {
        let mut dependents: DependentsMap =
            FxHashMap::with_capacity_and_hasher(self.len(), Default::default());
        for edge in self.all_edges() {
            dependents
                .entry(edge.target_id.as_str())
                .or_default()
                .push(edge);
        }
        dependents
    }
}

/// Build the dependency graph for a task snapshot.
///
/// Every task becomes a node. For each recognized link:
/// - directed links produce an edge only from the half whose reading makes
///   the carrier the dependent ([`LinkRules::carrier_depends`]); the other
///   half is held by the linked issue and skipped here;
/// - `BOTH` (symmetric) links produce one edge per pair, owned by whichever
///   task of the pair comes first.
///
/// Self-links and links to issues outside the snapshot are dropped.
pub fn build_dependency_graph(tasks: &[Task], rules: &LinkRules) -> DependencyGraph {
    let mut graph = DependencyGraph::with_tasks(tasks.iter().map(|t| t.id.as_str()));
    let mut symmetric_pairs: FxHashSet<(&str, &str)> = FxHashSet::default();

    for task in tasks {
        for link in &task.links {
            if !rules.is_recognized(&link.link_type) {
                debug!(task = %task.id, link_type = %link.link_type, "Ignoring unrecognized link type");
                continue;
            }
            let symmetric = link.direction == LinkDirection::Both;
            if !symmetric && !rules.carrier_depends(link) {
                continue;
            }

            let kind = rules.classify_kind(&link.link_type);
            for linked in &link.issue_ids {
                if linked == &task.id {
                    debug!(task = %task.id, "Dropping self-link");
                    continue;
                }
                if !graph.contains(linked) {
                    debug!(task = %task.id, linked = %linked, "Dropping link to issue outside snapshot");
                    continue;
                }
                if symmetric {
                    if symmetric_pairs.contains(&(linked.as_str(), task.id.as_str())) {
                        continue;
                    }
                    symmetric_pairs.insert((task.id.as_str(), linked.as_str()));
                }

                let edge = DependencyEdge {
                    source_id: task.id.clone(),
                    target_id: linked.clone(),
                    kind,
                    lag_days: 0,
                    constraint: DependencyConstraint::Hard,
                };
                // Source is always a node: every task was added above.
                if let Err(e) = graph.add_edge(edge) {
                    debug!(error = %e, "Skipping edge");
                }
            }
        }
    }

    graph
}
