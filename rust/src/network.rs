//! Dependency network topology analysis.
//!
//! Aggregate metrics, connected clusters, high in-degree bottlenecks and a
//! composite health score. Everything here is a pure function of the graph
//! and the task list.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use std::fmt;

use crate::cycle::audit_cycles;
use crate::graph::{DependencyGraph, GraphError};
use crate::models::Task;

/// A task is a bottleneck when at least this many edges target it.
pub const BOTTLENECK_IN_DEGREE: usize = 3;

const DENSE_THRESHOLD: f64 = 0.3;
const DENSE_PENALTY: u32 = 20;
const BOTTLENECK_PENALTY: u32 = 10;
const FAN_OUT_THRESHOLD: f64 = 3.0;
const FAN_OUT_PENALTY: u32 = 15;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum HealthRating {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl HealthRating {
    pub fn from_score(score: u32) -> Self {
        if score >= 80 {
            Self::Excellent
        } else if score >= 60 {
            Self::Good
        } else if score >= 40 {
            Self::Fair
        } else {
            Self::Poor
        }
    }
}

impl fmt::Display for HealthRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Poor => "Poor",
        };
        write!(f, "{}", s)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkMetrics {
    pub total_tasks: usize,
    pub total_dependencies: usize,
    pub average_out_degree: f64,
    pub density: f64,
    pub has_cycles: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cycle_path: Vec<String>,
}

/// Weakly connected group of at least two tasks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    pub id: String,
    pub task_ids: Vec<String>,
    pub size: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkBottleneck {
    pub task_id: String,
    pub title: String,
    /// Number of edges targeting this task.
    pub dependent_count: usize,
    pub impact: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkAnalysis {
    pub metrics: NetworkMetrics,
    pub clusters: Vec<Cluster>,
    pub bottlenecks: Vec<NetworkBottleneck>,
    pub health_score: u32,
    pub health_rating: HealthRating,
}

impl NetworkAnalysis {
    /// Neutral result used when the analysis itself fails.
    pub fn neutral(task_count: usize) -> Self {
        Self {
            metrics: NetworkMetrics {
                total_tasks: task_count,
                total_dependencies: 0,
                average_out_degree: 0.0,
                density: 0.0,
                has_cycles: false,
                cycle_path: Vec::new(),
            },
            clusters: Vec::new(),
            bottlenecks: Vec::new(),
            health_score: 100,
            health_rating: HealthRating::Excellent,
        }
    }
}

/// Composite health: 100 minus the fixed deductions, floored at 0.
pub fn health_score(density: f64, bottleneck_count: usize, average_out_degree: f64) -> u32 {
    let mut deductions: u32 = 0;
    if density > DENSE_THRESHOLD {
        deductions += DENSE_PENALTY;
    }
    let per_bottleneck = u32::try_from(bottleneck_count)
        .unwrap_or(u32::MAX)
        .saturating_mul(BOTTLENECK_PENALTY);
    deductions = deductions.saturating_add(per_bottleneck);
    if average_out_degree > FAN_OUT_THRESHOLD {
        deductions = deductions.saturating_add(FAN_OUT_PENALTY);
    }
    100u32.saturating_sub(deductions)
}

/// Flood-fill over the undirected view of the graph, in graph order.
fn find_clusters(graph: &DependencyGraph) -> Vec<Cluster> {
    let mut adj: FxHashMap<&str, Vec<&str>> = FxHashMap::default();
    for edge in graph.all_edges() {
        adj.entry(edge.source_id.as_str())
            .or_default()
            .push(edge.target_id.as_str());
        adj.entry(edge.target_id.as_str())
            .or_default()
            .push(edge.source_id.as_str());
    }

    let mut seen: FxHashSet<&str> = FxHashSet::default();
    let mut clusters = Vec::new();
    for id in graph.task_ids() {
        if !seen.insert(id) {
            continue;
        }
        let mut members = vec![id];
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            for &next in adj.get(node).map(|v| v.as_slice()).unwrap_or(&[]) {
                if seen.insert(next) {
                    members.push(next);
                    stack.push(next);
                }
            }
        }
        if members.len() > 1 {
            clusters.push(Cluster {
                id: format!("cluster-{}", clusters.len() + 1),
                size: members.len(),
                task_ids: members.into_iter().map(str::to_string).collect(),
            });
        }
    }
    clusters
}

/// Tasks targeted by at least [`BOTTLENECK_IN_DEGREE`] edges, most depended
/// on first. Equal counts keep graph order.
fn find_bottlenecks(graph: &DependencyGraph, tasks: &[Task]) -> Vec<NetworkBottleneck> {
    let titles: FxHashMap<&str, &str> = tasks
        .iter()
        .map(|t| (t.id.as_str(), t.title.as_str()))
        .collect();

    let mut in_degree: FxHashMap<&str, usize> = FxHashMap::default();
    for edge in graph.all_edges() {
        *in_degree.entry(edge.target_id.as_str()).or_default() += 1;
    }

    let mut bottlenecks: Vec<NetworkBottleneck> = graph
        .task_ids()
        .filter_map(|id| {
            let count = in_degree.get(id).copied().unwrap_or(0);
            (count >= BOTTLENECK_IN_DEGREE).then(|| NetworkBottleneck {
                task_id: id.to_string(),
                title: titles.get(id).copied().unwrap_or(id).to_string(),
                dependent_count: count,
                impact: "high".to_string(),
            })
        })
        .collect();
    bottlenecks.sort_by(|a, b| b.dependent_count.cmp(&a.dependent_count));
    bottlenecks
}

/// Analyze the topology of a dependency graph.
pub fn analyze_network(
    graph: &DependencyGraph,
    tasks: &[Task],
) -> Result<NetworkAnalysis, GraphError> {
    graph.validate()?;

    let n = graph.len();
    let e = graph.edge_count();
    let average_out_degree = if n == 0 { 0.0 } else { e as f64 / n as f64 };
    let density = if n <= 1 {
        0.0
    } else {
        e as f64 / (n as f64 * (n - 1) as f64)
    };
    let audit = audit_cycles(graph);

    let clusters = find_clusters(graph);
    let bottlenecks = find_bottlenecks(graph, tasks);
    let score = health_score(density, bottlenecks.len(), average_out_degree);

    Ok(NetworkAnalysis {
        metrics: NetworkMetrics {
            total_tasks: n,
            total_dependencies: e,
            average_out_degree,
            density,
            has_cycles: audit.has_cycle,
            cycle_path: audit.path,
        },
        clusters,
        bottlenecks,
        health_score: score,
        health_rating: HealthRating::from_score(score),
    })
}
