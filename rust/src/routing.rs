//! Dependency routing: validate a proposed dependency and estimate its
//! impact before it is committed.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use std::collections::VecDeque;
use tracing::info;

use crate::config::AnalysisConfig;
use crate::critical_path::{compute_critical_path, CriticalPathResult};
use crate::cycle::detect_cycle;
use crate::graph::DependencyGraph;
use crate::models::{DependencyConstraint, DependencyEdge, DependencyKind, Task};
use crate::resources::windows_overlap;

/// A dependency someone wants to add: `source_id` depends on `target_id`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DependencyRequest {
    pub source_id: String,
    pub target_id: String,
    pub kind: Option<DependencyKind>,
    pub lag_days: Option<i32>,
    pub constraint: Option<DependencyConstraint>,
}

impl DependencyRequest {
    pub fn new(source_id: impl Into<String>, target_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            kind: None,
            lag_days: None,
            constraint: None,
        }
    }

    /// The edge this request describes, with defaults filled in.
    pub fn to_edge(&self) -> DependencyEdge {
        DependencyEdge {
            source_id: self.source_id.clone(),
            target_id: self.target_id.clone(),
            kind: self.kind.unwrap_or(DependencyKind::FS),
            lag_days: self.lag_days.unwrap_or(0),
            constraint: self.constraint.unwrap_or_default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DependencyInfo {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub kind: DependencyKind,
    pub lag: i32,
    pub constraint: DependencyConstraint,
}

impl From<&DependencyEdge> for DependencyInfo {
    fn from(edge: &DependencyEdge) -> Self {
        Self {
            id: format!("dep-{}-{}", edge.source_id, edge.target_id),
            source: edge.source_id.clone(),
            target: edge.target_id.clone(),
            kind: edge.kind,
            lag: edge.lag_days,
            constraint: edge.constraint,
        }
    }
}

/// Same assignee on both ends of the dependency with overlapping dates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceConflict {
    pub resource: String,
    pub task_ids: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyImpact {
    pub project_delay_days: u64,
    /// The dependent task and everything that transitively depends on it.
    pub affected_task_ids: Vec<String>,
    pub critical_path_changed: bool,
    pub resource_conflicts: Vec<ResourceConflict>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutedDependency {
    pub success: bool,
    pub dependency: DependencyInfo,
    pub impact: DependencyImpact,
    pub recommendations: Vec<String>,
    /// Whether the link was written to the tracker.
    pub applied: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedDependency {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub circular_path: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Outcome of routing a dependency. Both variants serialize to the
/// `{success, ...}` payload shape.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DependencyRoutingResult {
    Created(RoutedDependency),
    Rejected(RejectedDependency),
}

impl DependencyRoutingResult {
    fn rejected(error: &str, circular_path: Vec<String>, details: Option<String>) -> Self {
        Self::Rejected(RejectedDependency {
            success: false,
            error: error.to_string(),
            circular_path,
            details,
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Transitive dependents of `start` (including `start`), breadth first.
fn affected_tasks(graph: &DependencyGraph, start: &str) -> Vec<String> {
    let dependents = graph.dependents_map();
    let mut seen: FxHashSet<&str> = FxHashSet::default();
    let mut order = Vec::new();
    let mut queue: VecDeque<&str> = VecDeque::from([start]);
    seen.insert(start);

    while let Some(id) = queue.pop_front() {
        order.push(id.to_string());
        for edge in dependents.get(id).into_iter().flatten() {
            if seen.insert(edge.source_id.as_str()) {
                queue.push_back(edge.source_id.as_str());
            }
        }
    }
    order
}

fn resource_conflicts(source: &Task, target: &Task) -> Vec<ResourceConflict> {
    let same_owner = source.is_assigned() && source.assignee == target.assignee;
    match (same_owner, source.window(), target.window()) {
        (true, Some(a), Some(b)) if windows_overlap(a, b) => vec![ResourceConflict {
            resource: source.assignee.clone(),
            task_ids: vec![source.id.clone(), target.id.clone()],
        }],
        _ => Vec::new(),
    }
}

fn recommendations(
    edge: &DependencyEdge,
    source: &Task,
    target: &Task,
    impact: &DependencyImpact,
    after: &CriticalPathResult,
) -> Vec<String> {
    let mut out = Vec::new();

    if impact.critical_path_changed {
        out.push(format!(
            "Critical path changes to {}; review the new sequence",
            after.path.join(" -> ")
        ));
    }
    if impact.project_delay_days > 0 {
        out.push(format!(
            "Project completion moves out by {} day(s)",
            impact.project_delay_days
        ));
    }
    for conflict in &impact.resource_conflicts {
        out.push(format!(
            "{} is assigned to both {} with overlapping dates; reassign or resequence",
            conflict.resource,
            conflict.task_ids.join(" and ")
        ));
    }
    if edge.kind == DependencyKind::SF {
        out.push("Start-to-Finish dependencies are uncommon; confirm the relationship type".to_string());
    }
    if edge.constraint == DependencyConstraint::Soft {
        out.push("Soft dependency: treat it as guidance, it will not block scheduling".to_string());
    }
    if edge.kind == DependencyKind::FS {
        if let (Some(start), Some(end)) = (source.start_date, target.end_date) {
            if start < end {
                out.push(format!(
                    "{} starts before {} finishes; adjust dates to honour the finish-to-start dependency",
                    source.id, target.id
                ));
            }
        }
    }

    if out.is_empty() {
        out.push("No schedule impact detected".to_string());
    }
    out
}

/// Validate `request` against the current snapshot and estimate its impact.
///
/// The graph is not modified; impact is computed on a copy with the new
/// edge. Unknown tasks and cycles produce a rejected result, never an error.
pub fn route_dependency(
    tasks: &[Task],
    graph: &DependencyGraph,
    request: &DependencyRequest,
    config: &AnalysisConfig,
) -> DependencyRoutingResult {
    let by_id: FxHashMap<&str, &Task> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();
    let edge = request.to_edge();

    let (source, target) = match (
        by_id.get(edge.source_id.as_str()),
        by_id.get(edge.target_id.as_str()),
    ) {
        (Some(s), Some(t)) if graph.contains(&s.id) && graph.contains(&t.id) => (*s, *t),
        (s, _) => {
            let missing = if s.is_none() { &edge.source_id } else { &edge.target_id };
            return DependencyRoutingResult::rejected(
                "Unknown task",
                Vec::new(),
                Some(format!("Task {} is not part of this project", missing)),
            );
        }
    };

    let check = detect_cycle(graph, Some(&edge));
    if check.has_cycle {
        info!(source = %edge.source_id, target = %edge.target_id, "Rejected circular dependency");
        return DependencyRoutingResult::rejected(
            "Circular dependency detected",
            check.path,
            Some(format!(
                "{} already depends on {} transitively",
                edge.target_id, edge.source_id
            )),
        );
    }

    let hypothetical = match graph.with_edge(edge.clone()) {
        Ok(g) => g,
        Err(e) => {
            return DependencyRoutingResult::rejected("Unknown task", Vec::new(), Some(e.to_string()))
        }
    };

    let before = compute_critical_path(tasks, graph, config);
    let after = compute_critical_path(tasks, &hypothetical, config);

    let lag_delay = if edge.lag_days > 0 && after.contains(&edge.source_id) {
        u64::from(edge.lag_days.unsigned_abs())
    } else {
        0
    };
    let project_delay_days = (after.duration + lag_delay).saturating_sub(before.duration);

    let impact = DependencyImpact {
        project_delay_days,
        affected_task_ids: affected_tasks(&hypothetical, &edge.source_id),
        critical_path_changed: before.path != after.path,
        resource_conflicts: resource_conflicts(source, target),
    };
    let recommendations = recommendations(&edge, source, target, &impact, &after);

    DependencyRoutingResult::Created(RoutedDependency {
        success: true,
        dependency: DependencyInfo::from(&edge),
        impact,
        recommendations,
        applied: false,
    })
}
