//! Circular dependency detection.
//!
//! Traversal follows owned edges (dependent -> prerequisite) with an explicit
//! work stack, so deep chains cannot overflow the call stack.

use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::{trace, warn};

use crate::graph::{DependencyGraph, GraphError};
use crate::models::DependencyEdge;

/// Outcome of a cycle check.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleCheck {
    pub has_cycle: bool,
    /// Traversal path at the moment the cycle was found. Not necessarily the
    /// minimal cycle.
    pub path: Vec<String>,
}

impl CycleCheck {
    fn none() -> Self {
        Self::default()
    }

    fn found(path: Vec<String>) -> Self {
        Self {
            has_cycle: true,
            path,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    /// On the current traversal stack.
    Grey,
    /// Fully explored.
    Black,
}

/// One DFS frame: the node and how many of its edges were already followed.
struct Frame<'a> {
    id: &'a str,
    cursor: usize,
}

/// Check whether `proposed` (or, with `None`, the graph itself) contains a
/// cycle.
///
/// With a proposed edge, the traversal starts from the edge's target and
/// reports a cycle when it reaches the edge's source or revisits a node on
/// the current stack. The graph is not modified.
pub fn try_detect_cycle(
    graph: &DependencyGraph,
    proposed: Option<&DependencyEdge>,
) -> Result<CycleCheck, GraphError> {
    graph.validate()?;
    let Some(edge) = proposed else {
        return Ok(audit_cycles(graph));
    };

    for id in [&edge.source_id, &edge.target_id] {
        if !graph.contains(id) {
            return Err(GraphError::UnknownTask(id.clone()));
        }
    }
    if edge.source_id == edge.target_id {
        return Ok(CycleCheck::found(vec![edge.target_id.clone()]));
    }

    let mut marks: FxHashMap<&str, Mark> = FxHashMap::default();
    Ok(walk_from(graph, &edge.target_id, Some(&edge.source_id), &mut marks)
        .unwrap_or_else(CycleCheck::none))
}

/// Advisory form of [`try_detect_cycle`]: a failing check is logged and
/// reported as "no cycle".
pub fn detect_cycle(graph: &DependencyGraph, proposed: Option<&DependencyEdge>) -> CycleCheck {
    match try_detect_cycle(graph, proposed) {
        Ok(check) => check,
        Err(e) => {
            warn!(error = %e, "Cycle detection failed; assuming no cycle");
            CycleCheck::none()
        }
    }
}

/// Full-graph audit: colored DFS from every node in graph order.
pub fn audit_cycles(graph: &DependencyGraph) -> CycleCheck {
    let mut marks: FxHashMap<&str, Mark> = FxHashMap::default();
    for id in graph.task_ids() {
        if marks.contains_key(id) {
            continue;
        }
        if let Some(check) = walk_from(graph, id, None, &mut marks) {
            return check;
        }
    }
    CycleCheck::none()
}

/// Iterative DFS from `start`. Returns the first cycle found, if any.
///
/// When `closing` is set, reaching that node also counts as a cycle (the
/// proposed edge would close the loop back to `start`).
fn walk_from<'a>(
    graph: &'a DependencyGraph,
    start: &'a str,
    closing: Option<&str>,
    marks: &mut FxHashMap<&'a str, Mark>,
) -> Option<CycleCheck> {
    let mut stack: Vec<Frame<'a>> = vec![Frame {
        id: start,
        cursor: 0,
    }];
    marks.insert(start, Mark::Grey);

    while let Some(frame) = stack.last_mut() {
        let edges = graph.edges(frame.id);
        let Some(edge) = edges.get(frame.cursor) else {
            marks.insert(frame.id, Mark::Black);
            stack.pop();
            continue;
        };
        frame.cursor += 1;
        let next = edge.target_id.as_str();
        trace!(from = %edge.source_id, to = %next, "Following dependency");

        if closing == Some(next) {
            let mut path = stack_ids(&stack, 0);
            path.push(next.to_string());
            return Some(CycleCheck::found(path));
        }

        match marks.get(next) {
            Some(Mark::Grey) => {
                let from = stack.iter().position(|f| f.id == next).unwrap_or(0);
                let mut path = stack_ids(&stack, from);
                path.push(next.to_string());
                return Some(CycleCheck::found(path));
            }
            Some(Mark::Black) => {}
            None => {
                marks.insert(next, Mark::Grey);
                stack.push(Frame {
                    id: next,
                    cursor: 0,
                });
            }
        }
    }

    None
}

fn stack_ids(stack: &[Frame<'_>], from: usize) -> Vec<String> {
    stack[from..].iter().map(|f| f.id.to_string()).collect()
}
