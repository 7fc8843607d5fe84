//! Longest-path calculation over the dependency graph.
//!
//! Paths run from prerequisites to dependents. Acyclic graphs use a
//! topological order with forward and backward passes; graphs that still
//! contain a cycle fall back to a bounded exhaustive search with a per-path
//! visited set.

use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use tracing::{debug, trace, warn};

use crate::config::AnalysisConfig;
use crate::graph::DependencyGraph;
use crate::interner::{TaskIdInterner, TaskIdx};
use crate::models::Task;

use super::types::{CriticalPathResult, PathBottleneck, TaskTiming};

/// Pre-computed task data for path calculations. All lookups use direct
/// array indexing; strings only appear at the boundaries.
pub struct PathGraph {
    pub index: TaskIdInterner,
    pub durations: Vec<u64>,
    /// Prerequisites per task, in edge order.
    pub prereqs: Vec<Vec<TaskIdx>>,
    /// Dependents per task, in graph edge order.
    pub dependents: Vec<Vec<TaskIdx>>,
}

impl PathGraph {
    /// Index the tasks in input order. Edges touching unknown ids are ignored.
    pub fn new(tasks: &[Task], graph: &DependencyGraph) -> Self {
        let index = TaskIdInterner::from_ids(tasks.iter().map(|t| t.id.as_str()));
        let n = index.len();

        let mut durations = vec![0u64; n];
        for task in tasks {
            if let Some(idx) = index.get(&task.id) {
                durations[idx as usize] = u64::from(task.duration_days);
            }
        }

        let mut prereqs: Vec<Vec<TaskIdx>> = vec![Vec::new(); n];
        let mut dependents: Vec<Vec<TaskIdx>> = vec![Vec::new(); n];
        for edge in graph.all_edges() {
            let (Some(source), Some(target)) =
                (index.get(&edge.source_id), index.get(&edge.target_id))
            else {
                continue;
            };
            prereqs[source as usize].push(target);
            dependents[target as usize].push(source);
        }

        Self {
            index,
            durations,
            prereqs,
            dependents,
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Tasks with no prerequisites, in index order.
    pub fn roots(&self) -> Vec<TaskIdx> {
        (0..self.len() as TaskIdx)
            .filter(|&i| self.prereqs[i as usize].is_empty())
            .collect()
    }

    /// Kahn's algorithm over prerequisite -> dependent edges.
    /// Returns `None` if the graph has a cycle.
    pub fn topological_order(&self) -> Option<Vec<TaskIdx>> {
        let n = self.len();
        let mut in_degree: Vec<usize> = self.prereqs.iter().map(|p| p.len()).collect();
        let mut queue: VecDeque<TaskIdx> = (0..n as TaskIdx)
            .filter(|&i| in_degree[i as usize] == 0)
            .collect();

        let mut order = Vec::with_capacity(n);
        while let Some(idx) = queue.pop_front() {
            order.push(idx);
            for &dependent in &self.dependents[idx as usize] {
                let degree = &mut in_degree[dependent as usize];
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(dependent);
                }
            }
        }

        (order.len() == n).then_some(order)
    }
}

/// Path found by one of the longest-path strategies, in index space.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LongestPath {
    pub path: Vec<TaskIdx>,
    pub total: u64,
    pub timings: Vec<TaskTiming>,
}

/// Longest path in an acyclic graph via forward and backward passes.
///
/// Ties are broken the same way a depth-first enumeration in index and edge
/// order would break them: the first root with the maximal chain, then at
/// each step the first dependent with the maximal remaining chain.
pub fn longest_path_dag(pg: &PathGraph, order: &[TaskIdx]) -> LongestPath {
    let mut timings: Vec<TaskTiming> = pg
        .durations
        .iter()
        .map(|&duration| TaskTiming {
            duration,
            ..Default::default()
        })
        .collect();

    // Forward pass: longest chain ending at each task.
    for &idx in order {
        let i = idx as usize;
        let best_prereq = pg.prereqs[i]
            .iter()
            .map(|&p| timings[p as usize].longest_to)
            .max()
            .unwrap_or(0);
        timings[i].longest_to = timings[i].duration + best_prereq;
    }

    // Backward pass: longest chain starting at each task.
    for &idx in order.iter().rev() {
        let i = idx as usize;
        let best_dependent = pg.dependents[i]
            .iter()
            .map(|&c| timings[c as usize].longest_from)
            .max()
            .unwrap_or(0);
        timings[i].longest_from = timings[i].duration + best_dependent;
    }

    let mut start: Option<TaskIdx> = None;
    for root in pg.roots() {
        let better = match start {
            None => true,
            Some(s) => timings[root as usize].longest_from > timings[s as usize].longest_from,
        };
        if better {
            start = Some(root);
        }
    }
    let Some(start) = start else {
        return LongestPath::default();
    };
    let total = timings[start as usize].longest_from;

    let mut path = vec![start];
    let mut current = start;
    while let Some(next) = first_max(&pg.dependents[current as usize], |c| {
        timings[c as usize].longest_from
    }) {
        path.push(next);
        current = next;
    }

    for timing in timings.iter_mut() {
        timing.slack = total.saturating_sub(timing.longest_through());
    }

    LongestPath {
        path,
        total,
        timings,
    }
}

/// First element with the maximal key, if any.
fn first_max(items: &[TaskIdx], key: impl Fn(TaskIdx) -> u64) -> Option<TaskIdx> {
    let mut best: Option<(TaskIdx, u64)> = None;
    for &item in items {
        let value = key(item);
        if best.map_or(true, |(_, b)| value > b) {
            best = Some((item, value));
        }
    }
    best.map(|(item, _)| item)
}

/// One frame of the exhaustive search stack.
struct Frame {
    node: TaskIdx,
    cursor: usize,
    /// Whether any dependent was pushed from this frame.
    extended: bool,
}

/// Longest simple path by exhaustive depth-first enumeration.
///
/// Starts from every root in index order, then from any task not yet
/// visited (tasks only reachable through a cycle). A path is complete when
/// its last task has no dependent that is not already on the path. At most
/// `max_paths` complete paths are enumerated; tasks never reached get slack
/// relative to their own duration only.
pub fn longest_path_exhaustive(pg: &PathGraph, max_paths: usize) -> LongestPath {
    let n = pg.len();
    let mut on_path = vec![false; n];
    let mut visited = vec![false; n];
    let mut through = vec![0u64; n];
    let mut best: Option<(Vec<TaskIdx>, u64)> = None;
    let mut recorded = 0usize;
    let mut truncated = false;

    let mut starts: Vec<TaskIdx> = pg.roots();
    starts.extend((0..n as TaskIdx).filter(|i| !pg.prereqs[*i as usize].is_empty()));

    'starts: for start in starts {
        if visited[start as usize] {
            continue;
        }

        let mut stack = vec![Frame {
            node: start,
            cursor: 0,
            extended: false,
        }];
        on_path[start as usize] = true;
        visited[start as usize] = true;
        let mut total = pg.durations[start as usize];

        while let Some(frame) = stack.last_mut() {
            let node = frame.node as usize;
            let next = pg.dependents[node][frame.cursor..]
                .iter()
                .position(|&c| !on_path[c as usize]);

            match next {
                Some(offset) => {
                    let child = pg.dependents[node][frame.cursor + offset];
                    frame.cursor += offset + 1;
                    frame.extended = true;
                    trace!(from = node, to = child, "Extending path");

                    on_path[child as usize] = true;
                    visited[child as usize] = true;
                    total += pg.durations[child as usize];
                    stack.push(Frame {
                        node: child,
                        cursor: 0,
                        extended: false,
                    });
                }
                None => {
                    if !frame.extended {
                        for f in &stack {
                            let slot = &mut through[f.node as usize];
                            *slot = (*slot).max(total);
                        }
                        if best.as_ref().map_or(true, |(_, b)| total > *b) {
                            best = Some((stack.iter().map(|f| f.node).collect(), total));
                        }
                        recorded += 1;
                        if recorded >= max_paths {
                            truncated = true;
                            break 'starts;
                        }
                    }
                    let done = stack.pop();
                    if let Some(done) = done {
                        on_path[done.node as usize] = false;
                        total -= pg.durations[done.node as usize];
                    }
                }
            }
        }
    }

    if truncated {
        warn!(
            max_paths,
            "Path enumeration truncated; critical path may not be the longest"
        );
    }

    let (path, total) = best.unwrap_or_default();
    let timings = (0..n)
        .map(|i| {
            let duration = pg.durations[i];
            let longest = if visited[i] { through[i].max(duration) } else { duration };
            TaskTiming {
                duration,
                longest_to: 0,
                longest_from: 0,
                slack: total.saturating_sub(longest),
            }
        })
        .collect();

    LongestPath {
        path,
        total,
        timings,
    }
}

/// Compute the critical path of a task snapshot.
///
/// The path is the longest-duration chain from a task without prerequisites
/// through its dependents. Same input gives the same path.
pub fn compute_critical_path(
    tasks: &[Task],
    graph: &DependencyGraph,
    config: &AnalysisConfig,
) -> CriticalPathResult {
    let pg = PathGraph::new(tasks, graph);
    if pg.is_empty() {
        return CriticalPathResult::default();
    }

    let longest = match pg.topological_order() {
        Some(order) => longest_path_dag(&pg, &order),
        None => {
            debug!("Dependency graph has a cycle; using exhaustive path search");
            longest_path_exhaustive(&pg, config.max_exhaustive_paths)
        }
    };

    let path = pg.index.resolve_all(&longest.path);
    let mut slack: FxHashMap<String, u32> =
        FxHashMap::with_capacity_and_hasher(pg.len(), Default::default());
    for (i, timing) in longest.timings.iter().enumerate() {
        if let Some(id) = pg.index.resolve(i as TaskIdx) {
            let value = u32::try_from(timing.slack).unwrap_or(u32::MAX);
            slack.insert(id.to_string(), value);
        }
    }
    for id in &path {
        slack.insert(id.clone(), 0);
    }

    let bottlenecks = path_bottlenecks(tasks, &path, config.long_task_factor);

    CriticalPathResult {
        path,
        duration: longest.total,
        bottlenecks,
        slack,
    }
}

/// Annotate path tasks that are unusually long or have no start date.
fn path_bottlenecks(tasks: &[Task], path: &[String], long_task_factor: f64) -> Vec<PathBottleneck> {
    let by_id: FxHashMap<&str, &Task> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();
    let path_tasks: Vec<&Task> = path.iter().filter_map(|id| by_id.get(id.as_str()).copied()).collect();
    if path_tasks.is_empty() {
        return Vec::new();
    }

    let mean = path_tasks
        .iter()
        .map(|t| f64::from(t.duration_days))
        .sum::<f64>()
        / path_tasks.len() as f64;

    let mut bottlenecks = Vec::new();
    for task in &path_tasks {
        if path_tasks.len() > 1 && f64::from(task.duration_days) > long_task_factor * mean {
            bottlenecks.push(PathBottleneck {
                task_id: task.id.clone(),
                duration_days: task.duration_days,
                reason: "Long duration on critical path".to_string(),
            });
        }
        if task.start_date.is_none() {
            bottlenecks.push(PathBottleneck {
                task_id: task.id.clone(),
                duration_days: task.duration_days,
                reason: "Unscheduled task on critical path".to_string(),
            });
        }
    }
    bottlenecks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DependencyEdge;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn make_task(id: &str, duration: u32) -> Task {
        let mut task = Task::new(id, format!("Task {}", id));
        task.duration_days = duration;
        task.start_date = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        task
    }

    /// `deps` entries are (dependent, prerequisite).
    fn make_graph(tasks: &[Task], deps: &[(&str, &str)]) -> DependencyGraph {
        let mut graph = DependencyGraph::with_tasks(tasks.iter().map(|t| t.id.as_str()));
        for (dependent, prereq) in deps {
            graph.add_edge(DependencyEdge::new(*dependent, *prereq)).unwrap();
        }
        graph
    }

    #[test]
    fn test_empty_task_list() {
        let result = compute_critical_path(&[], &DependencyGraph::new(), &AnalysisConfig::default());
        assert!(result.path.is_empty());
        assert_eq!(result.duration, 0);
        assert!(result.bottlenecks.is_empty());
    }

    #[test]
    fn test_single_task_critical_path() {
        let tasks = vec![make_task("A", 5)];
        let graph = make_graph(&tasks, &[]);
        let result = compute_critical_path(&tasks, &graph, &AnalysisConfig::default());

        assert_eq!(result.path, vec!["A"]);
        assert_eq!(result.duration, 5);
        assert_eq!(result.slack_of("A"), 0);
    }

    #[test]
    fn test_branching_path_and_slack() {
        let tasks = vec![make_task("A", 3), make_task("B", 2), make_task("C", 4)];
        let graph = make_graph(&tasks, &[("B", "A"), ("C", "A")]);
        let result = compute_critical_path(&tasks, &graph, &AnalysisConfig::default());

        assert_eq!(result.path, vec!["A", "C"]);
        assert_eq!(result.duration, 7);
        assert!(!result.contains("B"));
        assert_eq!(result.slack_of("B"), 2);
        assert_eq!(result.slack_of("C"), 0);
    }

    #[test]
    fn test_diamond_dependency() {
        // A -> B -> D and A -> C -> D; via C is longer.
        let tasks = vec![
            make_task("A", 2),
            make_task("B", 3),
            make_task("C", 5),
            make_task("D", 1),
        ];
        let graph = make_graph(&tasks, &[("B", "A"), ("C", "A"), ("D", "B"), ("D", "C")]);
        let result = compute_critical_path(&tasks, &graph, &AnalysisConfig::default());

        assert_eq!(result.path, vec!["A", "C", "D"]);
        assert_eq!(result.duration, 8);
        assert_eq!(result.slack_of("B"), 2);
    }

    #[test]
    fn test_ties_keep_first_discovered_path() {
        let tasks = vec![make_task("A", 2), make_task("B", 2), make_task("C", 2)];
        let graph = make_graph(&tasks, &[("C", "A"), ("C", "B")]);
        let result = compute_critical_path(&tasks, &graph, &AnalysisConfig::default());

        assert_eq!(result.path, vec!["A", "C"]);
        assert_eq!(result.slack_of("B"), 0);
    }

    #[test]
    fn test_disconnected_tasks_pick_longest() {
        let tasks = vec![make_task("A", 1), make_task("B", 6), make_task("C", 2)];
        let graph = make_graph(&tasks, &[("C", "A")]);
        let result = compute_critical_path(&tasks, &graph, &AnalysisConfig::default());

        assert_eq!(result.path, vec!["B"]);
        assert_eq!(result.duration, 6);
        assert_eq!(result.slack_of("A"), 3);
    }

    #[test]
    fn test_cyclic_graph_falls_back_to_exhaustive_search() {
        // R -> A -> B -> A (cycle), R -> C
        let tasks = vec![
            make_task("R", 1),
            make_task("A", 2),
            make_task("B", 3),
            make_task("C", 1),
        ];
        let graph = make_graph(&tasks, &[("A", "R"), ("B", "A"), ("A", "B"), ("C", "R")]);
        let pg = PathGraph::new(&tasks, &graph);
        assert!(pg.topological_order().is_none());

        let result = compute_critical_path(&tasks, &graph, &AnalysisConfig::default());
        assert_eq!(result.path, vec!["R", "A", "B"]);
        assert_eq!(result.duration, 6);
        assert_eq!(result.slack_of("C"), 4);
    }

    #[test]
    fn test_pure_cycle_uses_unvisited_start() {
        let tasks = vec![make_task("A", 2), make_task("B", 3)];
        let graph = make_graph(&tasks, &[("A", "B"), ("B", "A")]);
        let result = compute_critical_path(&tasks, &graph, &AnalysisConfig::default());

        assert_eq!(result.path, vec!["A", "B"]);
        assert_eq!(result.duration, 5);
    }

    #[test]
    fn test_exhaustive_search_respects_path_cap() {
        let tasks = vec![
            make_task("R", 1),
            make_task("A", 1),
            make_task("B", 9),
            make_task("X", 1),
        ];
        let graph = make_graph(&tasks, &[("A", "R"), ("B", "R"), ("X", "X")]);
        let pg = PathGraph::new(&tasks, &graph);
        let longest = longest_path_exhaustive(&pg, 1);

        assert_eq!(longest.path, vec![0, 1]);
        assert_eq!(longest.total, 2);
        // B and X were never reached.
        assert_eq!(longest.timings[2].slack, 0);
        assert_eq!(longest.timings[3].slack, 1);
    }

    #[test]
    fn test_path_bottlenecks() {
        let mut tasks = vec![make_task("A", 1), make_task("B", 1), make_task("C", 10)];
        tasks[1].start_date = None;
        let graph = make_graph(&tasks, &[("B", "A"), ("C", "B")]);
        let result = compute_critical_path(&tasks, &graph, &AnalysisConfig::default());

        assert_eq!(result.path, vec!["A", "B", "C"]);
        let reasons: Vec<(&str, &str)> = result
            .bottlenecks
            .iter()
            .map(|b| (b.task_id.as_str(), b.reason.as_str()))
            .collect();
        assert_eq!(
            reasons,
            vec![
                ("B", "Unscheduled task on critical path"),
                ("C", "Long duration on critical path"),
            ]
        );
    }

    fn arb_dag() -> impl Strategy<Value = (Vec<u32>, Vec<(usize, usize)>)> {
        (1usize..9).prop_flat_map(|n| {
            (
                prop::collection::vec(0u32..20, n),
                prop::collection::vec((0..n, 0..n), 0..(n * 2)),
            )
        })
    }

    /// Edges go from a higher index (dependent) to a lower one (prerequisite).
    fn build((durations, raw): &(Vec<u32>, Vec<(usize, usize)>)) -> (Vec<Task>, DependencyGraph) {
        let tasks: Vec<Task> = durations
            .iter()
            .enumerate()
            .map(|(i, &d)| make_task(&format!("T{}", i), d))
            .collect();
        let mut graph = DependencyGraph::with_tasks(tasks.iter().map(|t| t.id.as_str()));
        for &(a, b) in raw {
            if a != b {
                let (dependent, prereq) = (a.max(b), a.min(b));
                graph
                    .add_edge(DependencyEdge::new(format!("T{}", dependent), format!("T{}", prereq)))
                    .unwrap();
            }
        }
        (tasks, graph)
    }

    /// Edges in any direction, plus a T0 <-> T(n-1) loop so the graph is
    /// always cyclic.
    fn build_cyclic(
        (durations, raw): &(Vec<u32>, Vec<(usize, usize)>),
    ) -> (Vec<Task>, DependencyGraph) {
        let tasks: Vec<Task> = durations
            .iter()
            .enumerate()
            .map(|(i, &d)| make_task(&format!("T{}", i), d))
            .collect();
        let last = tasks.len() - 1;
        let mut pairs: Vec<(usize, usize)> = vec![(0, last), (last, 0)];
        for &pair in raw {
            if pair.0 != pair.1 && !pairs.contains(&pair) {
                pairs.push(pair);
            }
        }
        let mut graph = DependencyGraph::with_tasks(tasks.iter().map(|t| t.id.as_str()));
        for (dependent, prereq) in pairs {
            graph
                .add_edge(DependencyEdge::new(format!("T{}", dependent), format!("T{}", prereq)))
                .unwrap();
        }
        (tasks, graph)
    }

    fn arb_cyclic() -> impl Strategy<Value = (Vec<u32>, Vec<(usize, usize)>)> {
        (2usize..7).prop_flat_map(|n| {
            (
                prop::collection::vec(0u32..20, n),
                prop::collection::vec((0..n, 0..n), 0..(n * 2)),
            )
        })
    }

    proptest! {
        #[test]
        fn prop_cyclic_duration_bounded_by_tasks(input in arb_cyclic()) {
            let (tasks, graph) = build_cyclic(&input);
            prop_assert!(PathGraph::new(&tasks, &graph).topological_order().is_none());

            let config = AnalysisConfig::default();
            let result = compute_critical_path(&tasks, &graph, &config);
            let max = tasks.iter().map(|t| u64::from(t.duration_days)).max().unwrap_or(0);
            let sum: u64 = tasks.iter().map(|t| u64::from(t.duration_days)).sum();
            prop_assert!(result.duration >= max);
            prop_assert!(result.duration <= sum);

            let again = compute_critical_path(&tasks, &graph, &config);
            prop_assert_eq!(result.path, again.path);
            prop_assert_eq!(result.duration, again.duration);
        }

        #[test]
        fn prop_duration_bounded_by_tasks(input in arb_dag()) {
            let (tasks, graph) = build(&input);
            let result = compute_critical_path(&tasks, &graph, &AnalysisConfig::default());
            let max = tasks.iter().map(|t| u64::from(t.duration_days)).max().unwrap_or(0);
            let sum: u64 = tasks.iter().map(|t| u64::from(t.duration_days)).sum();

            prop_assert!(result.duration >= max);
            prop_assert!(result.duration <= sum);
        }

        #[test]
        fn prop_repeated_runs_agree(input in arb_dag()) {
            let (tasks, graph) = build(&input);
            let config = AnalysisConfig::default();
            let first = compute_critical_path(&tasks, &graph, &config);
            let second = compute_critical_path(&tasks, &graph, &config);
            prop_assert_eq!(first.path, second.path);
            prop_assert_eq!(first.duration, second.duration);
        }

        #[test]
        fn prop_dag_passes_match_exhaustive_search(input in arb_dag()) {
            let (tasks, graph) = build(&input);
            let pg = PathGraph::new(&tasks, &graph);
            let order = pg.topological_order().unwrap();
            let fast = longest_path_dag(&pg, &order);
            let slow = longest_path_exhaustive(&pg, usize::MAX);

            prop_assert_eq!(&fast.path, &slow.path);
            prop_assert_eq!(fast.total, slow.total);
            let fast_slack: Vec<u64> = fast.timings.iter().map(|t| t.slack).collect();
            let slow_slack: Vec<u64> = slow.timings.iter().map(|t| t.slack).collect();
            prop_assert_eq!(fast_slack, slow_slack);
        }
    }
}
