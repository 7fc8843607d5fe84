//! Per-task derived fields and critical path marking.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::AnalysisConfig;
use crate::graph::DependencyGraph;
use crate::models::Task;

use super::calculation::compute_critical_path;
use super::types::{CriticalPathResult, Schedule};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Whole days from `start` to `end` (or `now` when the task is still open),
/// rounded up. Zero without a start date or when the end is not after the
/// start.
pub fn task_duration_days(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> u32 {
    let Some(start) = start else {
        return 0;
    };
    let millis = (end.unwrap_or(now) - start).num_milliseconds();
    if millis <= 0 {
        return 0;
    }
    let days = (millis as f64 / MILLIS_PER_DAY).ceil();
    if days >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        days as u32
    }
}

/// Completion estimate for tasks without an explicit progress field.
///
/// Resolved tasks are complete; otherwise the state name is matched in
/// order: open/new 0, progress/working 50, review/testing 80, done/closed
/// 100, anything else 25.
pub fn estimate_progress(status: &str, resolved: bool) -> u8 {
    if resolved {
        return 100;
    }
    let status = status.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| status.contains(w));
    if has(&["open", "new"]) {
        0
    } else if has(&["progress", "working"]) {
        50
    } else if has(&["review", "testing"]) {
        80
    } else if has(&["done", "closed"]) {
        100
    } else {
        25
    }
}

/// Write the scheduler-owned fields from a computed path. Running it again
/// with the same result leaves the tasks unchanged.
pub fn apply_critical_path(tasks: &mut [Task], result: &CriticalPathResult) {
    for task in tasks.iter_mut() {
        task.is_on_critical_path = result.contains(&task.id);
        task.slack_days = if task.is_on_critical_path {
            0
        } else {
            result.slack_of(&task.id)
        };
    }
}

/// Compute the critical path and return the tasks with `isOnCriticalPath`
/// and `slackDays` set. Input tasks are not modified.
pub fn compute_schedule(
    tasks: &[Task],
    graph: &DependencyGraph,
    config: &AnalysisConfig,
) -> Schedule {
    let critical_path = compute_critical_path(tasks, graph, config);
    let mut scheduled = tasks.to_vec();
    apply_critical_path(&mut scheduled, &critical_path);

    info!(
        tasks = scheduled.len(),
        path_len = critical_path.path.len(),
        duration = critical_path.duration,
        "Computed critical path"
    );

    Schedule {
        tasks: scheduled,
        critical_path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DependencyEdge;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn make_task(id: &str, duration: u32) -> Task {
        let mut task = Task::new(id, format!("Task {}", id));
        task.duration_days = duration;
        task
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_duration_rounds_up_partial_days() {
        assert_eq!(task_duration_days(Some(at(1, 0)), Some(at(4, 0)), at(20, 0)), 3);
        assert_eq!(task_duration_days(Some(at(1, 0)), Some(at(4, 1)), at(20, 0)), 4);
        assert_eq!(task_duration_days(Some(at(1, 0)), Some(at(1, 0)), at(20, 0)), 0);
    }

    #[test]
    fn test_duration_without_start_is_zero() {
        assert_eq!(task_duration_days(None, Some(at(4, 0)), at(20, 0)), 0);
        assert_eq!(task_duration_days(None, None, at(20, 0)), 0);
    }

    #[test]
    fn test_open_task_runs_until_now() {
        let now = at(1, 0) + Duration::hours(30);
        assert_eq!(task_duration_days(Some(at(1, 0)), None, now), 2);
    }

    #[test]
    fn test_end_before_start_is_zero() {
        assert_eq!(task_duration_days(Some(at(5, 0)), Some(at(1, 0)), at(20, 0)), 0);
    }

    #[test]
    fn test_progress_heuristic() {
        assert_eq!(estimate_progress("In Progress", true), 100);
        assert_eq!(estimate_progress("Open", false), 0);
        assert_eq!(estimate_progress("New", false), 0);
        assert_eq!(estimate_progress("In Progress", false), 50);
        assert_eq!(estimate_progress("Working", false), 50);
        assert_eq!(estimate_progress("Code Review", false), 80);
        assert_eq!(estimate_progress("Testing", false), 80);
        assert_eq!(estimate_progress("Done", false), 100);
        assert_eq!(estimate_progress("Closed", false), 100);
        assert_eq!(estimate_progress("Submitted", false), 25);
        // "Reopened" contains "open".
        assert_eq!(estimate_progress("Reopened", false), 0);
    }

    #[test]
    fn test_schedule_marks_critical_tasks() {
        let tasks = vec![make_task("A", 3), make_task("B", 2), make_task("C", 4)];
        let mut graph = DependencyGraph::with_tasks(["A", "B", "C"]);
        graph.add_edge(DependencyEdge::new("B", "A")).unwrap();
        graph.add_edge(DependencyEdge::new("C", "A")).unwrap();

        let schedule = compute_schedule(&tasks, &graph, &AnalysisConfig::default());
        let flags: Vec<(bool, u32)> = schedule
            .tasks
            .iter()
            .map(|t| (t.is_on_critical_path, t.slack_days))
            .collect();

        assert_eq!(flags, vec![(true, 0), (false, 2), (true, 0)]);
        assert_eq!(schedule.critical_path.duration, 7);
        // Input is untouched.
        assert!(tasks.iter().all(|t| !t.is_on_critical_path));
    }

    #[test]
    fn test_marking_clears_stale_flags() {
        let mut tasks = vec![make_task("A", 1), make_task("B", 5)];
        tasks[0].is_on_critical_path = true;
        tasks[0].slack_days = 9;
        let graph = DependencyGraph::with_tasks(["A", "B"]);

        let schedule = compute_schedule(&tasks, &graph, &AnalysisConfig::default());
        assert!(!schedule.tasks[0].is_on_critical_path);
        assert_eq!(schedule.tasks[0].slack_days, 4);
        assert!(schedule.tasks[1].is_on_critical_path);
    }

    proptest! {
        #[test]
        fn prop_marking_is_idempotent(
            durations in prop::collection::vec(0u32..15, 1..8),
            raw in prop::collection::vec((0usize..8, 0usize..8), 0..12),
        ) {
            let n = durations.len();
            let tasks: Vec<Task> = durations
                .iter()
                .enumerate()
                .map(|(i, &d)| make_task(&format!("T{}", i), d))
                .collect();
            let mut graph = DependencyGraph::with_tasks(tasks.iter().map(|t| t.id.as_str()));
            for (a, b) in raw {
                let (a, b) = (a % n, b % n);
                if a != b {
                    graph.add_edge(DependencyEdge::new(format!("T{}", a), format!("T{}", b))).unwrap();
                }
            }
            let config = AnalysisConfig::default();

            let once = compute_schedule(&tasks, &graph, &config);
            let twice = compute_schedule(&once.tasks, &graph, &config);
            let flags = |s: &Schedule| -> Vec<(bool, u32)> {
                s.tasks.iter().map(|t| (t.is_on_critical_path, t.slack_days)).collect()
            };
            prop_assert_eq!(flags(&once), flags(&twice));
        }
    }
}
