//! Types for critical path analysis.

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::models::Task;

/// Reason attached to a task on the critical path that deserves attention.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathBottleneck {
    pub task_id: String,
    /// Duration this task contributes to the path.
    pub duration_days: u32,
    pub reason: String,
}

/// Longest-duration chain of dependent tasks.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CriticalPathResult {
    /// Task ids from the first prerequisite to the last dependent.
    pub path: Vec<String>,
    /// Sum of the path tasks' durations, in days.
    pub duration: u64,
    pub bottlenecks: Vec<PathBottleneck>,
    /// Slack per task id. Path tasks have 0.
    #[serde(skip)]
    pub slack: FxHashMap<String, u32>,
}

impl CriticalPathResult {
    pub fn contains(&self, task_id: &str) -> bool {
        self.path.iter().any(|id| id == task_id)
    }

    pub fn slack_of(&self, task_id: &str) -> u32 {
        self.slack.get(task_id).copied().unwrap_or(0)
    }
}

/// Per-task timing information from the longest-path passes.
///
/// `longest_to` is the longest chain ending with this task (inclusive),
/// `longest_from` the longest chain starting with it (inclusive).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TaskTiming {
    pub duration: u64,
    pub longest_to: u64,
    pub longest_from: u64,
    /// Critical duration minus the longest path through this task.
    pub slack: u64,
}

impl TaskTiming {
    /// Longest root-to-leaf path that passes through this task.
    pub fn longest_through(&self) -> u64 {
        (self.longest_to + self.longest_from).saturating_sub(self.duration)
    }
}

/// Tasks with their scheduler-owned fields filled in, plus the path they
/// were derived from.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub tasks: Vec<Task>,
    pub critical_path: CriticalPathResult,
}
