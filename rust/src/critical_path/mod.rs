//! Critical path scheduling.
//!
//! Durations and progress estimates for individual tasks, the longest
//! dependency chain through a task snapshot, and per-task slack.

mod calculation;
mod schedule;
mod types;

pub use calculation::{
    compute_critical_path, longest_path_dag, longest_path_exhaustive, LongestPath, PathGraph,
};
pub use schedule::{apply_critical_path, compute_schedule, estimate_progress, task_duration_days};
pub use types::{CriticalPathResult, PathBottleneck, Schedule, TaskTiming};
