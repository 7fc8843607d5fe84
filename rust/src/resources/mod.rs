//! Resource allocation analysis.
//!
//! Tasks are grouped by assignee; each group's estimated effort is compared
//! against the working days its dated tasks span. The model is coarse on
//! purpose: overlapping windows are counted once per task.

mod busy;

pub use busy::{windows_overlap, BusyCalendar};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

use crate::models::{DateWindow, Task};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Errors raised by an analysis step.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Capacity must be a positive number of hours per day, got {0}")]
    InvalidCapacity(f64),
}

/// Effort booked on one dated task.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    pub task_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub hours: f64,
}

/// Load summary for one assignee.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: String,
    pub name: String,
    pub capacity_per_day: f64,
    pub allocations: Vec<Allocation>,
    /// Allocation windows merged into sorted, non-overlapping ranges.
    pub busy_periods: Vec<DateWindow>,
    /// All tasks of this assignee, dated or not.
    pub task_count: usize,
    pub total_allocated_hours: f64,
    pub available_hours: f64,
    pub working_days: u32,
    pub utilization: u32,
    pub overallocation: bool,
}

/// Working days booked by one allocation: whole days spanned, at least one.
fn allocation_days(start: DateTime<Utc>, end: DateTime<Utc>) -> u32 {
    let days = ((end - start).num_milliseconds() as f64 / MILLIS_PER_DAY).ceil();
    if days < 1.0 {
        1
    } else if days >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        days as u32
    }
}

/// Summarize one assignee's tasks.
fn summarize(name: &str, tasks: &[&Task], capacity_per_day: f64) -> Resource {
    let allocations: Vec<Allocation> = tasks
        .iter()
        .filter_map(|task| {
            let (start, end) = task.window()?;
            Some(Allocation {
                task_id: task.id.clone(),
                start,
                end,
                hours: task.estimated_effort_hours.max(0.0),
            })
        })
        .collect();

    let total_allocated_hours: f64 = allocations.iter().map(|a| a.hours).sum();
    let working_days = allocations
        .iter()
        .map(|a| allocation_days(a.start, a.end))
        .fold(0u32, u32::saturating_add);
    let available_hours = f64::from(working_days) * capacity_per_day;

    let utilization = if available_hours > 0.0 {
        let ratio = (total_allocated_hours / available_hours * 100.0).round();
        if ratio >= f64::from(u32::MAX) {
            u32::MAX
        } else {
            ratio.max(0.0) as u32
        }
    } else {
        0
    };

    let busy = BusyCalendar::from_windows(allocations.iter().map(|a| (a.start, a.end)).collect());

    Resource {
        id: name.to_string(),
        name: name.to_string(),
        capacity_per_day,
        allocations,
        busy_periods: busy.windows(),
        task_count: tasks.len(),
        total_allocated_hours,
        available_hours,
        working_days,
        utilization,
        overallocation: utilization > 100,
    }
}

/// Per-assignee utilization, sorted by assignee name. Unassigned tasks are
/// not a resource.
pub fn analyze_resources(
    tasks: &[Task],
    capacity_per_day: f64,
) -> Result<Vec<Resource>, AnalysisError> {
    if !capacity_per_day.is_finite() || capacity_per_day <= 0.0 {
        return Err(AnalysisError::InvalidCapacity(capacity_per_day));
    }

    let mut groups: BTreeMap<&str, Vec<&Task>> = BTreeMap::new();
    for task in tasks.iter().filter(|t| t.is_assigned()) {
        groups.entry(task.assignee.as_str()).or_default().push(task);
    }

    let resources: Vec<Resource> = groups
        .into_iter()
        .map(|(name, group)| summarize(name, &group, capacity_per_day))
        .collect();

    for resource in resources.iter().filter(|r| r.overallocation) {
        debug!(
            resource = %resource.name,
            utilization = resource.utilization,
            "Resource overallocated"
        );
    }

    Ok(resources)
}
