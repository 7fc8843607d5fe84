//! Core data types for the scheduling analysis.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Assignee label used when a task has no assignee. Never treated as a resource.
pub const UNASSIGNED: &str = "Unassigned";

/// Direction of a tracker link relative to the issue that carries it.
///
/// A directed link reads "source <outward name> target". For YouTrack's
/// `Depend` type the outward name is "depends on", so the issue holding the
/// `OUTWARD` half is the dependent and the one holding `INWARD` is the
/// prerequisite ("is required for").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LinkDirection {
    /// The carrying issue is the link's source; it reads with the outward name.
    Outward,
    /// The carrying issue is the link's target; it reads with the inward name.
    Inward,
    /// Symmetric link types such as "Relates".
    Both,
}

/// A link as found on an issue record, kept on the task for graph building.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLink {
    /// Link-type label as reported by the tracker (e.g. "Depend").
    pub link_type: String,
    /// Outward name of the link type (e.g. "depends on", "blocks"), when the
    /// tracker reported it.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub outward_name: Option<String>,
    pub direction: LinkDirection,
    pub issue_ids: Vec<String>,
}

/// Temporal dependency kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DependencyKind {
    /// Finish-to-Start
    FS,
    /// Start-to-Start
    SS,
    /// Finish-to-Finish
    FF,
    /// Start-to-Finish
    SF,
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::FS => "FS",
            Self::SS => "SS",
            Self::FF => "FF",
            Self::SF => "SF",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for DependencyKind {
    type Err = String;

    /// Accepts the short codes ("FS") and the long names ("finish-to-start"),
    /// case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['_', ' '], "-").as_str() {
            "fs" | "finish-to-start" => Ok(Self::FS),
            "ss" | "start-to-start" => Ok(Self::SS),
            "ff" | "finish-to-finish" => Ok(Self::FF),
            "sf" | "start-to-finish" => Ok(Self::SF),
            other => Err(format!("Unknown dependency type: {}", other)),
        }
    }
}

/// Whether a dependency must be honoured or is advisory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyConstraint {
    #[default]
    Hard,
    Soft,
}

impl fmt::Display for DependencyConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hard => write!(f, "hard"),
            Self::Soft => write!(f, "soft"),
        }
    }
}

impl FromStr for DependencyConstraint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hard" => Ok(Self::Hard),
            "soft" => Ok(Self::Soft),
            other => Err(format!("Unknown dependency constraint: {}", other)),
        }
    }
}

/// A directed dependency: `source_id` depends on `target_id`.
///
/// Scheduling traverses these edges in reverse (target -> dependents).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyEdge {
    pub source_id: String,
    pub target_id: String,
    pub kind: DependencyKind,
    /// Lag in days; negative values are lead time.
    pub lag_days: i32,
    pub constraint: DependencyConstraint,
}

impl DependencyEdge {
    /// A hard finish-to-start edge with no lag.
    pub fn new(source_id: impl Into<String>, target_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            kind: DependencyKind::FS,
            lag_days: 0,
            constraint: DependencyConstraint::Hard,
        }
    }

    pub fn with_kind(mut self, kind: DependencyKind) -> Self {
        self.kind = kind;
        self
    }
}

/// One schedulable unit, normalized from a tracker issue.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub priority_label: Option<String>,
    pub assignee: String,
    pub start_date: Option<DateTime<Utc>>,
    /// Due date if known, otherwise the resolution timestamp.
    pub end_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub resolved_date: Option<DateTime<Utc>>,
    pub progress_percent: u8,
    pub duration_days: u32,
    pub estimated_effort_hours: f64,
    pub actual_effort_hours: f64,
    pub resource_utilization_percent: u32,
    /// Written only by the scheduler.
    pub is_on_critical_path: bool,
    /// Written only by the scheduler.
    pub slack_days: u32,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub links: Vec<RawLink>,
}

impl Task {
    /// Create an unscheduled, unassigned task.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            status: "Unknown".to_string(),
            priority_label: None,
            assignee: UNASSIGNED.to_string(),
            start_date: None,
            end_date: None,
            due_date: None,
            resolved_date: None,
            progress_percent: 0,
            duration_days: 0,
            estimated_effort_hours: 0.0,
            actual_effort_hours: 0.0,
            resource_utilization_percent: 0,
            is_on_critical_path: false,
            slack_days: 0,
            links: Vec::new(),
        }
    }

    pub fn is_assigned(&self) -> bool {
        !self.assignee.is_empty() && self.assignee != UNASSIGNED
    }

    /// The (start, end) window if both ends are known.
    pub fn window(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        }
    }
}

/// Inclusive-exclusive time window used in reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_kind_parsing() {
        assert_eq!("FS".parse::<DependencyKind>(), Ok(DependencyKind::FS));
        assert_eq!("start_to_start".parse::<DependencyKind>(), Ok(DependencyKind::SS));
        assert_eq!("Finish to Finish".parse::<DependencyKind>(), Ok(DependencyKind::FF));
        assert_eq!("sf".parse::<DependencyKind>(), Ok(DependencyKind::SF));
        assert!("sideways".parse::<DependencyKind>().is_err());
    }

    #[test]
    fn test_task_serializes_camel_case() {
        let task = Task::new("PRJ-1", "Design");
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["isOnCriticalPath"], false);
        assert_eq!(json["durationDays"], 0);
        assert_eq!(json["assignee"], UNASSIGNED);
        assert!(json.get("links").is_none());
    }

    #[test]
    fn test_edge_serializes_kind_and_constraint() {
        let edge = DependencyEdge::new("B", "A").with_kind(DependencyKind::SS);
        let json = serde_json::to_value(&edge).unwrap();
        assert_eq!(json["kind"], "SS");
        assert_eq!(json["constraint"], "hard");
        assert_eq!(json["sourceId"], "B");
    }
}
