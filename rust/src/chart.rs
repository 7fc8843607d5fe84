//! Gantt chart assembly.
//!
//! Composes the schedule, resource and network analyses into one result.
//! Sub-analyses that fail are logged and replaced by a neutral section; the
//! chart itself is always produced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::AnalysisConfig;
use crate::critical_path::{compute_schedule, CriticalPathResult};
use crate::graph::build_dependency_graph;
use crate::models::Task;
use crate::network::{analyze_network, HealthRating, NetworkAnalysis};
use crate::resources::{analyze_resources, Resource};

fn default_true() -> bool {
    true
}

/// Caller-controlled chart options.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GanttOptions {
    #[serde(default = "default_true")]
    pub include_critical_path: bool,
    #[serde(default = "default_true")]
    pub include_resources: bool,
    /// Keep only tasks overlapping this window. Undated tasks are always kept.
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
}

impl Default for GanttOptions {
    fn default() -> Self {
        Self {
            include_critical_path: true,
            include_resources: true,
            start_date: None,
            end_date: None,
        }
    }
}

impl GanttOptions {
    fn keeps(&self, task: &Task) -> bool {
        let (task_start, task_end) = match (task.start_date, task.end_date) {
            (None, None) => return true,
            (Some(s), None) => (s, s),
            (None, Some(e)) => (e, e),
            (Some(s), Some(e)) => (s, e),
        };
        let after_window = self.end_date.is_some_and(|end| task_start > end);
        let before_window = self.start_date.is_some_and(|start| task_end < start);
        !after_window && !before_window
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetadata {
    pub generated_at: DateTime<Utc>,
    /// Earliest start and latest end over the chart items.
    pub date_range: DateRange,
    pub options: GanttOptions,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GanttChart {
    pub project_id: String,
    pub metadata: ChartMetadata,
    pub items: Vec<Task>,
    pub critical_path: Option<CriticalPathResult>,
    pub resources: Option<Vec<Resource>>,
    pub network_metrics: NetworkAnalysis,
    pub recommendations: Vec<String>,
}

fn date_range(tasks: &[Task]) -> DateRange {
    DateRange {
        start: tasks.iter().filter_map(|t| t.start_date).min(),
        end: tasks.iter().filter_map(|t| t.end_date).max(),
    }
}

fn recommendations(
    items: &[Task],
    critical_path: &CriticalPathResult,
    resources: &[Resource],
    network: &NetworkAnalysis,
) -> Vec<String> {
    let mut out = Vec::new();

    if items.len() > 2 && critical_path.path.len() * 2 > items.len() {
        out.push(format!(
            "{} of {} tasks are on the critical path; look for work that can run in parallel",
            critical_path.path.len(),
            items.len()
        ));
    }
    for bottleneck in &critical_path.bottlenecks {
        out.push(format!("{}: {}", bottleneck.task_id, bottleneck.reason));
    }
    for resource in resources.iter().filter(|r| r.overallocation) {
        out.push(format!(
            "{} is overallocated at {}% utilization; rebalance assignments",
            resource.name, resource.utilization
        ));
    }
    for bottleneck in &network.bottlenecks {
        out.push(format!(
            "{} has {} dependent tasks; finishing it early unblocks the most work",
            bottleneck.task_id, bottleneck.dependent_count
        ));
    }
    if network.metrics.has_cycles {
        out.push(format!(
            "Circular dependency detected ({}); break the cycle to get a reliable schedule",
            network.metrics.cycle_path.join(" -> ")
        ));
    }
    if matches!(network.health_rating, HealthRating::Fair | HealthRating::Poor) {
        out.push(format!(
            "Dependency network health is {} ({}/100); consider simplifying dependencies",
            network.health_rating, network.health_score
        ));
    }
    let unscheduled = items.iter().filter(|t| t.start_date.is_none()).count();
    if unscheduled > 0 {
        out.push(format!(
            "{} task(s) have no start date; add dates for a more accurate schedule",
            unscheduled
        ));
    }
    out
}

/// Build the full chart for a project snapshot.
pub fn assemble_chart(
    project_id: &str,
    tasks: Vec<Task>,
    options: GanttOptions,
    config: &AnalysisConfig,
    now: DateTime<Utc>,
) -> GanttChart {
    let tasks: Vec<Task> = tasks.into_iter().filter(|t| options.keeps(t)).collect();
    let graph = build_dependency_graph(&tasks, &config.link_rules);
    let schedule = compute_schedule(&tasks, &graph, config);
    let items = schedule.tasks;

    let resources = match analyze_resources(&items, config.capacity_hours_per_day) {
        Ok(resources) => resources,
        Err(e) => {
            warn!(project = %project_id, error = %e, "Resource analysis failed; section left empty");
            Vec::new()
        }
    };
    let network = match analyze_network(&graph, &items) {
        Ok(network) => network,
        Err(e) => {
            warn!(project = %project_id, error = %e, "Network analysis failed; using neutral metrics");
            NetworkAnalysis::neutral(items.len())
        }
    };

    let recommendations = recommendations(&items, &schedule.critical_path, &resources, &network);
    info!(
        project = %project_id,
        items = items.len(),
        dependencies = graph.edge_count(),
        health = network.health_score,
        "Assembled Gantt chart"
    );

    GanttChart {
        project_id: project_id.to_string(),
        metadata: ChartMetadata {
            generated_at: now,
            date_range: date_range(&items),
            options: options.clone(),
        },
        critical_path: options.include_critical_path.then_some(schedule.critical_path),
        resources: options.include_resources.then_some(resources),
        items,
        network_metrics: network,
        recommendations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LinkDirection, RawLink};
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, d, 0, 0, 0).unwrap()
    }

    fn make_task(id: &str, window: Option<(u32, u32)>, depends_on: &[&str]) -> Task {
        let mut task = Task::new(id, format!("Task {}", id));
        if let Some((start, end)) = window {
            task.start_date = Some(day(start));
            task.end_date = Some(day(end));
            task.duration_days = end - start;
        }
        if !depends_on.is_empty() {
            task.links.push(RawLink {
                link_type: "Depend".to_string(),
                outward_name: Some("depends on".to_string()),
                direction: LinkDirection::Outward,
                issue_ids: depends_on.iter().map(|s| s.to_string()).collect(),
            });
        }
        task
    }

    #[test]
    fn test_empty_project() {
        let chart = assemble_chart(
            "PRJ",
            Vec::new(),
            GanttOptions::default(),
            &AnalysisConfig::default(),
            day(1),
        );

        assert!(chart.items.is_empty());
        assert_eq!(chart.critical_path.as_ref().map(|c| c.duration), Some(0));
        assert_eq!(chart.resources, Some(Vec::new()));
        assert_eq!(chart.network_metrics.health_score, 100);
        assert!(chart.recommendations.is_empty());

        let json = serde_json::to_value(&chart).unwrap();
        assert_eq!(json["projectId"], "PRJ");
        assert_eq!(json["criticalPath"]["duration"], 0);
        assert_eq!(json["networkMetrics"]["healthScore"], 100);
        assert!(json["metadata"]["generatedAt"].is_string());
    }

    #[test]
    fn test_chart_composes_sections() {
        let mut tasks = vec![
            make_task("A", Some((1, 4)), &[]),
            make_task("B", Some((4, 6)), &["A"]),
            make_task("C", Some((4, 8)), &["A"]),
        ];
        tasks[2].assignee = "kim".to_string();
        tasks[2].estimated_effort_hours = 48.0;

        let chart = assemble_chart(
            "PRJ",
            tasks,
            GanttOptions::default(),
            &AnalysisConfig::default(),
            day(1),
        );

        let critical = chart.critical_path.as_ref().unwrap();
        assert_eq!(critical.path, vec!["A", "C"]);
        assert_eq!(critical.duration, 7);
        let flags: Vec<(bool, u32)> = chart
            .items
            .iter()
            .map(|t| (t.is_on_critical_path, t.slack_days))
            .collect();
        assert_eq!(flags, vec![(true, 0), (false, 2), (true, 0)]);

        let resources = chart.resources.as_ref().unwrap();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].utilization, 150);
        assert!(chart
            .recommendations
            .iter()
            .any(|r| r.starts_with("kim is overallocated")));

        assert_eq!(chart.network_metrics.metrics.total_dependencies, 2);
        assert_eq!(chart.metadata.date_range.start, Some(day(1)));
        assert_eq!(chart.metadata.date_range.end, Some(day(8)));
    }

    #[test]
    fn test_sections_can_be_excluded() {
        let options = GanttOptions {
            include_critical_path: false,
            include_resources: false,
            ..Default::default()
        };
        let chart = assemble_chart(
            "PRJ",
            vec![make_task("A", Some((1, 2)), &[])],
            options,
            &AnalysisConfig::default(),
            day(1),
        );
        assert!(chart.critical_path.is_none());
        assert!(chart.resources.is_none());
        // Marking still happens.
        assert!(chart.items[0].is_on_critical_path);
    }

    #[test]
    fn test_window_filter_keeps_undated_tasks() {
        let options = GanttOptions {
            start_date: Some(day(10)),
            end_date: Some(day(20)),
            ..Default::default()
        };
        let tasks = vec![
            make_task("EARLY", Some((1, 5)), &[]),
            make_task("INSIDE", Some((12, 14)), &[]),
            make_task("SPANNING", Some((5, 25)), &[]),
            make_task("LATE", Some((22, 28)), &[]),
            make_task("UNDATED", None, &[]),
        ];
        let chart = assemble_chart("PRJ", tasks, options, &AnalysisConfig::default(), day(1));
        let ids: Vec<&str> = chart.items.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["INSIDE", "SPANNING", "UNDATED"]);
        assert!(chart
            .recommendations
            .iter()
            .any(|r| r.starts_with("1 task(s) have no start date")));
    }

    #[test]
    fn test_invalid_capacity_degrades_resources_only() {
        let config = AnalysisConfig {
            capacity_hours_per_day: 0.0,
            ..Default::default()
        };
        let mut task = make_task("A", Some((1, 3)), &[]);
        task.assignee = "lee".to_string();
        let chart = assemble_chart("PRJ", vec![task], GanttOptions::default(), &config, day(1));

        assert_eq!(chart.resources, Some(Vec::new()));
        assert_eq!(chart.critical_path.as_ref().map(|c| c.duration), Some(2));
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: GanttOptions = serde_json::from_str(r#"{"includeResources": false}"#).unwrap();
        assert!(options.include_critical_path);
        assert!(!options.include_resources);
        assert!(options.start_date.is_none());
    }
}
