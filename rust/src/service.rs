//! Fetch → analyze orchestration behind every tool.
//!
//! The tracker is reached through [`IssueSource`]; everything after the fetch
//! is synchronous analysis on an owned snapshot.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::adapter::normalize_issues;
use crate::chart::{assemble_chart, GanttChart, GanttOptions};
use crate::config::AnalysisConfig;
use crate::critical_path::{compute_schedule, Schedule};
use crate::graph::{build_dependency_graph, GraphError};
use crate::models::Task;
use crate::network::{analyze_network, NetworkAnalysis};
use crate::resources::{analyze_resources, AnalysisError, Resource};
use crate::routing::{route_dependency, DependencyRequest, DependencyRoutingResult};

/// Failures talking to the issue tracker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("Request failed: {0}")]
    Request(String),
    #[error("Tracker returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Could not decode tracker response: {0}")]
    Decode(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Where raw issue records come from and where link commands go.
#[async_trait]
pub trait IssueSource: Send + Sync {
    /// All issues of a project as raw JSON records.
    async fn fetch_issues(&self, project_id: &str) -> Result<Vec<Value>, SourceError>;

    /// Apply a tracker command (e.g. `depends on PRJ-2`) to one issue.
    async fn apply_command(&self, issue_id: &str, command: &str) -> Result<(), SourceError>;
}

pub struct GanttService {
    source: Arc<dyn IssueSource>,
    config: AnalysisConfig,
}

impl GanttService {
    pub fn new(source: Arc<dyn IssueSource>, config: AnalysisConfig) -> Self {
        Self { source, config }
    }

    pub async fn fetch_tasks(&self, project_id: &str) -> Result<Vec<Task>, ServiceError> {
        let issues = self.source.fetch_issues(project_id).await?;
        let tasks = normalize_issues(&issues, &self.config, Utc::now());
        debug!(
            project = %project_id,
            records = issues.len(),
            tasks = tasks.len(),
            "Fetched project snapshot"
        );
        Ok(tasks)
    }

    pub async fn gantt_chart(
        &self,
        project_id: &str,
        options: GanttOptions,
    ) -> Result<GanttChart, ServiceError> {
        let tasks = self.fetch_tasks(project_id).await?;
        Ok(assemble_chart(project_id, tasks, options, &self.config, Utc::now()))
    }

    /// Tasks marked with slack and critical flags, plus the path itself.
    pub async fn critical_path(&self, project_id: &str) -> Result<Schedule, ServiceError> {
        let tasks = self.fetch_tasks(project_id).await?;
        let graph = build_dependency_graph(&tasks, &self.config.link_rules);
        Ok(compute_schedule(&tasks, &graph, &self.config))
    }

    /// `capacity_per_day` overrides the configured capacity when given.
    pub async fn resources(
        &self,
        project_id: &str,
        capacity_per_day: Option<f64>,
    ) -> Result<Vec<Resource>, ServiceError> {
        let tasks = self.fetch_tasks(project_id).await?;
        let capacity = capacity_per_day.unwrap_or(self.config.capacity_hours_per_day);
        Ok(analyze_resources(&tasks, capacity)?)
    }

    pub async fn network(&self, project_id: &str) -> Result<NetworkAnalysis, ServiceError> {
        let tasks = self.fetch_tasks(project_id).await?;
        let graph = build_dependency_graph(&tasks, &self.config.link_rules);
        Ok(analyze_network(&graph, &tasks)?)
    }

    /// Validate a dependency and, unless `dry_run`, commit it to the tracker.
    ///
    /// Rejections are returned as results. Only tracker failures are errors.
    pub async fn create_dependency(
        &self,
        project_id: &str,
        request: DependencyRequest,
        dry_run: bool,
    ) -> Result<DependencyRoutingResult, ServiceError> {
        let tasks = self.fetch_tasks(project_id).await?;
        let graph = build_dependency_graph(&tasks, &self.config.link_rules);
        let mut result = route_dependency(&tasks, &graph, &request, &self.config);

        if let DependencyRoutingResult::Created(routed) = &mut result {
            if !dry_run {
                let command = self.config.link_rules.command_for(&request.target_id);
                self.source
                    .apply_command(&request.source_id, &command)
                    .await?;
                routed.applied = true;
                info!(
                    source = %request.source_id,
                    target = %request.target_id,
                    delay = routed.impact.project_delay_days,
                    "Created dependency"
                );
            }
        }
        Ok(result)
    }
}
