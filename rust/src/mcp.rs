//! MCP tool surface over stdio.

use std::{future::Future, str::FromStr, sync::Arc};

use rmcp::{
    ErrorData, ServerHandler, ServiceExt,
    handler::server::tool::{Parameters, ToolRouter},
    model::{
        CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
    },
    schemars, tool, tool_handler, tool_router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::adapter::parse_date_str;
use crate::chart::GanttOptions;
use crate::models::{DependencyConstraint, DependencyKind, Task};
use crate::routing::DependencyRequest;
use crate::service::{GanttService, ServiceError};

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ProjectRequest {
    #[schemars(description = "The YouTrack project short name or id, e.g. 'PRJ'")]
    pub project_id: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GanttChartRequest {
    #[schemars(description = "The YouTrack project short name or id")]
    pub project_id: String,
    #[schemars(description = "Include the critical path section (default true)")]
    pub include_critical_path: Option<bool>,
    #[schemars(description = "Include the resource allocation section (default true)")]
    pub include_resources: Option<bool>,
    #[schemars(description = "Only chart tasks overlapping a window starting at this date (YYYY-MM-DD or RFC 3339)")]
    pub start_date: Option<String>,
    #[schemars(description = "Only chart tasks overlapping a window ending at this date (YYYY-MM-DD or RFC 3339)")]
    pub end_date: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ResourceAllocationRequest {
    #[schemars(description = "The YouTrack project short name or id")]
    pub project_id: String,
    #[schemars(description = "Working hours per assignee per day; defaults to the configured capacity")]
    pub capacity_hours_per_day: Option<f64>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CreateDependencyRequest {
    #[schemars(description = "The YouTrack project the two issues belong to")]
    pub project_id: String,
    #[schemars(description = "The issue that depends on the target, e.g. 'PRJ-12'")]
    pub source_id: String,
    #[schemars(description = "The issue the source depends on, e.g. 'PRJ-7'")]
    pub target_id: String,
    #[schemars(description = "Dependency type: FS, SS, FF or SF (default FS)")]
    pub dependency_type: Option<String>,
    #[schemars(description = "Lag in days between the two tasks (default 0)")]
    pub lag_days: Option<i32>,
    #[schemars(description = "Constraint: 'hard' or 'soft' (default hard)")]
    pub constraint: Option<String>,
    #[schemars(description = "Only analyze the impact without creating the link (default false)")]
    pub dry_run: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListTasksResponse {
    project_id: String,
    count: usize,
    tasks: Vec<Task>,
}

#[derive(Clone)]
pub struct GanttServer {
    service: Arc<GanttService>,
    tool_router: ToolRouter<GanttServer>,
}

impl GanttServer {
    fn success<T: Serialize>(data: &T) -> Result<CallToolResult, ErrorData> {
        Ok(CallToolResult::success(vec![Content::text(
            serde_json::to_string_pretty(data)
                .unwrap_or_else(|_| "Failed to serialize response".to_string()),
        )]))
    }

    fn err_value(v: serde_json::Value) -> Result<CallToolResult, ErrorData> {
        Ok(CallToolResult::error(vec![Content::text(
            serde_json::to_string_pretty(&v)
                .unwrap_or_else(|_| "Failed to serialize error".to_string()),
        )]))
    }

    fn err<S: Into<String>>(msg: S, details: Option<String>) -> Result<CallToolResult, ErrorData> {
        let mut v = serde_json::json!({"success": false, "error": msg.into()});
        if let Some(d) = details {
            v["details"] = serde_json::json!(d);
        };
        Self::err_value(v)
    }

    fn service_err(project_id: &str, e: ServiceError) -> Result<CallToolResult, ErrorData> {
        warn!(project = %project_id, error = %e, "Tool call failed");
        let msg = match &e {
            ServiceError::Source(_) => "Failed to fetch project issues from YouTrack",
            ServiceError::Analysis(_) => "Resource analysis failed",
            ServiceError::Graph(_) => "Dependency network analysis failed",
        };
        Self::err(msg, Some(e.to_string()))
    }

    fn parse_optional_date(
        field: &str,
        value: Option<&str>,
    ) -> Result<Option<chrono::DateTime<chrono::Utc>>, CallToolResult> {
        match value {
            None => Ok(None),
            Some(s) => match parse_date_str(s) {
                Some(date) => Ok(Some(date)),
                None => Err(CallToolResult::error(vec![Content::text(
                    serde_json::json!({
                        "success": false,
                        "error": format!("Invalid {}", field),
                        "details": format!("Could not parse '{}' as a date", s),
                    })
                    .to_string(),
                )])),
            },
        }
    }
}

#[tool_router]
impl GanttServer {
    pub fn new(service: Arc<GanttService>) -> Self {
        Self {
            service,
            tool_router: Self::tool_router(),
        }
    }

    pub async fn serve_stdio(self) -> anyhow::Result<()> {
        info!("Serving MCP over stdio");
        let server = self.serve(rmcp::transport::stdio()).await?;
        server.waiting().await?;
        Ok(())
    }

    #[tool(
        description = "List the tasks of a YouTrack project, normalized with dates, duration, assignee, effort and progress."
    )]
    async fn list_project_tasks(
        &self,
        Parameters(ProjectRequest { project_id }): Parameters<ProjectRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        match self.service.fetch_tasks(&project_id).await {
            Ok(tasks) => Self::success(&ListTasksResponse {
                project_id,
                count: tasks.len(),
                tasks,
            }),
            Err(e) => Self::service_err(&project_id, e),
        }
    }

    #[tool(
        description = "Generate a Gantt chart for a YouTrack project: schedule items with critical path marking, resource utilization, dependency network health and recommendations. Use start_date/end_date to restrict the chart to a window."
    )]
    async fn generate_gantt_chart(
        &self,
        Parameters(GanttChartRequest {
            project_id,
            include_critical_path,
            include_resources,
            start_date,
            end_date,
        }): Parameters<GanttChartRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        let start_date = match Self::parse_optional_date("start_date", start_date.as_deref()) {
            Ok(d) => d,
            Err(e) => return Ok(e),
        };
        let end_date = match Self::parse_optional_date("end_date", end_date.as_deref()) {
            Ok(d) => d,
            Err(e) => return Ok(e),
        };
        let options = GanttOptions {
            include_critical_path: include_critical_path.unwrap_or(true),
            include_resources: include_resources.unwrap_or(true),
            start_date,
            end_date,
        };

        match self.service.gantt_chart(&project_id, options).await {
            Ok(chart) => Self::success(&chart),
            Err(e) => Self::service_err(&project_id, e),
        }
    }

    #[tool(
        description = "Compute the critical path of a YouTrack project: the longest dependency chain by duration, its bottlenecks, and per-task slack."
    )]
    async fn get_critical_path(
        &self,
        Parameters(ProjectRequest { project_id }): Parameters<ProjectRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        match self.service.critical_path(&project_id).await {
            Ok(schedule) => Self::success(&schedule),
            Err(e) => Self::service_err(&project_id, e),
        }
    }

    #[tool(
        description = "Analyze per-assignee resource allocation for a YouTrack project: allocated vs available hours, utilization and overallocation."
    )]
    async fn analyze_resource_allocation(
        &self,
        Parameters(ResourceAllocationRequest {
            project_id,
            capacity_hours_per_day,
        }): Parameters<ResourceAllocationRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        match self
            .service
            .resources(&project_id, capacity_hours_per_day)
            .await
        {
            Ok(resources) => Self::success(&resources),
            Err(e) => Self::service_err(&project_id, e),
        }
    }

    #[tool(
        description = "Analyze the dependency network of a YouTrack project: density, clusters, bottleneck tasks, cycles and an overall health score."
    )]
    async fn analyze_dependency_network(
        &self,
        Parameters(ProjectRequest { project_id }): Parameters<ProjectRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        match self.service.network(&project_id).await {
            Ok(network) => Self::success(&network),
            Err(e) => Self::service_err(&project_id, e),
        }
    }

    #[tool(
        description = "Create a dependency 'source depends on target' between two issues. Circular dependencies are rejected with the cycle path. Returns the schedule impact (project delay, affected tasks, resource conflicts) and recommendations. Use dry_run=true to only analyze."
    )]
    async fn create_dependency(
        &self,
        Parameters(CreateDependencyRequest {
            project_id,
            source_id,
            target_id,
            dependency_type,
            lag_days,
            constraint,
            dry_run,
        }): Parameters<CreateDependencyRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        let kind = match dependency_type.as_deref().map(DependencyKind::from_str).transpose() {
            Ok(kind) => kind,
            Err(e) => return Self::err("Invalid dependency_type", Some(e)),
        };
        let constraint = match constraint
            .as_deref()
            .map(DependencyConstraint::from_str)
            .transpose()
        {
            Ok(constraint) => constraint,
            Err(e) => return Self::err("Invalid constraint", Some(e)),
        };

        let request = DependencyRequest {
            kind,
            lag_days,
            constraint,
            ..DependencyRequest::new(source_id, target_id)
        };
        match self
            .service
            .create_dependency(&project_id, request, dry_run.unwrap_or(false))
            .await
        {
            Ok(result) if result.is_success() => Self::success(&result),
            Ok(rejected) => Ok(CallToolResult::error(vec![Content::text(
                serde_json::to_string_pretty(&rejected)
                    .unwrap_or_else(|_| "Failed to serialize error".to_string()),
            )])),
            Err(e) => Self::service_err(&project_id, e),
        }
    }
}

#[tool_handler]
impl ServerHandler for GanttServer {
    fn get_info(&self) -> ServerInfo {
        let instruction = "Project scheduling analysis for YouTrack. TOOLS: 'list_project_tasks', 'generate_gantt_chart', 'get_critical_path', 'analyze_resource_allocation', 'analyze_dependency_network', 'create_dependency'. Always pass project_id. Use 'create_dependency' with dry_run=true to preview the schedule impact of a dependency before creating it.".to_string();

        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: Some(instruction),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::service::{IssueSource, SourceError};
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct StaticSource(Vec<Value>);

    #[async_trait]
    impl IssueSource for StaticSource {
        async fn fetch_issues(&self, project_id: &str) -> Result<Vec<Value>, SourceError> {
            if project_id == "MISSING" {
                return Err(SourceError::Status {
                    status: 404,
                    body: "Project not found".to_string(),
                });
            }
            Ok(self.0.clone())
        }

        async fn apply_command(&self, _issue_id: &str, _command: &str) -> Result<(), SourceError> {
            Ok(())
        }
    }

    fn make_server() -> GanttServer {
        let issues = vec![
            json!({"idReadable": "P-1", "summary": "Design",
                   "customFields": [{"name": "Start Date", "value": "2024-05-01"},
                                    {"name": "Due Date", "value": "2024-05-03"}]}),
            json!({"idReadable": "P-2", "summary": "Build",
                   "customFields": [{"name": "Start Date", "value": "2024-05-03"},
                                    {"name": "Due Date", "value": "2024-05-07"}],
                   "links": [{"direction": "OUTWARD", "linkType": {"name": "Depend"},
                              "issues": [{"idReadable": "P-1"}]}]}),
        ];
        let service = GanttService::new(Arc::new(StaticSource(issues)), AnalysisConfig::default());
        GanttServer::new(Arc::new(service))
    }

    /// Pull the JSON payload and error flag out of a tool result.
    fn payload(result: CallToolResult) -> (bool, Value) {
        let raw = serde_json::to_value(&result).unwrap();
        let text = raw["content"][0]["text"].as_str().unwrap();
        let is_error = raw["isError"].as_bool().unwrap_or(false);
        (is_error, serde_json::from_str(text).unwrap())
    }

    #[tokio::test]
    async fn test_list_project_tasks() {
        let server = make_server();
        let result = server
            .list_project_tasks(Parameters(ProjectRequest {
                project_id: "P".to_string(),
            }))
            .await
            .unwrap();
        let (is_error, body) = payload(result);
        assert!(!is_error);
        assert_eq!(body["count"], 2);
        assert_eq!(body["tasks"][1]["durationDays"], 4);
    }

    #[tokio::test]
    async fn test_critical_path_tool() {
        let server = make_server();
        let result = server
            .get_critical_path(Parameters(ProjectRequest {
                project_id: "P".to_string(),
            }))
            .await
            .unwrap();
        let (_, body) = payload(result);
        assert_eq!(body["criticalPath"]["path"], json!(["P-1", "P-2"]));
        assert_eq!(body["criticalPath"]["duration"], 6);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_structured_error() {
        let server = make_server();
        let result = server
            .analyze_dependency_network(Parameters(ProjectRequest {
                project_id: "MISSING".to_string(),
            }))
            .await
            .unwrap();
        let (is_error, body) = payload(result);
        assert!(is_error);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Failed to fetch project issues from YouTrack");
        assert!(body["details"].as_str().unwrap().contains("404"));
    }

    #[tokio::test]
    async fn test_invalid_dependency_type() {
        let server = make_server();
        let result = server
            .create_dependency(Parameters(CreateDependencyRequest {
                project_id: "P".to_string(),
                source_id: "P-2".to_string(),
                target_id: "P-1".to_string(),
                dependency_type: Some("XX".to_string()),
                lag_days: None,
                constraint: None,
                dry_run: Some(true),
            }))
            .await
            .unwrap();
        let (is_error, body) = payload(result);
        assert!(is_error);
        assert_eq!(body["error"], "Invalid dependency_type");
    }

    #[tokio::test]
    async fn test_circular_dependency_is_rejected() {
        let server = make_server();
        let result = server
            .create_dependency(Parameters(CreateDependencyRequest {
                project_id: "P".to_string(),
                source_id: "P-1".to_string(),
                target_id: "P-2".to_string(),
                dependency_type: None,
                lag_days: None,
                constraint: None,
                dry_run: None,
            }))
            .await
            .unwrap();
        let (is_error, body) = payload(result);
        assert!(is_error);
        assert_eq!(body["error"], "Circular dependency detected");
        assert_eq!(body["circularPath"], json!(["P-2", "P-1"]));
    }

    #[tokio::test]
    async fn test_invalid_window_date() {
        let server = make_server();
        let result = server
            .generate_gantt_chart(Parameters(GanttChartRequest {
                project_id: "P".to_string(),
                include_critical_path: None,
                include_resources: Some(false),
                start_date: Some("next tuesday".to_string()),
                end_date: None,
            }))
            .await
            .unwrap();
        let (is_error, body) = payload(result);
        assert!(is_error);
        assert_eq!(body["error"], "Invalid start_date");
    }

    #[test]
    fn test_server_info_lists_tools() {
        let info = make_server().get_info();
        let instructions = info.instructions.unwrap();
        assert!(instructions.contains("generate_gantt_chart"));
        assert!(instructions.contains("create_dependency"));
    }
}
