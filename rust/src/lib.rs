//! Project scheduling analysis for YouTrack, exposed as MCP tools.
//!
//! Raw issues are normalized into tasks, linked into a dependency graph and
//! analyzed for critical path, resource load and network health. The
//! analysis modules are synchronous and pure; `service`, `youtrack` and `mcp`
//! add the tracker client and the tool surface.

pub mod adapter;
pub mod chart;
pub mod cli;
pub mod config;
pub mod critical_path;
pub mod cycle;
pub mod graph;
pub mod interner;
pub mod logging;
pub mod mcp;
pub mod models;
pub mod network;
pub mod resources;
pub mod routing;
pub mod service;
pub mod youtrack;

pub use chart::{assemble_chart, GanttChart, GanttOptions};
pub use config::{AnalysisConfig, ConfigError, ServerConfig};
pub use critical_path::{compute_critical_path, compute_schedule, CriticalPathResult, Schedule};
pub use cycle::{audit_cycles, detect_cycle, CycleCheck};
pub use graph::{build_dependency_graph, DependencyGraph, GraphError};
pub use models::{DependencyConstraint, DependencyEdge, DependencyKind, Task};
pub use network::{analyze_network, NetworkAnalysis};
pub use resources::{analyze_resources, AnalysisError, Resource};
pub use routing::{route_dependency, DependencyRequest, DependencyRoutingResult};
pub use service::{GanttService, IssueSource, ServiceError, SourceError};
