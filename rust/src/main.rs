use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::sync::Arc;

use youtrack_mcp::chart::GanttOptions;
use youtrack_mcp::cli::{Cli, Command};
use youtrack_mcp::config::AnalysisConfig;
use youtrack_mcp::logging;
use youtrack_mcp::mcp::GanttServer;
use youtrack_mcp::service::GanttService;
use youtrack_mcp::youtrack::YouTrackClient;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose).map_err(|e| anyhow!(e))?;

    let config = match &cli.config {
        Some(path) => AnalysisConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => AnalysisConfig::default(),
    };

    let client = YouTrackClient::from_config(&cli.server_config());
    let service = Arc::new(GanttService::new(Arc::new(client), config));

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            GanttServer::new(service).serve_stdio().await?;
        }
        Command::Gantt {
            project_id,
            no_critical_path,
            no_resources,
        } => {
            let options = GanttOptions {
                include_critical_path: !no_critical_path,
                include_resources: !no_resources,
                ..Default::default()
            };
            let chart = service.gantt_chart(&project_id, options).await?;
            println!("{}", serde_json::to_string_pretty(&chart)?);
        }
    }

    Ok(())
}
