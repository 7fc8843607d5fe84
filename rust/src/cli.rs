use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::ServerConfig;

#[derive(Parser, Debug)]
#[command(name = "youtrack-mcp")]
#[command(about = "Project scheduling analysis for YouTrack, served over MCP")]
pub struct Cli {
    /// YouTrack instance URL
    #[arg(long, env = "YOUTRACK_URL", global = true, default_value = "http://localhost:8080")]
    pub base_url: String,

    /// Permanent token used as a bearer token
    #[arg(long, env = "YOUTRACK_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// YAML file with analysis settings
    #[arg(long, env = "YOUTRACK_MCP_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Issues requested per page
    #[arg(long, global = true, default_value_t = 100)]
    pub page_size: usize,

    /// Increase log verbosity (-v changes, -vv checks, -vvv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Serve the MCP tools over stdio (default)
    Serve,

    /// Print the Gantt chart of a project as JSON
    Gantt {
        project_id: String,

        #[arg(long)]
        no_critical_path: bool,

        #[arg(long)]
        no_resources: bool,
    },
}

impl Cli {
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            base_url: self.base_url.clone(),
            token: self.token.clone(),
            page_size: self.page_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_serve() {
        let cli = Cli::try_parse_from(["youtrack-mcp", "--base-url", "https://yt.example.com"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.page_size, 100);
        assert_eq!(cli.verbose, 0);
        assert_eq!(cli.server_config().base_url, "https://yt.example.com");
    }

    #[test]
    fn test_gantt_subcommand_flags() {
        let cli = Cli::try_parse_from([
            "youtrack-mcp",
            "-vv",
            "--base-url",
            "https://yt.example.com",
            "gantt",
            "PRJ",
            "--no-resources",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(
            cli.command,
            Some(Command::Gantt {
                project_id: "PRJ".to_string(),
                no_critical_path: false,
                no_resources: true,
            })
        );
    }
}
