//! YouTrack REST client.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace};

use crate::config::ServerConfig;
use crate::service::{IssueSource, SourceError};

/// Fields requested for every issue; matches what the adapter reads.
const ISSUE_FIELDS: &str = "id,idReadable,summary,description,resolved,\
customFields(name,value(name,fullName,login,minutes,presentation)),\
links(direction,linkType(name,directed,sourceToTarget,targetToSource),issues(id,idReadable))";

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            SourceError::Decode(e.to_string())
        } else {
            SourceError::Request(e.to_string())
        }
    }
}

/// Search query selecting every issue of a project. Braces keep names with
/// spaces in one term.
fn project_query(project_id: &str) -> String {
    format!("project: {{{}}}", project_id)
}

#[derive(Serialize)]
struct CommandIssue<'a> {
    #[serde(rename = "idReadable")]
    id_readable: &'a str,
}

#[derive(Serialize)]
struct CommandRequest<'a> {
    query: &'a str,
    issues: Vec<CommandIssue<'a>>,
}

#[derive(Debug, Clone)]
pub struct YouTrackClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    page_size: usize,
}

impl YouTrackClient {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            token: config.token.clone(),
            page_size: config.page_size.max(1),
        }
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn authorized(&self, rb: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let rb = rb.header(reqwest::header::ACCEPT, "application/json");
        match &self.token {
            Some(token) => rb.bearer_auth(token),
            None => rb,
        }
    }

    async fn send(&self, rb: reqwest::RequestBuilder) -> Result<reqwest::Response, SourceError> {
        let resp = self.authorized(rb).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    async fn fetch_page(
        &self,
        project_id: &str,
        skip: usize,
    ) -> Result<Vec<Value>, SourceError> {
        let query = project_query(project_id);
        let top = self.page_size.to_string();
        let skip = skip.to_string();
        let rb = self.client.get(self.url("/api/issues")).query(&[
            ("query", query.as_str()),
            ("fields", ISSUE_FIELDS),
            ("$top", top.as_str()),
            ("$skip", skip.as_str()),
        ]);
        let page = self.send(rb).await?.json::<Vec<Value>>().await?;
        Ok(page)
    }
}

#[async_trait]
impl IssueSource for YouTrackClient {
    async fn fetch_issues(&self, project_id: &str) -> Result<Vec<Value>, SourceError> {
        let mut issues = Vec::new();
        loop {
            let page = self.fetch_page(project_id, issues.len()).await?;
            let short = page.len() < self.page_size;
            trace!(project = %project_id, skip = issues.len(), received = page.len(), "Fetched page");
            issues.extend(page);
            if short {
                break;
            }
        }
        debug!(project = %project_id, issues = issues.len(), "Fetched issues");
        Ok(issues)
    }

    async fn apply_command(&self, issue_id: &str, command: &str) -> Result<(), SourceError> {
        let body = CommandRequest {
            query: command,
            issues: vec![CommandIssue { id_readable: issue_id }],
        };
        let rb = self.client.post(self.url("/api/commands")).json(&body);
        self.send(rb).await?;
        debug!(issue = %issue_id, command = %command, "Applied command");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_without_double_slash() {
        let mut config = ServerConfig::new("https://yt.example.com/");
        config.page_size = 0;
        let client = YouTrackClient::from_config(&config);
        assert_eq!(client.url("/api/issues"), "https://yt.example.com/api/issues");
        assert_eq!(client.url("api/commands"), "https://yt.example.com/api/commands");
        assert_eq!(client.page_size, 1);
    }

    #[test]
    fn test_project_query_braces_name() {
        assert_eq!(project_query("PRJ"), "project: {PRJ}");
        assert_eq!(project_query("Mobile App"), "project: {Mobile App}");
    }

    #[test]
    fn test_command_body_shape() {
        let body = CommandRequest {
            query: "depends on P-2",
            issues: vec![CommandIssue { id_readable: "P-3" }],
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"query": "depends on P-2", "issues": [{"idReadable": "P-3"}]})
        );
    }
}
