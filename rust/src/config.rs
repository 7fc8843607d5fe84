//! Configuration types for the analysis engine and the tracker connection.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::models::{DependencyKind, LinkDirection, RawLink};

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Canonical task attributes that custom fields can be mapped onto.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CanonicalField {
    Progress,
    StartDate,
    DueDate,
    SpentTime,
    Estimation,
    Assignee,
    State,
    Priority,
}

/// Keyword table mapping tracker field names onto canonical attributes.
///
/// A field matches when its lowercased name contains any of the keywords.
/// Attributes are tried in the order of [`FieldMatchers::classify`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldMatchers {
    pub progress: Vec<String>,
    pub start_date: Vec<String>,
    pub due_date: Vec<String>,
    pub spent_time: Vec<String>,
    pub estimation: Vec<String>,
    pub assignee: Vec<String>,
    pub state: Vec<String>,
    pub priority: Vec<String>,
}

fn keywords(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

impl Default for FieldMatchers {
    fn default() -> Self {
        Self {
            progress: keywords(&["progress", "complete", "percent"]),
            start_date: keywords(&["start", "begin"]),
            due_date: keywords(&["due", "end", "deadline", "finish"]),
            spent_time: keywords(&["spent", "actual", "logged"]),
            estimation: keywords(&["estimat", "effort"]),
            assignee: keywords(&["assignee", "owner", "responsible"]),
            state: keywords(&["state", "status", "stage"]),
            priority: keywords(&["priority", "severity"]),
        }
    }
}

impl FieldMatchers {
    /// Map a field name onto a canonical attribute, if any keyword matches.
    pub fn classify(&self, field_name: &str) -> Option<CanonicalField> {
        let name = field_name.to_lowercase();
        let table: [(&Vec<String>, CanonicalField); 8] = [
            (&self.progress, CanonicalField::Progress),
            (&self.start_date, CanonicalField::StartDate),
            (&self.due_date, CanonicalField::DueDate),
            (&self.spent_time, CanonicalField::SpentTime),
            (&self.estimation, CanonicalField::Estimation),
            (&self.assignee, CanonicalField::Assignee),
            (&self.state, CanonicalField::State),
            (&self.priority, CanonicalField::Priority),
        ];
        table
            .iter()
            .find(|(words, _)| {
                words
                    .iter()
                    .any(|w| !w.is_empty() && name.contains(&w.to_lowercase()))
            })
            .map(|(_, field)| *field)
    }
}

/// One keyword -> dependency kind rule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindKeyword {
    pub keyword: String,
    pub kind: DependencyKind,
}

/// Rules for turning tracker links into dependency edges.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LinkRules {
    /// Case-sensitive substrings; a link is a dependency only if its label
    /// contains one of them.
    pub recognized_labels: Vec<String>,
    /// Checked in order against the lowercased link-type name. First hit wins,
    /// no hit means finish-to-start.
    pub kind_keywords: Vec<KindKeyword>,
    /// Lowercased phrases marking an outward name under which the source is
    /// the prerequisite ("blocks"). Any other outward name ("depends on") makes
    /// the source the dependent. Matched against the link-type name when the
    /// tracker did not report an outward name.
    pub prerequisite_phrases: Vec<String>,
    /// Tracker command applied to the dependent issue when a dependency is
    /// committed. `{target}` is replaced by the prerequisite's id.
    pub dependency_command: String,
}

impl Default for LinkRules {
    fn default() -> Self {
        let kind = |keyword: &str, kind| KindKeyword {
            keyword: keyword.to_string(),
            kind,
        };
        Self {
            recognized_labels: keywords(&[
                "Depend",
                "depend",
                "Block",
                "block",
                "Start-together",
                "start-together",
                "Finish-together",
                "finish-together",
                "Duplicate",
                "duplicate",
                "Relate",
                "relate",
            ]),
            kind_keywords: vec![
                kind("depend", DependencyKind::FS),
                kind("start", DependencyKind::SS),
                kind("finish", DependencyKind::FF),
                kind("block", DependencyKind::SF),
            ],
            prerequisite_phrases: keywords(&["blocks", "is required for", "precedes"]),
            dependency_command: "depends on {target}".to_string(),
        }
    }
}

impl LinkRules {
    pub fn is_recognized(&self, label: &str) -> bool {
        self.recognized_labels
            .iter()
            .any(|r| !r.is_empty() && label.contains(r.as_str()))
    }

    pub fn classify_kind(&self, link_type: &str) -> DependencyKind {
        let name = link_type.to_lowercase();
        self.kind_keywords
            .iter()
            .find(|k| name.contains(&k.keyword.to_lowercase()))
            .map(|k| k.kind)
            .unwrap_or(DependencyKind::FS)
    }

    /// Whether the link's source side is the prerequisite.
    fn source_is_prerequisite(&self, link: &RawLink) -> bool {
        let name = link
            .outward_name
            .as_deref()
            .unwrap_or(&link.link_type)
            .to_lowercase();
        self.prerequisite_phrases
            .iter()
            .any(|p| !p.is_empty() && name.contains(&p.to_lowercase()))
    }

    /// Whether a directed link makes the carrying issue depend on the linked
    /// issues. Exactly one half of every directed pair answers true.
    /// Symmetric links are not directed and always answer false.
    pub fn carrier_depends(&self, link: &RawLink) -> bool {
        match link.direction {
            LinkDirection::Outward => !self.source_is_prerequisite(link),
            LinkDirection::Inward => self.source_is_prerequisite(link),
            LinkDirection::Both => false,
        }
    }

    pub fn command_for(&self, target_id: &str) -> String {
        self.dependency_command.replace("{target}", target_id)
    }
}

/// Configuration for the scheduling analysis.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisConfig {
    /// Working hours per assignee per day.
    pub capacity_hours_per_day: f64,
    /// A critical-path task longer than this multiple of the mean path task
    /// duration is reported as a path bottleneck.
    pub long_task_factor: f64,
    /// Upper bound on complete paths enumerated when the graph has a cycle.
    pub max_exhaustive_paths: usize,
    pub field_matchers: FieldMatchers,
    pub link_rules: LinkRules,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            capacity_hours_per_day: 8.0,
            long_task_factor: 1.5,
            max_exhaustive_paths: 100_000,
            field_matchers: FieldMatchers::default(),
            link_rules: LinkRules::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.capacity_hours_per_day.is_finite() || self.capacity_hours_per_day <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "capacityHoursPerDay must be positive, got {}",
                self.capacity_hours_per_day
            )));
        }
        if !self.long_task_factor.is_finite() || self.long_task_factor <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "longTaskFactor must be positive, got {}",
                self.long_task_factor
            )));
        }
        if self.max_exhaustive_paths == 0 {
            return Err(ConfigError::Invalid(
                "maxExhaustivePaths must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Connection settings for the YouTrack REST API.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Instance root, e.g. `https://example.youtrack.cloud`.
    pub base_url: String,
    /// Permanent token, sent as a bearer token.
    pub token: Option<String>,
    /// Issues requested per page.
    pub page_size: usize,
}

impl ServerConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            page_size: 100,
        }
    }
}
