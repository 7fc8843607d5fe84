//! Task record adapter: raw tracker issue JSON to [`Task`].
//!
//! Field names differ between tracker installations, so custom fields are
//! mapped onto task attributes through the configurable keyword table in
//! [`FieldMatchers`](crate::config::FieldMatchers). Matching is best-effort:
//! an attribute without a usable field stays empty.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use regex::Regex;
use rustc_hash::FxHashSet;
use serde_json::Value;
use tracing::debug;

use crate::config::{AnalysisConfig, CanonicalField};
use crate::critical_path::{estimate_progress, task_duration_days};
use crate::models::{LinkDirection, RawLink, Task, UNASSIGNED};

/// Top-level issue keys that are never treated as custom fields.
const RESERVED_KEYS: &[&str] = &[
    "id",
    "idReadable",
    "summary",
    "description",
    "resolved",
    "created",
    "updated",
    "customFields",
    "links",
    "project",
    "reporter",
    "$type",
];

/// Attribute values collected from custom fields. The first value that
/// parses wins.
#[derive(Default)]
struct Extracted {
    progress: Option<u8>,
    start: Option<DateTime<Utc>>,
    due: Option<DateTime<Utc>>,
    spent_hours: Option<f64>,
    estimated_hours: Option<f64>,
    assignee: Option<String>,
    state: Option<String>,
    priority: Option<String>,
}

impl Extracted {
    fn absorb(&mut self, field: CanonicalField, value: &Value, hours_per_day: f64) {
        match field {
            CanonicalField::Progress => fill(&mut self.progress, || parse_progress(value)),
            CanonicalField::StartDate => fill(&mut self.start, || parse_date(value)),
            CanonicalField::DueDate => fill(&mut self.due, || parse_date(value)),
            CanonicalField::SpentTime => {
                fill(&mut self.spent_hours, || parse_effort_hours(value, hours_per_day))
            }
            CanonicalField::Estimation => {
                fill(&mut self.estimated_hours, || parse_effort_hours(value, hours_per_day))
            }
            CanonicalField::Assignee => fill(&mut self.assignee, || parse_name(value)),
            CanonicalField::State => fill(&mut self.state, || parse_name(value)),
            CanonicalField::Priority => fill(&mut self.priority, || parse_name(value)),
        }
    }
}

fn fill<T>(slot: &mut Option<T>, parse: impl FnOnce() -> Option<T>) {
    if slot.is_none() {
        *slot = parse();
    }
}

fn from_epoch_millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

/// Parse a calendar date or timestamp string.
pub(crate) fn parse_date_str(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    s.parse::<i64>().ok().and_then(from_epoch_millis)
}

/// Dates arrive as epoch milliseconds or as strings.
fn parse_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(from_epoch_millis),
        Value::String(s) => parse_date_str(s),
        _ => None,
    }
}

/// Display name of a user, enum or state value.
fn parse_name(value: &Value) -> Option<String> {
    let name = match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => ["fullName", "name", "login"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map(str::to_string),
        Value::Array(items) => items.first().and_then(parse_name),
        _ => None,
    }?;
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_string())
}

fn duration_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*([wdhm])").ok())
        .as_ref()
}

/// Hours from a presentation string like `1w 2d 3h 30m`.
fn parse_duration_presentation(s: &str, hours_per_day: f64) -> Option<f64> {
    let mut hours = 0.0;
    let mut matched = false;
    let captures = duration_pattern().into_iter().flat_map(|re| re.captures_iter(s));
    for cap in captures {
        let amount: f64 = cap[1].parse().ok()?;
        let unit_hours = match cap[2].to_ascii_lowercase().as_str() {
            "w" => 5.0 * hours_per_day,
            "d" => hours_per_day,
            "h" => 1.0,
            _ => 1.0 / 60.0,
        };
        hours += amount * unit_hours;
        matched = true;
    }
    if matched {
        return Some(hours);
    }
    s.trim().parse::<f64>().ok()
}

/// Effort in hours: period objects (`{minutes}` or `{presentation}`),
/// presentation strings, or plain hour numbers.
fn parse_effort_hours(value: &Value, hours_per_day: f64) -> Option<f64> {
    let hours = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_duration_presentation(s, hours_per_day),
        Value::Object(map) => map
            .get("minutes")
            .and_then(Value::as_f64)
            .map(|m| m / 60.0)
            .or_else(|| {
                map.get("presentation")
                    .and_then(Value::as_str)
                    .and_then(|p| parse_duration_presentation(p, hours_per_day))
            }),
        _ => None,
    }?;
    (hours.is_finite() && hours >= 0.0).then_some(hours)
}

/// Progress from a number or a `"40%"` string, clamped to 0..=100.
fn parse_progress(value: &Value) -> Option<u8> {
    let raw = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        Value::Object(map) => map.get("value").and_then(Value::as_f64),
        _ => None,
    }?;
    raw.is_finite().then(|| raw.round().clamp(0.0, 100.0) as u8)
}

fn parse_id(value: &Value) -> Option<String> {
    let id = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!id.is_empty()).then_some(id)
}

fn parse_links(issue: &Value) -> Vec<RawLink> {
    let Some(links) = issue.get("links").and_then(Value::as_array) else {
        return Vec::new();
    };
    links
        .iter()
        .filter_map(|link| {
            let kind = link.get("linkType")?;
            let link_type = kind.get("name").and_then(Value::as_str)?.to_string();
            let outward_name = kind
                .get("sourceToTarget")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string);
            let undirected = kind.get("directed").and_then(Value::as_bool) == Some(false);
            // A record without a direction is read from its own side.
            let direction = match link.get("direction").and_then(Value::as_str) {
                _ if undirected => LinkDirection::Both,
                Some("INWARD") => LinkDirection::Inward,
                Some("BOTH") => LinkDirection::Both,
                _ => LinkDirection::Outward,
            };
            let issue_ids: Vec<String> = link
                .get("issues")
                .and_then(Value::as_array)
                .map(|issues| {
                    issues
                        .iter()
                        .filter_map(|i| {
                            i.get("idReadable")
                                .and_then(parse_id)
                                .or_else(|| i.get("id").and_then(parse_id))
                        })
                        .collect()
                })
                .unwrap_or_default();
            (!issue_ids.is_empty()).then_some(RawLink {
                link_type,
                outward_name,
                direction,
                issue_ids,
            })
        })
        .collect()
}

/// Normalize one raw issue. Returns `None` for records without an id.
pub fn normalize_issue(issue: &Value, config: &AnalysisConfig, now: DateTime<Utc>) -> Option<Task> {
    let id = issue
        .get("idReadable")
        .and_then(parse_id)
        .or_else(|| issue.get("id").and_then(parse_id))?;
    let hours_per_day = config.capacity_hours_per_day;
    let matchers = &config.field_matchers;

    let mut extracted = Extracted::default();
    if let Some(fields) = issue.get("customFields").and_then(Value::as_array) {
        for field in fields {
            let Some(name) = field.get("name").and_then(Value::as_str) else {
                continue;
            };
            let Some(kind) = matchers.classify(name) else {
                continue;
            };
            if let Some(value) = field.get("value") {
                extracted.absorb(kind, value, hours_per_day);
            }
        }
    }
    if let Some(map) = issue.as_object() {
        for (key, value) in map {
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }
            if let Some(kind) = matchers.classify(key) {
                extracted.absorb(kind, value, hours_per_day);
            }
        }
    }

    let resolved_date = issue.get("resolved").and_then(parse_date);
    let status = extracted.state.unwrap_or_else(|| "Unknown".to_string());
    let end_date = extracted.due.or(resolved_date);
    let estimated = extracted.estimated_hours.unwrap_or(0.0);
    let actual = extracted.spent_hours.unwrap_or(0.0);
    let utilization = if estimated > 0.0 {
        (actual / estimated * 100.0).round().clamp(0.0, f64::from(u32::MAX)) as u32
    } else {
        0
    };

    let title = issue
        .get("summary")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    let mut task = Task::new(id, title);
    task.description = issue
        .get("description")
        .and_then(Value::as_str)
        .map(str::to_string);
    task.progress_percent = extracted
        .progress
        .unwrap_or_else(|| estimate_progress(&status, resolved_date.is_some()));
    task.status = status;
    task.priority_label = extracted.priority;
    task.assignee = extracted.assignee.unwrap_or_else(|| UNASSIGNED.to_string());
    task.start_date = extracted.start;
    task.end_date = end_date;
    task.due_date = extracted.due;
    task.resolved_date = resolved_date;
    task.duration_days = task_duration_days(extracted.start, end_date, now);
    task.estimated_effort_hours = estimated;
    task.actual_effort_hours = actual;
    task.resource_utilization_percent = utilization;
    task.links = parse_links(issue);
    Some(task)
}

/// Normalize a batch of raw issues, skipping records without an id and
/// repeated ids.
pub fn normalize_issues(issues: &[Value], config: &AnalysisConfig, now: DateTime<Utc>) -> Vec<Task> {
    let mut seen: FxHashSet<String> = FxHashSet::default();
    let mut tasks = Vec::with_capacity(issues.len());
    for (position, issue) in issues.iter().enumerate() {
        match normalize_issue(issue, config, now) {
            Some(task) if seen.insert(task.id.clone()) => tasks.push(task),
            Some(task) => debug!(id = %task.id, "Skipping duplicate issue"),
            None => debug!(position, "Skipping issue record without id"),
        }
    }
    tasks
}
