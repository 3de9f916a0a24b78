use anyhow::{bail, Context, Result};
use chrono::NaiveTime;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::model::issue::PriorityLadder;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub jira: JiraConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub slack: SlackConfig,
    #[serde(default)]
    pub filters: BTreeMap<String, FilterConfig>,
}

#[derive(Debug, Deserialize)]
pub struct JiraConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    /// Element wrapping one issue in the export.
    #[serde(default = "default_issue_tag")]
    pub issue_tag: String,
    /// Element holding the issue key.
    #[serde(default = "default_key_tag")]
    pub key_tag: String,
    #[serde(default = "default_priority_field")]
    pub priority_field: String,
    /// Priority names, highest attention first.
    pub priorities: Vec<String>,
    /// Bucket for issues whose priority is missing or unknown.
    #[serde(default)]
    pub fallback_priority: usize,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

#[derive(Debug, Deserialize)]
pub struct NetworkConfig {
    /// e.g. `http://proxy.internal:3128`
    pub proxy: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
    /// `HH:MM`, local time.
    pub start_time: Option<String>,
    /// `HH:MM`, local time.
    pub end_time: Option<String>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
            start_time: None,
            end_time: None,
        }
    }
}

impl ScheduleConfig {
    /// The active-hours window, if both ends are configured.
    pub fn active_window(&self) -> Result<Option<(NaiveTime, NaiveTime)>> {
        match (&self.start_time, &self.end_time) {
            (Some(start), Some(end)) => Ok(Some((parse_time(start)?, parse_time(end)?))),
            (None, None) => Ok(None),
            _ => bail!("schedule.start_time and schedule.end_time must be set together"),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SlackConfig {
    #[serde(default)]
    pub active: bool,
    #[serde(default = "default_slack_api_url")]
    pub api_url: String,
    /// Attachment color per priority position.
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub fields: MessageFields,
    #[serde(default)]
    pub subfields: Vec<Subfield>,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            active: false,
            api_url: default_slack_api_url(),
            colors: Vec::new(),
            fields: MessageFields::default(),
            subfields: Vec::new(),
        }
    }
}

/// Which issue fields fill the message title, link and body.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageFields {
    pub title: Option<String>,
    pub title_link: Option<String>,
    pub text: Option<String>,
}

impl Default for MessageFields {
    fn default() -> Self {
        Self {
            title: Some("title".into()),
            title_link: Some("link".into()),
            text: None,
        }
    }
}

/// A labelled attachment field taken from one issue field.
#[derive(Debug, Clone, Deserialize)]
pub struct Subfield {
    pub title: String,
    pub value: String,
    #[serde(default = "default_true")]
    pub short: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilterConfig {
    pub filter_id: String,
    pub state_file: String,
    #[serde(default)]
    pub slack_token: String,
    #[serde(default)]
    pub slack_active: bool,
    /// Destination channel per priority position.
    #[serde(default)]
    pub slack_channels: Vec<String>,
}

fn default_issue_tag() -> String {
    "item".into()
}

fn default_key_tag() -> String {
    "key".into()
}

fn default_priority_field() -> String {
    "priority".into()
}

fn default_max_results() -> u32 {
    1000
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_interval_minutes() -> u64 {
    15
}

/// One week.
pub const MAX_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

fn default_slack_api_url() -> String {
    "https://slack.com/api".into()
}

fn default_true() -> bool {
    true
}

fn parse_time(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .with_context(|| format!("Invalid time '{value}', expected HH:MM"))
}

pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".filter-watch")
}

pub fn default_config_path() -> PathBuf {
    data_dir().join("config.toml")
}

impl AppConfig {
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents).context("Failed to parse config.toml")?;
        config.validate()?;
        Ok(config)
    }

    pub fn ladder(&self) -> Result<PriorityLadder> {
        PriorityLadder::new(
            self.jira.priorities.clone(),
            self.jira.priority_field.clone(),
            self.jira.fallback_priority,
        )
    }

    pub fn validate(&self) -> Result<()> {
        let ladder = self.ladder().context("Invalid jira.priorities")?;
        if self.jira.url.trim().is_empty() {
            bail!("jira.url must not be empty");
        }
        if self.schedule.interval_minutes == 0 {
            bail!("schedule.interval_minutes must be at least 1");
        }
        if self.schedule.interval_minutes > MAX_INTERVAL_MINUTES {
            bail!("schedule.interval_minutes must be at most {MAX_INTERVAL_MINUTES}");
        }
        self.schedule.active_window()?;
        if self.filters.is_empty() {
            bail!("No filters configured. Add a [filters.<name>] section");
        }

        if self.slack.active && self.slack.colors.len() != ladder.len() {
            tracing::warn!(
                colors = self.slack.colors.len(),
                priorities = ladder.len(),
                "slack.colors does not match the number of priorities"
            );
        }
        for (name, filter) in &self.filters {
            if filter.filter_id.trim().is_empty() {
                bail!("filters.{name}.filter_id must not be empty");
            }
            if filter.state_file.trim().is_empty() {
                bail!("filters.{name}.state_file must not be empty");
            }
            if self.slack.active && filter.slack_active {
                if filter.slack_token.trim().is_empty() {
                    bail!("filters.{name}.slack_token is required when Slack is active");
                }
                if filter.slack_channels.len() != ladder.len() {
                    tracing::warn!(
                        filter = name.as_str(),
                        channels = filter.slack_channels.len(),
                        priorities = ladder.len(),
                        "slack_channels does not match the number of priorities"
                    );
                }
            }
        }
        Ok(())
    }
}

impl FilterConfig {
    /// Relative paths are resolved against `base`.
    pub fn state_path(&self, base: &Path) -> PathBuf {
        let path = PathBuf::from(&self.state_file);
        if path.is_absolute() {
            path
        } else {
            base.join(path)
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(default_config_path);
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    AppConfig::from_toml(&contents).with_context(|| format!("Invalid config {}", path.display()))
}
