use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use std::time::Duration;

use super::extract::extract_records;
use super::IssueSource;
use crate::config::{JiraConfig, NetworkConfig};
use crate::error::TrackerError;
use crate::model::issue::IssueSet;

/// HTTP settings for tracker calls, passed explicitly to each client.
#[derive(Debug, Clone, Default)]
pub struct ConnectionOptions {
    pub proxy: Option<String>,
    pub timeout: Option<Duration>,
}

impl From<&NetworkConfig> for ConnectionOptions {
    fn from(cfg: &NetworkConfig) -> Self {
        Self {
            proxy: cfg.proxy.clone().filter(|p| !p.trim().is_empty()),
            timeout: Some(Duration::from_secs(cfg.timeout_secs)),
        }
    }
}

impl ConnectionOptions {
    pub fn build_client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder();
        if let Some(proxy) = &self.proxy {
            builder = builder.proxy(
                reqwest::Proxy::all(proxy).with_context(|| format!("Invalid proxy URL {proxy}"))?,
            );
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        builder.build().context("Failed to build HTTP client")
    }
}

pub struct JiraClient {
    base_url: String,
    auth_header: String,
    issue_tag: String,
    key_tag: String,
    max_results: u32,
    client: reqwest::Client,
}

impl JiraClient {
    pub fn new(config: &JiraConfig, options: &ConnectionOptions) -> Result<Self> {
        let creds = format!("{}:{}", config.username, config.password);
        let encoded = base64::engine::general_purpose::STANDARD.encode(creds);
        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            auth_header: format!("Basic {encoded}"),
            issue_tag: config.issue_tag.clone(),
            key_tag: config.key_tag.clone(),
            max_results: config.max_results,
            client: options.build_client()?,
        })
    }

    fn export_url(&self, filter_id: &str) -> String {
        let id = urlencoding::encode(filter_id);
        format!(
            "{}/sr/jira.issueviews:searchrequest-xml/{id}/SearchRequest-{id}.xml?tempMax={}",
            self.base_url, self.max_results
        )
    }

    /// Raw XML export of a saved filter.
    pub async fn fetch_export(&self, filter_id: &str) -> Result<String, TrackerError> {
        let url = self.export_url(filter_id);
        tracing::debug!(filter_id, url = url.as_str(), "Fetching filter export");

        let resp = self
            .client
            .get(&url)
            .header("Authorization", &self.auth_header)
            .header("Accept", "application/xml")
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(TrackerError::Unauthorized);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TrackerError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }
        Ok(resp.text().await?)
    }
}

#[async_trait]
impl IssueSource for JiraClient {
    fn name(&self) -> &str {
        "Jira"
    }

    async fn fetch_issues(&self, filter_id: &str) -> Result<IssueSet, TrackerError> {
        let xml = self.fetch_export(filter_id).await?;
        let issues = extract_records(&xml, &self.issue_tag, &self.key_tag)?;
        tracing::info!(filter_id, issues = issues.len(), "Filter export parsed");
        Ok(issues)
    }
}
