use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::message::{build_message, SlackMessage};
use super::{group_by_priority, Destination, DispatchReport, Notifier};
use crate::config::{MessageFields, SlackConfig, Subfield};
use crate::model::issue::{IssueSet, PriorityLadder};

/// Slack Web API notifier.
pub struct SlackNotifier {
    api_url: String,
    colors: Vec<String>,
    fields: MessageFields,
    subfields: Vec<Subfield>,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    error: Option<String>,
    team: Option<String>,
}

impl SlackNotifier {
    pub fn new(config: &SlackConfig, client: reqwest::Client) -> Self {
        Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            colors: config.colors.clone(),
            fields: config.fields.clone(),
            subfields: config.subfields.clone(),
            client,
        }
    }

    /// Open a session for one dispatch round. The token is checked up front
    /// so a bad token fails once instead of once per message.
    pub async fn connect(&self, token: &str) -> Result<SlackSession<'_>> {
        let resp: ApiResponse = self
            .client
            .post(format!("{}/auth.test", self.api_url))
            .bearer_auth(token)
            .send()
            .await
            .context("Slack auth.test request failed")?
            .json()
            .await
            .context("Failed to parse Slack auth.test response")?;
        if !resp.ok {
            bail!(
                "Slack rejected the token: {}",
                resp.error.unwrap_or_else(|| "unknown error".into())
            );
        }
        tracing::debug!(team = resp.team.as_deref().unwrap_or(""), "Slack session opened");
        Ok(SlackSession {
            notifier: self,
            token: token.to_string(),
        })
    }

    fn color(&self, position: usize) -> &str {
        self.colors.get(position).map(String::as_str).unwrap_or("")
    }
}

/// A token that passed `auth.test`, borrowed for one dispatch round.
/// Slack bearer tokens are stateless, so there is nothing to close.
pub struct SlackSession<'a> {
    notifier: &'a SlackNotifier,
    token: String,
}

impl SlackSession<'_> {
    pub async fn post(&self, channel: &str, message: &SlackMessage) -> Result<()> {
        let mut body = serde_json::to_value(message)?;
        body["channel"] = json!(channel);

        let resp = self
            .notifier
            .client
            .post(format!("{}/chat.postMessage", self.notifier.api_url))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .context("Slack chat.postMessage request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            bail!("Slack post failed ({status}): {text}");
        }
        let result: ApiResponse = resp
            .json()
            .await
            .context("Failed to parse Slack chat.postMessage response")?;
        if !result.ok {
            bail!(
                "Slack post to {channel} failed: {}",
                result.error.unwrap_or_else(|| "unknown error".into())
            );
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    fn name(&self) -> &str {
        "Slack"
    }

    async fn notify(
        &self,
        destination: &Destination,
        new_issues: &IssueSet,
        ladder: &PriorityLadder,
    ) -> Result<DispatchReport> {
        let session = self.connect(&destination.token).await?;
        let mut report = DispatchReport::default();

        let groups = group_by_priority(new_issues, ladder);
        for (position, group) in groups.into_iter().enumerate() {
            if group.is_empty() {
                continue;
            }
            let Some(channel) = destination.channels.get(position) else {
                tracing::warn!(
                    priority = ladder.names()[position].as_str(),
                    issues = group.len(),
                    "No Slack channel configured for priority"
                );
                report.failed += group.len();
                continue;
            };
            let color = self.color(position);
            for (id, fields) in group {
                let message = build_message(&self.fields, &self.subfields, fields, color);
                match session.post(channel, &message).await {
                    Ok(()) => {
                        report.sent += 1;
                        tracing::info!(
                            issue = id,
                            channel = channel.as_str(),
                            "Message sent to Slack"
                        );
                    }
                    Err(e) => {
                        report.failed += 1;
                        tracing::error!(
                            issue = id,
                            channel = channel.as_str(),
                            "Slack send failed: {e:#}"
                        );
                    }
                }
            }
        }

        Ok(report)
    }
}
