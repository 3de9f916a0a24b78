use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::Instrument;

use crate::config::{self, AppConfig, FilterConfig};
use crate::model::issue::PriorityLadder;
use crate::notify::slack::SlackNotifier;
use crate::notify::{Destination, Notifier};
use crate::providers::jira::{ConnectionOptions, JiraClient};
use crate::providers::IssueSource;
use crate::tracking::reconcile::{detect_new, reconcile, split_line};
use crate::tracking::store::StateStore;

/// Outcome of one filter check.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub new: usize,
    pub tracked: usize,
    pub notified: usize,
}

pub struct Bot {
    config: AppConfig,
    ladder: PriorityLadder,
    source: Box<dyn IssueSource>,
    notifier: Box<dyn Notifier>,
    data_dir: PathBuf,
}

impl Bot {
    pub fn new(
        config: AppConfig,
        source: Box<dyn IssueSource>,
        notifier: Box<dyn Notifier>,
        data_dir: PathBuf,
    ) -> Result<Self> {
        let ladder = config.ladder()?;
        Ok(Self {
            config,
            ladder,
            source,
            notifier,
            data_dir,
        })
    }

    pub fn from_config(config: AppConfig) -> Result<Self> {
        let options = ConnectionOptions::from(&config.network);
        let source = JiraClient::new(&config.jira, &options)?;
        let notifier = SlackNotifier::new(&config.slack, options.build_client()?);
        Self::new(
            config,
            Box::new(source),
            Box::new(notifier),
            config::data_dir(),
        )
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn ladder(&self) -> &PriorityLadder {
        &self.ladder
    }

    /// Check every filter once, in name order. Returns how many failed.
    pub async fn run_all(&self) -> usize {
        let mut failed = 0;
        for (name, filter) in &self.config.filters {
            let span = tracing::info_span!("filter", name = name.as_str());
            match self.run_filter(name, filter).instrument(span).await {
                Ok(report) => tracing::info!(
                    filter = name.as_str(),
                    fetched = report.fetched,
                    new = report.new,
                    tracked = report.tracked,
                    notified = report.notified,
                    "Filter checked"
                ),
                Err(e) => {
                    failed += 1;
                    tracing::error!(filter = name.as_str(), "Filter check failed: {e:#}");
                }
            }
        }
        tracing::info!("Ending check");
        failed
    }

    /// One full cycle for a filter: fetch, diff against the stored state,
    /// persist the rebuilt state, then announce what is new.
    ///
    /// Nothing is written unless the fetch and the state read both succeed.
    /// A failed announcement does not fail the cycle, since the state file
    /// alone decides what counts as new next time.
    pub async fn run_filter(&self, name: &str, filter: &FilterConfig) -> Result<CycleReport> {
        tracing::info!(
            filter_id = filter.filter_id.as_str(),
            source = self.source.name(),
            "Checking filter"
        );
        let current = self
            .source
            .fetch_issues(&filter.filter_id)
            .await
            .with_context(|| format!("Failed to fetch filter {}", filter.filter_id))?;

        let store = StateStore::new(filter.state_path(&self.data_dir));
        let persisted = store.load()?;
        let new_issues = detect_new(&current, &persisted);
        let next = reconcile(&persisted, &current, &new_issues, &self.ladder);
        store
            .save(&next)
            .with_context(|| format!("Failed to persist state for filter {name}"))?;

        let mut report = CycleReport {
            fetched: current.len(),
            new: new_issues.len(),
            tracked: next.iter().map(|line| split_line(line).count()).sum(),
            notified: 0,
        };

        if new_issues.is_empty() || !self.config.slack.active || !filter.slack_active {
            return Ok(report);
        }

        let destination = Destination {
            token: filter.slack_token.clone(),
            channels: filter.slack_channels.clone(),
        };
        match self
            .notifier
            .notify(&destination, &new_issues, &self.ladder)
            .await
        {
            Ok(dispatch) => {
                report.notified = dispatch.sent;
                if dispatch.failed > 0 {
                    tracing::warn!(
                        notifier = self.notifier.name(),
                        sent = dispatch.sent,
                        failed = dispatch.failed,
                        "Some announcements were not delivered"
                    );
                }
            }
            Err(e) => {
                tracing::error!(
                    notifier = self.notifier.name(),
                    state_file = %store.path().display(),
                    "Notification failed, state already saved: {e:#}"
                );
            }
        }

        Ok(report)
    }
}
