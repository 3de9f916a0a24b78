pub mod extract;
pub mod jira;

use async_trait::async_trait;

use crate::error::TrackerError;
use crate::model::issue::IssueSet;

/// A tracker that can list the issues matched by a saved filter.
#[async_trait]
pub trait IssueSource: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch_issues(&self, filter_id: &str) -> Result<IssueSet, TrackerError>;
}

#[cfg(test)]
pub mod tests;
