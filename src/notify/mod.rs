pub mod message;
pub mod slack;

use anyhow::Result;
use async_trait::async_trait;

use crate::model::issue::{IssueFields, IssueSet, PriorityLadder};

/// Where one filter's announcements go.
#[derive(Debug, Clone)]
pub struct Destination {
    pub token: String,
    /// Channel per priority position.
    pub channels: Vec<String>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub sent: usize,
    pub failed: usize,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    /// Announce every new issue. Per-message failures are counted in the
    /// report; an error means nothing could be sent at all.
    async fn notify(
        &self,
        destination: &Destination,
        new_issues: &IssueSet,
        ladder: &PriorityLadder,
    ) -> Result<DispatchReport>;
}

/// New issues grouped by bucket, in ladder order. Within a bucket the
/// issues keep their fetch order.
pub fn group_by_priority<'a>(
    new_issues: &'a IssueSet,
    ladder: &PriorityLadder,
) -> Vec<Vec<(&'a str, &'a IssueFields)>> {
    let mut groups = vec![Vec::new(); ladder.len()];
    for (id, fields) in new_issues {
        groups[ladder.bucket_for(id, fields)].push((id.as_str(), fields));
    }
    groups
}
