use anyhow::{bail, Result};
use indexmap::IndexMap;

/// Field name -> text value for one issue, in export order.
pub type IssueFields = IndexMap<String, String>;

/// Issue identifier -> its fields, in export order.
pub type IssueSet = IndexMap<String, IssueFields>;

/// Ordered priority names. Position `i` is both the rank of a priority and
/// the index of its bucket in the state file.
#[derive(Debug, Clone)]
pub struct PriorityLadder {
    names: Vec<String>,
    field: String,
    fallback: usize,
}

impl PriorityLadder {
    pub fn new(names: Vec<String>, field: impl Into<String>, fallback: usize) -> Result<Self> {
        if names.is_empty() {
            bail!("Priority ladder must contain at least one priority");
        }
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                bail!("Priority '{name}' appears more than once in the ladder");
            }
        }
        if fallback >= names.len() {
            bail!(
                "Fallback priority index {fallback} is out of range for a ladder of {}",
                names.len()
            );
        }
        Ok(Self {
            names,
            field: field.into(),
            fallback,
        })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Always false for a ladder built by [`PriorityLadder::new`].
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Name of the issue field holding the priority.
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn fallback(&self) -> usize {
        self.fallback
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Bucket index for an issue. Issues whose priority is missing or not on
    /// the ladder land in the fallback bucket.
    pub fn bucket_for(&self, id: &str, fields: &IssueFields) -> usize {
        match fields.get(&self.field) {
            Some(value) => self.position(value).unwrap_or_else(|| {
                tracing::warn!(
                    issue = id,
                    priority = value.as_str(),
                    fallback = self.fallback,
                    "Priority not on the ladder, using fallback bucket"
                );
                self.fallback
            }),
            None => {
                tracing::warn!(
                    issue = id,
                    field = self.field.as_str(),
                    fallback = self.fallback,
                    "Issue has no priority field, using fallback bucket"
                );
                self.fallback
            }
        }
    }
}
