use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::IssueSource;
use crate::error::TrackerError;
use crate::model::issue::{IssueFields, IssueSet};

/// A scripted source: each fetch pops the next queued response.
pub struct MockSource {
    responses: Mutex<VecDeque<Result<IssueSet, TrackerError>>>,
    pub requested: Arc<Mutex<Vec<String>>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requested: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn then_issues(self, pairs: &[(&str, &str)]) -> Self {
        self.responses.lock().unwrap().push_back(Ok(make_issues(pairs)));
        self
    }

    pub fn then_error(self, err: TrackerError) -> Self {
        self.responses.lock().unwrap().push_back(Err(err));
        self
    }
}

#[async_trait]
impl IssueSource for MockSource {
    fn name(&self) -> &str {
        "Mock"
    }

    async fn fetch_issues(&self, filter_id: &str) -> Result<IssueSet, TrackerError> {
        self.requested.lock().unwrap().push(filter_id.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TrackerError::Malformed("no scripted response".into())))
    }
}

/// Issues with a `title` and a `priority` field.
pub fn make_issues(pairs: &[(&str, &str)]) -> IssueSet {
    pairs
        .iter()
        .map(|(id, priority)| {
            let mut fields = IssueFields::new();
            fields.insert("title".into(), format!("Issue {id}"));
            fields.insert("priority".into(), priority.to_string());
            (id.to_string(), fields)
        })
        .collect()
}

#[tokio::test]
async fn mock_source_replays_in_order() {
    let source = MockSource::new()
        .then_issues(&[("A-1", "High")])
        .then_error(TrackerError::Unauthorized);
    let requested = source.requested.clone();

    let first = source.fetch_issues("10").await.unwrap();
    assert_eq!(first.keys().collect::<Vec<_>>(), vec!["A-1"]);
    assert!(matches!(
        source.fetch_issues("10").await,
        Err(TrackerError::Unauthorized)
    ));
    assert_eq!(requested.lock().unwrap().as_slice(), &["10", "10"]);
}

#[tokio::test]
async fn sources_are_usable_as_trait_objects() {
    let sources: Vec<Box<dyn IssueSource>> = vec![
        Box::new(MockSource::new().then_issues(&[("A-1", "High")])),
        Box::new(MockSource::new().then_issues(&[])),
    ];

    let mut total = 0;
    for source in &sources {
        assert_eq!(source.name(), "Mock");
        total += source.fetch_issues("1").await.unwrap().len();
    }
    assert_eq!(total, 1);
}

#[tokio::test]
async fn exhausted_source_fails() {
    let source = MockSource::new();
    assert!(source.fetch_issues("1").await.is_err());
}
