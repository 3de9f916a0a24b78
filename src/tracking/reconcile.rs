//! Novelty detection and bucket rebuilding for the tracked-issue state.
//!
//! Persisted state is one line per priority bucket, each line a list of
//! identifiers terminated by `;`. Membership is always tested against the
//! split tokens, never against the raw line text.

use std::collections::HashSet;

use crate::model::issue::{IssueSet, PriorityLadder};

pub const DELIMITER: char = ';';

/// Identifiers stored in one persisted line. Empty tokens are skipped.
pub fn split_line(line: &str) -> impl Iterator<Item = &str> {
    line.split(DELIMITER).filter(|id| !id.is_empty())
}

/// Every identifier known from a previous cycle, across all buckets.
pub fn known_ids(persisted: &[String]) -> HashSet<&str> {
    persisted.iter().flat_map(|line| split_line(line)).collect()
}

/// Issues in the current fetch that no bucket of the persisted state knows.
pub fn detect_new(current: &IssueSet, persisted: &[String]) -> IssueSet {
    let known = known_ids(persisted);
    let new_issues: IssueSet = current
        .iter()
        .filter(|(id, _)| !known.contains(id.as_str()))
        .map(|(id, fields)| (id.clone(), fields.clone()))
        .collect();
    tracing::info!(
        fetched = current.len(),
        known = known.len(),
        new = new_issues.len(),
        "New issues detected"
    );
    new_issues
}

/// Build the next persisted state.
///
/// Previously tracked issues still reported by the tracker are kept, in their
/// stored order, but placed in the bucket of their current priority. Issues
/// that vanished from the fetch are dropped. New issues are appended after
/// them. The result always has one line per ladder entry.
pub fn reconcile(
    persisted: &[String],
    current: &IssueSet,
    new_issues: &IssueSet,
    ladder: &PriorityLadder,
) -> Vec<String> {
    let mut buckets = vec![String::new(); ladder.len()];
    let mut placed: HashSet<&str> = HashSet::new();

    for id in persisted.iter().flat_map(|line| split_line(line)) {
        let Some(fields) = current.get(id) else {
            tracing::debug!(issue = id, "Issue no longer in filter, dropping");
            continue;
        };
        if !placed.insert(id) {
            continue;
        }
        push_id(&mut buckets[ladder.bucket_for(id, fields)], id);
    }

    for (id, fields) in new_issues {
        if placed.contains(id.as_str()) {
            continue;
        }
        push_id(&mut buckets[ladder.bucket_for(id, fields)], id);
    }

    buckets
}

fn push_id(bucket: &mut String, id: &str) {
    bucket.push_str(id);
    bucket.push(DELIMITER);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::issue::IssueFields;

    fn ladder(names: &[&str]) -> PriorityLadder {
        PriorityLadder::new(names.iter().map(|n| n.to_string()).collect(), "priority", 0).unwrap()
    }

    fn issue(priority: &str) -> IssueFields {
        let mut fields = IssueFields::new();
        fields.insert("priority".into(), priority.into());
        fields
    }

    fn issues(pairs: &[(&str, &str)]) -> IssueSet {
        pairs
            .iter()
            .map(|(id, priority)| (id.to_string(), issue(priority)))
            .collect()
    }

    fn state(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn resolved_dropped_and_new_inserted() {
        let ladder = ladder(&["Low", "High"]);
        let persisted = state(&["A;", "B;"]);
        let current = issues(&[("B", "High"), ("C", "Low")]);

        let new_issues = detect_new(&current, &persisted);
        assert_eq!(new_issues.keys().collect::<Vec<_>>(), vec!["C"]);

        let next = reconcile(&persisted, &current, &new_issues, &ladder);
        assert_eq!(next, state(&["C;", "B;"]));
    }

    #[test]
    fn substring_of_known_id_is_still_new() {
        let persisted = state(&["112;"]);
        let current = issues(&[("12", "Low"), ("112", "Low")]);

        let new_issues = detect_new(&current, &persisted);
        assert_eq!(new_issues.keys().collect::<Vec<_>>(), vec!["12"]);
    }

    #[test]
    fn prefixed_keys_are_not_confused() {
        let persisted = state(&["PROJ-10;PROJ-100;"]);
        let current = issues(&[("PROJ-1", "Low"), ("PROJ-10", "Low")]);

        let new_issues = detect_new(&current, &persisted);
        assert_eq!(new_issues.keys().collect::<Vec<_>>(), vec!["PROJ-1"]);
    }

    #[test]
    fn second_run_without_changes_finds_nothing() {
        let ladder = ladder(&["Low", "High"]);
        let current = issues(&[("A", "High"), ("B", "Low"), ("C", "High")]);

        let first_new = detect_new(&current, &[]);
        assert_eq!(first_new.len(), 3);
        let first_state = reconcile(&[], &current, &first_new, &ladder);

        let second_new = detect_new(&current, &first_state);
        assert!(second_new.is_empty());
        let second_state = reconcile(&first_state, &current, &second_new, &ladder);
        assert_eq!(second_state, first_state);
    }

    #[test]
    fn tracked_issue_never_reported_twice() {
        let ladder = ladder(&["Low", "High"]);
        let mut persisted = Vec::new();
        let mut current = issues(&[("A", "Low")]);

        let mut reported = Vec::new();
        for next_id in ["B", "C", "D"] {
            let new_issues = detect_new(&current, &persisted);
            reported.extend(new_issues.keys().cloned());
            persisted = reconcile(&persisted, &current, &new_issues, &ladder);
            current.insert(next_id.to_string(), issue("High"));
        }

        assert_eq!(reported, vec!["A", "B", "C"]);
    }

    #[test]
    fn resolved_issue_removed_from_every_bucket() {
        let ladder = ladder(&["Low", "Medium", "High"]);
        let persisted = state(&["X;A;", "B;", "X;"]);
        let current = issues(&[("A", "Low"), ("B", "Medium")]);

        let next = reconcile(&persisted, &current, &IssueSet::new(), &ladder);
        assert!(next.iter().all(|line| split_line(line).all(|id| id != "X")));
        assert_eq!(next, state(&["A;", "B;", ""]));
    }

    #[test]
    fn changed_priority_moves_bucket() {
        let ladder = ladder(&["Blocker", "Major", "Minor"]);
        let persisted = state(&["X;", "", ""]);
        let current = issues(&[("X", "Minor")]);

        let next = reconcile(&persisted, &current, &IssueSet::new(), &ladder);
        assert_eq!(next, state(&["", "", "X;"]));
    }

    #[test]
    fn carried_issues_precede_new_ones_in_bucket() {
        let ladder = ladder(&["Low", "High"]);
        let persisted = state(&["", "B;A;"]);
        let current = issues(&[("N", "High"), ("A", "High"), ("B", "High")]);

        let new_issues = detect_new(&current, &persisted);
        let next = reconcile(&persisted, &current, &new_issues, &ladder);
        assert_eq!(next, state(&["", "B;A;N;"]));
    }

    #[test]
    fn unclassifiable_priority_goes_to_fallback_bucket() {
        let ladder = ladder(&["Low", "High"]);
        let mut current = issues(&[("A", "Urgent")]);
        current.insert("B".into(), IssueFields::new());

        let new_issues = detect_new(&current, &[]);
        let next = reconcile(&[], &current, &new_issues, &ladder);
        assert_eq!(next, state(&["A;B;", ""]));
    }

    #[test]
    fn missing_lines_treated_as_empty() {
        let ladder = ladder(&["Low", "Medium", "High"]);
        let persisted = state(&["A;"]);
        let current = issues(&[("A", "Low"), ("B", "High")]);

        let new_issues = detect_new(&current, &persisted);
        let next = reconcile(&persisted, &current, &new_issues, &ladder);
        assert_eq!(next.len(), 3);
        assert_eq!(next, state(&["A;", "", "B;"]));
    }

    #[test]
    fn extra_lines_beyond_ladder_are_carried_into_current_bucket() {
        let ladder = ladder(&["Low", "High"]);
        let persisted = state(&["", "", "Z;"]);
        let current = issues(&[("Z", "High")]);

        let new_issues = detect_new(&current, &persisted);
        assert!(new_issues.is_empty());
        let next = reconcile(&persisted, &current, &new_issues, &ladder);
        assert_eq!(next, state(&["", "Z;"]));
    }

    #[test]
    fn duplicate_stored_ids_written_once() {
        let ladder = ladder(&["Low", "High"]);
        let persisted = state(&["A;A;", "A;"]);
        let current = issues(&[("A", "High")]);

        let next = reconcile(&persisted, &current, &IssueSet::new(), &ladder);
        assert_eq!(next, state(&["", "A;"]));
    }

    #[test]
    fn lines_without_trailing_delimiter_are_read() {
        let persisted = state(&["A;B", "C"]);
        let known = known_ids(&persisted);
        assert!(known.contains("A"));
        assert!(known.contains("B"));
        assert!(known.contains("C"));
        assert_eq!(known.len(), 3);
    }

    #[test]
    fn inputs_are_not_mutated() {
        let ladder = ladder(&["Low", "High"]);
        let persisted = state(&["A;", "B;"]);
        let current = issues(&[("B", "High"), ("C", "Low")]);
        let persisted_before = persisted.clone();
        let current_before = current.clone();

        let new_issues = detect_new(&current, &persisted);
        let _ = reconcile(&persisted, &current, &new_issues, &ladder);

        assert_eq!(persisted, persisted_before);
        assert_eq!(current, current_before);
    }
}
