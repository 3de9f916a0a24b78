use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::TrackerError;
use crate::model::issue::{IssueFields, IssueSet};

/// Convert a filter export into issue records.
///
/// Every `issue_tag` element is one issue, keyed by the text of the first
/// `key_tag` element found inside it. Each immediate child element becomes a
/// field holding its full text content; when a child name repeats, the first
/// one wins. When two issues share a key, the first one wins.
pub fn extract_records(
    xml: &str,
    issue_tag: &str,
    key_tag: &str,
) -> Result<IssueSet, TrackerError> {
    let mut reader = Reader::from_str(xml);
    let mut records = IssueSet::new();
    let mut depth: usize = 0;
    let mut seen_root = false;
    let mut root_closed = false;
    let mut current: Option<PendingIssue> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            TrackerError::Malformed(format!("at byte {}: {e}", reader.buffer_position()))
        })?;
        match event {
            Event::Start(e) => {
                if root_closed {
                    return Err(content_after_root());
                }
                depth += 1;
                seen_root = true;
                let name = tag_name(e.name().into_inner())?;
                if let Some(issue) = current.as_mut() {
                    issue.open(name, depth, key_tag);
                } else if name == issue_tag {
                    current = Some(PendingIssue::new(depth));
                }
            }
            Event::Empty(e) => {
                if root_closed {
                    return Err(content_after_root());
                }
                root_closed = depth == 0;
                seen_root = true;
                let name = tag_name(e.name().into_inner())?;
                if let Some(issue) = current.as_mut() {
                    issue.empty(name, depth + 1, key_tag);
                } else if name == issue_tag {
                    return Err(TrackerError::Malformed(format!(
                        "empty <{issue_tag}/> element has no <{key_tag}>"
                    )));
                }
            }
            Event::End(_) => {
                let closes_issue = current.as_ref().is_some_and(|i| i.depth == depth);
                if closes_issue {
                    if let Some(issue) = current.take() {
                        let (id, fields) = issue.finish(issue_tag, key_tag)?;
                        if records.contains_key(&id) {
                            tracing::debug!(
                                issue = id.as_str(),
                                "Duplicate issue in export, keeping first"
                            );
                        } else {
                            records.insert(id, fields);
                        }
                    }
                } else if let Some(issue) = current.as_mut() {
                    issue.close(depth);
                }
                depth = depth.checked_sub(1).ok_or_else(|| {
                    TrackerError::Malformed("closing tag without an opening tag".into())
                })?;
                root_closed = depth == 0;
            }
            Event::Text(t) => {
                if let Some(issue) = current.as_mut() {
                    let text = t
                        .unescape()
                        .map_err(|e| TrackerError::Malformed(e.to_string()))?;
                    issue.text(&text);
                } else if depth == 0 && !t.iter().all(u8::is_ascii_whitespace) {
                    return Err(TrackerError::Malformed("text outside the root element".into()));
                }
            }
            Event::CData(c) => {
                if let Some(issue) = current.as_mut() {
                    let text = std::str::from_utf8(&c)
                        .map_err(|e| TrackerError::Malformed(e.to_string()))?;
                    issue.text(text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if depth != 0 {
        return Err(TrackerError::Malformed("unexpected end of document".into()));
    }
    if !seen_root {
        return Err(TrackerError::Malformed("document has no root element".into()));
    }
    Ok(records)
}

fn content_after_root() -> TrackerError {
    TrackerError::Malformed("content after the root element".into())
}

fn tag_name(raw: &[u8]) -> Result<&str, TrackerError> {
    std::str::from_utf8(raw).map_err(|e| TrackerError::Malformed(format!("tag name: {e}")))
}

/// An issue element whose closing tag has not been read yet.
struct PendingIssue {
    depth: usize,
    key: Option<String>,
    key_depth: Option<usize>,
    key_text: String,
    field: Option<(String, String)>,
    fields: IssueFields,
}

impl PendingIssue {
    fn new(depth: usize) -> Self {
        Self {
            depth,
            key: None,
            key_depth: None,
            key_text: String::new(),
            field: None,
            fields: IssueFields::new(),
        }
    }

    fn open(&mut self, name: &str, depth: usize, key_tag: &str) {
        if depth == self.depth + 1 {
            self.field = Some((name.to_string(), String::new()));
        }
        if self.key.is_none() && self.key_depth.is_none() && name == key_tag {
            self.key_depth = Some(depth);
            self.key_text.clear();
        }
    }

    fn empty(&mut self, name: &str, depth: usize, key_tag: &str) {
        if depth == self.depth + 1 {
            self.fields.entry(name.to_string()).or_default();
        }
        if self.key.is_none() && self.key_depth.is_none() && name == key_tag {
            self.key = Some(String::new());
        }
    }

    fn text(&mut self, text: &str) {
        if let Some((_, value)) = self.field.as_mut() {
            value.push_str(text);
        }
        if self.key_depth.is_some() {
            self.key_text.push_str(text);
        }
    }

    fn close(&mut self, depth: usize) {
        if self.key_depth == Some(depth) {
            self.key = Some(self.key_text.trim().to_string());
            self.key_depth = None;
        }
        if depth == self.depth + 1 {
            if let Some((name, value)) = self.field.take() {
                self.fields
                    .entry(name)
                    .or_insert_with(|| value.trim().to_string());
            }
        }
    }

    fn finish(self, issue_tag: &str, key_tag: &str) -> Result<(String, IssueFields), TrackerError> {
        match self.key {
            Some(key) if !key.is_empty() => Ok((key, self.fields)),
            _ => Err(TrackerError::Malformed(format!(
                "<{issue_tag}> element without a <{key_tag}> value"
            ))),
        }
    }
}
