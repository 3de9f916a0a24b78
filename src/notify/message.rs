use scraper::{Html, Node};
use serde::Serialize;

use crate::config::{MessageFields, Subfield};
use crate::model::issue::IssueFields;

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "br", "li", "ul", "ol", "tr", "td", "th", "table", "pre", "blockquote", "h1",
    "h2", "h3", "h4", "h5", "h6",
];

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SlackMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub attachments: Vec<Attachment>,
    pub unfurl_links: bool,
    pub unfurl_media: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Attachment {
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<AttachmentField>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AttachmentField {
    pub title: String,
    pub value: String,
    pub short: bool,
}

/// Build the message announcing one issue. `color` is the styling token of
/// the issue's priority.
pub fn build_message(
    mapping: &MessageFields,
    subfields: &[Subfield],
    issue: &IssueFields,
    color: &str,
) -> SlackMessage {
    let lookup = |field: &Option<String>| field.as_ref().and_then(|name| issue.get(name)).cloned();

    let title = lookup(&mapping.title);
    let text = lookup(&mapping.text)
        .map(|body| html_to_text(&body))
        .filter(|body| !body.is_empty());

    let fields = subfields
        .iter()
        .map(|sub| AttachmentField {
            title: sub.title.clone(),
            value: issue.get(&sub.value).cloned().unwrap_or_default(),
            short: sub.short,
        })
        .collect();

    SlackMessage {
        text: title.clone(),
        attachments: vec![Attachment {
            color: color.to_string(),
            title,
            title_link: lookup(&mapping.title_link),
            text,
            fields,
        }],
        unfurl_links: false,
        unfurl_media: false,
    }
}

/// Plain text of an HTML fragment with whitespace collapsed.
pub fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut raw = String::new();
    for node in fragment.root_element().descendants() {
        match node.value() {
            Node::Text(text) => raw.push_str(text),
            Node::Element(el) if BLOCK_TAGS.contains(&el.name()) => raw.push(' '),
            _ => {}
        }
    }
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
