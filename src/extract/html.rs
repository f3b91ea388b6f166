//! Visible text from HTML.

use scraper::{Html, Node};

use super::text::{decode, normalize};
use crate::models::{DocumentFormat, ExtractedText};

/// Elements whose contents are never visible text.
const SKIPPED: &[&str] = &["script", "style", "noscript", "template", "svg"];

pub fn extract(bytes: &[u8]) -> ExtractedText {
    ExtractedText::new(DocumentFormat::Html).with_text(html_to_text(&decode(bytes)))
}

/// Visible text of a page, one text block per line.
pub fn html_to_text(markup: &str) -> String {
    let document = Html::parse_document(markup);
    let mut lines = Vec::new();

    for node in document.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| SKIPPED.contains(&el.name()))
        });
        if hidden {
            continue;
        }

        let line = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if !line.is_empty() {
            lines.push(line);
        }
    }

    normalize(&lines.join("\n"))
}
