//! Turn provider HTML instructions into plain text.
//!

use scraper::{Html, Node};

/// Elements that separate words when removed
const BLOCK_TAGS: &[&str] = &["div", "br", "p", "li"];

/// Remove all tags, decode entities and collapse whitespace.
///
pub fn strip_html(input: &str) -> String {
    let doc = Html::parse_fragment(input);

    let text = doc
        .root_element()
        .descendants()
        .fold(String::with_capacity(input.len()), |mut acc, node| {
            match node.value() {
                Node::Text(t) => acc.push_str(t),
                Node::Element(e) if BLOCK_TAGS.contains(&e.name()) => acc.push(' '),
                _ => (),
            }
            acc
        });

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
