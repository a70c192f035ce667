use std::sync::OnceLock;

use regex::Regex;

struct Patterns {
    block_break: Regex,
    tag: Regex,
    whitespace: Regex,
}

fn patterns() -> Option<&'static Patterns> {
    static PATTERNS: OnceLock<Option<Patterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            Some(Patterns {
                block_break: Regex::new(
                    r"(?i)<br\s*/?>|</(?:p|div|h[1-6]|li|td|tr|blockquote)\s*>",
                )
                .ok()?,
                tag: Regex::new(r"<[^>]*>").ok()?,
                whitespace: Regex::new(r"\s+").ok()?,
            })
        })
        .as_ref()
}

/// Plain-text rendering of an HTML fragment for metadata: block boundaries become spaces,
/// tags are removed and whitespace runs collapse to one space.
pub fn flatten(html: &str) -> String {
    let Some(patterns) = patterns() else {
        return html.split_whitespace().collect::<Vec<_>>().join(" ");
    };
    let spaced = patterns.block_break.replace_all(html, " ");
    let stripped = patterns.tag.replace_all(&spaced, "");
    patterns
        .whitespace
        .replace_all(stripped.trim(), " ")
        .into_owned()
}
