//! Body normalization: HTML entity decoding, tag stripping, whitespace collapsing.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;

static SCRIPT_OR_STYLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>")
        .expect("valid script/style pattern")
});

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid tag pattern"));

/// Upper bound on decode/strip rounds for doubly-escaped markup
/// (`&amp;lt;b&amp;gt;` needs two).
const MAX_ROUNDS: usize = 4;

/// Normalize a record body.
///
/// Entities are decoded first. If the decoded text starts with `<` it is
/// treated as HTML: scripts and styles are dropped, tags stripped, entities
/// decoded again and all whitespace collapsed to single spaces. Plain text
/// is returned decoded but otherwise untouched.
pub fn normalize_body(raw: &str) -> String {
    let decoded = decode_entities(raw);
    if decoded.trim_start().starts_with('<') {
        html_to_text(&decoded)
    } else {
        decoded.into_owned()
    }
}

/// Convert HTML to a single line of plain text.
///
/// The output never contains a `<...>` tag sequence or a known entity escape.
pub fn html_to_text(html: &str) -> String {
    let mut text = SCRIPT_OR_STYLE.replace_all(html, "").into_owned();

    for _ in 0..MAX_ROUNDS {
        let stripped = TAG.replace_all(&text, "");
        let decoded = decode_entities(&stripped).into_owned();
        if decoded == text {
            break;
        }
        text = decoded;
    }
    // Decoding can reintroduce a tag in the last round.
    let text = TAG.replace_all(&text, "");

    collapse_whitespace(&text)
}

/// Collapse every run of whitespace to one space and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decode named (full HTML5 table) and numeric character references.
///
/// Unknown names are left verbatim.
pub fn decode_entities(input: &str) -> Cow<'_, str> {
    html_escape::decode_html_entities(input)
}
