//! Heuristic recovery of records that are not well-formed XML.
//!
//! Older archives and damaged records often still contain RFC 5322 style
//! header lines. They are found anywhere in the text, case-insensitively,
//! and the body is whatever follows the first blank line.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::record::{MessageRecord, ParseMethod};

use super::date;

pub const NO_SUBJECT: &str = "No Subject";
pub const UNKNOWN_SENDER: &str = "Unknown Sender";
pub const UNKNOWN_RECIPIENT: &str = "Unknown Recipient";
pub const BODY_NOT_EXTRACTED: &str = "Content could not be extracted";

fn header_line(name: &str) -> Regex {
    Regex::new(&format!(r"(?im)^[ \t]*{name}:[ \t]*([^\r\n]*[^\s])")).expect("valid header pattern")
}

static SUBJECT: Lazy<Regex> = Lazy::new(|| header_line("Subject"));
static FROM: Lazy<Regex> = Lazy::new(|| header_line("From"));
static TO: Lazy<Regex> = Lazy::new(|| header_line("To"));
static DATE: Lazy<Regex> = Lazy::new(|| header_line("Date"));
static MESSAGE_ID: Lazy<Regex> = Lazy::new(|| header_line("Message-ID"));

/// Recover a record from arbitrary bytes. Never fails.
///
/// Invalid sequences are replaced and a leading BOM is dropped.
/// Missing headers get fixed placeholders; a missing date becomes the
/// current time.
pub fn parse_heuristic(raw: &[u8]) -> MessageRecord {
    // UTF-8 unless a byte-order mark says otherwise.
    let (text, _encoding, _had_errors) = encoding_rs::UTF_8.decode(raw);

    let body = match body_start(&text) {
        Some(start) => text[start..].trim().to_string(),
        None => BODY_NOT_EXTRACTED.to_string(),
    };

    MessageRecord {
        subject: capture(&SUBJECT, &text).unwrap_or_else(|| NO_SUBJECT.to_string()),
        sender_display: capture(&FROM, &text).unwrap_or_else(|| UNKNOWN_SENDER.to_string()),
        recipient_display: capture(&TO, &text).unwrap_or_else(|| UNKNOWN_RECIPIENT.to_string()),
        sent_time: capture(&DATE, &text).unwrap_or_else(date::now_display),
        message_id: capture(&MESSAGE_ID, &text).unwrap_or_default(),
        body,
        method: ParseMethod::Heuristic,
    }
}

fn capture(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Byte offset just past the first blank line (`\n\n` or `\r\n\r\n`).
fn body_start(text: &str) -> Option<usize> {
    let lf = text.find("\n\n").map(|i| (i, i + 2));
    let crlf = text.find("\r\n\r\n").map(|i| (i, i + 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a.1 } else { b.1 }),
        (Some((_, end)), None) | (None, Some((_, end))) => Some(end),
        (None, None) => None,
    }
}
