//! Reader for emitted message files (header block, blank line, body).

use std::path::Path;

use crate::error::{OlmError, Result};
use crate::model::record::MessageRecord;

/// Parse an emitted message file back into a [`MessageRecord`].
pub fn read_message_file(path: impl AsRef<Path>) -> Result<MessageRecord> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            OlmError::FileNotFound(path.to_path_buf())
        } else {
            OlmError::io(path, e)
        }
    })?;
    Ok(parse_message_text(&String::from_utf8_lossy(&data)))
}

/// Parse message text. Unknown headers are ignored; absent ones are empty.
pub fn parse_message_text(text: &str) -> MessageRecord {
    let (header_block, body) = match find_header_end(text) {
        Some((end, body_start)) => (&text[..end], &text[body_start..]),
        None => (text, ""),
    };

    let headers = unfold_headers(header_block);
    let header = |name: &str| -> String {
        headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
            .unwrap_or_default()
    };

    // The emitter terminates the body with a single newline.
    let body = body
        .strip_suffix("\r\n")
        .or_else(|| body.strip_suffix('\n'))
        .unwrap_or(body);

    MessageRecord {
        subject: header("subject"),
        sender_display: header("from"),
        recipient_display: header("to"),
        sent_time: header("date"),
        message_id: header("message-id"),
        body: body.to_string(),
        ..Default::default()
    }
}

/// Locate the blank line ending the header block.
///
/// Returns `(header_end, body_start)` byte offsets. A file that starts with a
/// blank line has no headers.
fn find_header_end(text: &str) -> Option<(usize, usize)> {
    if let Some(rest) = text.strip_prefix("\r\n") {
        return Some((0, text.len() - rest.len()));
    }
    if text.starts_with('\n') {
        return Some((0, 1));
    }
    let lf = text.find("\n\n").map(|i| (i, i + 2));
    let crlf = text.find("\r\n\r\n").map(|i| (i, i + 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

/// Join folded continuation lines and split each header into `(name, value)`.
fn unfold_headers(block: &str) -> Vec<(String, String)> {
    let mut result: Vec<(String, String)> = Vec::new();

    for line in block.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(last) = result.last_mut() {
                if !last.1.is_empty() {
                    last.1.push(' ');
                }
                last.1.push_str(line.trim());
            }
        } else if let Some((name, value)) = line.split_once(':') {
            result.push((name.trim().to_string(), value.trim().to_string()));
        }
    }

    result
}
