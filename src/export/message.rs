//! Writing canonical message files.
//!
//! Every file has the same five header lines, in a fixed order, followed by
//! a blank line and the body:
//!
//! ```text
//! From: <sender>
//! To: <recipient>
//! Subject: <subject>
//! Date: <date>
//! Message-ID: <id>
//!
//! <body>
//! ```

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use crate::error::{OlmError, Result};
use crate::model::record::MessageRecord;

/// File naming for emitted messages: `{prefix}{sequence:05}.{extension}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageNaming {
    pub prefix: String,
    pub extension: String,
}

impl Default for MessageNaming {
    fn default() -> Self {
        Self {
            prefix: "message_".to_string(),
            extension: "eml".to_string(),
        }
    }
}

impl MessageNaming {
    /// File name for the given sequence number.
    pub fn file_name(&self, sequence: usize) -> String {
        format!("{}{:05}.{}", self.prefix, sequence, self.extension)
    }
}

/// A message file that was written.
#[derive(Debug, Clone)]
pub struct EmittedMessage {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Render a record in canonical form.
///
/// Header values are flattened to a single line so a multi-line value cannot
/// end the header block early.
pub fn render_message(record: &MessageRecord) -> String {
    let mut out = String::with_capacity(record.body.len() + 256);
    for (name, value) in [
        ("From", &record.sender_display),
        ("To", &record.recipient_display),
        ("Subject", &record.subject),
        ("Date", &record.sent_time),
        ("Message-ID", &record.message_id),
    ] {
        out.push_str(name);
        out.push_str(": ");
        out.push_str(&single_line(value));
        out.push('\n');
    }
    out.push('\n');
    out.push_str(&record.body);
    out.push('\n');
    out
}

/// Write `record` as `output_dir/{naming.file_name(sequence)}`.
///
/// An existing file with the same name is overwritten.
pub fn emit_message(
    record: &MessageRecord,
    sequence: usize,
    output_dir: &Path,
    naming: &MessageNaming,
) -> Result<EmittedMessage> {
    let path = output_dir.join(naming.file_name(sequence));
    let content = render_message(record);

    std::fs::write(&path, content.as_bytes()).map_err(|e| OlmError::Emit {
        path: path.clone(),
        reason: e.to_string(),
    })?;

    Ok(EmittedMessage {
        path,
        bytes: content.len() as u64,
    })
}

fn single_line(value: &str) -> Cow<'_, str> {
    if value.contains(['\r', '\n']) {
        Cow::Owned(
            value
                .split(['\r', '\n'])
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(" "),
        )
    } else {
        Cow::Borrowed(value)
    }
}
