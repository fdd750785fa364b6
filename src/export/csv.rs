//! Summarize a directory of message files as a CSV manifest.
//!
//! Output is UTF-8 with BOM for Excel compatibility.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::model::address::{split_columns, EmailAddress};
use crate::model::record::MessageRecord;
use crate::parser::date::parse_display;
use crate::parser::message_file::read_message_file;

/// Longest text cell before truncation, in characters.
pub const MAX_CELL_CHARS: usize = 5000;

const HEADER: &str =
    "filename,subject,from_name,from_email,to_name,to_email,date,date_parsed,message_id,body_text";

/// Write one row per `*.eml` file in `message_dir` to `csv_path`.
///
/// Files are read in name order. A file that cannot be read is skipped with a
/// warning. Returns the number of rows written.
pub fn export_csv(message_dir: &Path, csv_path: &Path) -> anyhow::Result<usize> {
    let files = message_files(message_dir)?;

    let mut file = std::io::BufWriter::new(std::fs::File::create(csv_path)?);

    // UTF-8 BOM for Excel
    file.write_all(&[0xEF, 0xBB, 0xBF])?;
    writeln!(file, "{HEADER}")?;

    let mut rows = 0usize;
    for path in &files {
        let record = match read_message_file(path) {
            Ok(r) => r,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable message file");
                continue;
            }
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        writeln!(file, "{}", csv_row(&name, &record))?;
        rows += 1;
    }

    file.flush()?;
    debug!(rows, path = %csv_path.display(), "CSV manifest written");
    Ok(rows)
}

fn message_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("eml"))
        })
        .collect();
    files.sort();
    Ok(files)
}

fn csv_row(file_name: &str, record: &MessageRecord) -> String {
    let from = EmailAddress::parse_list(&record.sender_display)
        .into_iter()
        .next()
        .unwrap_or_default();
    let (to_name, to_email) = split_columns(&EmailAddress::parse_list(&record.recipient_display));
    let date_parsed = parse_display(&record.sent_time)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default();

    [
        file_name.to_string(),
        clean_text(&record.subject),
        clean_text(&from.display_name),
        from.address,
        clean_text(&to_name),
        to_email,
        record.sent_time.clone(),
        date_parsed,
        record.message_id.clone(),
        clean_text(&record.body),
    ]
    .iter()
    .map(|v| csv_escape(v))
    .collect::<Vec<_>>()
    .join(",")
}

/// Collapse whitespace and cap the length at [`MAX_CELL_CHARS`].
fn clean_text(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match collapsed.char_indices().nth(MAX_CELL_CHARS) {
        Some((cut, _)) => format!("{}...", &collapsed[..cut]),
        None => collapsed,
    }
}

/// Escape a value for CSV (RFC 4180).
///
/// Wraps in double quotes if the value contains commas, quotes, or newlines.
fn csv_escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
