//! Sent-time normalization.
//!
//! OLM records store `OPFMessageCopySentTime` as ISO-8601. Emitted messages
//! carry an RFC 2822 style `Date:` header instead.

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeZone, Utc};

/// `strftime` format of every emitted `Date:` value.
pub const DISPLAY_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Reformat an ISO-8601 timestamp into [`DISPLAY_FORMAT`].
///
/// Only values containing the `T` date/time separator are considered; a
/// value that fails to parse is returned as-is, never rejected.
pub fn normalize_sent_time(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.contains('T') {
        return trimmed.to_string();
    }
    match parse_iso(trimmed) {
        Some(dt) => dt.format(DISPLAY_FORMAT).to_string(),
        None => trimmed.to_string(),
    }
}

/// Current local time in [`DISPLAY_FORMAT`], used when no date is recoverable.
pub fn now_display() -> String {
    Local::now().format(DISPLAY_FORMAT).to_string()
}

/// Parse an ISO-8601 timestamp. `Z` means UTC; a value without offset is taken as UTC.
pub fn parse_iso(s: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%dT%H:%M%z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }

    let naive = s.strip_suffix(['Z', 'z']).unwrap_or(s);
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(naive, fmt) {
            return Some(Utc.from_utc_datetime(&ndt).into());
        }
    }
    None
}

/// Parse a `Date:` value as written by the emitter (or by a mail client).
///
/// Tries RFC 2822, then [`DISPLAY_FORMAT`], then ISO-8601.
pub fn parse_display(s: &str) -> Option<DateTime<FixedOffset>> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc2822(trimmed)
        .or_else(|_| DateTime::parse_from_str(trimmed, DISPLAY_FORMAT))
        .ok()
        .or_else(|| parse_iso(trimmed))
}
