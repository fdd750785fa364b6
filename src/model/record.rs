//! The canonical extracted message unit.

use serde::{Deserialize, Serialize};

/// How a record's fields were recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMethod {
    /// Tag lookup over a well-formed XML record.
    #[default]
    Structured,
    /// Header-line scanning over text that is not well-formed XML.
    Heuristic,
}

/// One message recovered from a single archive record.
///
/// Every field is always present: a value that could not be found is the
/// empty string (or a fixed placeholder on the heuristic path), never absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Decoded subject line.
    pub subject: String,

    /// Sender as displayed (`Name <address>`, bare address, or free text).
    pub sender_display: String,

    /// Recipients as displayed.
    pub recipient_display: String,

    /// Sent time, reformatted as `%a, %d %b %Y %H:%M:%S %z` when possible,
    /// otherwise the raw value.
    pub sent_time: String,

    /// The `Message-ID` value, verbatim.
    pub message_id: String,

    /// Plain-text body (HTML stripped when the source was HTML).
    pub body: String,

    /// Which parser produced this record.
    #[serde(default)]
    pub method: ParseMethod,
}

impl MessageRecord {
    /// `true` if the record was recovered by the heuristic parser.
    pub fn is_heuristic(&self) -> bool {
        self.method == ParseMethod::Heuristic
    }
}
