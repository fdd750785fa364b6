//! Sender and recipient display strings split into name and address.
//!
//! OLM records store people as free-form display strings. The CSV manifest
//! needs them as separate columns, so this module splits a display string
//! such as `"Doe, Jane" <jane@example.com>, bob@example.com` into parts.

/// A display name paired with its mailbox address. Either part may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct EmailAddress {
    /// Human-readable name.
    pub display_name: String,
    /// Bare `user@domain` address.
    pub address: String,
}

impl EmailAddress {
    /// Build from the two parts found in an OLM address element.
    pub fn new(display_name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into().trim().to_string(),
            address: address.into().trim().to_string(),
        }
    }

    /// Parse one mailbox.
    ///
    /// Text without an `@` and without angle brackets is treated as a name
    /// (`"Unknown Sender"` has no address).
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();

        if let Some((name, rest)) = trimmed.rsplit_once('<') {
            if let Some((addr, _)) = rest.split_once('>') {
                return Self::new(unquote(name), addr);
            }
        }

        if trimmed.contains('@') {
            Self::new("", trimmed)
        } else {
            Self::new(unquote(trimmed), "")
        }
    }

    /// Parse a comma or semicolon separated list, honoring quotes and angle brackets.
    pub fn parse_list(raw: &str) -> Vec<Self> {
        split_mailboxes(raw)
            .into_iter()
            .map(Self::parse)
            .filter(|a| !a.is_empty())
            .collect()
    }

    /// `true` if both parts are empty.
    pub fn is_empty(&self) -> bool {
        self.display_name.is_empty() && self.address.is_empty()
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.display_name.is_empty(), self.address.is_empty()) {
            (true, _) => f.write_str(&self.address),
            (false, true) => f.write_str(&self.display_name),
            (false, false) => write!(f, "{} <{}>", self.display_name, self.address),
        }
    }
}

/// Join the names and the addresses of a list into two `"; "`-separated columns.
pub fn split_columns(addresses: &[EmailAddress]) -> (String, String) {
    let names = addresses
        .iter()
        .map(|a| a.display_name.as_str())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("; ");
    let emails = addresses
        .iter()
        .map(|a| a.address.as_str())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("; ");
    (names, emails)
}

fn split_mailboxes(raw: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut angle = false;

    for (i, ch) in raw.char_indices() {
        match ch {
            '"' => quoted = !quoted,
            '<' if !quoted => angle = true,
            '>' if !quoted => angle = false,
            ',' | ';' if !quoted && !angle => {
                parts.push(&raw[start..i]);
                start = i + ch.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&raw[start..]);
    parts
}

fn unquote(s: &str) -> &str {
    let s = s.trim();
    s.strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(s)
        .trim()
}
