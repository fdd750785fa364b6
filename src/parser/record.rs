//! Structured parsing of OLM message records.
//!
//! A record is scanned as a flat sequence of elements: nesting is ignored and
//! every element whose name is a [`RecordTag`] contributes its direct text.
//! When the same tag occurs more than once (a forwarded message quoted inside
//! another, for example) the first non-empty occurrence in document order
//! wins, so outer fields are never overwritten by inner ones.
//!
//! Records are transcoded to UTF-8 first, using the byte-order mark or the
//! `encoding` of the XML declaration. Anything that is not a well-formed XML
//! document yields [`ParseOutcome::NeedsFallback`]; the caller decides what to
//! do with it.

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::Path;

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};
use once_cell::sync::Lazy;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use tracing::debug;

use crate::error::{OlmError, Result};
use crate::model::address::EmailAddress;
use crate::model::record::{MessageRecord, ParseMethod};

use super::{date, heuristic, html};

static DECLARED_ENCODING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\bencoding\s*=\s*["']([^"']+)["']"#).expect("valid encoding pattern")
});

/// Attribute names of the address children found under sender elements.
const ADDRESS_ATTR: &[u8] = b"OPFContactEmailAddressAddress";
const NAME_ATTR: &[u8] = b"OPFContactEmailAddressName";

/// Element names recognized in a message record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordTag {
    Subject,
    DisplayTo,
    FromAddresses,
    SenderAddress,
    SentTime,
    Body,
    HtmlBody,
    MessageId,
}

impl RecordTag {
    /// Every recognized tag.
    pub const ALL: [RecordTag; 8] = [
        Self::Subject,
        Self::DisplayTo,
        Self::FromAddresses,
        Self::SenderAddress,
        Self::SentTime,
        Self::Body,
        Self::HtmlBody,
        Self::MessageId,
    ];

    /// The XML element name.
    pub fn element_name(self) -> &'static str {
        match self {
            Self::Subject => "OPFMessageCopySubject",
            Self::DisplayTo => "OPFMessageCopyDisplayTo",
            Self::FromAddresses => "OPFMessageCopyFromAddresses",
            Self::SenderAddress => "OPFMessageCopySenderAddress",
            Self::SentTime => "OPFMessageCopySentTime",
            Self::Body => "OPFMessageCopyBody",
            Self::HtmlBody => "OPFMessageCopyHTMLBody",
            Self::MessageId => "OPFMessageCopyMessageID",
        }
    }

    /// Look up a tag by element (local) name.
    pub fn from_element_name(name: &[u8]) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|tag| tag.element_name().as_bytes() == name)
    }

    fn holds_addresses(self) -> bool {
        matches!(self, Self::FromAddresses | Self::SenderAddress)
    }
}

/// Result of the structured pass over one record.
#[derive(Debug)]
pub enum ParseOutcome<'a> {
    /// The record is well-formed XML; fields were read from its tags.
    Structured(MessageRecord),
    /// The record is not well-formed XML and must be scanned heuristically.
    NeedsFallback { raw: &'a [u8], reason: String },
}

/// First non-empty value found for each tag.
#[derive(Debug, Default)]
pub struct TagValues(HashMap<RecordTag, String>);

impl TagValues {
    fn take(&mut self, tag: RecordTag) -> Option<String> {
        self.0.remove(&tag)
    }
}

/// Read a record from disk and parse it.
///
/// Only the read can fail; parsing always yields a record.
pub fn read_record(path: &Path) -> Result<MessageRecord> {
    let raw = std::fs::read(path).map_err(|source| OlmError::RecordRead {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_record(&raw))
}

/// Parse one record: structured first, heuristic when the bytes are not XML.
pub fn parse_record(raw: &[u8]) -> MessageRecord {
    match parse_structured(raw) {
        ParseOutcome::Structured(record) => record,
        ParseOutcome::NeedsFallback { raw, reason } => {
            debug!(reason = %reason, "Record is not well-formed XML, scanning headers");
            heuristic::parse_heuristic(raw)
        }
    }
}

/// Attempt the structured pass.
pub fn parse_structured(raw: &[u8]) -> ParseOutcome<'_> {
    let bytes = transcode(raw);
    match scan_tags(&bytes) {
        Ok(values) => ParseOutcome::Structured(build_record(values)),
        Err(reason) => ParseOutcome::NeedsFallback { raw, reason },
    }
}

/// UTF-8 bytes of a record, without byte-order mark.
///
/// The encoding comes from the BOM, from the `<\0` / `\0<` prefix of
/// unmarked UTF-16, or from the XML declaration. UTF-8 input is borrowed.
fn transcode(raw: &[u8]) -> Cow<'_, [u8]> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(raw) {
        let body = &raw[bom_len..];
        if encoding == UTF_8 {
            return Cow::Borrowed(body);
        }
        return decode_with(encoding, body);
    }

    let encoding = match raw {
        [b'<', 0, ..] => UTF_16LE,
        [0, b'<', ..] => UTF_16BE,
        _ => match declared_encoding(raw) {
            // The declaration was readable as ASCII, so a UTF-16 label is wrong.
            Some(e) if e != UTF_8 && e.is_ascii_compatible() => e,
            _ => return Cow::Borrowed(raw),
        },
    };
    decode_with(encoding, raw)
}

fn decode_with(encoding: &'static Encoding, bytes: &[u8]) -> Cow<'static, [u8]> {
    let (text, _had_errors) = encoding.decode_without_bom_handling(bytes);
    Cow::Owned(text.into_owned().into_bytes())
}

/// Encoding named by `<?xml ... encoding="..."?>`, if any.
fn declared_encoding(raw: &[u8]) -> Option<&'static Encoding> {
    let head = raw.strip_prefix(b"<?xml")?;
    let end = head.windows(2).position(|w| w == b"?>")?;
    let decl = std::str::from_utf8(&head[..end]).ok()?;
    let label = DECLARED_ENCODING.captures(decl)?.get(1)?;
    Encoding::for_label(label.as_str().trim().as_bytes())
}

/// `Char` production of XML 1.0.
fn is_xml_char(c: char) -> bool {
    matches!(
        c,
        '\t' | '\n' | '\r'
            | '\u{20}'..='\u{D7FF}'
            | '\u{E000}'..='\u{FFFD}'
            | '\u{10000}'..='\u{10FFFF}'
    )
}

fn check_chars(text: &str) -> std::result::Result<(), String> {
    match text.chars().find(|&c| !is_xml_char(c)) {
        Some(c) => Err(format!("invalid character U+{:04X}", c as u32)),
        None => Ok(()),
    }
}

fn build_record(mut values: TagValues) -> MessageRecord {
    let sender = values
        .take(RecordTag::FromAddresses)
        .or_else(|| values.take(RecordTag::SenderAddress))
        .unwrap_or_default();
    let body = values
        .take(RecordTag::Body)
        .or_else(|| values.take(RecordTag::HtmlBody))
        .unwrap_or_default();
    let sent_time = values.take(RecordTag::SentTime).unwrap_or_default();

    MessageRecord {
        subject: values.take(RecordTag::Subject).unwrap_or_default(),
        sender_display: sender,
        recipient_display: values.take(RecordTag::DisplayTo).unwrap_or_default(),
        sent_time: date::normalize_sent_time(&sent_time),
        message_id: values.take(RecordTag::MessageId).unwrap_or_default(),
        body: html::normalize_body(&body),
        method: ParseMethod::Structured,
    }
}

/// An element currently open during the scan.
struct OpenElement {
    tag: Option<RecordTag>,
    order: usize,
    text: String,
    addresses: Vec<EmailAddress>,
}

impl OpenElement {
    fn value(&self) -> String {
        let text = self.text.trim();
        if !text.is_empty() || self.addresses.is_empty() {
            return text.to_string();
        }
        self.addresses
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Walk every element of a well-formed document and collect recognized tags.
///
/// Returns the reason as `Err` on the first well-formedness violation.
pub fn scan_tags(bytes: &[u8]) -> std::result::Result<TagValues, String> {
    let mut reader = Reader::from_reader(bytes);
    reader.check_end_names(true);

    let mut buf = Vec::new();
    let mut stack: Vec<OpenElement> = Vec::new();
    let mut found: Vec<(usize, RecordTag, String)> = Vec::new();
    let mut next_order = 0usize;
    let mut root_seen = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let element = open_element(&e, &mut stack, &mut root_seen, &mut next_order)?;
                stack.push(element);
            }
            Ok(Event::Empty(e)) => {
                let element = open_element(&e, &mut stack, &mut root_seen, &mut next_order)?;
                close_element(element, &mut found);
            }
            Ok(Event::End(_)) => {
                let element = stack.pop().ok_or("closing tag without an open element")?;
                close_element(element, &mut found);
            }
            Ok(Event::Text(e)) => {
                let text = e.unescape().map_err(|err| err.to_string())?;
                check_chars(&text)?;
                match stack.last_mut() {
                    Some(top) if top.tag.is_some() => top.text.push_str(&text),
                    Some(_) => {}
                    None if text.trim().is_empty() => {}
                    None => return Err("text outside the root element".to_string()),
                }
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                check_chars(&text)?;
                match stack.last_mut() {
                    Some(top) if top.tag.is_some() => top.text.push_str(&text),
                    Some(_) => {}
                    None => return Err("CDATA outside the root element".to_string()),
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(format!("at byte {}: {e}", reader.buffer_position()));
            }
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        let name = open.tag.map_or("element", RecordTag::element_name);
        return Err(format!("unclosed {name} at end of input"));
    }
    if !root_seen {
        return Err("no root element".to_string());
    }

    found.sort_by_key(|(order, _, _)| *order);
    let mut values = TagValues::default();
    for (_, tag, value) in found {
        if !value.is_empty() {
            values.0.entry(tag).or_insert(value);
        }
    }
    Ok(values)
}

fn open_element(
    start: &BytesStart<'_>,
    stack: &mut [OpenElement],
    root_seen: &mut bool,
    next_order: &mut usize,
) -> std::result::Result<OpenElement, String> {
    if stack.is_empty() {
        if *root_seen {
            return Err("more than one root element".to_string());
        }
        *root_seen = true;
    }

    let tag = RecordTag::from_element_name(start.local_name().as_ref());

    if let Some(parent) = stack.last_mut() {
        if parent.tag.is_some_and(RecordTag::holds_addresses) {
            if let Some(address) = address_attributes(start)? {
                parent.addresses.push(address);
            }
        }
    }

    let order = *next_order;
    *next_order += 1;
    Ok(OpenElement {
        tag,
        order,
        text: String::new(),
        addresses: Vec::new(),
    })
}

fn close_element(element: OpenElement, found: &mut Vec<(usize, RecordTag, String)>) {
    if let Some(tag) = element.tag {
        found.push((element.order, tag, element.value()));
    }
}

/// Read `OPFContactEmailAddressName` / `OPFContactEmailAddressAddress` attributes.
fn address_attributes(
    start: &BytesStart<'_>,
) -> std::result::Result<Option<EmailAddress>, String> {
    let mut name = String::new();
    let mut address = String::new();

    for attr in start.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let key = attr.key.local_name();
        if key.as_ref() == ADDRESS_ATTR {
            address = attr.unescape_value().map_err(|e| e.to_string())?.into_owned();
            check_chars(&address)?;
        } else if key.as_ref() == NAME_ATTR {
            name = attr.unescape_value().map_err(|e| e.to_string())?.into_owned();
            check_chars(&name)?;
        }
    }

    let parsed = EmailAddress::new(name, address);
    Ok((!parsed.is_empty()).then_some(parsed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn structured(xml: &str) -> MessageRecord {
        match parse_structured(xml.as_bytes()) {
            ParseOutcome::Structured(record) => record,
            ParseOutcome::NeedsFallback { reason, .. } => panic!("unexpected fallback: {reason}"),
        }
    }

    fn fallback_reason(input: &[u8]) -> String {
        match parse_structured(input) {
            ParseOutcome::NeedsFallback { reason, .. } => reason,
            ParseOutcome::Structured(r) => panic!("unexpected structured parse: {r:?}"),
        }
    }

    #[test]
    fn test_all_fields() {
        let record = structured(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<emails><email>
  <OPFMessageCopySubject>Quarterly report</OPFMessageCopySubject>
  <OPFMessageCopyDisplayTo>Bob &lt;bob@example.com&gt;</OPFMessageCopyDisplayTo>
  <OPFMessageCopyFromAddresses>alice@example.com</OPFMessageCopyFromAddresses>
  <OPFMessageCopySentTime>2024-01-15T10:30:00Z</OPFMessageCopySentTime>
  <OPFMessageCopyMessageID>&lt;abc@mail.example.com&gt;</OPFMessageCopyMessageID>
  <OPFMessageCopyBody>See attached.</OPFMessageCopyBody>
</email></emails>"#,
        );
        assert_eq!(record.subject, "Quarterly report");
        assert_eq!(record.recipient_display, "Bob <bob@example.com>");
        assert_eq!(record.sender_display, "alice@example.com");
        assert_eq!(record.sent_time, "Mon, 15 Jan 2024 10:30:00 +0000");
        assert_eq!(record.message_id, "<abc@mail.example.com>");
        assert_eq!(record.body, "See attached.");
        assert_eq!(record.method, ParseMethod::Structured);
    }

    #[test]
    fn test_missing_tags_are_empty() {
        let record = structured("<email><OPFMessageCopySubject>Only</OPFMessageCopySubject></email>");
        assert_eq!(record.subject, "Only");
        assert_eq!(record.sender_display, "");
        assert_eq!(record.recipient_display, "");
        assert_eq!(record.sent_time, "");
        assert_eq!(record.message_id, "");
        assert_eq!(record.body, "");
    }

    #[test]
    fn test_sender_address_fallback() {
        let record = structured(
            "<email><OPFMessageCopyFromAddresses/>\
             <OPFMessageCopySenderAddress>carol@example.com</OPFMessageCopySenderAddress></email>",
        );
        assert_eq!(record.sender_display, "carol@example.com");
    }

    #[test]
    fn test_sender_from_address_children() {
        let record = structured(
            r#"<email><OPFMessageCopyFromAddresses>
  <emailAddress OPFContactEmailAddressAddress="dan@example.com" OPFContactEmailAddressName="Dan Smith"/>
</OPFMessageCopyFromAddresses></email>"#,
        );
        assert_eq!(record.sender_display, "Dan Smith <dan@example.com>");
    }

    #[test]
    fn test_html_body_only_when_plain_missing() {
        let record = structured(
            "<email><OPFMessageCopyHTMLBody>&lt;p&gt;Hi &amp;amp; bye&lt;/p&gt;</OPFMessageCopyHTMLBody></email>",
        );
        assert_eq!(record.body, "Hi & bye");

        let record = structured(
            "<email><OPFMessageCopyHTMLBody>&lt;p&gt;html&lt;/p&gt;</OPFMessageCopyHTMLBody>\
             <OPFMessageCopyBody>plain</OPFMessageCopyBody></email>",
        );
        assert_eq!(record.body, "plain");
    }

    #[test]
    fn test_cdata_body() {
        let record = structured(
            "<email><OPFMessageCopyBody><![CDATA[<div>Rich <i>text</i></div>]]></OPFMessageCopyBody></email>",
        );
        assert_eq!(record.body, "Rich text");
    }

    #[test]
    fn test_first_match_wins_for_nested_copies() {
        let record = structured(
            "<email>\
               <OPFMessageCopySubject>Outer</OPFMessageCopySubject>\
               <quoted><email><OPFMessageCopySubject>Inner</OPFMessageCopySubject></email></quoted>\
             </email>",
        );
        assert_eq!(record.subject, "Outer");

        // Outer element opened first even though the inner one closes first.
        let record = structured(
            "<email><OPFMessageCopyBody>outer body\
               <OPFMessageCopyBody>inner body</OPFMessageCopyBody>\
             </OPFMessageCopyBody></email>",
        );
        assert_eq!(record.body, "outer body");
    }

    #[test]
    fn test_unparseable_date_kept_raw() {
        let record = structured(
            "<email><OPFMessageCopySentTime>2024-99-99Tnope</OPFMessageCopySentTime></email>",
        );
        assert_eq!(record.sent_time, "2024-99-99Tnope");
    }

    #[test]
    fn test_bom_is_ignored() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(b"<email><OPFMessageCopySubject>BOM</OPFMessageCopySubject></email>");
        match parse_structured(&bytes) {
            ParseOutcome::Structured(r) => assert_eq!(r.subject, "BOM"),
            ParseOutcome::NeedsFallback { reason, .. } => panic!("{reason}"),
        }
    }

    #[test]
    fn test_latin1_declaration_is_transcoded() {
        let raw: &[u8] = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n<email>\
<OPFMessageCopySubject>Caf\xE9 cr\xE8me</OPFMessageCopySubject>\
<OPFMessageCopyMessageID>&lt;l1@example.com&gt;</OPFMessageCopyMessageID></email>";
        match parse_structured(raw) {
            ParseOutcome::Structured(r) => {
                assert_eq!(r.subject, "Caf\u{e9} cr\u{e8}me");
                assert_eq!(r.message_id, "<l1@example.com>");
            }
            ParseOutcome::NeedsFallback { reason, .. } => panic!("{reason}"),
        }
    }

    #[test]
    fn test_utf16_records_are_transcoded() {
        let xml = "<?xml version=\"1.0\" encoding=\"UTF-16\"?>\
<email><OPFMessageCopySubject>Hi \u{f6}</OPFMessageCopySubject></email>";

        let mut le_bom = vec![0xFF, 0xFE];
        let mut be_bom = vec![0xFE, 0xFF];
        let mut le_bare = Vec::new();
        for unit in xml.encode_utf16() {
            le_bom.extend_from_slice(&unit.to_le_bytes());
            be_bom.extend_from_slice(&unit.to_be_bytes());
            le_bare.extend_from_slice(&unit.to_le_bytes());
        }

        for raw in [le_bom, be_bom, le_bare] {
            let record = parse_record(&raw);
            assert_eq!(record.method, ParseMethod::Structured);
            assert_eq!(record.subject, "Hi \u{f6}");
        }
    }

    #[test]
    fn test_utf8_declaration_stays_borrowed() {
        let raw = b"<?xml version=\"1.0\" encoding=\"utf-8\"?><email/>";
        assert!(matches!(transcode(raw), Cow::Borrowed(_)));
        assert_eq!(
            declared_encoding(b"<?xml version='1.0' encoding='windows-1252'?>"),
            Some(encoding_rs::WINDOWS_1252)
        );
    }

    #[test]
    fn test_control_characters_are_not_xml() {
        assert!(fallback_reason(b"<email><OPFMessageCopySubject>a\x01b</OPFMessageCopySubject></email>")
            .contains("invalid character"));
        assert!(fallback_reason(b"<email><OPFMessageCopySubject>a&#1;b</OPFMessageCopySubject></email>")
            .contains("invalid character"));
        assert!(fallback_reason(b"<email><x><![CDATA[\x0b]]></x></email>").contains("invalid character"));
        assert!(is_xml_char('\t'));
        assert!(!is_xml_char('\u{FFFE}'));
    }

    #[test]
    fn test_structural_failures() {
        assert!(fallback_reason(b"Subject: plain text\n\nbody").contains("root"));
        assert!(fallback_reason(b"").contains("no root"));
        assert!(!fallback_reason(b"<email><OPFMessageCopySubject>x</email>").is_empty());
        assert!(!fallback_reason(b"<email><a></a>").is_empty());
        assert!(fallback_reason(b"<a/><b/>").contains("more than one root"));
        assert!(!fallback_reason(b"<a>&nbsp;</a>").is_empty());
    }

    #[test]
    fn test_dispatcher_falls_back() {
        let record = parse_record(b"<broken>\nSubject: Rescued\n\nBody here");
        assert_eq!(record.method, ParseMethod::Heuristic);
        assert_eq!(record.subject, "Rescued");
        assert_eq!(record.body, "Body here");
    }

    #[test]
    fn test_read_record_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let err = read_record(&tmp.path().join("gone.olk15Message")).unwrap_err();
        assert!(matches!(err, OlmError::RecordRead { .. }));
    }
}
