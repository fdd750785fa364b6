use criterion::{criterion_group, criterion_main, Criterion};

const STRUCTURED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<emails>
  <email>
    <OPFMessageCopySubject>Quarterly report</OPFMessageCopySubject>
    <OPFMessageCopyDisplayTo>Bob &lt;bob@example.com&gt;</OPFMessageCopyDisplayTo>
    <OPFMessageCopyFromAddresses>
      <emailAddress OPFContactEmailAddressAddress="alice@example.com" OPFContactEmailAddressName="Alice"/>
    </OPFMessageCopyFromAddresses>
    <OPFMessageCopySentTime>2024-01-15T10:30:00Z</OPFMessageCopySentTime>
    <OPFMessageCopyMessageID>&lt;q3@example.com&gt;</OPFMessageCopyMessageID>
    <OPFMessageCopyHTMLBody>&lt;html&gt;&lt;body&gt;&lt;p&gt;Numbers &amp;amp; charts attached.&lt;/p&gt;&lt;/body&gt;&lt;/html&gt;</OPFMessageCopyHTMLBody>
  </email>
</emails>"#;

const MALFORMED: &str = "<email><OPFMessageCopySubject>cut off\n\
Subject: Quarterly report\nFrom: alice@example.com\nTo: bob@example.com\n\
Date: Mon, 15 Jan 2024 10:30:00 +0000\n\nNumbers attached.\n";

fn bench_parse_structured(c: &mut Criterion) {
    c.bench_function("parse_record_structured", |b| {
        b.iter(|| olmshell::parser::parse_record(STRUCTURED.as_bytes()))
    });
}

fn bench_parse_fallback(c: &mut Criterion) {
    c.bench_function("parse_record_fallback", |b| {
        b.iter(|| olmshell::parser::parse_record(MALFORMED.as_bytes()))
    });
}

criterion_group!(benches, bench_parse_structured, bench_parse_fallback);
criterion_main!(benches);
