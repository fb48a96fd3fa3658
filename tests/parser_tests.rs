//! Integration tests for the message sources and the MIME decoder.

use std::path::Path;

use mimetree::config::SourceConfig;
use mimetree::model::raw::RawMessage;
use mimetree::parser::encoded_word;
use mimetree::parser::header::parse_date;
use mimetree::parser::mime::{DecodeOptions, MimeEntity};
use mimetree::source::eml::read_eml;
use mimetree::source::mbox::UnixMboxReader;
use mimetree::source::{open_messages, SourceFormat};

fn fixture(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn load(name: &str, format: SourceFormat) -> Vec<MimeEntity> {
    open_messages(&fixture(name), format, &SourceConfig::default())
        .unwrap()
        .into_iter()
        .map(MimeEntity::parse)
        .collect()
}

// ─── Test 1: simple.mbox → exactly 4 messages ──────────────────────

#[test]
fn test_parse_simple_mbox_count() {
    let count = UnixMboxReader::open(fixture("simple.mbox")).unwrap().count();
    assert_eq!(count, 4, "simple.mbox should contain exactly 4 messages");
}

// ─── Test 2: First message fields ──────────────────────────────────

#[test]
fn test_parse_simple_mbox_first_message() {
    let mails = load("simple.mbox", SourceFormat::Mbox);
    let first = &mails[0];
    assert_eq!(first.subject(), "Hello World");
    assert_eq!(first.from(), "User One <user1@example.com>");
    assert_eq!(first.message_id(), "<msg001@example.com>");
    assert_eq!(first.content_type(), "");
    assert_eq!(first.message_body().unwrap(), "This is the first message.\n\n");
    assert!(first.raw().uuid.ends_with("simple.mbox/0"));
}

// ─── Test 3: Multipart message with an attachment ──────────────────

#[test]
fn test_multipart_message_in_mbox() {
    let mails = load("simple.mbox", SourceFormat::Mbox);
    let second = &mails[1];
    assert!(second.is_multipart());
    assert_eq!(second.boundary(), "----=_Part_0");
    assert_eq!(
        second.contents(),
        "This is a multi-part message in MIME format.\n"
    );
    assert_eq!(second.parts().len(), 2);
    assert_eq!(second.parts()[0].message_body().unwrap(), "See the report.\n");

    let attachment = &second.parts()[1];
    assert!(attachment.is_attachment());
    assert_eq!(attachment.filename().unwrap(), "report.txt");
    assert_eq!(attachment.raw_contents().unwrap(), b"Hello, attachment!");
}

// ─── Test 4: Encoded words and quoted-printable body ───────────────

#[test]
fn test_encoded_words_and_quoted_printable() {
    let mails = load("simple.mbox", SourceFormat::Mbox);
    let third = &mails[2];
    assert_eq!(
        encoded_word::decode(third.from()).unwrap(),
        "José García <jose@example.com>"
    );
    assert_eq!(encoded_word::decode(third.subject()).unwrap(), "Café con leña");
    assert!(third.message_body().unwrap().starts_with("Un caf=C3=A9"));
    assert!(third
        .readable_body()
        .unwrap()
        .starts_with("Un café por la mañana.\n"));
}

// ─── Test 5: >From in body is not a separator ──────────────────────

#[test]
fn test_from_escaping_in_body() {
    let mails = load("simple.mbox", SourceFormat::Mbox);
    let fourth = &mails[3];
    assert_eq!(fourth.subject(), "Quoting");
    assert!(fourth
        .contents()
        .contains("\nFrom the archives, this is not a separator.\nLine three\n"));
}

// ─── Test 6: Empty mailbox ─────────────────────────────────────────

#[test]
fn test_parse_empty_mbox() {
    assert!(load("empty.mbox", SourceFormat::Mbox).is_empty());
}

// ─── Test 7: Nested multipart EML ──────────────────────────────────

#[test]
fn test_nested_multipart_eml() {
    let mail = MimeEntity::parse(read_eml(fixture("multipart.eml")).unwrap());
    assert_eq!(mail.contents(), "preamble text\n");
    assert_eq!(mail.parts().len(), 2);
    assert!(!mail.walk().any(|p| p.contents().contains("epilogue")));

    let alternative = &mail.parts()[0];
    assert_eq!(alternative.content_type(), "multipart/alternative");
    assert_eq!(alternative.parts().len(), 2);
    assert_eq!(
        alternative.parts()[0].readable_body().unwrap(),
        "Café au lait\n"
    );
    assert_eq!(alternative.parts()[1].content_type(), "text/html");

    let attachment = &mail.parts()[1];
    assert_eq!(attachment.content_disposition(), "attachment");
    assert_eq!(attachment.filename().unwrap(), "日本.txt");
    assert_eq!(attachment.raw_contents().unwrap(), vec![0, 1, 2, 3]);

    let text = mail.text_part().unwrap();
    assert_eq!(text.charset(), "iso-8859-1");
}

#[test]
fn test_eml_date_is_normalized_to_utc() {
    let mail = MimeEntity::parse(read_eml(fixture("multipart.eml")).unwrap());
    assert_eq!(
        mail.date().map(|d| d.to_rfc3339()),
        Some("2024-01-05T00:30:00+00:00".to_string())
    );
}

#[test]
fn test_depth_option_applies_to_files() {
    let raw = read_eml(fixture("multipart.eml")).unwrap();
    let mail = MimeEntity::parse_with(raw, &DecodeOptions { max_depth: 1 });
    let alternative = &mail.parts()[0];
    assert!(alternative.parts().is_empty());
    assert!(alternative.contents().starts_with("--inner\n"));
}

// ─── Test 8: Dot-terminated Shift_JIS mailbox ──────────────────────

#[test]
fn test_dot_terminated_mailbox() {
    let mails = load("japanese.dot", SourceFormat::Dot);
    assert_eq!(mails.len(), 2);
    assert_eq!(mails[0].subject(), "first");
    assert_eq!(mails[0].message_body().unwrap(), "日本\n");
    assert_eq!(mails[1].charset(), "Shift_JIS");
    assert_eq!(mails[1].message_body().unwrap(), "日本\n");
}

// ─── Test 9: Structural properties ─────────────────────────────────

#[test]
fn test_decoding_is_idempotent() {
    let raw = read_eml(fixture("multipart.eml")).unwrap();
    assert_eq!(MimeEntity::parse(raw.clone()), MimeEntity::parse(raw));
}

#[test]
fn test_last_header_wins() {
    let raw = RawMessage::new(
        "t",
        "t/0",
        "Subject: one\nSubject: two\nsubject: three\n\nbody",
    );
    let mail = MimeEntity::parse(raw);
    assert_eq!(mail.subject(), "three");
    assert_eq!(mail.headers().first("Subject"), Some("one"));
    assert_eq!(mail.all_headers().len(), 3);
}

#[test]
fn test_message_without_blank_line_has_no_body() {
    let mail = MimeEntity::parse(RawMessage::new("t", "t/0", "Subject: a\nFrom: b"));
    assert_eq!(mail.from(), "b");
    assert_eq!(mail.full_body(), "");
}

// ─── Test 10: Date parsing ─────────────────────────────────────────

#[test]
fn test_date_parsing_formats() {
    assert!(parse_date("Mon, 01 Jan 2024 10:00:00 +0000").is_some());
    assert!(parse_date("01 Jan 2024 10:00:00 +0000").is_some());
    assert!(parse_date("2024-01-01T10:00:00+00:00").is_some());
    assert!(parse_date("not a date").is_none());
}
