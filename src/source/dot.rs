//! Mailboxes where each message ends with a line holding a single `.`.
//!
//! Such files store every message in one local charset regardless of what
//! the message headers declare, so each block is re-encoded into the
//! declared charset before the MIME layer sees it.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::warn;

use crate::codec::{latin1_view, EncodingRsCodec, TextCodec};
use crate::error::{Error, Result};
use crate::model::raw::RawMessage;
use crate::parser::field_body;
use crate::parser::header::HeaderBlock;
use crate::source::{open_file, strip_line_ending};

/// Charset assumed for the stored bytes when none is configured.
pub const DEFAULT_SOURCE_CHARSET: &str = "Shift_JIS";

/// Iterator over the messages of a dot-terminated mailbox.
pub struct DotTerminatedReader<R> {
    reader: R,
    source_id: String,
    source_charset: String,
    codec: EncodingRsCodec,
    line: Vec<u8>,
    message: Vec<u8>,
    index: usize,
    done: bool,
}

impl DotTerminatedReader<BufReader<File>> {
    /// Open a mailbox whose bytes are stored in `source_charset`.
    pub fn open(path: impl AsRef<Path>, source_charset: &str) -> Result<Self> {
        let path = path.as_ref();
        let file = open_file(path)?;
        Ok(Self::new(BufReader::new(file), path.display().to_string())
            .with_source_charset(source_charset))
    }
}

impl<R: BufRead> DotTerminatedReader<R> {
    /// Read messages from any buffered reader.
    pub fn new(reader: R, source_id: impl Into<String>) -> Self {
        Self {
            reader,
            source_id: source_id.into(),
            source_charset: DEFAULT_SOURCE_CHARSET.to_string(),
            codec: EncodingRsCodec,
            line: Vec::with_capacity(4096),
            message: Vec::new(),
            index: 0,
            done: false,
        }
    }

    /// Charset the stored bytes are written in (default Shift_JIS).
    ///
    /// A message declaring a Unicode or Japanese charset is re-encoded into
    /// it; any other message keeps the stored bytes.
    pub fn with_source_charset(mut self, charset: &str) -> Self {
        self.source_charset = charset.to_string();
        self
    }

    fn take_message(&mut self) -> RawMessage {
        let bytes = self.reencode(&self.message);
        let uuid = format!("{}/{}", self.source_id, self.index);
        self.index += 1;
        self.message.clear();
        RawMessage::from_bytes(self.source_id.clone(), uuid, &bytes)
    }

    /// Convert stored bytes into the charset the message itself declares.
    fn reencode(&self, bytes: &[u8]) -> Vec<u8> {
        let (headers, _) = HeaderBlock::parse(&latin1_view(bytes));
        let declared = field_body::parse(headers.last("Content-Type").unwrap_or(""))
            .into_iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("charset"))
            .map(|(_, v)| v)
            .unwrap_or_default();
        let target = target_charset(&declared, &self.source_charset);

        let converted = self
            .codec
            .decode(bytes, &self.source_charset)
            .and_then(|text| self.codec.encode(&text, target));
        match converted {
            Ok(out) => out,
            Err(e) => {
                warn!(
                    source = %self.source_id,
                    index = self.index,
                    error = %e,
                    "Charset conversion failed, keeping stored bytes"
                );
                bytes.to_vec()
            }
        }
    }
}

impl<R: BufRead> Iterator for DotTerminatedReader<R> {
    type Item = Result<RawMessage>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            self.line.clear();
            match self.reader.read_until(b'\n', &mut self.line) {
                Ok(0) => {
                    self.done = true;
                    return (!self.message.is_empty()).then(|| Ok(self.take_message()));
                }
                Ok(_) => {}
                Err(e) => {
                    self.done = true;
                    return Some(Err(Error::io(self.source_id.clone(), e)));
                }
            }
            let row = strip_line_ending(&self.line);
            if row == b"." {
                return Some(Ok(self.take_message()));
            }
            self.message.extend_from_slice(row);
            self.message.push(b'\n');
        }
    }
}

/// Charset to re-encode a message into, given the one it declares.
fn target_charset<'a>(declared: &str, source_charset: &'a str) -> &'a str {
    let is = |names: &[&str]| names.iter().any(|n| n.eq_ignore_ascii_case(declared));
    if is(&["utf-8", "utf_8", "utf8"]) {
        "UTF-8"
    } else if is(&["euc-jp", "euc_jp", "eucjp"]) {
        "EUC-JP"
    } else if is(&["iso-2022-jp"]) {
        "ISO-2022-JP"
    } else {
        source_charset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::mime::MimeEntity;

    fn read_all(input: &[u8]) -> Vec<RawMessage> {
        DotTerminatedReader::new(input, "test.eml")
            .collect::<Result<_>>()
            .unwrap()
    }

    #[test]
    fn test_splitter() {
        let input = b"From: test@example.com\r\n.\r\nFrom: test@example.net\r\n.\r\nFrom: test@example.org\r\n";
        let texts: Vec<String> = read_all(input).into_iter().map(|m| m.raw_text).collect();
        assert_eq!(
            texts,
            vec![
                "From: test@example.com\n",
                "From: test@example.net\n",
                "From: test@example.org\n",
            ]
        );
    }

    #[test]
    fn test_uuid() {
        let messages = read_all(b"a\n.\nb\n");
        assert_eq!(messages[0].uuid, "test.eml/0");
        assert_eq!(messages[1].uuid, "test.eml/1");
    }

    #[test]
    fn test_trailing_dot_leaves_no_empty_message() {
        assert_eq!(read_all(b"a\n.\n").len(), 1);
    }

    #[test]
    fn test_reencode_to_declared_utf8() {
        let mut input = b"Content-Type: text/plain; charset=utf-8\r\n\r\n".to_vec();
        input.extend_from_slice(&[0x93, 0xfa, 0x96, 0x7b]); // 日本 in Shift_JIS
        input.extend_from_slice(b"\r\n.\r\n");
        let messages = read_all(&input);
        let mail = MimeEntity::parse(messages[0].clone());
        assert_eq!(mail.message_body().unwrap(), "日本\n");
    }

    #[test]
    fn test_reencode_to_declared_euc_jp() {
        let mut input = b"Content-Type: text/plain; charset=EUC-JP\n\n".to_vec();
        input.extend_from_slice(&[0x93, 0xfa, 0x96, 0x7b]);
        let messages = read_all(&input);
        let mail = MimeEntity::parse(messages[0].clone());
        assert_eq!(mail.raw_contents().unwrap(), vec![0xc6, 0xfc, 0xcb, 0xdc, b'\n']);
        assert_eq!(mail.message_body().unwrap(), "日本\n");
    }

    #[test]
    fn test_custom_source_charset() {
        let input = b"Content-Type: text/plain; charset=utf-8\n\ncaf\xe9\n";
        let messages: Vec<RawMessage> = DotTerminatedReader::new(&input[..], "latin.dot")
            .with_source_charset("windows-1252")
            .collect::<Result<_>>()
            .unwrap();
        let mail = MimeEntity::parse(messages[0].clone());
        assert_eq!(mail.raw_contents().unwrap(), "café\n".as_bytes());
    }

    #[test]
    fn test_undeclared_keeps_source_bytes() {
        let mut input = b"Subject: x\n\n".to_vec();
        input.extend_from_slice(&[0x93, 0xfa, 0x96, 0x7b]);
        let messages = read_all(&input);
        let mail = MimeEntity::parse(messages[0].clone());
        assert_eq!(mail.raw_contents().unwrap(), vec![0x93, 0xfa, 0x96, 0x7b, b'\n']);
    }

    #[test]
    fn test_target_charset() {
        assert_eq!(target_charset("UTF8", "Shift_JIS"), "UTF-8");
        assert_eq!(target_charset("euc_jp", "Shift_JIS"), "EUC-JP");
        assert_eq!(target_charset("ISO-2022-JP", "Shift_JIS"), "ISO-2022-JP");
        assert_eq!(target_charset("", "Shift_JIS"), "Shift_JIS");
        assert_eq!(target_charset("us-ascii", "windows-1252"), "windows-1252");
    }
}
