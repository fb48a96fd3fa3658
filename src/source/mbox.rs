//! Streaming UNIX mbox reader.
//!
//! Reads line by line through a large buffer and yields one
//! [`RawMessage`] per `From ` separator. Never loads the whole file.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::warn;

use crate::error::{Error, Result};
use crate::model::raw::RawMessage;
use crate::source::{open_file, strip_line_ending};

/// Size of the internal read buffer (1 MB for fast sequential reads on modern SSDs).
const READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Default maximum message size in bytes (256 MB).
const MAX_MESSAGE_SIZE: usize = 256 * 1024 * 1024;

/// Iterator over the messages of a UNIX mbox.
///
/// - A line starting with `From ` opens a new message; the line itself is
///   not part of it.
/// - Text before the first separator is dropped, unless no separator shows
///   up at all, in which case the whole input is one message.
/// - `>From`, `>>From`, … lose exactly one `>`.
/// - Lines are re-terminated with `\n`; a trailing `\r` is removed.
pub struct UnixMboxReader<R> {
    reader: R,
    source_id: String,
    line: Vec<u8>,
    message: Vec<u8>,
    /// A separator has been seen.
    started: bool,
    /// The current buffer holds at least one line.
    any: bool,
    truncated: bool,
    index: usize,
    max_message_size: usize,
    done: bool,
}

impl UnixMboxReader<BufReader<File>> {
    /// Open an mbox file. The path becomes the source id.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = open_file(path)?;
        Ok(Self::new(
            BufReader::with_capacity(READ_BUFFER_SIZE, file),
            path.display().to_string(),
        ))
    }
}

impl<R: BufRead> UnixMboxReader<R> {
    /// Read messages from any buffered reader.
    pub fn new(reader: R, source_id: impl Into<String>) -> Self {
        Self {
            reader,
            source_id: source_id.into(),
            line: Vec::with_capacity(4096),
            message: Vec::with_capacity(64 * 1024),
            started: false,
            any: false,
            truncated: false,
            index: 0,
            max_message_size: MAX_MESSAGE_SIZE,
            done: false,
        }
    }

    /// Cap on the bytes kept per message; the rest of an oversized
    /// message is dropped with a warning.
    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    fn take_message(&mut self) -> RawMessage {
        let uuid = format!("{}/{}", self.source_id, self.index);
        let raw = RawMessage::from_bytes(self.source_id.clone(), uuid, &self.message);
        self.index += 1;
        self.message.clear();
        self.any = false;
        self.truncated = false;
        raw
    }

    fn push_row(&mut self, row: &[u8]) {
        self.any = true;
        if self.message.len() + row.len() + 1 > self.max_message_size {
            if !self.truncated {
                warn!(
                    source = %self.source_id,
                    index = self.index,
                    max_size = self.max_message_size,
                    "Message exceeds maximum size, truncating body"
                );
                self.truncated = true;
            }
            return;
        }
        self.message.extend_from_slice(row);
        self.message.push(b'\n');
    }

    /// Feed one line (without its ending); returns a finished message when
    /// the line is a separator.
    fn feed(&mut self, row: &[u8]) -> Option<RawMessage> {
        if is_mbox_separator(row) {
            let finished = (self.any && self.started).then(|| self.take_message());
            self.message.clear();
            self.any = false;
            self.truncated = false;
            self.started = true;
            return finished;
        }
        self.push_row(unescape_from(row));
        None
    }
}

impl<R: BufRead> Iterator for UnixMboxReader<R> {
    type Item = Result<RawMessage>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let mut line = std::mem::take(&mut self.line);
            line.clear();
            match self.reader.read_until(b'\n', &mut line) {
                Ok(0) => {
                    self.done = true;
                    return self.any.then(|| Ok(self.take_message()));
                }
                Ok(_) => {}
                Err(e) => {
                    self.done = true;
                    return Some(Err(Error::io(self.source_id.clone(), e)));
                }
            }
            let finished = self.feed(strip_line_ending(&line));
            self.line = line;
            if let Some(raw) = finished {
                return Some(Ok(raw));
            }
        }
    }
}

/// Check whether a line is an mbox separator (`From ` at the start).
fn is_mbox_separator(line: &[u8]) -> bool {
    // Skip BOM if present at very start
    let line = line.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(line);
    line.starts_with(b"From ")
}

/// `>+From…` loses one leading `>`.
fn unescape_from(row: &[u8]) -> &[u8] {
    match row.strip_prefix(b">") {
        Some(rest) => {
            let unquoted = rest.iter().position(|&b| b != b'>').map_or(&[][..], |i| &rest[i..]);
            if unquoted.starts_with(b"From") {
                rest
            } else {
                row
            }
        }
        None => row,
    }
}
