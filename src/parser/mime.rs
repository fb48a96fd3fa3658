//! MIME entity tree: header accessors and multipart splitting.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::codec::{EncodingRsCodec, TextCodec};
use crate::error::Result;
use crate::model::raw::RawMessage;
use crate::parser::content;
use crate::parser::encoded_word;
use crate::parser::field_body::{self, ParameterPair};
use crate::parser::header::{self, HeaderBlock};

/// Default maximum multipart nesting depth.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Knobs for entity construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Parts nested this deep are kept as opaque leaves instead of being
    /// split further. The top-level message is depth 0.
    pub max_depth: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// One decoded message or message part.
///
/// Built once from a [`RawMessage`] and never mutated afterwards. Every
/// derived value (content type, charset, filename, …) is recomputed from the
/// headers on each call, and each of them fails or defaults independently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MimeEntity {
    raw: RawMessage,
    headers: HeaderBlock,
    full_body: String,
    contents: String,
    parts: Vec<MimeEntity>,
    depth: usize,
}

impl MimeEntity {
    /// Decode a message with default options.
    pub fn parse(raw: RawMessage) -> Self {
        Self::parse_with(raw, &DecodeOptions::default())
    }

    /// Decode a message.
    ///
    /// Never fails: a missing blank line, a missing boundary, or a
    /// multipart body that never terminates degrades to the most
    /// conservative reading. The tree is built breadth-first from a work
    /// queue, so input nesting never translates into stack depth.
    pub fn parse_with(raw: RawMessage, options: &DecodeOptions) -> Self {
        let mut nodes: Vec<(Self, Vec<usize>)> = Vec::new();
        let mut queue: VecDeque<(RawMessage, usize, Option<usize>)> = VecDeque::new();
        queue.push_back((raw, 0, None));

        while let Some((raw, depth, parent)) = queue.pop_front() {
            let (entity, segments) = Self::split_one(raw, depth, options);
            let id = nodes.len();
            if let Some(parent) = parent {
                nodes[parent].1.push(id);
            }
            for segment in segments {
                queue.push_back((entity.raw.child(segment), depth + 1, Some(id)));
            }
            nodes.push((entity, Vec::new()));
        }

        // Children always have larger ids than their parent
        let mut built: Vec<Option<Self>> = vec![None; nodes.len()];
        while let Some((mut entity, children)) = nodes.pop() {
            entity.parts = children
                .into_iter()
                .filter_map(|child| built[child].take())
                .collect();
            built[nodes.len()] = Some(entity);
        }

        let root = built.into_iter().next().flatten().unwrap_or_default();
        debug!(
            uuid = %root.raw.uuid,
            content_type = %root.content_type(),
            parts = root.parts.len(),
            "Decoded MIME entity"
        );
        root
    }

    /// Headers and body of one entity, plus the raw text of its children.
    fn split_one(raw: RawMessage, depth: usize, options: &DecodeOptions) -> (Self, Vec<String>) {
        let (headers, full_body) = HeaderBlock::parse(&raw.raw_text);
        let mut entity = Self {
            raw,
            headers,
            full_body,
            contents: String::new(),
            parts: Vec::new(),
            depth,
        };

        let boundary = entity.boundary();
        if !entity.is_multipart() || boundary.is_empty() {
            entity.contents = entity.full_body.clone();
            return (entity, Vec::new());
        }
        if depth >= options.max_depth {
            warn!(
                uuid = %entity.raw.uuid,
                depth,
                "Multipart nesting too deep, keeping part opaque"
            );
            entity.contents = entity.full_body.clone();
            return (entity, Vec::new());
        }

        let (preamble, segments) = split_multipart(&entity.full_body, &boundary);
        entity.contents = preamble;
        (entity, segments)
    }

    /// The raw block this entity was decoded from.
    pub fn raw(&self) -> &RawMessage {
        &self.raw
    }

    /// Header section.
    pub fn headers(&self) -> &HeaderBlock {
        &self.headers
    }

    /// All headers in order, duplicates included.
    pub fn all_headers(&self) -> &[(String, String)] {
        self.headers.all()
    }

    /// Last value of the header `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.last(name)
    }

    /// Everything after the header/body separator, child parts included.
    pub fn full_body(&self) -> &str {
        &self.full_body
    }

    /// This entity's own payload. For a multipart entity, the preamble.
    pub fn contents(&self) -> &str {
        &self.contents
    }

    /// Child parts in order. Empty for leaves.
    pub fn parts(&self) -> &[MimeEntity] {
        &self.parts
    }

    /// Nesting depth; the top-level message is 0.
    pub fn depth(&self) -> usize {
        self.depth
    }

    fn field(&self, name: &str) -> Vec<ParameterPair> {
        field_body::parse(self.header(name).unwrap_or(""))
    }

    fn positional(&self, name: &str) -> String {
        self.field(name)
            .into_iter()
            .find(|(k, _)| k.is_empty())
            .map(|(_, v)| v)
            .unwrap_or_default()
    }

    fn parameter(&self, name: &str, key: &str) -> String {
        self.field(name)
            .into_iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
            .unwrap_or_default()
    }

    /// MIME type from `Content-Type`, e.g. `text/plain`, or `""`.
    pub fn content_type(&self) -> String {
        self.positional("Content-Type")
    }

    /// Top-level type: the part of [`Self::content_type`] before `/`.
    pub fn perceived_type(&self) -> String {
        let content_type = self.content_type();
        content_type
            .split('/')
            .next()
            .unwrap_or_default()
            .to_string()
    }

    /// `true` when the declared top-level type is `multipart`.
    pub fn is_multipart(&self) -> bool {
        self.perceived_type().eq_ignore_ascii_case("multipart")
    }

    /// Disposition type, e.g. `attachment`, or `""`.
    pub fn content_disposition(&self) -> String {
        self.positional("Content-Disposition")
    }

    /// `boundary` parameter of `Content-Type`, or `""`.
    pub fn boundary(&self) -> String {
        self.parameter("Content-Type", "boundary")
    }

    /// `charset` parameter of `Content-Type`, or `""`.
    pub fn charset(&self) -> String {
        self.parameter("Content-Type", "charset")
    }

    /// `Content-Transfer-Encoding`, or `""`.
    pub fn content_transfer_encoding(&self) -> String {
        self.positional("Content-Transfer-Encoding")
    }

    /// File name of the part, or `""`.
    ///
    /// The `filename` parameter of `Content-Disposition` wins over the
    /// `name` parameter of `Content-Type`. RFC 2231 continuations are
    /// joined and RFC 2047 encoded-words decoded.
    pub fn filename(&self) -> Result<String> {
        self.filename_with(&EncodingRsCodec)
    }

    /// [`Self::filename`] with an explicit codec.
    pub fn filename_with(&self, codec: &dyn TextCodec) -> Result<String> {
        let lookup = |name: &str, key: &str| {
            field_body::combine_with(codec, self.field(name))
                .into_iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v)
        };
        match lookup("Content-Disposition", "filename").or_else(|| lookup("Content-Type", "name")) {
            Some(value) => encoded_word::decode_with(codec, &value),
            None => Ok(String::new()),
        }
    }

    /// Raw `From` header, or `""`.
    pub fn from(&self) -> &str {
        self.header("From").unwrap_or_default()
    }

    /// Raw `To` header, or `""`.
    pub fn to(&self) -> &str {
        self.header("To").unwrap_or_default()
    }

    /// Raw `Cc` header, or `""`.
    pub fn cc(&self) -> &str {
        self.header("Cc").unwrap_or_default()
    }

    /// Raw `Subject` header, or `""`.
    pub fn subject(&self) -> &str {
        self.header("Subject").unwrap_or_default()
    }

    /// Raw `Message-ID` header, or `""`.
    pub fn message_id(&self) -> &str {
        self.header("Message-ID").unwrap_or_default()
    }

    /// `Date` header, when present and parseable.
    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.header("Date").and_then(header::parse_date)
    }

    /// Payload bytes after undoing the transfer encoding.
    pub fn raw_contents(&self) -> Result<Vec<u8>> {
        content::body_bytes(&self.contents, &self.content_transfer_encoding())
    }

    /// Payload rendered as text in the declared charset.
    pub fn message_body(&self) -> Result<String> {
        self.message_body_with(&EncodingRsCodec)
    }

    /// [`Self::message_body`] with an explicit codec.
    pub fn message_body_with(&self, codec: &dyn TextCodec) -> Result<String> {
        content::render_text(codec, &self.raw_contents()?, &self.charset())
    }

    /// Like [`Self::message_body`], but with quoted-printable undone too.
    pub fn readable_body(&self) -> Result<String> {
        self.readable_body_with(&EncodingRsCodec)
    }

    /// [`Self::readable_body`] with an explicit codec.
    pub fn readable_body_with(&self, codec: &dyn TextCodec) -> Result<String> {
        let bytes = content::readable_bytes(&self.contents, &self.content_transfer_encoding())?;
        content::render_text(codec, &bytes, &self.charset())
    }

    /// A leaf that is meant to be saved rather than displayed.
    pub fn is_attachment(&self) -> bool {
        if !self.parts.is_empty() {
            return false;
        }
        self.content_disposition().eq_ignore_ascii_case("attachment")
            || self.filename().is_ok_and(|name| !name.is_empty())
    }

    /// The part to show as the message text: the first `text/plain` leaf,
    /// else the first `text/*` leaf, else this entity when it is a leaf.
    pub fn text_part(&self) -> Option<&MimeEntity> {
        let leaves = || {
            self.walk()
                .filter(|e| e.parts.is_empty() && !e.is_attachment())
        };
        leaves()
            .find(|e| e.content_type().eq_ignore_ascii_case("text/plain"))
            .or_else(|| leaves().find(|e| e.perceived_type().eq_ignore_ascii_case("text")))
            .or_else(|| self.parts.is_empty().then_some(self))
    }

    /// Pre-order iterator over this entity and all its descendants.
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }
}

impl fmt::Display for MimeEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.content_type())
    }
}

/// Iterator returned by [`MimeEntity::walk`].
pub struct Walk<'a> {
    stack: Vec<&'a MimeEntity>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a MimeEntity;

    fn next(&mut self) -> Option<Self::Item> {
        let entity = self.stack.pop()?;
        self.stack.extend(entity.parts.iter().rev());
        Some(entity)
    }
}

/// Split a multipart body at `--boundary` lines.
///
/// Returns the preamble (text before the first delimiter) and the raw text
/// of every following segment. A `--boundary--` line ends the scan and the
/// epilogue after it is dropped; without one, whatever is buffered at the
/// end of input becomes the last segment. Each kept line is re-terminated
/// with `\n`.
pub fn split_multipart(body: &str, boundary: &str) -> (String, Vec<String>) {
    let delimiter = format!("--{boundary}");
    let terminator = format!("--{boundary}--");

    let mut segments = Vec::new();
    let mut buf = String::new();
    for row in body.split('\n') {
        if row == terminator {
            break;
        }
        if row == delimiter {
            segments.push(std::mem::take(&mut buf));
            continue;
        }
        buf.push_str(row);
        buf.push('\n');
    }
    segments.push(buf);

    let mut segments = segments.into_iter();
    let preamble = segments.next().unwrap_or_default();
    (preamble, segments.collect())
}
