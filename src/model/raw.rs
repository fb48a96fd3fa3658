//! Raw message blocks as produced by the message sources.

use serde::Serialize;

use crate::codec::latin1_view;

/// One undecoded message (or message part).
///
/// `raw_text` is a Latin-1 view of the original bytes: every `char` is in
/// `U+0000..=U+00FF` and stands for exactly one byte, so slicing and line
/// splitting never cut a multi-byte sequence and the bytes can be recovered
/// with [`crate::codec::latin1_bytes`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawMessage {
    /// Where the message came from (usually a file path).
    pub source_id: String,
    /// Identifier of the top-level message inside its source.
    pub uuid: String,
    /// Latin-1 view of the message bytes.
    pub raw_text: String,
}

impl RawMessage {
    /// Build from text that is already a Latin-1 view.
    pub fn new(
        source_id: impl Into<String>,
        uuid: impl Into<String>,
        raw_text: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            uuid: uuid.into(),
            raw_text: raw_text.into(),
        }
    }

    /// Build from raw bytes.
    pub fn from_bytes(source_id: impl Into<String>, uuid: impl Into<String>, bytes: &[u8]) -> Self {
        Self::new(source_id, uuid, latin1_view(bytes))
    }

    /// A part carved out of this message. It keeps the source identity.
    pub fn child(&self, raw_text: String) -> Self {
        Self {
            source_id: self.source_id.clone(),
            uuid: self.uuid.clone(),
            raw_text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_inherits_identity() {
        let parent = RawMessage::new("box.mbox", "box.mbox/3", "Subject: x\n\nbody\n");
        let child = parent.child("Content-Type: text/plain\n\nhi\n".to_string());
        assert_eq!(child.source_id, "box.mbox");
        assert_eq!(child.uuid, "box.mbox/3");
        assert_eq!(child.raw_text, "Content-Type: text/plain\n\nhi\n");
    }

    #[test]
    fn test_from_bytes_is_latin1_view() {
        let raw = RawMessage::from_bytes("a", "a/0", &[b'S', 0xe9]);
        assert_eq!(raw.raw_text, "S\u{e9}");
    }
}
