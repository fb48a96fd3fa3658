//! Character set conversion.
//!
//! The MIME layer only ever holds a Latin-1 view of the message (one `char`
//! per byte). Turning bytes into real text for a named charset goes through
//! [`TextCodec`], which [`EncodingRsCodec`] implements on top of `encoding_rs`.

use std::borrow::Cow;

use encoding_rs::Encoding;

use crate::error::{Error, Result};

/// Conversion between bytes and text for a named character set.
pub trait TextCodec {
    /// Decode `bytes` that are encoded in `charset`.
    fn decode(&self, bytes: &[u8], charset: &str) -> Result<String>;

    /// Encode `text` into `charset`.
    fn encode(&self, text: &str, charset: &str) -> Result<Vec<u8>>;
}

/// [`TextCodec`] backed by the WHATWG encoding labels of `encoding_rs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncodingRsCodec;

impl EncodingRsCodec {
    fn lookup(charset: &str) -> Result<&'static Encoding> {
        Encoding::for_label_no_replacement(charset.trim().as_bytes())
            .ok_or_else(|| Error::UnsupportedCharset(charset.to_string()))
    }
}

impl TextCodec for EncodingRsCodec {
    fn decode(&self, bytes: &[u8], charset: &str) -> Result<String> {
        let encoding = Self::lookup(charset)?;
        let (text, _) = encoding.decode_without_bom_handling(bytes);
        Ok(text.into_owned())
    }

    fn encode(&self, text: &str, charset: &str) -> Result<Vec<u8>> {
        let encoding = Self::lookup(charset)?;
        let (bytes, _, _) = encoding.encode(text);
        Ok(bytes.into_owned())
    }
}

/// Decode with `charset`, falling back to the Latin-1 view when the codec
/// does not know the name.
pub fn decode_or_latin1(codec: &dyn TextCodec, bytes: &[u8], charset: &str) -> String {
    match codec.decode(bytes, charset) {
        Ok(text) => text,
        Err(_) => {
            tracing::warn!(charset, "Unknown charset, falling back to Latin-1");
            latin1_view(bytes)
        }
    }
}

/// Map every byte to the `char` with the same value.
pub fn latin1_view(bytes: &[u8]) -> String {
    encoding_rs::mem::decode_latin1(bytes).into_owned()
}

/// Inverse of [`latin1_view`]. Chars above U+00FF cannot come from a byte
/// and are replaced by `?`.
pub fn latin1_bytes(text: &str) -> Cow<'_, [u8]> {
    encoding_rs::mem::encode_latin1_lossy(text)
}
