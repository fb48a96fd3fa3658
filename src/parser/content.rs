//! Body payload decoding: transfer encodings and charset rendering.

use base64::Engine;

use crate::codec::{latin1_bytes, TextCodec};
use crate::error::Result;
use crate::parser::encoded_word::LENIENT_BASE64;

/// Charset assumed when a text part declares none.
///
/// `encoding_rs` resolves this label to windows-1252, so stray bytes in
/// `0x80..=0xFF` come out as CP1252 characters instead of errors.
pub const DEFAULT_CHARSET: &str = "us-ascii";

/// Turn an entity's `contents` into the bytes it stands for.
///
/// Only `base64` (exact, lowercase) is decoded, ignoring line breaks.
/// Every other value, including none, means the Latin-1 view already is
/// the payload.
pub fn body_bytes(contents: &str, transfer_encoding: &str) -> Result<Vec<u8>> {
    if transfer_encoding == "base64" {
        let compact: Vec<u8> = latin1_bytes(contents)
            .iter()
            .copied()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();
        return Ok(LENIENT_BASE64.decode(compact)?);
    }
    Ok(latin1_bytes(contents).into_owned())
}

/// Like [`body_bytes`], but also undoes `quoted-printable` (any case).
///
/// Meant for showing a body to a reader; the quoted-printable pass never
/// fails.
pub fn readable_bytes(contents: &str, transfer_encoding: &str) -> Result<Vec<u8>> {
    if transfer_encoding.eq_ignore_ascii_case("quoted-printable") {
        return Ok(decode_quoted_printable(&latin1_bytes(contents)));
    }
    body_bytes(contents, transfer_encoding)
}

/// Map a declared charset to the one handed to the codec.
///
/// Empty means [`DEFAULT_CHARSET`]; `cp932` is a common mislabel of
/// Windows Shift_JIS that the WHATWG label table does not carry.
pub fn effective_charset(declared: &str) -> &str {
    if declared.is_empty() {
        DEFAULT_CHARSET
    } else if declared == "cp932" {
        "Shift_JIS"
    } else {
        declared
    }
}

/// Render payload bytes as text in the declared charset.
pub fn render_text(codec: &dyn TextCodec, bytes: &[u8], declared_charset: &str) -> Result<String> {
    codec.decode(bytes, effective_charset(declared_charset))
}

/// Decode quoted-printable body data (RFC 2045 §6.7).
///
/// Soft line breaks (`=` before a newline) are removed and `=XX` becomes a
/// byte. An `=` that starts neither is copied through as-is.
pub fn decode_quoted_printable(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        if data[i] != b'=' {
            result.push(data[i]);
            i += 1;
            continue;
        }
        match data.get(i + 1) {
            Some(b'\n') => i += 2,
            Some(b'\r') if data.get(i + 2) == Some(&b'\n') => i += 3,
            // `=` at the very end is a soft break without newline
            None => i += 1,
            Some(_) => {
                let byte = data.get(i + 1..i + 3).and_then(|pair| {
                    let hi = (pair[0] as char).to_digit(16)?;
                    let lo = (pair[1] as char).to_digit(16)?;
                    Some((hi * 16 + lo) as u8)
                });
                match byte {
                    Some(byte) => {
                        result.push(byte);
                        i += 3;
                    }
                    None => {
                        result.push(b'=');
                        i += 1;
                    }
                }
            }
        }
    }
    result
}
