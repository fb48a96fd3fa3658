//! RFC 2047 encoded-words (`=?charset?B|Q?payload?=`) in header text.

use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::{alphabet, Engine};

use crate::codec::{decode_or_latin1, EncodingRsCodec, TextCodec};
use crate::error::{Error, Result};

/// Standard alphabet, padding optional: senders routinely drop it.
pub(crate) const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Decode every encoded-word in `input` using the default codec.
///
/// Example: `"=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="` → `"Hola mundo"`
pub fn decode(input: &str) -> Result<String> {
    decode_with(&EncodingRsCodec, input)
}

/// Decode every encoded-word in `input`.
///
/// Text around encoded-words is copied verbatim, except that a run made only
/// of linear whitespace lying between two encoded-words is dropped
/// (RFC 2047 §6.2). A charset the codec does not know falls back to the
/// Latin-1 view. A malformed base64 or Q payload fails the whole call.
pub fn decode_with(codec: &dyn TextCodec, input: &str) -> Result<String> {
    let mut result = String::with_capacity(input.len());
    let mut remaining = input;
    let mut last_was_encoded = false;
    // Literal text seen since the last encoded-word; emitted lazily so a
    // whitespace-only gap can be dropped once the next word turns up.
    let mut pending = String::new();

    while let Some(start) = remaining.find("=?") {
        pending.push_str(&remaining[..start]);
        let after_start = &remaining[start + 2..];

        match parse_word(after_start) {
            Some(word) => {
                let gap_is_fold = last_was_encoded && is_linear_whitespace(&pending);
                if !gap_is_fold {
                    result.push_str(&pending);
                }
                pending.clear();
                result.push_str(&word.decode(codec)?);
                remaining = &after_start[word.consumed..];
                last_was_encoded = true;
            }
            None => {
                pending.push_str("=?");
                remaining = after_start;
            }
        }
    }

    result.push_str(&pending);
    result.push_str(remaining);
    Ok(result)
}

fn is_linear_whitespace(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| matches!(c, ' ' | '\t' | '\r' | '\n'))
}

struct EncodedWord<'a> {
    charset: &'a str,
    encoding: char,
    payload: &'a str,
    /// Bytes consumed from the text *after* the initial "=?".
    consumed: usize,
}

impl EncodedWord<'_> {
    fn decode(&self, codec: &dyn TextCodec) -> Result<String> {
        let bytes = match self.encoding {
            'B' | 'b' => decode_b(self.payload)?,
            _ => decode_q(self.payload)?,
        };
        Ok(decode_or_latin1(codec, &bytes, self.charset))
    }
}

/// Recognize `charset?E?payload?=` right after a `=?`.
fn parse_word(s: &str) -> Option<EncodedWord<'_>> {
    let first_q = s.find('?')?;
    let charset = &s[..first_q];
    if charset.is_empty() || charset.contains(char::is_whitespace) {
        return None;
    }

    let rest = &s[first_q + 1..];
    let mut enc_chars = rest.chars();
    let encoding = enc_chars.next()?;
    if !matches!(encoding, 'B' | 'b' | 'Q' | 'q') || enc_chars.next()? != '?' {
        return None;
    }

    let rest2 = &rest[2..];
    let end = rest2.find('?')?;
    if end == 0 || !rest2[end..].starts_with("?=") {
        return None;
    }
    let payload = &rest2[..end];

    // RFC 2231 §5 allows `charset*language`; the language is not needed
    let charset = charset.split('*').next().unwrap_or(charset);

    Some(EncodedWord {
        charset,
        encoding,
        payload,
        consumed: first_q + 1 + 2 + end + 2,
    })
}

fn decode_b(payload: &str) -> Result<Vec<u8>> {
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(LENIENT_BASE64.decode(compact)?)
}

/// Q encoding: `_` is a space, `=XX` is a hex byte, everything else is literal.
fn decode_q(payload: &str) -> Result<Vec<u8>> {
    let bytes = payload.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                result.push(b' ');
                i += 1;
            }
            b'=' => {
                let hex = bytes.get(i + 1..i + 3).and_then(|pair| {
                    let hi = (pair[0] as char).to_digit(16)?;
                    let lo = (pair[1] as char).to_digit(16)?;
                    Some((hi * 16 + lo) as u8)
                });
                match hex {
                    Some(byte) => {
                        result.push(byte);
                        i += 3;
                    }
                    None => {
                        return Err(Error::InvalidEncodedWord(format!(
                            "bad escape in Q payload '{payload}'"
                        )))
                    }
                }
            }
            b => {
                result.push(b);
                i += 1;
            }
        }
    }
    Ok(result)
}
