//! Structured header field bodies: `token *(";" attribute "=" value)`.
//!
//! [`parse`] splits a field body such as a `Content-Type` value into ordered
//! key/value pairs, where the leading token (and any bare word without `=`)
//! gets the empty key. [`combine`] then folds RFC 2231 continuations
//! (`name*0`, `name*1*`, …) back into single parameters.

use percent_encoding::percent_decode_str;

use crate::codec::{decode_or_latin1, latin1_bytes, latin1_view, EncodingRsCodec, TextCodec};

/// One parameter. The key is `""` for positional tokens.
pub type ParameterPair = (String, String);

/// Tokenize a field body.
///
/// ```
/// use mimetree::parser::field_body::parse;
///
/// let pairs = parse("text/plain; charset=\"utf-8\"");
/// assert_eq!(pairs[0], ("".to_string(), "text/plain".to_string()));
/// assert_eq!(pairs[1], ("charset".to_string(), "utf-8".to_string()));
/// ```
///
/// The grammar is lenient. Quoted values end at the next `"` with no escape
/// handling, a trailing `;` yields a final `("", "")`, and a key followed by
/// `=` and nothing else yields no pair at all.
pub fn parse(s: &str) -> Vec<ParameterPair> {
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len();
    let mut pairs = Vec::new();
    let mut x = 0;

    while x < len {
        while x < len && chars[x].is_whitespace() {
            x += 1;
        }

        let mut key = String::new();
        let mut is_pair = false;
        while x < len {
            let c = chars[x];
            x += 1;
            match c {
                ';' => break,
                '=' => {
                    is_pair = true;
                    break;
                }
                _ => key.push(c),
            }
        }
        if !is_pair {
            pairs.push((String::new(), key));
            continue;
        }

        while x < len && chars[x].is_whitespace() {
            x += 1;
        }
        if x >= len {
            break;
        }

        let mut value = String::new();
        if chars[x] == '"' {
            x += 1;
            while x < len {
                let c = chars[x];
                x += 1;
                if c == '"' {
                    break;
                }
                value.push(c);
            }
        } else {
            while x < len {
                let c = chars[x];
                x += 1;
                if c == ';' {
                    break;
                }
                value.push(c);
            }
        }
        pairs.push((key, value));
    }

    pairs
}

/// Merge RFC 2231 parameter continuations using the default codec.
pub fn combine(pairs: Vec<ParameterPair>) -> Vec<ParameterPair> {
    combine_with(&EncodingRsCodec, pairs)
}

/// A key split into its RFC 2231 parts.
struct Segment {
    name: String,
    index: u32,
    extended: bool,
}

/// Recognize `name*N`, `name*N*` and `name*`.
fn split_segment_key(key: &str) -> Option<Segment> {
    let (rest, extended) = match key.strip_suffix('*') {
        Some(rest) => (rest, true),
        None => (key, false),
    };

    if let Some(star) = rest.rfind('*') {
        let digits = &rest[star + 1..];
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            let name = &rest[..star];
            if name.is_empty() {
                return None;
            }
            let index = digits.parse().ok()?;
            return Some(Segment {
                name: name.to_string(),
                index,
                extended,
            });
        }
    }

    // `name*=charset'lang'value` is a single extended segment
    if extended && !rest.is_empty() && !rest.contains('*') {
        return Some(Segment {
            name: rest.to_string(),
            index: 0,
            extended: true,
        });
    }

    None
}

/// Collected segments of one logical parameter.
struct Continuation {
    name: String,
    segments: Vec<(u32, bool, String)>,
}

enum Slot {
    Plain(ParameterPair),
    Joined(usize),
}

/// Merge RFC 2231 parameter continuations.
///
/// Segments of the same parameter are concatenated in ascending segment
/// number no matter in which order they appear. Extended segments (`*N*`)
/// are percent-decoded, and the lowest one may start with a
/// `charset'language'` prefix that selects how the joined octets become
/// text. The merged pair takes the position of the first segment seen;
/// every other pair passes through untouched.
pub fn combine_with(codec: &dyn TextCodec, pairs: Vec<ParameterPair>) -> Vec<ParameterPair> {
    let mut slots: Vec<Slot> = Vec::with_capacity(pairs.len());
    let mut joined: Vec<Continuation> = Vec::new();

    for (key, value) in pairs {
        let Some(segment) = split_segment_key(&key) else {
            slots.push(Slot::Plain((key, value)));
            continue;
        };
        match joined
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(&segment.name))
        {
            Some(pos) => joined[pos]
                .segments
                .push((segment.index, segment.extended, value)),
            None => {
                slots.push(Slot::Joined(joined.len()));
                joined.push(Continuation {
                    name: segment.name,
                    segments: vec![(segment.index, segment.extended, value)],
                });
            }
        }
    }

    slots
        .into_iter()
        .map(|slot| match slot {
            Slot::Plain(pair) => pair,
            Slot::Joined(idx) => {
                let continuation = &mut joined[idx];
                let value = join_segments(codec, &mut continuation.segments);
                (continuation.name.clone(), value)
            }
        })
        .collect()
}

fn join_segments(codec: &dyn TextCodec, segments: &mut [(u32, bool, String)]) -> String {
    segments.sort_by_key(|(index, _, _)| *index);

    let mut octets: Vec<u8> = Vec::new();
    let mut charset: Option<String> = None;

    for (pos, (_, extended, value)) in segments.iter().enumerate() {
        if !*extended {
            octets.extend_from_slice(&latin1_bytes(value));
            continue;
        }
        let mut encoded = value.as_str();
        if pos == 0 {
            if let Some((declared, rest)) = split_charset_prefix(encoded) {
                if !declared.is_empty() {
                    charset = Some(declared.to_string());
                }
                encoded = rest;
            }
        }
        octets.extend(percent_decode_str(encoded));
    }

    match charset {
        Some(charset) => decode_or_latin1(codec, &octets, &charset),
        None => latin1_view(&octets),
    }
}

/// Split `charset'language'rest` into `(charset, rest)`.
fn split_charset_prefix(value: &str) -> Option<(&str, &str)> {
    let (charset, after) = value.split_once('\'')?;
    let (_language, rest) = after.split_once('\'')?;
    Some((charset, rest))
}
