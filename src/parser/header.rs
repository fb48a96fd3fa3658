//! RFC 822 header section: tokenizing, folding, and date parsing.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use tracing::warn;

/// The header section of one entity.
///
/// Headers are kept once, in order and with duplicates. The "last value
/// wins" lookup is derived from that list on demand, so the two views can
/// never disagree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HeaderBlock {
    headers: Vec<(String, String)>,
}

impl HeaderBlock {
    /// Split raw message text into headers and the body remainder.
    ///
    /// `\r\n` is normalized to `\n` first. The first empty line separates
    /// the sections and belongs to neither. Without an empty line the whole
    /// text is headers and the body is empty.
    ///
    /// Continuation lines (starting with whitespace) are appended to the
    /// current value as `"\n" + line`. Lines without a `:` are dropped.
    pub fn parse(text: &str) -> (Self, String) {
        let normalized = text.replace("\r\n", "\n");
        let rows: Vec<&str> = normalized.split('\n').collect();

        let mut headers: Vec<(String, String)> = Vec::new();
        let mut current: Option<(String, String)> = None;
        let mut body_start = rows.len();

        for (idx, row) in rows.iter().enumerate() {
            if row.is_empty() {
                body_start = idx + 1;
                break;
            }
            if row.starts_with(char::is_whitespace) {
                if let Some((_, value)) = current.as_mut() {
                    value.push('\n');
                    value.push_str(row);
                }
                continue;
            }
            if let Some(done) = current.take() {
                headers.push(done);
            }
            // Lines without a colon are silently skipped
            if let Some((name, value)) = row.split_once(':') {
                current = Some((name.trim_end().to_string(), value.trim_start().to_string()));
            }
        }
        if let Some(done) = current {
            headers.push(done);
        }

        let body = if body_start < rows.len() {
            rows[body_start..].join("\n")
        } else {
            String::new()
        };

        (Self { headers }, body)
    }

    /// All headers in order, duplicates included.
    pub fn all(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Iterate over `(name, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// The value of the last header named `name` (case-insensitive).
    pub fn last(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The value of the first header named `name` (case-insensitive).
    pub fn first(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value of headers named `name`, in order.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Number of header lines (after unfolding).
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// `true` when the entity has no headers at all.
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

/// Parse an email date string in various common formats.
///
/// Supports RFC 2822, ISO 8601, and many broken real-world variants.
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    // Folded Date headers carry the embedded newline of the continuation
    let unfolded = date_str.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = unfolded.as_str();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    let no_dow = strip_day_of_week(trimmed);
    let no_dow_normalized = normalize_imap_date(&no_dow);

    let formats = [
        "%d %b %Y %H:%M:%S %z",
        "%d %b %Y %H:%M:%S",
        "%d %b %Y %H:%M %z",
        "%b %d %H:%M:%S %Y",
        "%Y-%m-%dT%H:%M:%S%z",
        "%Y-%m-%dT%H:%M:%SZ",
        "%Y-%m-%d %H:%M:%S %z",
        "%Y-%m-%d %H:%M:%S",
        "%Y/%m/%d %H:%M:%S",
        "%d/%m/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
    ];

    for candidate in [&no_dow, &no_dow_normalized] {
        for fmt in &formats {
            if let Ok(dt) = DateTime::parse_from_str(candidate, fmt) {
                return Some(dt.with_timezone(&Utc));
            }
            if let Ok(ndt) = NaiveDateTime::parse_from_str(candidate, fmt) {
                return Some(Utc.from_utc_datetime(&ndt));
            }
        }
    }

    for candidate in [&no_dow, &no_dow_normalized] {
        let replaced = replace_named_tz(strip_zone_comment(candidate));
        for fmt in &formats {
            if let Ok(dt) = DateTime::parse_from_str(&replaced, fmt) {
                return Some(dt.with_timezone(&Utc));
            }
        }
    }

    if let Some(dt) = mail_parser_date(trimmed) {
        return Some(dt);
    }

    warn!(date = trimmed, "Could not parse date");
    None
}

/// Last resort: let `mail-parser` read a one-header message.
fn mail_parser_date(input: &str) -> Option<DateTime<Utc>> {
    use mail_parser::MessageParser;

    let fake_msg = format!("Date: {input}\n\n");
    let parsed = MessageParser::default().parse(fake_msg.as_bytes())?;
    let dt = parsed.date()?.to_rfc3339();
    DateTime::parse_from_rfc3339(&dt)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// `"16-JUL-2025 03:01:03"` → `"16 Jul 2025 03:01:03"`.
fn normalize_imap_date(s: &str) -> String {
    if !s.contains('-') {
        return s.to_string();
    }

    let title_months = [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];

    for month in &title_months {
        for spelled in [month.to_uppercase(), month.to_lowercase(), month.to_string()] {
            let pattern = format!("-{spelled}-");
            if s.contains(&pattern) {
                return s.replacen(&pattern, &format!(" {month} "), 1);
            }
        }
    }

    s.to_string()
}

/// Strip leading day-of-week prefix (e.g. "Thu, " or "Thu ").
fn strip_day_of_week(s: &str) -> String {
    let days = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
    for day in &days {
        if let Some(rest) = s.strip_prefix(day) {
            if rest.starts_with(',') || rest.starts_with(' ') {
                return rest.trim_start_matches(',').trim().to_string();
            }
        }
    }
    s.to_string()
}

/// Drop a trailing zone comment such as `" (JST)"`.
fn strip_zone_comment(s: &str) -> &str {
    match s.rfind(" (") {
        Some(pos) if s.ends_with(')') => s[..pos].trim_end(),
        _ => s,
    }
}

/// Replace well-known timezone abbreviations with numeric offsets.
fn replace_named_tz(s: &str) -> String {
    let tzs = [
        ("EST", "-0500"),
        ("EDT", "-0400"),
        ("CST", "-0600"),
        ("CDT", "-0500"),
        ("MST", "-0700"),
        ("MDT", "-0600"),
        ("PST", "-0800"),
        ("PDT", "-0700"),
        ("GMT", "+0000"),
        ("UTC", "+0000"),
        ("UT", "+0000"),
        ("CEST", "+0200"),
        ("CET", "+0100"),
        ("JST", "+0900"),
    ];
    let mut result = s.to_string();
    for (name, offset) in &tzs {
        if result.ends_with(&format!(" {name}")) {
            let pos = result.len() - name.len();
            result.replace_range(pos.., offset);
            return result;
        }
    }
    result
}
