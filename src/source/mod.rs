//! Message sources: split container files into [`RawMessage`] blocks.

pub mod dot;
pub mod eml;
pub mod mbox;

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::SourceConfig;
use crate::error::Result;
use crate::model::raw::RawMessage;

/// Container format of a message file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// UNIX mbox: messages start at `From ` lines.
    Mbox,
    /// Messages separated by a line holding a single `.`.
    Dot,
    /// One bare RFC 822 message.
    Eml,
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mbox => write!(f, "mbox"),
            Self::Dot => write!(f, "dot"),
            Self::Eml => write!(f, "eml"),
        }
    }
}

/// Guess the format from the file extension.
pub fn detect(path: &Path) -> SourceFormat {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("eml") => SourceFormat::Eml,
        _ => SourceFormat::Mbox,
    }
}

/// Read every message of `path`.
pub fn open_messages(
    path: &Path,
    format: SourceFormat,
    config: &SourceConfig,
) -> Result<Vec<RawMessage>> {
    let messages = match format {
        SourceFormat::Mbox => mbox::UnixMboxReader::open(path)?
            .with_max_message_size(config.max_message_size)
            .collect::<Result<Vec<_>>>()?,
        SourceFormat::Dot => dot::DotTerminatedReader::open(path, &config.dot_source_charset)?
            .collect::<Result<Vec<_>>>()?,
        SourceFormat::Eml => vec![eml::read_eml(path)?],
    };
    tracing::debug!(
        path = %path.display(),
        %format,
        count = messages.len(),
        "Read messages"
    );
    Ok(messages)
}

/// Open `path` for buffered reading, mapping a missing file to
/// [`crate::error::Error::FileNotFound`].
pub(crate) fn open_file(path: &Path) -> Result<std::fs::File> {
    std::fs::File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            crate::error::Error::FileNotFound(path.to_path_buf())
        } else {
            crate::error::Error::io(path, e)
        }
    })
}

/// Strip one trailing `\n` and then one `\r`.
pub(crate) fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
