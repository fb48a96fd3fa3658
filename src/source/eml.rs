//! Single `.eml` files (one RFC 822 message without mbox framing).

use std::io::Read;
use std::path::Path;

use crate::error::{Error, Result};
use crate::model::raw::RawMessage;
use crate::source::open_file;

/// Load a single message file.
///
/// The file bytes are taken as-is; the path becomes the source id and
/// the message is number 0 within it.
pub fn read_eml(path: impl AsRef<Path>) -> Result<RawMessage> {
    let path = path.as_ref();
    let mut data = Vec::new();
    open_file(path)?
        .read_to_end(&mut data)
        .map_err(|e| Error::io(path, e))?;
    let source_id = path.display().to_string();
    let uuid = format!("{source_id}/0");
    Ok(RawMessage::from_bytes(source_id, uuid, &data))
}
