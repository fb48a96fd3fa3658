//! Extract attachments from decoded messages.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::parser::encoded_word;
use crate::parser::mime::MimeEntity;

/// Write one attachment part to `output_dir` and return the file path.
pub fn export_attachment(part: &MimeEntity, output_dir: &Path) -> Result<PathBuf> {
    let filename = part.filename()?;
    let data = part.raw_contents()?;
    let path = unique_path(&output_dir.join(sanitize_filename_part(&filename, 150)));
    std::fs::write(&path, &data).map_err(|e| Error::io(&path, e))?;
    tracing::debug!(path = %path.display(), bytes = data.len(), "Exported attachment");
    Ok(path)
}

/// Extract every named leaf part of one message.
///
/// A part that fails to decode or write is logged and skipped.
pub fn export_attachments(entity: &MimeEntity, output_dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir).map_err(|e| Error::io(output_dir, e))?;
    let mut paths = Vec::new();

    for part in entity.walk().filter(|p| p.is_attachment()) {
        match export_attachment(part, output_dir) {
            Ok(path) => paths.push(path),
            Err(e) => {
                tracing::warn!(
                    uuid = %part.raw().uuid,
                    content_type = %part.content_type(),
                    error = %e,
                    "Failed to export attachment"
                );
            }
        }
    }

    Ok(paths)
}

/// Extract all attachments from multiple messages.
///
/// Creates a subfolder per message: `{output_dir}/{index}_{date}_{subject}/`
pub fn export_bulk_attachments(
    entities: &[MimeEntity],
    output_dir: &Path,
    progress: &dyn Fn(usize, usize),
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir).map_err(|e| Error::io(output_dir, e))?;
    let mut all_paths = Vec::new();
    let total = entities.len();

    for (i, entity) in entities.iter().enumerate() {
        progress(i, total);
        if !entity.walk().any(|p| p.is_attachment()) {
            continue;
        }
        let subfolder = output_dir.join(message_folder_name(i, entity));
        all_paths.extend(export_attachments(entity, &subfolder)?);
    }
    progress(total, total);

    Ok(all_paths)
}

/// Generate a folder name for a message's attachments.
fn message_folder_name(index: usize, entity: &MimeEntity) -> String {
    let date = entity
        .date()
        .map(|d| d.format("%Y%m%d_%H%M%S").to_string())
        .unwrap_or_else(|| "nodate".to_string());
    let subject = encoded_word::decode(entity.subject())
        .unwrap_or_else(|_| entity.subject().to_string());
    format!("{index:04}_{date}_{}", sanitize_filename_part(&subject, 60))
}

/// Replace anything outside `[alnum - . _ @]` with `_` and cap the length.
///
/// Leading dots are dropped so the result never names a parent directory
/// or a hidden file.
pub fn sanitize_filename_part(s: &str, max_len: usize) -> String {
    let sanitized: String = s
        .trim_start_matches('.')
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '.' || c == '_' || c == '@' {
                c
            } else {
                '_'
            }
        })
        .take(max_len)
        .collect();

    if sanitized.is_empty() {
        "unknown".to_string()
    } else {
        sanitized
    }
}

/// If `path` already exists, append a counter to make it unique.
pub fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let parent = path.parent().unwrap_or(Path::new("."));

    for i in 1..1000 {
        let candidate = if ext.is_empty() {
            parent.join(format!("{stem}_{i}"))
        } else {
            parent.join(format!("{stem}_{i}.{ext}"))
        };
        if !candidate.exists() {
            return candidate;
        }
    }

    // Fallback, very unlikely
    parent.join(format!("{stem}_dup.{ext}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::raw::RawMessage;

    const MESSAGE: &str = "Subject: =?UTF-8?Q?Fotos_del_viaje?=\n\
Date: Mon, 12 Feb 2024 10:00:00 +0000\n\
Content-Type: multipart/mixed; boundary=SEP\n\
\n\
--SEP\n\
Content-Type: text/plain\n\
\n\
see attached\n\
--SEP\n\
Content-Type: application/octet-stream; name=\"a.bin\"\n\
Content-Transfer-Encoding: base64\n\
\n\
AAEC\n\
--SEP\n\
Content-Type: text/plain\n\
Content-Disposition: attachment; filename=\"a.bin\"\n\
\n\
second\n\
--SEP--\n";

    fn message() -> MimeEntity {
        MimeEntity::parse(RawMessage::new("box", "box/0", MESSAGE))
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename_part("hello world", 20), "hello_world");
        assert_eq!(sanitize_filename_part("user@example.com", 30), "user@example.com");
        assert_eq!(sanitize_filename_part("a/b\\c:d*e", 20), "a_b_c_d_e");
        assert_eq!(sanitize_filename_part("..", 20), "unknown");
        assert_eq!(sanitize_filename_part("../etc/passwd", 20), "_etc_passwd");
        assert_eq!(sanitize_filename_part("", 20), "unknown");
    }

    #[test]
    fn test_export_attachments_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let paths = export_attachments(&message(), dir.path()).unwrap();

        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0], dir.path().join("a.bin"));
        assert_eq!(paths[1], dir.path().join("a_1.bin"));
        assert_eq!(std::fs::read(&paths[0]).unwrap(), vec![0, 1, 2]);
        assert_eq!(std::fs::read(&paths[1]).unwrap(), b"second\n");
    }

    #[test]
    fn test_broken_part_is_skipped() {
        let text = "Content-Type: multipart/mixed; boundary=B\n\n--B\n\
Content-Type: image/png; name=bad.png\nContent-Transfer-Encoding: base64\n\n@@@@\n\
--B\n\
Content-Type: image/png; name=good.png\n\nxyz\n--B--\n";
        let entity = MimeEntity::parse(RawMessage::new("t", "t/0", text));
        let dir = tempfile::tempdir().unwrap();
        let paths = export_attachments(&entity, dir.path()).unwrap();
        assert_eq!(paths, vec![dir.path().join("good.png")]);
    }

    #[test]
    fn test_bulk_export_uses_subfolders() {
        let dir = tempfile::tempdir().unwrap();
        let plain = MimeEntity::parse(RawMessage::new("box", "box/1", "Subject: none\n\nhi\n"));
        let calls = std::cell::Cell::new(0);
        let paths = export_bulk_attachments(&[message(), plain], dir.path(), &|_, _| {
            calls.set(calls.get() + 1)
        })
        .unwrap();

        assert_eq!(paths.len(), 2);
        let folder = dir.path().join("0000_20240212_100000_Fotos_del_viaje");
        assert!(folder.join("a.bin").exists());
        assert_eq!(calls.get(), 3);
    }
}
