//! Upload intake: normalise a user-supplied file into a raw upload.
//!
//! Validation is deliberately coarse: only the *declared* media type is
//! checked for an `image/` prefix. No magic-byte sniffing, no size or
//! dimension limits — a mistyped file is caught later, when an operation
//! actually tries to decode it. Tightening this is a conscious decision
//! left to callers, not something the intake does behind their back.

use crate::error::CutoutError;
use std::path::Path;
use tracing::debug;

/// A user-supplied file before it becomes the current artifact.
#[derive(Debug, Clone)]
pub struct RawUpload {
    /// Display name, usually the source file name.
    pub name: String,
    /// Declared media type (from the picker, or derived from the file
    /// extension for filesystem inputs).
    pub media_type: String,
    /// Raw file content.
    pub bytes: Vec<u8>,
}

impl RawUpload {
    /// Read a file from disk, deriving the declared media type from its
    /// extension the way a browser file input would.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, CutoutError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            CutoutError::InputReadFailed {
                path: path.to_path_buf(),
                source: e,
            }
        })?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let media_type = media_type_for_path(path);
        debug!("read {} ({} bytes, {media_type})", path.display(), bytes.len());

        Ok(Self {
            name,
            media_type,
            bytes,
        })
    }
}

/// Whether a declared media type indicates an image.
pub fn is_image_media_type(media_type: &str) -> bool {
    media_type.starts_with("image/")
}

/// Declared media type for a filesystem path, by extension.
///
/// Unknown extensions map to `application/octet-stream`, which the intake
/// check then rejects — the same outcome a browser gives a file it cannot
/// type.
pub fn media_type_for_path(path: &Path) -> String {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("tif") | Some("tiff") => "image/tiff",
        _ => "application/octet-stream",
    }
    .to_string()
}
