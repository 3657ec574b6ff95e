//! The image artifact currently under edit.
//!
//! A session holds at most one [`Artifact`] at a time. Pipeline operations
//! never mutate it in place: each successful operation (and each fresh
//! upload) produces a whole new value that replaces the previous one. No
//! history is kept — once superseded, the old artifact is gone.

use std::fmt;

/// The single current image: raw bytes plus the metadata needed to offer it
/// back to the user as a file.
#[derive(Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Opaque encoded image bytes. Never inspected except by the codec.
    pub bytes: Vec<u8>,
    /// Declared media type, e.g. `image/png`.
    pub media_type: String,
    /// Display name, used as the download file name.
    pub name: String,
}

impl Artifact {
    /// Build an artifact from raw bytes and its declared type and name.
    pub fn new(bytes: Vec<u8>, media_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            bytes,
            media_type: media_type.into(),
            name: name.into(),
        }
    }

    /// Byte length of the encoded image.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the artifact holds no bytes at all.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// Debug elides the byte buffer; a multi-megabyte hex dump in a trace line
// helps nobody.
impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("name", &self.name)
            .field("media_type", &self.media_type)
            .field("bytes", &format_args!("{} bytes", self.bytes.len()))
            .finish()
    }
}
