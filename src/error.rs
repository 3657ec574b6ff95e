//! Error types for the cutout library.
//!
//! Every failure an operation can hit is caught at the operation boundary
//! inside [`crate::session::Session`] and converted into a single
//! user-facing message through the presentation port — no error escapes
//! `remove_background` or `reencode`. The variants below are what the
//! internal stages return before that conversion happens, so tests and
//! adapters can still match on the precise failure kind.
//!
//! One variant is special: [`CutoutError::InvalidUpload`] never reaches the
//! user at all. A non-image upload is silently dropped at the intake
//! boundary, drop-zone style: the file is simply ignored.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the cutout library.
#[derive(Debug, Error)]
pub enum CutoutError {
    // ── Intake errors ─────────────────────────────────────────────────────
    /// The upload's declared media type does not indicate an image.
    ///
    /// Dropped silently at the intake boundary; no user-visible message.
    #[error("upload '{name}' rejected: declared media type '{media_type}' is not an image")]
    InvalidUpload { name: String, media_type: String },

    // ── Remote service errors ─────────────────────────────────────────────
    /// The background-removal service returned a non-success status or the
    /// transport failed. `message` is already user-presentable: either the
    /// first error title from the structured error body, or the generic
    /// fallback.
    #[error("background removal failed: {message}")]
    RemoteService { message: String },

    // ── Codec errors ──────────────────────────────────────────────────────
    /// Bytes did not parse as a displayable image.
    #[error("image decode failed: {detail}")]
    Decode { detail: String },

    /// The raster could not be encoded at the requested format/quality.
    #[error("image encode to {format} failed: {detail}")]
    Encode { format: String, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// An input file could not be read from disk.
    #[error("Failed to read input file '{path}': {source}")]
    InputReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The download adapter could not write the result file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
