//! # cutout
//!
//! Remove image backgrounds and re-encode images at a chosen
//! format/quality, from a CLI or as a library.
//!
//! ## Pipeline Overview
//!
//! ```text
//! image file
//!  │
//!  ├─ 1. Intake      coarse media-type check, install as current artifact
//!  ├─ 2. Remove BG   multipart POST to the matting service (optional)
//!  ├─ 3. Re-encode   decode → draw onto fresh canvas → encode at quality
//!  └─ 4. Download    each result offered as removed-bg.png / processed.<fmt>
//! ```
//!
//! The session is single-flight: one operation at a time, overlapping
//! invocations dropped (never queued), failures surfaced as one user-facing
//! message with the previous artifact left intact.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cutout::{DownloadDir, OutputFormat, RawUpload, Session, SessionConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // API key auto-detected from REMOVE_BG_API_KEY
//!     let config = SessionConfig::builder()
//!         .quality(80)
//!         .format(OutputFormat::Jpeg)
//!         .presenter(Arc::new(DownloadDir::new(".")))
//!         .build()?;
//!
//!     let session = Session::new(config);
//!     session.install_artifact(RawUpload::from_file("photo.png").await?);
//!     session.remove_background().await; // writes ./removed-bg.png
//!     session.reencode().await;          // writes ./processed.jpeg
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `cutout` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only
//! deps:
//! ```toml
//! cutout = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod artifact;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod present;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use artifact::Artifact;
pub use config::{EncodingSettings, OutputFormat, SessionConfig, SessionConfigBuilder, API_KEY_ENV};
pub use error::CutoutError;
pub use pipeline::intake::RawUpload;
pub use pipeline::remote::{BackgroundRemover, RemoveBgClient, DEFAULT_ENDPOINT};
pub use present::{DownloadDir, NoopPresenter, Presenter, SharedPresenter};
pub use session::Session;
