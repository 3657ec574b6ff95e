//! Configuration types for a cutout session.
//!
//! Everything a [`crate::session::Session`] needs at construction time lives
//! in [`SessionConfig`], built via its [`SessionConfigBuilder`]. Keeping the
//! knobs in one struct makes it trivial to share a config between the CLI
//! and tests, and to diff two runs to understand why their outputs differ.
//!
//! Note the split between construction-time and operation-time state: the
//! API credential and endpoint are fixed when the session is created, while
//! quality and output format are *live* — operations read them fresh on
//! every invocation, so changing them between (or during) runs affects the
//! next operation only.

use crate::error::CutoutError;
use crate::pipeline::remote::BackgroundRemover;
use crate::present::Presenter;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Environment variable consulted for the API credential when none is set
/// explicitly.
pub const API_KEY_ENV: &str = "REMOVE_BG_API_KEY";

/// Target format for the re-encode operation.
///
/// The set is fixed to the formats the canvas-style re-encoder can produce.
/// The serialized form is the lowercase tag (`png`, `jpeg`, `webp`), which
/// doubles as the file extension of the emitted `processed.<format>` name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Lossless PNG (default). The quality fraction is accepted but unused.
    #[default]
    Png,
    /// Lossy JPEG; the only format where the quality fraction takes effect.
    Jpeg,
    /// Lossless WebP. The quality fraction is accepted but unused.
    WebP,
}

impl OutputFormat {
    /// The lowercase tag, used as both file extension and media-type suffix.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::WebP => "webp",
        }
    }

    /// The `image/<tag>` media type of this format.
    pub fn media_type(self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::WebP => "image/webp",
        }
    }

    /// Parse a user-supplied tag. Accepts `jpg` as an alias for `jpeg`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "png" => Some(OutputFormat::Png),
            "jpeg" | "jpg" => Some(OutputFormat::Jpeg),
            "webp" => Some(OutputFormat::WebP),
            _ => None,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// The live encoding parameters, read fresh by every re-encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingSettings {
    /// Quality on the 0–100 scale the UI exposes; divided by 100 before the
    /// codec sees it.
    pub quality: u8,
    /// Target format for the next re-encode.
    pub format: OutputFormat,
}

impl Default for EncodingSettings {
    fn default() -> Self {
        Self {
            quality: 80,
            format: OutputFormat::default(),
        }
    }
}

impl EncodingSettings {
    /// Quality as the fraction in `[0, 1]` the codec consumes.
    pub fn quality_fraction(self) -> f32 {
        f32::from(self.quality.min(100)) / 100.0
    }
}

/// Configuration for a [`crate::session::Session`].
///
/// Built via [`SessionConfig::builder()`] or [`SessionConfig::default()`].
///
/// # Example
/// ```rust
/// use cutout::{OutputFormat, SessionConfig};
///
/// let config = SessionConfig::builder()
///     .quality(85)
///     .format(OutputFormat::Jpeg)
///     .api_key("xkeysample")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone, Default)]
pub struct SessionConfig {
    /// Static API credential for the background-removal service. Falls back
    /// to the `REMOVE_BG_API_KEY` environment variable when unset.
    pub api_key: Option<String>,

    /// Override for the background-removal endpoint. If `None`, uses
    /// [`crate::pipeline::remote::DEFAULT_ENDPOINT`].
    pub endpoint: Option<String>,

    /// Initial encoding parameters. Live state after construction — see
    /// [`crate::session::Session::set_quality`] and
    /// [`crate::session::Session::set_format`].
    pub settings: EncodingSettings,

    /// Pre-constructed background remover. Takes precedence over
    /// `api_key`/`endpoint`. Useful in tests or when the caller needs
    /// custom middleware around the HTTP call.
    pub remover: Option<Arc<dyn BackgroundRemover>>,

    /// Presentation port receiving results, errors, and busy transitions.
    /// Defaults to a no-op when unset.
    pub presenter: Option<Arc<dyn Presenter>>,
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("endpoint", &self.endpoint)
            .field("settings", &self.settings)
            .field("remover", &self.remover.as_ref().map(|_| "<dyn BackgroundRemover>"))
            .field("presenter", &self.presenter.as_ref().map(|_| "<dyn Presenter>"))
            .finish()
    }
}

impl SessionConfig {
    /// Create a new builder for `SessionConfig`.
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`SessionConfig`].
#[derive(Debug)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = Some(endpoint.into());
        self
    }

    pub fn quality(mut self, quality: u8) -> Self {
        self.config.settings.quality = quality.min(100);
        self
    }

    pub fn format(mut self, format: OutputFormat) -> Self {
        self.config.settings.format = format;
        self
    }

    pub fn remover(mut self, remover: Arc<dyn BackgroundRemover>) -> Self {
        self.config.remover = Some(remover);
        self
    }

    pub fn presenter(mut self, presenter: Arc<dyn Presenter>) -> Self {
        self.config.presenter = Some(presenter);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<SessionConfig, CutoutError> {
        let c = &self.config;
        if c.settings.quality > 100 {
            return Err(CutoutError::InvalidConfig(format!(
                "quality must be 0–100, got {}",
                c.settings.quality
            )));
        }
        if let Some(ref endpoint) = c.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(CutoutError::InvalidConfig(format!(
                    "endpoint must be an HTTP(S) URL, got '{endpoint}'"
                )));
            }
        }
        Ok(self.config)
    }
}
