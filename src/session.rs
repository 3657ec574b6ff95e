//! The editing session: one artifact, one guard, two operations.
//!
//! A [`Session`] is the explicit home for all mutable state: the current
//! image, the in-flight flag, and the live encoding parameters. Making it a
//! value means multiple independent sessions coexist and tests run headless
//! against mock ports.
//!
//! ## Single-flight discipline
//!
//! Both operations suspend — at the codec (offloaded to the blocking pool)
//! and, for background removal, across the network round trip. The
//! [`Session`] allows exactly one operation in flight: a second invocation
//! while the guard is held returns immediately, with no side effects and no
//! queueing. The guard is released by a drop guard, so every exit path —
//! success, remote error, decode failure — restores the idle state and the
//! busy indicator.
//!
//! ## Failure semantics
//!
//! Operations return `()`. Every failure is converted at the operation
//! boundary into one `Presenter::notify_error` call with a user-facing
//! message; the previous artifact stays current and the session is
//! immediately retryable.

use crate::artifact::Artifact;
use crate::config::{EncodingSettings, OutputFormat, SessionConfig, API_KEY_ENV};
use crate::error::CutoutError;
use crate::pipeline::remote::{BackgroundRemover, RemoveBgClient, GENERIC_FAILURE};
use crate::pipeline::{codec, intake};
use crate::present::{NoopPresenter, Presenter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Name given to the artifact produced by background removal.
pub const REMOVED_BG_NAME: &str = "removed-bg.png";

/// User-facing message when the matted bytes do not decode.
const LOAD_PROCESSED_FAILURE: &str = "Failed to load processed image";

/// User-facing message for any re-encode failure.
const PROCESS_FAILURE: &str = "Failed to process image";

/// An editing session owning the current artifact and the operation guard.
pub struct Session {
    artifact: Mutex<Option<Artifact>>,
    busy: AtomicBool,
    settings: Mutex<EncodingSettings>,
    remover: Option<Arc<dyn BackgroundRemover>>,
    presenter: Arc<dyn Presenter>,
}

impl Session {
    /// Create a session from a config.
    ///
    /// The background remover resolves most-specific first: a pre-built
    /// [`BackgroundRemover`] from the config, else an HTTP client built
    /// from the configured API key, else one from the `REMOVE_BG_API_KEY`
    /// environment variable. With none of the three, re-encoding still
    /// works and background removal surfaces the generic failure message.
    pub fn new(config: SessionConfig) -> Self {
        let SessionConfig {
            api_key,
            endpoint,
            settings,
            remover,
            presenter,
        } = config;

        let remover = remover.or_else(|| {
            let key = api_key.or_else(|| std::env::var(API_KEY_ENV).ok())?;
            let client = match endpoint {
                Some(endpoint) => RemoveBgClient::with_endpoint(key, endpoint),
                None => RemoveBgClient::new(key),
            };
            Some(Arc::new(client) as Arc<dyn BackgroundRemover>)
        });

        Self {
            artifact: Mutex::new(None),
            busy: AtomicBool::new(false),
            settings: Mutex::new(settings),
            remover,
            presenter: presenter.unwrap_or_else(|| Arc::new(NoopPresenter)),
        }
    }

    // ── State accessors ───────────────────────────────────────────────────

    /// A clone of the current artifact, if one is loaded.
    pub fn artifact(&self) -> Option<Artifact> {
        self.artifact.lock().expect("artifact lock poisoned").clone()
    }

    /// Whether an operation is currently in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// The live encoding parameters.
    pub fn settings(&self) -> EncodingSettings {
        *self.settings.lock().expect("settings lock poisoned")
    }

    fn replace_artifact(&self, artifact: Artifact) {
        *self.artifact.lock().expect("artifact lock poisoned") = Some(artifact);
    }

    // ── Upload intake ─────────────────────────────────────────────────────

    /// Install an upload as the current artifact, discarding any prior one.
    ///
    /// Silently a no-op when the upload's declared media type does not
    /// indicate an image — only the coarse `image/` prefix is checked.
    pub fn install_artifact(&self, upload: intake::RawUpload) {
        if !intake::is_image_media_type(&upload.media_type) {
            debug!(
                "dropping upload '{}': declared type '{}' is not an image",
                upload.name, upload.media_type
            );
            return;
        }
        debug!("installing '{}' ({} bytes)", upload.name, upload.bytes.len());
        self.replace_artifact(Artifact::new(upload.bytes, upload.media_type, upload.name));
    }

    // ── Pipeline operations ───────────────────────────────────────────────

    /// Strip the background of the current artifact via the remote service.
    ///
    /// No-op without an artifact, and no-op (dropped, not queued) while
    /// another operation is in flight. On success the artifact becomes the
    /// matted PNG named `removed-bg.png` and the presenter receives it; on
    /// any failure the presenter receives one message and the artifact is
    /// unchanged.
    pub async fn remove_background(&self) {
        let Some(source) = self.artifact() else {
            debug!("remove_background: no artifact loaded");
            return;
        };
        let Some(_guard) = OpGuard::acquire(self) else {
            debug!("remove_background: operation already in flight, dropping");
            return;
        };

        let Some(remover) = self.remover.as_ref() else {
            warn!("remove_background: no API credential configured");
            self.presenter.notify_error(GENERIC_FAILURE);
            return;
        };

        match remover.remove(&source.bytes).await {
            Err(e) => {
                warn!("background removal failed: {e}");
                self.presenter.notify_error(&removal_message(&e));
            }
            Ok(matted) => {
                // The HTTP call succeeding is not enough: the body must
                // decode as a displayable image before it may replace the
                // artifact.
                if let Err(e) = codec::decode(&matted) {
                    warn!("matted bytes do not decode: {e}");
                    self.presenter.notify_error(LOAD_PROCESSED_FAILURE);
                    return;
                }
                let artifact = Artifact::new(matted, "image/png", REMOVED_BG_NAME);
                self.replace_artifact(artifact.clone());
                self.presenter.notify_result(&artifact);
            }
        }
    }

    /// Re-encode the current artifact at the live quality/format settings.
    ///
    /// Same guard discipline as [`Session::remove_background`]. The
    /// parameters are read fresh at invocation time; the output keeps the
    /// source's pixel dimensions exactly and is named `processed.<format>`.
    pub async fn reencode(&self) {
        let Some(source) = self.artifact() else {
            debug!("reencode: no artifact loaded");
            return;
        };
        let Some(_guard) = OpGuard::acquire(self) else {
            debug!("reencode: operation already in flight, dropping");
            return;
        };

        let settings = self.settings();
        let quality = settings.quality_fraction();
        let format = settings.format;
        debug!("re-encoding to {format} at quality {quality:.2}");

        let bytes = source.bytes.clone();
        let encoded = tokio::task::spawn_blocking(move || {
            codec::reencode_bytes(&bytes, format, quality)
        })
        .await
        .unwrap_or_else(|e| {
            Err(CutoutError::Encode {
                format: format.extension().to_string(),
                detail: format!("encode task panicked: {e}"),
            })
        });

        match encoded {
            Err(e) => {
                warn!("re-encode failed: {e}");
                self.presenter.notify_error(PROCESS_FAILURE);
            }
            Ok(bytes) => {
                let artifact = Artifact::new(
                    bytes,
                    format.media_type(),
                    format!("processed.{}", format.extension()),
                );
                self.replace_artifact(artifact.clone());
                self.presenter.notify_result(&artifact);
            }
        }
    }

    // ── Live parameter updates ────────────────────────────────────────────

    /// Update the quality (0–100) and, when an artifact is loaded, re-encode
    /// with the new value. Rapid changes while an operation is in flight
    /// are dropped by the guard, not queued.
    pub async fn set_quality(&self, quality: u8) {
        {
            let mut settings = self.settings.lock().expect("settings lock poisoned");
            settings.quality = quality.min(100);
        }
        if self.artifact().is_some() {
            self.reencode().await;
        }
    }

    /// Update the target format and, when an artifact is loaded, re-encode
    /// with the new value. Same drop-not-queue behavior as
    /// [`Session::set_quality`].
    pub async fn set_format(&self, format: OutputFormat) {
        {
            let mut settings = self.settings.lock().expect("settings lock poisoned");
            settings.format = format;
        }
        if self.artifact().is_some() {
            self.reencode().await;
        }
    }
}

/// Map a removal-stage error to its user-facing message.
fn removal_message(e: &CutoutError) -> String {
    match e {
        CutoutError::RemoteService { message } => message.clone(),
        CutoutError::Decode { .. } => LOAD_PROCESSED_FAILURE.to_string(),
        _ => GENERIC_FAILURE.to_string(),
    }
}

/// Scoped hold on the session's operation guard.
///
/// Acquisition fails closed: the loser of the compare-exchange gets `None`
/// and the caller returns without side effects. Release happens in `Drop`,
/// which is what guarantees the busy flag and indicator are restored on
/// every path out of an operation, early returns included.
struct OpGuard<'a> {
    session: &'a Session,
}

impl<'a> OpGuard<'a> {
    fn acquire(session: &'a Session) -> Option<Self> {
        if session
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }
        session.presenter.set_busy(true);
        Some(Self { session })
    }
}

impl Drop for OpGuard<'_> {
    fn drop(&mut self) {
        self.session.presenter.set_busy(false);
        self.session.busy.store(false, Ordering::Release);
    }
}
