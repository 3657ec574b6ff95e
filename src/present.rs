//! Presentation port: how the pipeline talks back to whatever hosts it.
//!
//! The pipeline core never touches a terminal, a filesystem, or a UI — it
//! reports through an [`Arc<dyn Presenter>`] injected via
//! [`crate::config::SessionConfigBuilder::presenter`]. Adapters decide what
//! "offering the result to the user" means: the bundled [`DownloadDir`]
//! writes the artifact under its fixed name, the CLI binary layers terminal
//! feedback on top, and tests record calls in memory.
//!
//! All methods have default no-op implementations so adapters only override
//! what they care about, and implementations must be `Send + Sync` — a
//! session can be shared across tasks.

use crate::artifact::Artifact;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Receives the observable outcomes of pipeline operations.
pub trait Presenter: Send + Sync {
    /// A pipeline operation succeeded and `artifact` is the new current
    /// image. Adapters are expected to offer it to the user as a file named
    /// `artifact.name`.
    fn notify_result(&self, artifact: &Artifact) {
        let _ = artifact;
    }

    /// A pipeline operation failed; `message` is the single user-facing
    /// description. The previous artifact is still current.
    fn notify_error(&self, message: &str) {
        let _ = message;
    }

    /// The operation guard was acquired (`true`) or released (`false`).
    /// Fired on every path, including failures.
    fn set_busy(&self, busy: bool) {
        let _ = busy;
    }
}

/// A no-op implementation for callers that don't need presentation events.
///
/// This is the default when no presenter is configured.
pub struct NoopPresenter;

impl Presenter for NoopPresenter {}

/// Convenience alias matching the type stored in [`crate::config::SessionConfig`].
pub type SharedPresenter = Arc<dyn Presenter>;

/// The download side effect as a directory sink: every successful result is
/// written to `<dir>/<artifact.name>`, mirroring a browser download into a
/// downloads folder. Repeated results with the same name overwrite, exactly
/// like re-running the operation would re-download the same file name.
pub struct DownloadDir {
    dir: PathBuf,
}

impl DownloadDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The path a given artifact would be written to.
    pub fn path_for(&self, artifact: &Artifact) -> PathBuf {
        self.dir.join(&artifact.name)
    }
}

impl Presenter for DownloadDir {
    fn notify_result(&self, artifact: &Artifact) {
        let path = self.path_for(artifact);
        match std::fs::write(&path, &artifact.bytes) {
            Ok(()) => debug!("wrote {} ({} bytes)", path.display(), artifact.len()),
            // The port has no error channel of its own; a failed write is a
            // host-side problem, logged and swallowed like a blocked
            // browser download.
            Err(e) => warn!("failed to write {}: {e}", path.display()),
        }
    }
}
