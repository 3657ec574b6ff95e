//! CLI binary for cutout.
//!
//! A thin shim over the library crate that maps CLI flags to a
//! `SessionConfig`, runs the requested operations, and reports results.

use anyhow::{Context, Result};
use clap::Parser;
use cutout::{
    Artifact, DownloadDir, OutputFormat, Presenter, RawUpload, Session, SessionConfig,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── Terminal presenter ───────────────────────────────────────────────────────

/// Presenter for the terminal: saves each result into the output directory,
/// spins while an operation is in flight, and prints one ✓/✗ line per
/// operation outcome.
struct CliPresenter {
    sink: DownloadDir,
    spinner: Mutex<Option<ProgressBar>>,
    show_progress: bool,
    quiet: bool,
    results: AtomicUsize,
    errors: AtomicUsize,
}

impl CliPresenter {
    fn new(output_dir: PathBuf, show_progress: bool, quiet: bool) -> Arc<Self> {
        Arc::new(Self {
            sink: DownloadDir::new(output_dir),
            spinner: Mutex::new(None),
            show_progress,
            quiet,
            results: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
        })
    }

    fn clear_spinner(&self) {
        if let Some(bar) = self.spinner.lock().unwrap().take() {
            bar.finish_and_clear();
        }
    }
}

impl Presenter for CliPresenter {
    fn set_busy(&self, busy: bool) {
        if !self.show_progress {
            return;
        }
        if busy {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template("{spinner:.cyan} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner())
                    .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
            );
            bar.set_message("Processing…");
            bar.enable_steady_tick(Duration::from_millis(80));
            *self.spinner.lock().unwrap() = Some(bar);
        } else {
            self.clear_spinner();
        }
    }

    fn notify_result(&self, artifact: &Artifact) {
        self.clear_spinner();
        self.sink.notify_result(artifact);
        self.results.fetch_add(1, Ordering::SeqCst);
        if !self.quiet {
            eprintln!(
                "{} {}  {}",
                green("✓"),
                bold(&artifact.name),
                dim(&format!("{} bytes, {}", artifact.len(), artifact.media_type)),
            );
        }
    }

    fn notify_error(&self, message: &str) {
        self.clear_spinner();
        self.errors.fetch_add(1, Ordering::SeqCst);
        eprintln!("{} {}", red("✗"), red(message));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Re-encode at the default format/quality (→ ./processed.png)
  cutout photo.jpg

  # Lossy re-encode to JPEG at quality 80 (→ ./processed.jpeg)
  cutout photo.png --format jpeg --quality 80

  # Remove the background only (→ ./removed-bg.png)
  cutout photo.jpg --remove-bg

  # Remove the background, then re-encode the matted result to WebP
  cutout photo.jpg --remove-bg --reencode --format webp -o out/

  # JSON summary of the final artifact
  cutout photo.png --format jpeg --json

ENVIRONMENT VARIABLES:
  REMOVE_BG_API_KEY   API credential for the background-removal service
  CUTOUT_ENDPOINT     Override the background-removal endpoint URL

SETUP:
  1. Set API key (only needed for --remove-bg):
       export REMOVE_BG_API_KEY=...
  2. Run:
       cutout photo.jpg --remove-bg
"#;

/// Remove image backgrounds and re-encode images at a chosen format/quality.
#[derive(Parser, Debug)]
#[command(
    name = "cutout",
    version,
    about = "Remove image backgrounds and re-encode images at a chosen format/quality",
    long_about = "Load an image, optionally strip its background via the remove.bg API, and \
re-encode it at a chosen format and quality. Each successful step writes its result into the \
output directory (removed-bg.png, processed.<format>).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input image file.
    input: PathBuf,

    /// Strip the background via the remote matting service.
    #[arg(long)]
    remove_bg: bool,

    /// Re-encode at --format/--quality. Default action when --remove-bg is
    /// not given; combine both to re-encode the matted result.
    #[arg(long)]
    reencode: bool,

    /// Output format: png, jpeg, webp.
    #[arg(short, long, env = "CUTOUT_FORMAT", default_value = "png")]
    format: String,

    /// Encoding quality 0–100 (only JPEG is lossy).
    #[arg(short, long, env = "CUTOUT_QUALITY", default_value_t = 80,
          value_parser = clap::value_parser!(u8).range(0..=100))]
    quality: u8,

    /// Directory results are written into.
    #[arg(short, long, env = "CUTOUT_OUTPUT_DIR", default_value = ".")]
    output: PathBuf,

    /// API credential for the background-removal service.
    #[arg(long, env = "REMOVE_BG_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Override the background-removal endpoint URL.
    #[arg(long, env = "CUTOUT_ENDPOINT")]
    endpoint: Option<String>,

    /// Print a JSON summary of the final artifact to stdout.
    #[arg(long)]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the spinner is active; the
    // per-operation ✓/✗ lines are the feedback that matters.
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let format = OutputFormat::from_tag(&cli.format)
        .with_context(|| format!("Unknown format '{}': expected png, jpeg, or webp", cli.format))?;

    // Default action: a plain `cutout photo.jpg` re-encodes.
    let reencode = cli.reencode || !cli.remove_bg;

    tokio::fs::create_dir_all(&cli.output)
        .await
        .with_context(|| format!("Failed to create output directory {:?}", cli.output))?;

    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let presenter = CliPresenter::new(cli.output.clone(), show_progress, cli.quiet);

    // ── Build session ────────────────────────────────────────────────────
    let mut builder = SessionConfig::builder()
        .quality(cli.quality)
        .format(format)
        .presenter(Arc::clone(&presenter) as Arc<dyn Presenter>);
    if let Some(key) = cli.api_key.clone() {
        builder = builder.api_key(key);
    }
    if let Some(endpoint) = cli.endpoint.clone() {
        builder = builder.endpoint(endpoint);
    }
    let config = builder.build().context("Invalid configuration")?;
    let session = Session::new(config);

    // ── Load input ───────────────────────────────────────────────────────
    let upload = RawUpload::from_file(&cli.input)
        .await
        .with_context(|| format!("Failed to read {:?}", cli.input))?;
    session.install_artifact(upload);
    if session.artifact().is_none() {
        anyhow::bail!(
            "{:?} is not an image (by its extension's declared type)",
            cli.input
        );
    }

    if !cli.quiet && reencode {
        eprintln!(
            "{}",
            dim(&format!("re-encode target: {format} at quality {}", cli.quality))
        );
    }

    // ── Run operations (sequential; each consumes the previous output) ──
    if cli.remove_bg {
        session.remove_background().await;
    }
    if reencode {
        session.reencode().await;
    }

    let failed = presenter.errors.load(Ordering::SeqCst);

    if cli.json {
        if let Some(artifact) = session.artifact() {
            let summary = serde_json::json!({
                "name": artifact.name,
                "media_type": artifact.media_type,
                "bytes": artifact.len(),
                "format": format,
                "quality": cli.quality,
                "failed_operations": failed,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} operation(s) failed");
    }
    Ok(())
}
