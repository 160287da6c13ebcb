//! CLI binary for foliator-client.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ClientConfig` and `StampSettings`, drives a `Controller`, and prints
//! results.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use foliator_client::{
    folio, ClientConfig, ClientConfigBuilder, Controller, Corner, DirectorySink, Orientation,
    ProgressCallback, SelectedFile, StampSettings, SubmitReport, UploadProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Byte-level upload bar. Starts as a spinner and switches to a bar once
/// the file size is known.
struct CliUploadProgress {
    bar: ProgressBar,
}

impl CliUploadProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(spinner_style);
        bar.set_prefix("Uploading");
        bar.set_message("Connecting…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl UploadProgressCallback for CliUploadProgress {
    fn on_upload_start(&self, total_bytes: Option<u64>) {
        let Some(total) = total_bytes else {
            return;
        };
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        self.bar.set_length(total);
        self.bar.set_style(style);
        self.bar.reset_eta();
    }

    fn on_upload_progress(&self, loaded: u64, _total: Option<u64>) {
        self.bar.set_position(loaded);
    }

    fn on_upload_complete(&self, status: u16) {
        self.bar.set_prefix("Stamping");
        self.bar.finish_with_message(format!("server answered {status}"));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Show how a start number will be printed
  foliator folio 7

  # Preview the first stamped page
  foliator preview contract.pdf -o preview.png --start-number 120

  # Stamp and save into ./out
  foliator stamp contract.pdf -o out --corner top-right --font-size 12

  # Against another server
  foliator --server http://stamp.internal:8080 stamp contract.pdf

ENVIRONMENT VARIABLES:
  FOLIATOR_SERVER         Server origin (default http://localhost:5000)
  FOLIATOR_CONFIG         JSON file with ClientConfig fields
  RUST_LOG                Overrides the log filter
"#;

/// Stamp page numbers onto PDFs through a foliation server.
#[derive(Parser, Debug)]
#[command(
    name = "foliator",
    version,
    about = "Preview and stamp folio numbers onto PDFs through a foliation server",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Server origin [default: http://localhost:5000].
    #[arg(long, global = true, env = "FOLIATOR_SERVER")]
    server: Option<String>,

    /// JSON file with client configuration; flags override it.
    #[arg(long, global = true, env = "FOLIATOR_CONFIG")]
    config: Option<PathBuf>,

    /// Preview call timeout in seconds.
    #[arg(long, global = true, env = "FOLIATOR_TIMEOUT", default_value_t = 60)]
    timeout: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "FOLIATOR_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "FOLIATOR_QUIET")]
    quiet: bool,

    /// Disable the upload progress bar.
    #[arg(long, global = true, env = "FOLIATOR_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the folio a start number renders as.
    Folio {
        /// Start number as typed into the form.
        value: String,
    },
    /// Render a preview of the first stamped page.
    Preview {
        file: PathBuf,
        /// Where to write the preview image.
        #[arg(short, long, default_value = "preview.png")]
        output: PathBuf,
        #[command(flatten)]
        stamp: StampArgs,
    },
    /// Stamp the whole document and save the result.
    Stamp {
        file: PathBuf,
        /// Directory the stamped PDF is saved into.
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
        #[command(flatten)]
        stamp: StampArgs,
    },
}

#[derive(Args, Debug)]
struct StampArgs {
    /// First page that receives a folio.
    #[arg(long, env = "FOLIATOR_START_PAGE", default_value_t = 1,
          value_parser = clap::value_parser!(u32).range(1..))]
    start_page: u32,

    /// Last page to stamp (default: through the end).
    #[arg(long, env = "FOLIATOR_END_PAGE")]
    end_page: Option<u32>,

    /// Number printed on the first stamped page.
    #[arg(long, env = "FOLIATOR_START_NUMBER", default_value_t = 1)]
    start_number: u32,

    /// Font size in points.
    #[arg(long, env = "FOLIATOR_FONT_SIZE", default_value_t = 16,
          value_parser = clap::value_parser!(u32).range(1..=200))]
    font_size: u32,

    /// Distance from the page edges in centimetres.
    #[arg(long, env = "FOLIATOR_OFFSET", default_value_t = 1.0)]
    offset: f32,

    /// Corner: top-left, top-right, bottom-left, bottom-right.
    #[arg(long, env = "FOLIATOR_CORNER", default_value = "bottom-right")]
    corner: Corner,

    /// Orientation: horizontal or vertical.
    #[arg(long, env = "FOLIATOR_ORIENTATION", default_value = "horizontal")]
    orientation: Orientation,
}

impl From<&StampArgs> for StampSettings {
    fn from(a: &StampArgs) -> Self {
        StampSettings {
            start_page: a.start_page,
            end_page: a.end_page,
            start_number: a.start_number,
            font_size: a.font_size,
            offset_cm: a.offset,
            corner: a.corner,
            orientation: a.orientation,
        }
    }
}

fn build_config(cli: &Cli, auto_preview: bool, debounce_ms: Option<u64>) -> Result<ClientConfig> {
    let mut builder = match &cli.config {
        Some(path) => ClientConfigBuilder::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ClientConfig::builder(),
    };
    if let Some(server) = &cli.server {
        builder = builder.base_url(server);
    }
    builder = builder
        .request_timeout_secs(cli.timeout)
        .auto_preview(auto_preview);
    if let Some(ms) = debounce_ms {
        builder = builder.debounce_ms(ms).transition_ms(0);
    }
    builder.build().context("Invalid configuration")
}

async fn load(path: &Path) -> Result<SelectedFile> {
    SelectedFile::from_path(path)
        .await
        .with_context(|| format!("Cannot open {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The upload bar gives all the feedback that matters while it is up.
    let show_progress =
        !cli.quiet && !cli.no_progress && matches!(cli.command, Command::Stamp { .. });
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match &cli.command {
        Command::Folio { value } => {
            println!("{}", folio::render(value));
            Ok(())
        }
        Command::Preview {
            file,
            output,
            stamp,
        } => run_preview(&cli, file, output, stamp).await,
        Command::Stamp {
            file,
            output,
            stamp,
        } => run_stamp(&cli, file, output, stamp, show_progress).await,
    }
}

async fn run_preview(cli: &Cli, file: &Path, output: &Path, stamp: &StampArgs) -> Result<()> {
    // No one is typing: fire the preview as soon as the file is in.
    let config = build_config(cli, true, Some(0))?;
    let controller = Controller::http(&config, &StampSettings::from(stamp))
        .context("Failed to create HTTP client")?;

    controller.select_file(Some(load(file).await?));
    let pane = controller.preview_settled().await;
    for alert in controller.take_alerts() {
        eprintln!("{} {}", red("✘"), alert);
    }

    let Some(image) = pane.image().filter(|_| pane.image_visible) else {
        bail!("{}", pane.message);
    };
    tokio::fs::write(output, &image.bytes[..])
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    if !cli.quiet {
        let size = image
            .dimensions
            .map(|(w, h)| format!("{w}×{h}"))
            .unwrap_or_else(|| "unknown size".to_string());
        eprintln!(
            "{} {}  {}  →  {}",
            green("✔"),
            pane.message,
            dim(&size),
            bold(&output.display().to_string())
        );
    }
    Ok(())
}

async fn run_stamp(
    cli: &Cli,
    file: &Path,
    output: &Path,
    stamp: &StampArgs,
    show_progress: bool,
) -> Result<()> {
    let config = build_config(cli, false, None)?;
    let controller = Controller::http(&config, &StampSettings::from(stamp))
        .context("Failed to create HTTP client")?;

    tokio::fs::create_dir_all(output)
        .await
        .with_context(|| format!("Failed to create {}", output.display()))?;

    controller.select_file(Some(load(file).await?));
    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliUploadProgress::new() as Arc<dyn UploadProgressCallback>)
    } else {
        None
    };

    let sink = DirectorySink::new(output);
    let result = controller.submit(&sink, progress).await;
    for alert in controller.take_alerts() {
        eprintln!("{} {}", red("✘"), alert);
    }

    match result.context("Submission refused")? {
        SubmitReport::Downloaded { path, bytes } => {
            if !cli.quiet {
                eprintln!(
                    "{}  {} bytes  →  {}",
                    green("✔"),
                    bytes,
                    bold(&path.display().to_string())
                );
            }
            Ok(())
        }
        SubmitReport::SaveFailed { filename, reason } => {
            bail!("Stamped '{filename}' but could not save it: {reason}")
        }
        SubmitReport::Rejected { location } => bail!(
            "Server rejected the upload{}",
            location.map(|l| format!(" (redirected to {l})")).unwrap_or_default()
        ),
        SubmitReport::ServerError { status } => bail!("Server error {status}"),
        SubmitReport::NetworkError { detail } => bail!("Network error: {detail}"),
    }
}
