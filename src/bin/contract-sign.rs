//! CLI binary for contract-sign.
//!
//! A thin shim over the library crate: renders a contract, simulates the
//! reader scrolling to the end, signs it with recorded (or generated)
//! strokes, confirms, and writes the published pages and the PDF to disk.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use contract_sign::collab::write_atomic;
use contract_sign::pipeline::encode::encode_artifact;
use contract_sign::{
    rasterize, ArtifactFormat, CaptureReport, CaptureStage, CollectingPublisher, ContractMetadata,
    ContractRenderer, DirectorySink, Notice, NoticeLevel, PageSize, Point, SessionObserver,
    SettleStrategy, SigningConfig, SigningError, SigningWorkflow, Stroke,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
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
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI observer using indicatif ─────────────────────────────────────────────

/// Prints notices above a spinner that runs while the capture is in flight.
struct CliObserver {
    bar: ProgressBar,
    quiet: bool,
}

impl CliObserver {
    fn new(quiet: bool) -> Arc<Self> {
        let bar = ProgressBar::hidden();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        Arc::new(Self { bar, quiet })
    }
}

impl SessionObserver for CliObserver {
    fn on_notice(&self, notice: &Notice) {
        if self.quiet && notice.level != NoticeLevel::Error {
            return;
        }
        let line = match notice.level {
            NoticeLevel::Info => format!("  {} {}", dim("·"), notice.message),
            NoticeLevel::Success => format!("  {} {}", green("✓"), notice.message),
            NoticeLevel::Warning => format!("  {} {}", yellow("!"), yellow(&notice.message)),
            NoticeLevel::Error => format!("  {} {}", red("✗"), red(&notice.message)),
        };
        self.bar.println(line);
    }

    fn on_capture_start(&self, attempt: u32) {
        if self.quiet {
            return;
        }
        self.bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        self.bar.set_prefix(format!("Capture #{attempt}"));
        self.bar.enable_steady_tick(Duration::from_millis(80));
    }

    fn on_capture_stage(&self, stage: CaptureStage) {
        self.bar.set_message(format!("{stage}…"));
    }

    fn on_capture_finish(&self, _report: &CaptureReport) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Sign the built-in host agreement for Jane Doe into ./signed
  contract-sign --name "Jane Doe" --email jane@example.com

  # Sign a contract described in JSON with recorded pen strokes
  contract-sign --metadata contract.json --strokes strokes.json -o out/

  # Render the unsigned contract only
  contract-sign --preview -o preview/

  # Letter paper, JPEG pages, machine-readable report
  contract-sign --page-size letter --format jpeg --json > report.json

  # Report with the page images inlined for a web host
  contract-sign --json --inline-pages > report.json

INPUT FORMATS:
  metadata  {"title", "provider_name", "counterparty_name", "counterparty_email",
             "counterparty_phone"?, "effective_date": "YYYY-MM-DD",
             "clauses": [{"heading", "body"}]}
  strokes   [[{"x": 10.0, "y": 80.0}, {"x": 40.0, "y": 60.0}], ...]
            in signature-pad coordinates (500x200 by default)

OUTPUT:
  page-1.png, page-2.png   the two published page images
  Contract_<Name>.pdf      the tiled multi-page PDF
"#;

/// Sign a contract and capture it as page images and a PDF.
#[derive(Parser, Debug)]
#[command(
    name = "contract-sign",
    version,
    about = "Sign a contract and capture it as two page images and a multi-page PDF",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Contract metadata JSON. Defaults to the built-in host agreement.
    #[arg(long, env = "CONTRACT_SIGN_METADATA")]
    metadata: Option<PathBuf>,

    /// Signer name for the built-in agreement.
    #[arg(long, default_value = "Jane Doe")]
    name: String,

    /// Signer email for the built-in agreement.
    #[arg(long, default_value = "jane@example.com")]
    email: String,

    /// Platform name for the built-in agreement.
    #[arg(long, default_value = "StayWell")]
    provider: String,

    /// Effective date (YYYY-MM-DD) for the built-in agreement. Defaults to today.
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Recorded pen strokes as JSON. Defaults to a generated scribble.
    #[arg(long, env = "CONTRACT_SIGN_STROKES")]
    strokes: Option<PathBuf>,

    /// Output directory.
    #[arg(short, long, env = "CONTRACT_SIGN_OUT_DIR", default_value = "signed")]
    out_dir: PathBuf,

    /// Capture scale (pixels per layout unit).
    #[arg(long, env = "CONTRACT_SIGN_SCALE", default_value_t = 2,
          value_parser = clap::value_parser!(u32).range(1..=4))]
    scale: u32,

    /// PDF page size.
    #[arg(long, value_enum, default_value = "a4")]
    page_size: PageSizeArg,

    /// Encoding of the published page images.
    #[arg(long, value_enum, default_value = "png")]
    format: FormatArg,

    /// TrueType font for contract text. Without one, text is drawn greeked.
    #[arg(long, env = "CONTRACT_SIGN_FONT")]
    font: Option<PathBuf>,

    /// Layout settle delay before capture, in milliseconds.
    #[arg(long, env = "CONTRACT_SIGN_SETTLE_MS", default_value_t = 500)]
    settle_ms: u64,

    /// Wait for the surface's layout signal instead of the full delay.
    #[arg(long)]
    layout_signal: bool,

    /// Minimum snapshot height accepted by the splitter, in pixels.
    #[arg(long, default_value_t = 500)]
    min_height: u32,

    /// Render the unsigned contract to preview.png and stop.
    #[arg(long)]
    preview: bool,

    /// Print the capture report as JSON.
    #[arg(long, env = "CONTRACT_SIGN_JSON")]
    json: bool,

    /// With --json, embed each published page as a base64 data URI.
    #[arg(long, requires = "json")]
    inline_pages: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "CONTRACT_SIGN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "CONTRACT_SIGN_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PageSizeArg {
    A4,
    Letter,
}

impl From<PageSizeArg> for PageSize {
    fn from(v: PageSizeArg) -> Self {
        match v {
            PageSizeArg::A4 => PageSize::A4,
            PageSizeArg::Letter => PageSize::LETTER,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Png,
    Jpeg,
}

impl From<FormatArg> for ArtifactFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Png => ArtifactFormat::Png,
            FormatArg::Jpeg => ArtifactFormat::Jpeg { quality: 100 },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner and notices cover normal runs; library logs only at -v.
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || !cli.json {
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

    let config = build_config(&cli)?;
    let metadata = load_metadata(&cli).await?;

    // ── Preview mode ─────────────────────────────────────────────────────
    if cli.preview {
        let renderer = ContractRenderer::new(metadata, &config).context("Failed to load contract")?;
        let snapshot = rasterize(&renderer, &config).context("Failed to render contract")?;
        let png = encode_artifact(snapshot.pixels(), ArtifactFormat::Png)
            .context("Failed to encode preview")?;
        let path = cli.out_dir.join("preview.png");
        write_file(&path, &png.bytes)?;
        if !cli.quiet {
            eprintln!(
                "{} {}x{} preview  →  {}",
                green("✔"),
                snapshot.width(),
                snapshot.height(),
                bold(&path.display().to_string())
            );
        }
        return Ok(());
    }

    let strokes = load_strokes(&cli).await?;

    // ── Run the workflow ─────────────────────────────────────────────────
    let publisher = Arc::new(CollectingPublisher::new());
    let sink = Arc::new(DirectorySink::new(&cli.out_dir));
    let observer = CliObserver::new(cli.quiet || cli.json);
    let mut workflow = SigningWorkflow::open(metadata, config.clone(), publisher.clone(), sink)
        .context("Failed to open signing session")?
        .with_observer(observer);

    workflow.read_to_end();
    workflow.next().context("Could not start signing")?;
    workflow
        .replay_strokes(&strokes)
        .context("Could not draw signature")?;
    let report = workflow.confirm().await.context("Capture did not run")?;

    // ── Write published pages ────────────────────────────────────────────
    let mut written = Vec::new();
    if let Some(pages) = publisher.last() {
        for (i, page) in pages.iter().enumerate() {
            let path = cli
                .out_dir
                .join(format!("page-{}.{}", i + 1, config.artifact_format.extension()));
            write_file(&path, &page.bytes)?;
            written.push(WrittenPage {
                data_uri: cli.inline_pages.then(|| page.data_uri()),
                mime_type: page.mime_type,
                path,
            });
        }
    }

    if cli.json {
        let out = JsonOutput {
            report: &report,
            pages: &written,
        };
        let json = serde_json::to_string_pretty(&out).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&report, &written);
    }

    report.check().context("capture incomplete")?;
    Ok(())
}

/// A published page as written to the output directory.
#[derive(Serialize)]
struct WrittenPage {
    path: PathBuf,
    mime_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data_uri: Option<String>,
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    #[serde(flatten)]
    report: &'a CaptureReport,
    pages: &'a [WrittenPage],
}

/// Map CLI args to `SigningConfig`.
fn build_config(cli: &Cli) -> Result<SigningConfig> {
    let mut builder = SigningConfig::builder()
        .scale_factor(cli.scale)
        .settle_delay_ms(cli.settle_ms)
        .minimum_capture_height(cli.min_height)
        .page_size(cli.page_size.into())
        .artifact_format(cli.format.into());
    if cli.layout_signal {
        builder = builder.settle(SettleStrategy::LayoutSignal);
    }
    if let Some(ref font) = cli.font {
        builder = builder.font_path(font);
    }
    Ok(builder.build()?)
}

async fn load_metadata(cli: &Cli) -> Result<ContractMetadata> {
    match cli.metadata {
        Some(ref path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read metadata from {:?}", path))?;
            serde_json::from_str(&raw).with_context(|| format!("Invalid metadata JSON in {:?}", path))
        }
        None => Ok(ContractMetadata::host_agreement(
            &cli.provider,
            &cli.name,
            &cli.email,
            cli.date.unwrap_or_else(|| chrono::Local::now().date_naive()),
        )),
    }
}

async fn load_strokes(cli: &Cli) -> Result<Vec<Stroke>> {
    match cli.strokes {
        Some(ref path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read strokes from {:?}", path))?;
            let strokes: Vec<Stroke> = serde_json::from_str(&raw)
                .with_context(|| format!("Invalid strokes JSON in {:?}", path))?;
            if strokes.iter().all(|s| s.is_empty()) {
                bail!("{:?} contains no pen strokes", path);
            }
            Ok(strokes)
        }
        None => Ok(vec![scribble(500.0, 200.0)]),
    }
}

/// A single wavy stroke across the middle of a `width`×`height` pad.
fn scribble(width: f32, height: f32) -> Stroke {
    let mid = height / 2.0;
    (0..=46)
        .map(|i| {
            let x = width * 0.05 + i as f32 * width * 0.02;
            let y = mid + (x / 28.0).sin() * height * 0.2;
            Point::new(x, y)
        })
        .collect()
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    write_atomic(path, bytes).map_err(|source| SigningError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

fn print_summary(report: &CaptureReport, pages: &[WrittenPage]) {
    if let Some(s) = report.snapshot {
        eprintln!(
            "{}  snapshot {}x{} px at {}x  {}",
            dim("◆"),
            s.width,
            s.height,
            s.scale,
            dim(&format!("{}ms", report.duration_ms))
        );
    }
    for page in pages {
        eprintln!("{}  {}", green("✔"), bold(&page.path.display().to_string()));
    }
    if let Some(pdf) = report.pdf_summary() {
        let shown = pdf
            .location
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| pdf.file_name.clone());
        eprintln!(
            "{}  {}  {}",
            green("✔"),
            bold(&shown),
            dim(&format!("{} pages, {} bytes", pdf.page_count, pdf.bytes))
        );
    }
}
