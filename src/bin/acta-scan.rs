//! CLI binary for acta-scan.
//!
//! A thin shim over the library crate: classifies each input, submits it
//! through one shared `Intake`, and prints the resulting store snapshot.

use acta_scan::{Intake, IntakeOutcome, Record, ScanConfig, ScanError};
use anyhow::{Context, Result};
use clap::Parser;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

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

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

const AFTER_HELP: &str = r#"INPUTS:
  *.pdf              certificate PDF: QR on any page, else the printed text
  *.png *.jpg *.jpeg photo or scan of the certificate QR
  *.txt              hand-scanner capture, one QR payload per line
  --qr TEXT          a single QR payload given inline (repeatable)

EXAMPLES:
  # Scan a batch of certificates and print the table
  acta-scan actas/*.pdf

  # Mix channels; duplicates are reported and skipped
  acta-scan acta.pdf foto_qr.jpg --qr "Cadena: 0129000012345, CURP: PELJ900315HTLRPN09"

  # JSON export of every stored record
  acta-scan --json actas/*.pdf > registros.json

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH         libpdfium file, or the directory holding it
  ACTA_SCAN_CAPACITY      Maximum number of stored records
  ACTA_SCAN_SCALE         Page render scale for QR detection
  RUST_LOG                Override the log filter (e.g. acta_scan=debug)
"#;

/// Digitize birth-certificate records from QR codes, images and PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "acta-scan",
    version,
    about = "Digitize birth-certificate records from QR codes, images and PDFs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Certificate PDFs, QR images or scanner capture files.
    files: Vec<PathBuf>,

    /// Raw QR payload, as typed by a hand scanner. Repeatable.
    #[arg(long = "qr", value_name = "TEXT")]
    qr: Vec<String>,

    /// Maximum number of records kept in the store.
    #[arg(long, env = "ACTA_SCAN_CAPACITY", default_value_t = 10_000)]
    capacity: usize,

    /// Page render scale for the QR stage (0.5–8.0).
    #[arg(long, env = "ACTA_SCAN_SCALE", default_value_t = 2.0)]
    scale: f32,

    /// Number of inputs processed concurrently.
    #[arg(short, long, env = "ACTA_SCAN_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Print the stored records as JSON instead of a table.
    #[arg(long, env = "ACTA_SCAN_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "ACTA_SCAN_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "ACTA_SCAN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "ACTA_SCAN_QUIET")]
    quiet: bool,
}

/// One unit of work for the intake.
#[derive(Debug)]
struct Job {
    label: String,
    kind: JobKind,
}

#[derive(Debug)]
enum JobKind {
    QrText(String),
    Image(PathBuf),
    Document(PathBuf),
}

#[derive(Default)]
struct Tally {
    accepted: usize,
    duplicates: usize,
    failed: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress;
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

    // ── Build intake ─────────────────────────────────────────────────────
    let config = ScanConfig::builder()
        .capacity(cli.capacity)
        .render_scale(cli.scale)
        .build()
        .context("Invalid configuration")?;
    let intake = Intake::new(config).context("Failed to initialise scan pipeline")?;

    let jobs = collect_jobs(&cli).await?;
    if jobs.is_empty() {
        anyhow::bail!("Nothing to scan: no files or --qr payloads given");
    }

    // ── Scan ─────────────────────────────────────────────────────────────
    let bar = if show_progress {
        progress_bar(jobs.len())
    } else {
        ProgressBar::hidden()
    };
    let started = Instant::now();
    let mut tally = Tally::default();

    let mut results = stream::iter(jobs)
        .map(|job| {
            let intake = intake.clone();
            async move {
                let result = run_job(&intake, &job).await;
                (job, result)
            }
        })
        .buffer_unordered(cli.concurrency.max(1));

    while let Some((job, result)) = results.next().await {
        let line = match result {
            Ok(outcome) => {
                tally.accepted += 1;
                format!(
                    "  {} {:<32} {}  {}",
                    green("✓"),
                    job.label,
                    outcome.key,
                    dim(&describe(&outcome))
                )
            }
            Err(e) if is_duplicate(&e) => {
                tally.duplicates += 1;
                format!("  {} {:<32} {}", yellow("="), job.label, yellow(&e.to_string()))
            }
            Err(e) => {
                tally.failed += 1;
                format!("  {} {:<32} {}", red("✗"), job.label, red(&format!("{e:#}")))
            }
        };
        if show_progress {
            bar.println(line);
        } else if !cli.quiet {
            eprintln!("{line}");
        }
        bar.inc(1);
    }
    bar.finish_and_clear();

    if !cli.quiet {
        eprintln!(
            "{} {} stored, {} duplicate, {} failed  {}",
            if tally.failed == 0 { green("✔") } else { yellow("⚠") },
            bold(&tally.accepted.to_string()),
            tally.duplicates,
            tally.failed,
            dim(&format!("{:.1}s", started.elapsed().as_secs_f64())),
        );
    }

    // ── Output ───────────────────────────────────────────────────────────
    let records = intake.store().snapshot();
    if cli.json {
        let json = serde_json::to_string_pretty(&records).context("Failed to serialise records")?;
        println!("{json}");
    } else {
        write_table(&records).context("Failed to write to stdout")?;
    }

    if tally.accepted == 0 && tally.failed > 0 {
        anyhow::bail!("No certificate could be stored ({} failed)", tally.failed);
    }
    Ok(())
}

/// Expand the command line into jobs. Capture files contribute one job per
/// non-empty line.
async fn collect_jobs(cli: &Cli) -> Result<Vec<Job>> {
    let mut jobs = Vec::new();

    for (i, payload) in cli.qr.iter().enumerate() {
        jobs.push(Job {
            label: format!("--qr #{}", i + 1),
            kind: JobKind::QrText(payload.clone()),
        });
    }

    for path in &cli.files {
        match extension(path).as_deref() {
            Some("txt") => {
                let text = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                for (n, line) in text.lines().enumerate() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    jobs.push(Job {
                        label: format!("{}:{}", display_name(path), n + 1),
                        kind: JobKind::QrText(line.to_string()),
                    });
                }
            }
            Some(ext) if IMAGE_EXTENSIONS.contains(&ext) => jobs.push(Job {
                label: display_name(path),
                kind: JobKind::Image(path.clone()),
            }),
            // Anything else goes to the document channel, which reports
            // unsupported extensions itself.
            _ => jobs.push(Job {
                label: display_name(path),
                kind: JobKind::Document(path.clone()),
            }),
        }
    }

    Ok(jobs)
}

async fn run_job(intake: &Intake, job: &Job) -> Result<IntakeOutcome> {
    let outcome = match &job.kind {
        JobKind::QrText(payload) => intake.scan_qr_text(payload)?,
        JobKind::Image(path) => {
            let bytes = read_input(path).await?;
            intake.scan_image_async(bytes).await?
        }
        JobKind::Document(path) => {
            let bytes = read_input(path).await?;
            intake.scan_document_async(display_name(path), bytes).await?
        }
    };
    Ok(outcome)
}

async fn read_input(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

fn is_duplicate(e: &anyhow::Error) -> bool {
    e.downcast_ref::<ScanError>()
        .is_some_and(ScanError::is_duplicate)
}

fn describe(outcome: &IntakeOutcome) -> String {
    match outcome.page {
        Some(page) => format!("{} (page {page})", outcome.provenance),
        None => outcome.provenance.to_string(),
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn progress_bar(total: usize) -> ProgressBar {
    let bar = ProgressBar::new(total as u64);
    let style = ProgressStyle::with_template(
        "{spinner:.cyan} {prefix:.bold}  \
         [{bar:42.green/238}] {pos:>3}/{len} inputs  ⏱ {elapsed_precise}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("█▉▊▋▌▍▎▏  ")
    .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
    bar.set_style(style);
    bar.set_prefix("Scanning");
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

/// Tab-separated export: one header line, then one line per record.
fn write_table(records: &[Record]) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let Some(first) = records.first() else {
        return Ok(());
    };
    let headers: Vec<&str> = first.to_row().iter().map(|(h, _)| *h).collect();
    writeln!(out, "{}", headers.join("\t"))?;

    for record in records {
        let values: Vec<String> = record
            .to_row()
            .into_iter()
            .map(|(_, v)| v.replace(['\t', '\n'], " "))
            .collect();
        writeln!(out, "{}", values.join("\t"))?;
    }
    Ok(())
}
