//! CLI binary for pagecast.
//!
//! A thin shim over the library crate that maps subcommands and flags to
//! `ConversionConfig`, runs one job and prints its outcome.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pagecast::{
    convert_to_cropped_images, convert_to_docx, convert_to_markdown, convert_to_markdown_file,
    package_markdown, package_markdown_file, ConversionConfig, ConversionProgressCallback,
    ConvertError, CropRatio, JobOutcome, PageSelection, ProgressCallback,
};
use serde::Serialize;
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per page.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    /// Item errors reported so far.
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// The bar starts as a spinner; `on_conversion_start` sets its length.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Reading");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, page_num: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&page_num))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Reading {total_pages} page(s)…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(page_num, Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, items: usize) {
        let secs = self.elapsed_secs(page_num);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<10}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{items:>5} items")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg = match error.char_indices().nth(79) {
            Some((idx, _)) => format!("{}\u{2026}", &error[..idx]),
            None => error.to_string(),
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
        ));
    }

    fn on_conversion_complete(&self, total_pages: usize, success_count: usize) {
        let failed = total_pages.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} page(s) read cleanly",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} page(s) clean  ({} item error(s))",
                cyan("⚠"),
                bold(&success_count.to_string()),
                total_pages,
                red(&self.errors.load(Ordering::SeqCst).to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Markdown to stdout, images next to the PDF in report_images/
  pagecast markdown report.pdf

  # Markdown to a file, then zip it with its images
  pagecast markdown report.pdf -o report.md --package report.zip

  # Word document for pages 1-5
  pagecast docx --pages 1-5 report.pdf -o report.docx

  # Page images cut to 3:4 at 3x scale
  pagecast crop --scale 3 report.pdf -o pages.zip

  # Zip an existing Markdown file with the images it references
  pagecast package notes.md --images-dir notes_images

  # JSON outcome for scripting
  pagecast --json docx report.pdf

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH         Path to libpdfium (directory or file); system library otherwise
  PAGECAST_PAGES          Default page selection
  PAGECAST_PASSWORD       PDF user password
  RUST_LOG                Override the log filter (e.g. pagecast=debug)
"#;

/// Rebuild PDF text layout as Markdown or DOCX, or cut pages into images.
#[derive(Parser, Debug)]
#[command(
    name = "pagecast",
    version,
    about = "Rebuild PDF text layout as Markdown or DOCX, or cut pages into images",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Print the job outcome as JSON on stdout.
    #[arg(long, global = true, env = "PAGECAST_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "PAGECAST_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PAGECAST_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PAGECAST_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a PDF to Markdown.
    Markdown {
        #[command(flatten)]
        pdf: PdfArgs,

        /// Write Markdown to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also zip the Markdown with its images into this archive.
        #[arg(long)]
        package: Option<PathBuf>,
    },
    /// Convert a PDF to a Word document.
    Docx {
        #[command(flatten)]
        pdf: PdfArgs,

        /// Output path. Default: `{pdf_dir}/{name}.docx`.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Widest an embedded image may be, in inches.
        #[arg(long, default_value_t = 6.0)]
        max_image_width: f32,
    },
    /// Cut every page to a fixed width:height ratio and zip the images.
    Crop {
        #[command(flatten)]
        pdf: PdfArgs,

        /// Output archive. Default: `{pdf_dir}/{name}_cropped_images.zip`.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Width:height ratio.
        #[arg(long, default_value = "3:4")]
        ratio: CropRatio,

        /// Rasterisation scale (values below 2 are raised to 2).
        #[arg(long, default_value_t = 2.0)]
        scale: f32,
    },
    /// Zip a Markdown file with the images it references.
    Package {
        /// Markdown file.
        markdown: PathBuf,

        /// Image directory. Default: `{md_dir}/{name}_images`.
        #[arg(long)]
        images_dir: Option<PathBuf>,

        /// Output archive. Default: `{md_dir}/{name}.zip`.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Flags shared by every subcommand that reads a PDF.
#[derive(Args, Debug)]
struct PdfArgs {
    /// Local PDF file.
    input: PathBuf,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "PAGECAST_PAGES", default_value = "all")]
    pages: PageSelection,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PAGECAST_PASSWORD")]
    password: Option<String>,

    /// Where extracted images go. Default: `{pdf_dir}/{name}_images`.
    #[arg(long, env = "PAGECAST_IMAGES_DIR")]
    images_dir: Option<PathBuf>,

    /// Skip embedded images entirely.
    #[arg(long)]
    no_images: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless -v asks for everything.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    match cli.command {
        Command::Markdown {
            ref pdf,
            ref output,
            ref package,
        } => {
            let config = build_config(pdf, progress_cb, |b| b)?;
            let result = run_markdown(pdf, output.as_deref(), package.as_deref(), &config).await;
            if let (Ok((out, _)), None, false) = (&result, output, cli.json) {
                write_stdout(&out.markdown)?;
            }
            let outcome = JobOutcome::from_result(result, |(out, packaged)| {
                let mut msg = format!(
                    "Converted {} page(s) to Markdown with {} image(s) in {}ms",
                    out.stats.processed_pages,
                    out.images.len(),
                    out.stats.total_duration_ms
                );
                if let Some(p) = packaged {
                    msg.push_str(&format!("  →  {}", p.path.display()));
                }
                msg
            });
            report(&cli, outcome)
        }
        Command::Docx {
            ref pdf,
            ref output,
            max_image_width,
        } => {
            let config = build_config(pdf, progress_cb, |b| b.max_image_width_in(max_image_width))?;
            let result = convert_to_docx(&pdf.input, output.as_deref(), &config).await;
            let outcome = JobOutcome::from_result(result, |o| {
                format!(
                    "{} page(s), {} image(s)  →  {}",
                    o.pages_count,
                    o.images_count,
                    o.path.display()
                )
            });
            report(&cli, outcome)
        }
        Command::Crop {
            ref pdf,
            ref output,
            ratio,
            scale,
        } => {
            let config =
                build_config(pdf, progress_cb, |b| b.crop_ratio(ratio).render_scale(scale))?;
            let result = convert_to_cropped_images(&pdf.input, output.as_deref(), &config).await;
            let outcome = JobOutcome::from_result(result, |o| {
                format!(
                    "{} page image(s) at {}  →  {}",
                    o.images_count,
                    ratio,
                    o.path.display()
                )
            });
            report(&cli, outcome)
        }
        Command::Package {
            ref markdown,
            ref images_dir,
            ref output,
        } => {
            let result =
                package_markdown_file(markdown, images_dir.as_deref(), output.as_deref()).await;
            let outcome = JobOutcome::from_result(result, |o| {
                let mut msg = format!(
                    "{} image(s) packaged  →  {}",
                    o.included.len(),
                    o.path.display()
                );
                if !o.missing.is_empty() {
                    msg.push_str(&format!("  ({} missing)", o.missing.len()));
                }
                msg
            });
            report(&cli, outcome)
        }
    }
}

/// Map shared PDF flags to `ConversionConfig`; `extra` applies
/// subcommand-specific settings before validation.
fn build_config(
    args: &PdfArgs,
    progress: Option<ProgressCallback>,
    extra: impl FnOnce(pagecast::ConversionConfigBuilder) -> pagecast::ConversionConfigBuilder,
) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .pages(args.pages.clone())
        .extract_images(!args.no_images);

    if let Some(ref pwd) = args.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(ref dir) = args.images_dir {
        builder = builder.images_dir(dir.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    extra(builder).build().context("Invalid configuration")
}

async fn run_markdown(
    pdf: &PdfArgs,
    output: Option<&Path>,
    package: Option<&Path>,
    config: &ConversionConfig,
) -> Result<(pagecast::MarkdownOutput, Option<pagecast::PackageOutput>), ConvertError> {
    let out = match output {
        Some(path) => convert_to_markdown_file(&pdf.input, path, config).await?,
        None => convert_to_markdown(&pdf.input, config).await?,
    };

    let packaged = match package {
        Some(zip_path) => {
            let base = pdf
                .input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "document".to_string());
            let images_dir = out
                .images_dir
                .clone()
                .or_else(|| config.images_dir.clone())
                .unwrap_or_else(|| {
                    let dir = pdf.input.parent().unwrap_or_else(|| Path::new("."));
                    dir.join(format!("{base}_images"))
                });
            Some(package_markdown(&out.markdown, &base, &images_dir, zip_path).await?)
        }
        None => None,
    };

    Ok((out, packaged))
}

fn write_stdout(markdown: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(markdown.as_bytes())
        .context("Failed to write to stdout")?;
    if !markdown.ends_with('\n') {
        handle.write_all(b"\n").ok();
    }
    Ok(())
}

/// Print the outcome (JSON or a one-line summary) and pick the exit code.
fn report<T: Serialize>(cli: &Cli, outcome: JobOutcome<T>) -> Result<ExitCode> {
    let code = if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&outcome).context("Failed to serialise outcome")?;
        println!("{json}");
    } else if !outcome.is_success() {
        eprintln!("{} {}", red("✘"), outcome.message);
    } else if !cli.quiet {
        eprintln!("{} {}", green("✔"), outcome.message);
    }

    Ok(code)
}
