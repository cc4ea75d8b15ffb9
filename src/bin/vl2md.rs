//! CLI binary for edgequake-vl2md.
//!
//! A thin shim over the library crate that pairs image files with their
//! vision-model HTML, maps CLI flags to `ConversionConfig` and prints results.

use anyhow::{bail, Context, Result};
use clap::Parser;
use edgequake_vl2md::{
    convert, convert_to_file, html_path_for, ConversionConfig, ConversionOutput,
    ConversionProgressCallback, PageInput, PageSeparator, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live progress bar plus one log line per
/// page. Pages complete out of order when `--concurrency` > 1.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Per-page wall-clock start times for elapsed reporting.
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Converting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, page_num: usize) -> f64 {
        let elapsed_ms = self
            .start_times
            .lock()
            .ok()
            .and_then(|mut times| times.remove(&page_num))
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);
        elapsed_ms as f64 / 1000.0
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_pages: usize) {
        self.bar.set_length(total_pages as u64);
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut times) = self.start_times.lock() {
            times.insert(page_num, Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, markdown_len: usize) {
        let secs = self.elapsed_secs(page_num);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{markdown_len:>5} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(page_num);
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Keep one line per page; the first line of the error is enough.
        let first_line = error.lines().next().unwrap_or_default();
        let msg = if first_line.chars().count() > 80 {
            let cut: String = first_line.chars().take(79).collect();
            format!("{cut}\u{2026}")
        } else {
            first_line.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, total_pages: usize, success_count: usize) {
        let failed = self.errors.load(Ordering::SeqCst);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} pages converted successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} pages converted  ({} failed)",
                cyan("⚠"),
                bold(&success_count.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # One page; scan.html is picked up next to scan.png
  vl2md scan.png

  # Explicit HTML file, figures embedded as data URIs
  vl2md scan.png --html model-output.html --embed-images -o scan.md

  # Many pages, figures written to disk next to the Markdown
  vl2md pages/*.png --regions-dir out/figures -o out/book.md --separator hr

  # Just the cleaned HTML
  vl2md scan.png --html-only

  # Boxes are in a known model-space size
  vl2md scan.png --resized 1288x1652

ENVIRONMENT:
  Every flag can also be set through a VL2MD_* variable (see --help).
  RUST_LOG overrides the log filter chosen by -v / -q."#;

#[derive(Parser, Debug)]
#[command(
    name = "vl2md",
    version,
    about = "Convert vision-model document HTML to clean Markdown",
    long_about = "Convert the bounding-box annotated HTML a document-parsing vision model \
produced for an image into clean Markdown. Figures are cropped out of the original image \
at full resolution and either referenced by filename or embedded as base64 data URIs.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Source images (PNG, JPEG, WebP), one per page, in page order.
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Vision-model HTML for a single image. Default: <image>.html.
    #[arg(long, env = "VL2MD_HTML")]
    html: Option<PathBuf>,

    /// Write Markdown to this file instead of stdout.
    #[arg(short, long, env = "VL2MD_OUTPUT")]
    output: Option<PathBuf>,

    /// Embed cropped figures as base64 data URIs.
    #[arg(long, env = "VL2MD_EMBED_IMAGES")]
    embed_images: bool,

    /// Print the sanitised fenced HTML instead of Markdown.
    #[arg(long, env = "VL2MD_HTML_ONLY")]
    html_only: bool,

    /// Write cropped figures (img-<n>.jpg) into this directory.
    #[arg(long, env = "VL2MD_REGIONS_DIR")]
    regions_dir: Option<PathBuf>,

    /// Model-space size the bounding boxes refer to, as WIDTHxHEIGHT.
    #[arg(long, env = "VL2MD_RESIZED", value_parser = parse_dimensions)]
    resized: Option<(u32, u32)>,

    /// Smart-resize lower pixel bound.
    #[arg(long, env = "VL2MD_MIN_PIXELS", default_value_t = edgequake_vl2md::config::DEFAULT_MIN_PIXELS)]
    min_pixels: u32,

    /// Smart-resize upper pixel bound.
    #[arg(long, env = "VL2MD_MAX_PIXELS", default_value_t = edgequake_vl2md::config::DEFAULT_MAX_PIXELS)]
    max_pixels: u32,

    /// JPEG quality for cropped figures (1–100).
    #[arg(long, env = "VL2MD_JPEG_QUALITY", default_value_t = 75,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Number of pages converted in parallel.
    #[arg(short, long, env = "VL2MD_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Page separator: none, hr, comment, or custom string.
    #[arg(long, env = "VL2MD_SEPARATOR", default_value = "none")]
    separator: String,

    /// Output structured JSON (ConversionOutput) instead of Markdown.
    #[arg(long, env = "VL2MD_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "VL2MD_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "VL2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "VL2MD_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && cli.images.len() > 1;
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

    // ── Load pages ───────────────────────────────────────────────────────
    let pages = load_pages(&cli)?;

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Fast path: Markdown straight to a file ───────────────────────────
    let plain_file_output = !cli.json && !cli.html_only && cli.regions_dir.is_none();
    if let (Some(output_path), true) = (&cli.output, plain_file_output) {
        let stats = convert_to_file(pages, output_path, &config)
            .await
            .context("Conversion failed")?;
        if !cli.quiet {
            eprintln!(
                "{}  {}/{} pages  {} figures  {}ms  →  {}",
                if stats.failed_pages == 0 {
                    green("✔")
                } else {
                    cyan("⚠")
                },
                stats.processed_pages,
                stats.total_pages,
                stats.total_regions,
                stats.total_duration_ms,
                bold(&output_path.display().to_string()),
            );
        }
        return Ok(());
    }

    // ── Run conversion ───────────────────────────────────────────────────
    let output = convert(pages, &config)
        .await
        .context("Conversion failed")?;

    if let Some(ref dir) = cli.regions_dir {
        let written = write_regions(dir, &output).await?;
        if !cli.quiet {
            eprintln!("Wrote {} figures to {}", written, dir.display());
        }
    }

    let rendered = if cli.json {
        serde_json::to_string_pretty(&output).context("Failed to serialise output")?
    } else if cli.html_only {
        output
            .pages
            .iter()
            .filter(|p| p.is_success())
            .map(|p| p.fenced_html.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    } else {
        output.markdown.clone()
    };

    match cli.output {
        Some(ref path) => {
            tokio::fs::write(path, &rendered)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(rendered.as_bytes())
                .context("Failed to write to stdout")?;
            if !rendered.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }
    }

    // The progress callback already printed its own summary.
    if !cli.quiet && !show_progress && !cli.json {
        eprintln!(
            "Converted {}/{} pages ({} figures) in {}ms",
            output.stats.processed_pages,
            output.stats.total_pages,
            output.stats.total_regions,
            output.stats.total_duration_ms
        );
        for err in output.errors() {
            eprintln!("  {} {}", red("✗"), err);
        }
    }

    Ok(())
}

/// Pair every image with its HTML and read both.
fn load_pages(cli: &Cli) -> Result<Vec<PageInput>> {
    if cli.html.is_some() && cli.images.len() > 1 {
        bail!("--html applies to a single image; with several images each is paired with <image>.html");
    }

    cli.images
        .iter()
        .map(|image| {
            let html = cli.html.clone().unwrap_or_else(|| html_path_for(image));
            PageInput::from_files(image, &html)
                .with_context(|| format!("Failed to load page {}", image.display()))
        })
        .collect()
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .min_pixels(cli.min_pixels)
        .max_pixels(cli.max_pixels)
        .jpeg_quality(cli.jpeg_quality)
        .concurrency(cli.concurrency)
        .embed_images(cli.embed_images)
        .page_separator(parse_separator(&cli.separator));

    if let Some((w, h)) = cli.resized {
        builder = builder.resized_dimensions(w, h);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Write each page's regions; pages get their own subdirectory when there
/// are several, since every page numbers its figures from 1.
async fn write_regions(dir: &Path, output: &ConversionOutput) -> Result<usize> {
    let subdirs = region_subdirs(
        output
            .pages
            .iter()
            .map(|p| (p.page_num, p.name.as_deref())),
    );
    let multi_page = output.pages.len() > 1;
    let mut written = 0;

    for (page, subdir) in output.pages.iter().zip(&subdirs) {
        if page.regions.is_empty() {
            continue;
        }
        let page_dir = if multi_page {
            dir.join(subdir)
        } else {
            dir.to_path_buf()
        };

        tokio::fs::create_dir_all(&page_dir)
            .await
            .with_context(|| format!("Failed to create {}", page_dir.display()))?;
        for region in &page.regions {
            let path = page_dir.join(&region.name);
            tokio::fs::write(&path, &region.bytes)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            written += 1;
        }
    }

    Ok(written)
}

/// Name each page's region directory after its image stem, suffixed with the
/// page number when two pages share a stem.
fn region_subdirs<'a>(pages: impl Iterator<Item = (usize, Option<&'a str>)>) -> Vec<String> {
    let stems: Vec<(usize, Option<String>)> = pages
        .map(|(page_num, name)| {
            let stem = name
                .and_then(|n| Path::new(n).file_stem())
                .map(|s| s.to_string_lossy().into_owned());
            (page_num, stem)
        })
        .collect();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for stem in stems.iter().filter_map(|(_, s)| s.as_deref()) {
        *counts.entry(stem).or_default() += 1;
    }

    stems
        .iter()
        .map(|(page_num, stem)| match stem.as_deref() {
            Some(stem) if counts.get(stem).copied().unwrap_or(0) > 1 => {
                format!("{stem}-page-{page_num}")
            }
            Some(stem) => stem.to_string(),
            None => format!("page-{page_num}"),
        })
        .collect()
}

/// Parse `--resized 1288x1652`.
fn parse_dimensions(s: &str) -> std::result::Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
    let w: u32 = w.trim().parse().map_err(|_| format!("invalid width '{w}'"))?;
    let h: u32 = h.trim().parse().map_err(|_| format!("invalid height '{h}'"))?;
    if w == 0 || h == 0 {
        return Err(format!("dimensions must be non-zero, got '{s}'"));
    }
    Ok((w, h))
}

/// Parse `--separator` string into `PageSeparator`.
fn parse_separator(s: &str) -> PageSeparator {
    match s.to_lowercase().as_str() {
        "none" => PageSeparator::None,
        "hr" | "---" => PageSeparator::HorizontalRule,
        "comment" => PageSeparator::Comment,
        _ => PageSeparator::Custom(s.to_string()),
    }
}
