//! Conversion entry points: one page synchronously, or a batch concurrently.
//!
//! ## Why two layers?
//!
//! [`convert_page`] is the whole normalisation pipeline for a single page:
//! pure, synchronous, no shared state. Everything else here is batch
//! plumbing around it. Pages are CPU-bound (decode, crop, JPEG encode), so
//! each runs on tokio's blocking pool via `spawn_blocking`, with at most
//! `config.concurrency` in flight. Use [`crate::stream::convert_stream`]
//! instead when you want pages as they finish.

use crate::config::ConversionConfig;
use crate::error::{PageError, Vl2MdError};
use crate::output::{ConversionOutput, ConversionStats, PageResult, ParsedPage};
use crate::pipeline::dom::Document;
use crate::pipeline::extract::RegionExtractor;
use crate::pipeline::geometry::smart_resize;
use crate::pipeline::inline::inline_images;
use crate::pipeline::input::PageInput;
use crate::pipeline::markdown::project;
use crate::pipeline::sanitize::sanitize_to_fenced_html;
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Convert one page: vision-model HTML plus its source image.
///
/// Runs extraction, sanitisation, projection and, when
/// `config.embed_images` is set, inlining.
///
/// # Errors
/// Fatal for this page only:
/// - the source image cannot be decoded
/// - a `data-bbox` is not four integers
/// - the original or model-space size is degenerate
pub fn convert_page(page: &PageInput, config: &ConversionConfig) -> Result<ParsedPage, Vl2MdError> {
    let image = image::load_from_memory(&page.image).map_err(|e| Vl2MdError::ImageDecode {
        detail: e.to_string(),
    })?;
    let resized = model_dimensions(image.width(), image.height(), config)?;
    debug!(
        "Source {}x{}, model space {}x{}",
        image.width(),
        image.height(),
        resized.0,
        resized.1
    );

    let mut doc = Document::parse(&page.html);
    let regions =
        RegionExtractor::new(&image, resized, config.jpeg_quality)?.extract(&mut doc)?;
    // Regions own their bytes; the decoded source is no longer needed.
    drop(image);

    let fenced_html = sanitize_to_fenced_html(&mut doc);
    let mut markdown = project(&doc);
    if config.embed_images {
        markdown = inline_images(&markdown, &regions);
    }

    Ok(ParsedPage {
        markdown,
        fenced_html,
        regions,
    })
}

/// The `(width, height)` the vision model worked on for an image of the
/// given size: explicit when configured, otherwise recomputed by smart resize.
pub fn model_dimensions(
    width: u32,
    height: u32,
    config: &ConversionConfig,
) -> Result<(u32, u32), Vl2MdError> {
    match config.resized_dimensions {
        Some(dims) => Ok(dims),
        None => smart_resize(
            width,
            height,
            config.resize_factor,
            config.min_pixels,
            config.max_pixels,
        ),
    }
}

/// Convert a batch of pages to one Markdown document.
///
/// # Returns
/// `Ok(ConversionOutput)` on success, even if some pages failed
/// (check `output.stats.failed_pages` or chain `into_result()`).
///
/// # Errors
/// Returns `Err(Vl2MdError::AllPagesFailed)` only when no page converted.
pub async fn convert(
    pages: Vec<PageInput>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Vl2MdError> {
    let total_start = Instant::now();
    let total_pages = pages.len();
    info!("Starting conversion of {} pages", total_pages);

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(total_pages);
    }

    let mut results = process_concurrent(pages, config).await;
    results.sort_by_key(|p| p.page_num);

    let markdown = assemble_document(&results, config);

    let processed = results.iter().filter(|p| p.is_success()).count();
    let failed = total_pages - processed;

    if processed == 0 && total_pages > 0 {
        let first_error = results
            .iter()
            .find_map(|p| p.error.as_ref())
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Unknown error".to_string());

        return Err(Vl2MdError::AllPagesFailed {
            total: total_pages,
            first_error,
        });
    }

    let stats = ConversionStats {
        total_pages,
        processed_pages: processed,
        failed_pages: failed,
        total_regions: results.iter().map(|p| p.regions.len()).sum(),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Conversion complete: {}/{} pages, {} regions, {}ms total",
        processed, total_pages, stats.total_regions, stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(total_pages, processed);
    }

    Ok(ConversionOutput {
        markdown,
        pages: results,
        stats,
    })
}

/// Convert a batch and write the Markdown directly to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn convert_to_file(
    pages: Vec<PageInput>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionStats, Vl2MdError> {
    let output = convert(pages, config).await?;
    let path = output_path.as_ref();

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Vl2MdError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, &output.markdown)
        .await
        .map_err(|e| Vl2MdError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Vl2MdError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    Ok(output.stats)
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally; do not call it from inside
/// an async context.
pub fn convert_sync(
    pages: Vec<PageInput>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Vl2MdError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Vl2MdError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(pages, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Convert one page on the blocking pool and report it to the callback.
///
/// Never fails: a page error is recorded in the returned [`PageResult`].
pub(crate) async fn run_page(
    page_num: usize,
    total_pages: usize,
    page: PageInput,
    config: ConversionConfig,
) -> PageResult {
    let start = Instant::now();
    if let Some(ref cb) = config.progress_callback {
        cb.on_page_start(page_num, total_pages);
    }

    let name = page.name.clone();
    let worker_config = config.clone();
    let joined = tokio::task::spawn_blocking(move || convert_page(&page, &worker_config)).await;
    let duration_ms = start.elapsed().as_millis() as u64;

    let result = match joined {
        Ok(Ok(parsed)) => {
            debug!(
                "Page {}: {} chars, {} regions in {}ms",
                page_num,
                parsed.markdown.len(),
                parsed.regions.len(),
                duration_ms
            );
            PageResult::success(page_num, name, parsed, duration_ms)
        }
        Ok(Err(e)) => {
            warn!("Page {} failed: {}", page_num, e);
            PageResult::failure(page_num, name, PageError::from_error(page_num, &e), duration_ms)
        }
        Err(e) => {
            warn!("Page {} worker task failed: {}", page_num, e);
            let err = PageError::Failed {
                page: page_num,
                detail: format!("worker task failed: {e}"),
            };
            PageResult::failure(page_num, name, err, duration_ms)
        }
    };

    if let Some(ref cb) = config.progress_callback {
        match &result.error {
            None => cb.on_page_complete(page_num, total_pages, result.markdown.len()),
            Some(e) => cb.on_page_error(page_num, total_pages, &e.to_string()),
        }
    }
    result
}

/// Process pages concurrently, at most `config.concurrency` at a time.
async fn process_concurrent(pages: Vec<PageInput>, config: &ConversionConfig) -> Vec<PageResult> {
    let total_pages = pages.len();
    stream::iter(
        pages
            .into_iter()
            .enumerate()
            .map(|(idx, page)| run_page(idx + 1, total_pages, page, config.clone())),
    )
    .buffer_unordered(config.concurrency)
    .collect()
    .await
}

/// Assemble the final markdown document from page results.
fn assemble_document(pages: &[PageResult], config: &ConversionConfig) -> String {
    let mut parts: Vec<String> = Vec::new();

    let successful_pages: Vec<&PageResult> = pages.iter().filter(|p| p.is_success()).collect();

    for (i, page) in successful_pages.iter().enumerate() {
        if i > 0 {
            parts.push(config.page_separator.render(page.page_num));
        }
        parts.push(page.markdown.clone());
    }

    parts.join("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PageSeparator;
    use crate::error::Stage;
    use crate::progress::ConversionProgressCallback;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 64])
        }));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn half_scale() -> ConversionConfig {
        ConversionConfig::builder()
            .resized_dimensions(100, 50)
            .build()
            .unwrap()
    }

    #[test]
    fn page_with_region_references_filename() {
        let page = PageInput::new(
            png(200, 100),
            r#"<h1 data-bbox="0 0 100 10">Title</h1><img data-bbox="0 0 50 25" alt="fig">"#,
        );
        let parsed = convert_page(&page, &half_scale()).unwrap();
        assert_eq!(parsed.markdown, "# Title\n\n![fig](img-1.jpg)");
        assert_eq!(parsed.regions.len(), 1);
        assert!(!parsed.fenced_html.contains("data-bbox"));
        assert!(parsed.fenced_html.starts_with("```html\n"));
    }

    #[test]
    fn embed_images_inlines_jpeg() {
        let page = PageInput::new(png(200, 100), r#"<img data-bbox="0 0 50 25" alt="fig">"#);
        let config = ConversionConfig::builder()
            .resized_dimensions(100, 50)
            .embed_images(true)
            .build()
            .unwrap();
        let parsed = convert_page(&page, &config).unwrap();
        // base64 of the JPEG SOI marker
        assert!(
            parsed.markdown.starts_with("![fig](data:image/jpeg;base64,/9j/"),
            "{}",
            parsed.markdown
        );
    }

    #[test]
    fn smart_resize_used_without_explicit_dimensions() {
        let config = ConversionConfig::default();
        assert_eq!(
            model_dimensions(1000, 1000, &config).unwrap(),
            smart_resize(1000, 1000, 28, config.min_pixels, config.max_pixels).unwrap()
        );
        assert_eq!(
            model_dimensions(1000, 1000, &half_scale()).unwrap(),
            (100, 50)
        );
    }

    #[test]
    fn undecodable_image_is_an_extraction_error() {
        let page = PageInput::new(b"not an image".to_vec(), "<p>x</p>");
        let err = convert_page(&page, &half_scale()).unwrap_err();
        assert!(matches!(err, Vl2MdError::ImageDecode { .. }));
        assert_eq!(err.stage(), Some(Stage::Extraction));
    }

    #[tokio::test]
    async fn batch_keeps_page_order_and_reports_failures() {
        let pages = vec![
            PageInput::new(png(20, 10), "<p>A</p>"),
            PageInput::new(b"junk".to_vec(), "<p>B</p>").with_name("b.png"),
            PageInput::new(png(20, 10), "<p>C</p>"),
        ];
        let config = ConversionConfig::builder()
            .resized_dimensions(20, 10)
            .page_separator(PageSeparator::HorizontalRule)
            .build()
            .unwrap();
        let out = convert(pages, &config).await.unwrap();

        assert_eq!(out.markdown, "A\n\n---\n\nC");
        assert_eq!(out.stats.processed_pages, 2);
        assert_eq!(out.stats.failed_pages, 1);
        let nums: Vec<usize> = out.pages.iter().map(|p| p.page_num).collect();
        assert_eq!(nums, vec![1, 2, 3]);
        assert_eq!(out.pages[1].name.as_deref(), Some("b.png"));
        assert!(matches!(
            out.pages[1].error,
            Some(PageError::StageFailed {
                page: 2,
                stage: Stage::Extraction,
                ..
            })
        ));
        assert!(out.into_result().is_err());
    }

    #[tokio::test]
    async fn all_pages_failing_is_fatal() {
        let pages = vec![
            PageInput::new(png(20, 10), r#"<img data-bbox="1 2 3">"#),
            PageInput::new(Vec::new(), "<p>x</p>"),
        ];
        let err = convert(pages, &half_scale()).await.unwrap_err();
        match err {
            Vl2MdError::AllPagesFailed { total, first_error } => {
                assert_eq!(total, 2);
                assert!(first_error.contains("bounding box"), "{first_error}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn empty_batch_is_empty_output() {
        let out = convert(Vec::new(), &ConversionConfig::default())
            .await
            .unwrap();
        assert!(out.markdown.is_empty());
        assert_eq!(out.stats.total_pages, 0);
    }

    #[tokio::test]
    async fn callback_sees_every_page() {
        #[derive(Default)]
        struct Counter {
            started: AtomicUsize,
            done: AtomicUsize,
            failed: AtomicUsize,
            success: AtomicUsize,
        }
        impl ConversionProgressCallback for Counter {
            fn on_page_start(&self, _: usize, _: usize) {
                self.started.fetch_add(1, Ordering::SeqCst);
            }
            fn on_page_complete(&self, _: usize, _: usize, _: usize) {
                self.done.fetch_add(1, Ordering::SeqCst);
            }
            fn on_page_error(&self, _: usize, _: usize, _: &str) {
                self.failed.fetch_add(1, Ordering::SeqCst);
            }
            fn on_conversion_complete(&self, _: usize, success_count: usize) {
                self.success.store(success_count, Ordering::SeqCst);
            }
        }

        let counter = Arc::new(Counter::default());
        let config = ConversionConfig::builder()
            .resized_dimensions(20, 10)
            .concurrency(2)
            .progress_callback(counter.clone())
            .build()
            .unwrap();
        let pages = vec![
            PageInput::new(png(20, 10), "<p>1</p>"),
            PageInput::new(png(20, 10), "<p>2</p>"),
            PageInput::new(Vec::new(), "<p>3</p>"),
        ];
        convert(pages, &config).await.unwrap();

        assert_eq!(counter.started.load(Ordering::SeqCst), 3);
        assert_eq!(counter.done.load(Ordering::SeqCst), 2);
        assert_eq!(counter.failed.load(Ordering::SeqCst), 1);
        assert_eq!(counter.success.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn convert_to_file_writes_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/doc.md");
        let pages = vec![PageInput::new(png(20, 10), "<h2>Hi</h2>")];
        let config = ConversionConfig::builder()
            .resized_dimensions(20, 10)
            .build()
            .unwrap();

        let stats = convert_to_file(pages, &path, &config).await.unwrap();
        assert_eq!(stats.processed_pages, 1);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "## Hi");
        assert!(!path.with_extension("md.tmp").exists());
    }

    #[test]
    fn convert_sync_runs_outside_a_runtime() {
        let pages = vec![PageInput::new(png(20, 10), "<p>sync</p>")];
        let config = ConversionConfig::builder()
            .resized_dimensions(20, 10)
            .build()
            .unwrap();
        let out = convert_sync(pages, &config).unwrap();
        assert_eq!(out.markdown, "sync");
    }

    #[test]
    fn convert_runs_under_block_on() {
        let pages = vec![PageInput::new(png(20, 10), "<p>x</p>")];
        let config = ConversionConfig::builder()
            .resized_dimensions(20, 10)
            .build()
            .unwrap();
        // tokio-test's block_on drives a current-thread runtime with the
        // blocking pool available.
        let out = tokio_test::block_on(convert(pages, &config)).unwrap();
        assert_eq!(out.stats.total_pages, 1);
    }
}
