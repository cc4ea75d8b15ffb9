//! # edgequake-vl2md
//!
//! Normalise the HTML a vision-language model produces for a scanned page
//! into clean Markdown, with figures cropped out of the source image.
//!
//! ## Why this crate?
//!
//! Document-parsing VLMs answer with loosely structured HTML: every block
//! carries a `data-bbox` in the model's resized coordinate space, figures are
//! `<img>` placeholders with no pixels behind them, and the markup is full of
//! colour styles and model-specific class names. This crate turns that into
//! deterministic Markdown: it crops each figure out of the original image at
//! full resolution, strips the noise, and projects the tree tag by tag.
//!
//! ## Pipeline Overview
//!
//! ```text
//! image bytes + model HTML
//!  │
//!  ├─ 1. Parse     strip ```html fences, html5ever into an owned tree
//!  ├─ 2. Extract   crop img[data-bbox] regions, rename to img-<n>.jpg
//!  ├─ 3. Sanitize  colour styles, coordinates, class collapse, clearing
//!  ├─ 4. Project   per-tag Markdown rules, blank-line collapse
//!  └─ 5. Inline    optional base64 data URIs for the regions
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_vl2md::{convert_page, ConversionConfig, PageInput};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let page = PageInput::from_files("scan.png".as_ref(), "scan.html".as_ref())?;
//!     let config = ConversionConfig::builder().embed_images(true).build()?;
//!     let parsed = convert_page(&page, &config)?;
//!     println!("{}", parsed.markdown);
//!     Ok(())
//! }
//! ```
//!
//! Batches go through [`convert`] (or [`convert_stream`]), which converts
//! pages concurrently on the blocking pool and joins them in page order.
//!
//! Markdown that already exists with a separate image map (an external
//! parsing service's `{markdown, images}` answer) only needs the last step:
//! [`inline_images`] over a `HashMap<String, String>` of base64 payloads.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `vl2md` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! edgequake-vl2md = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, PageSeparator};
pub use convert::{convert, convert_page, convert_sync, convert_to_file, model_dimensions};
pub use error::{PageError, Stage, Vl2MdError};
pub use output::{ConversionOutput, ConversionStats, PageResult, ParsedPage};
pub use pipeline::extract::{ImageRegion, RegionMap};
pub use pipeline::inline::{inline_images, ImageSource};
pub use pipeline::input::{html_path_for, PageInput};
pub use pipeline::markdown::html_to_markdown;
pub use pipeline::sanitize::sanitize_to_fenced_html;
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{convert_stream, PageStream};
