//! Configuration types for vision-model HTML to Markdown conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share configs across the blocking worker tasks and to log
//! exactly which settings produced an output.
//!
//! # Design choice: builder over constructor
//! Most callers only change one or two settings (usually `embed_images`).
//! The builder lets them set only what they care about and rely on the
//! documented defaults for the rest, and `build()` is the single place where
//! combinations are validated.

use crate::error::Vl2MdError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Side of one vision-model patch; resized dimensions are multiples of it.
pub const DEFAULT_RESIZE_FACTOR: u32 = 28;
/// Smallest pixel area the vision model is fed.
pub const DEFAULT_MIN_PIXELS: u32 = 512 * 28 * 28;
/// Largest pixel area the vision model is fed.
pub const DEFAULT_MAX_PIXELS: u32 = 2048 * 28 * 28;

/// Configuration for a conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_vl2md::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .embed_images(true)
///     .concurrency(8)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Lower bound on the model-space pixel area. Default: 512·28·28.
    ///
    /// Bounding boxes in the HTML live in the coordinate space of the image
    /// the vision model actually saw. When the caller does not pass that size
    /// explicitly it is recomputed from the original size with the same
    /// bounds the model's preprocessor used, so these must match the model.
    pub min_pixels: u32,

    /// Upper bound on the model-space pixel area. Default: 2048·28·28.
    pub max_pixels: u32,

    /// Patch multiple for the model-space size. Default: 28.
    pub resize_factor: u32,

    /// Explicit model-space `(width, height)`. Default: None.
    ///
    /// Overrides the smart-resize computation; use it when the vision service
    /// reports the size it resized to.
    pub resized_dimensions: Option<(u32, u32)>,

    /// Rewrite image references into base64 data URIs. Default: false.
    ///
    /// When off, the Markdown references the region filenames (`img-1.jpg`)
    /// and the caller is expected to store the regions alongside it.
    pub embed_images: bool,

    /// JPEG quality for cropped regions, 1–100. Default: 75.
    pub jpeg_quality: u8,

    /// Number of pages converted in parallel by the batch APIs. Default: 4.
    ///
    /// Conversion is CPU-bound (image decode, crop, JPEG encode), so values
    /// far above the core count only add memory pressure.
    pub concurrency: usize,

    /// Page separator in assembled output. Default: None (blank line).
    pub page_separator: PageSeparator,

    /// Per-page progress events. Default: None.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            min_pixels: DEFAULT_MIN_PIXELS,
            max_pixels: DEFAULT_MAX_PIXELS,
            resize_factor: DEFAULT_RESIZE_FACTOR,
            resized_dimensions: None,
            embed_images: false,
            jpeg_quality: 75,
            concurrency: 4,
            page_separator: PageSeparator::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("min_pixels", &self.min_pixels)
            .field("max_pixels", &self.max_pixels)
            .field("resize_factor", &self.resize_factor)
            .field("resized_dimensions", &self.resized_dimensions)
            .field("embed_images", &self.embed_images)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("concurrency", &self.concurrency)
            .field("page_separator", &self.page_separator)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn min_pixels(mut self, px: u32) -> Self {
        self.config.min_pixels = px;
        self
    }

    pub fn max_pixels(mut self, px: u32) -> Self {
        self.config.max_pixels = px;
        self
    }

    pub fn resize_factor(mut self, factor: u32) -> Self {
        self.config.resize_factor = factor;
        self
    }

    pub fn resized_dimensions(mut self, width: u32, height: u32) -> Self {
        self.config.resized_dimensions = Some((width, height));
        self
    }

    pub fn embed_images(mut self, v: bool) -> Self {
        self.config.embed_images = v;
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q.clamp(1, 100);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn page_separator(mut self, sep: PageSeparator) -> Self {
        self.config.page_separator = sep;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Vl2MdError> {
        let c = &self.config;
        if c.resize_factor == 0 {
            return Err(Vl2MdError::InvalidConfig(
                "Resize factor must be ≥ 1".into(),
            ));
        }
        if c.min_pixels > c.max_pixels {
            return Err(Vl2MdError::InvalidConfig(format!(
                "min_pixels ({}) must not exceed max_pixels ({})",
                c.min_pixels, c.max_pixels
            )));
        }
        if let Some((w, h)) = c.resized_dimensions {
            if w == 0 || h == 0 {
                return Err(Vl2MdError::InvalidConfig(format!(
                    "Resized dimensions must be non-zero, got {}x{}",
                    w, h
                )));
            }
        }
        if c.concurrency == 0 {
            return Err(Vl2MdError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How to separate pages in the assembled Markdown output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSeparator {
    /// No separator; pages joined with "\n\n". (default)
    #[default]
    None,
    /// Horizontal rule: "\n\n---\n\n"
    HorizontalRule,
    /// HTML comment with page number: "<!-- page N -->"
    Comment,
    /// Custom string inserted between pages.
    Custom(String),
}

impl PageSeparator {
    /// Render the separator string for the given page number (1-indexed).
    pub fn render(&self, page_num: usize) -> String {
        match self {
            PageSeparator::None => "\n\n".to_string(),
            PageSeparator::HorizontalRule => "\n\n---\n\n".to_string(),
            PageSeparator::Comment => format!("\n\n<!-- page {} -->\n\n", page_num),
            PageSeparator::Custom(s) => format!("\n\n{}\n\n", s),
        }
    }
}
