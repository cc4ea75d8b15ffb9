//! Error types for the edgequake-vl2md library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Vl2MdError`]: **Fatal**: the conversion of a document cannot proceed
//!   (malformed bounding box, undecodable source image, unreadable input).
//!   Returned as `Err(Vl2MdError)` from [`crate::convert::convert_page`] and
//!   from the batch entry points when nothing could be converted.
//!
//! * [`PageError`]: **Non-fatal**: a single page of a batch failed but the
//!   other pages are fine. Stored inside [`crate::output::PageResult`] so
//!   callers can inspect partial success rather than losing the whole batch
//!   to one bad page.
//!
//! Pipeline failures carry the [`Stage`] they happened in, so a caller sees a
//! single message naming the stage and, where known, the offending element.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The pipeline stage an error originated from.
///
/// Only [`Stage::Extraction`] produces errors today: sanitisation, projection
/// and inlining are total over any parsed tree. The other variants name those
/// stages for logging and progress reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    /// Cropping bounding-box regions out of the source image.
    Extraction,
    /// Stripping styling noise and collapsing class names.
    Sanitization,
    /// Walking the cleaned tree into Markdown.
    Projection,
    /// Rewriting image references into data URIs.
    Inlining,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Extraction => "extraction",
            Stage::Sanitization => "sanitization",
            Stage::Projection => "projection",
            Stage::Inlining => "inlining",
        };
        f.write_str(name)
    }
}

/// All fatal errors returned by the edgequake-vl2md library.
///
/// Page-level failures inside a batch use [`PageError`] and are stored in
/// [`crate::output::PageResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum Vl2MdError {
    // ── Pipeline errors ───────────────────────────────────────────────────
    /// A `data-bbox` attribute did not hold four integers.
    ///
    /// The vision model broke its output contract; the page is not trusted.
    #[error("Extraction failed at {element}: bounding box {value:?} is not four integers")]
    InvalidBoundingBox { element: String, value: String },

    /// The source image bytes could not be decoded.
    #[error("Extraction failed: source image could not be decoded: {detail}")]
    ImageDecode { detail: String },

    /// A cropped region could not be encoded as JPEG.
    #[error("Extraction failed for region '{region}': {detail}")]
    RegionEncode { region: String, detail: String },

    /// Image dimensions are unusable for coordinate mapping.
    #[error("Invalid image dimensions {width}x{height}: {reason}")]
    InvalidDimensions {
        width: u32,
        height: u32,
        reason: String,
    },

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists but reading it failed.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Batch errors ──────────────────────────────────────────────────────
    /// Every page in the batch failed; output would be empty.
    #[error("All {total} pages failed.\nFirst error: {first_error}")]
    AllPagesFailed { total: usize, first_error: String },

    /// Some pages succeeded but at least one failed.
    ///
    /// Returned by [`crate::output::ConversionOutput::into_result`] when
    /// the caller wants to treat any page failure as an error.
    #[error("{failed}/{total} pages failed during conversion")]
    PartialFailure {
        success: usize,
        failed: usize,
        total: usize,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Vl2MdError {
    /// The pipeline stage this error belongs to, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Vl2MdError::InvalidBoundingBox { .. }
            | Vl2MdError::ImageDecode { .. }
            | Vl2MdError::RegionEncode { .. }
            | Vl2MdError::InvalidDimensions { .. } => Some(Stage::Extraction),
            _ => None,
        }
    }
}

/// A non-fatal error for a single page of a batch.
///
/// Stored alongside [`crate::output::PageResult`] when a page fails.
/// The overall conversion continues unless ALL pages fail.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum PageError {
    /// A pipeline stage rejected the page.
    #[error("Page {page}: {stage} failed: {detail}")]
    StageFailed {
        page: usize,
        stage: Stage,
        detail: String,
    },

    /// The page failed outside the pipeline (task panic, bad input).
    #[error("Page {page}: {detail}")]
    Failed { page: usize, detail: String },
}

impl PageError {
    /// Wrap a fatal error as the failure of one page in a batch.
    pub fn from_error(page: usize, err: &Vl2MdError) -> Self {
        match err.stage() {
            Some(stage) => PageError::StageFailed {
                page,
                stage,
                detail: err.to_string(),
            },
            None => PageError::Failed {
                page,
                detail: err.to_string(),
            },
        }
    }

    /// 1-indexed page number the error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::StageFailed { page, .. } | PageError::Failed { page, .. } => *page,
        }
    }
}
