//! Input loading: one page is a source image plus the HTML a vision model
//! produced for it.
//!
//! ## Why keep bytes, not paths?
//!
//! The pipeline core never touches the file system: a [`PageInput`] carries
//! the raw image bytes and HTML text, so callers that already hold both in
//! memory (a web handler, a queue consumer) skip the disk entirely. Loading
//! from disk is a convenience on top, with the same friendly errors for a
//! missing or unreadable file.

use crate::error::Vl2MdError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One page to convert.
#[derive(Debug, Clone, Default)]
pub struct PageInput {
    /// Encoded source image (PNG, JPEG or WebP).
    pub image: Vec<u8>,
    /// Vision-model HTML for the image, optionally fenced.
    pub html: String,
    /// Display name used in logs and progress output.
    pub name: Option<String>,
}

impl PageInput {
    pub fn new(image: Vec<u8>, html: impl Into<String>) -> Self {
        Self {
            image,
            html: html.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Read an image and its HTML from disk.
    pub fn from_files(image: &Path, html: &Path) -> Result<Self, Vl2MdError> {
        let image_bytes = read_file(image)?;
        let html_bytes = read_file(html)?;
        let html_text = String::from_utf8_lossy(&html_bytes).into_owned();
        debug!(
            "Loaded {} ({} bytes) with {} ({} chars)",
            image.display(),
            image_bytes.len(),
            html.display(),
            html_text.len()
        );

        let name = image
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        Ok(Self {
            image: image_bytes,
            html: html_text,
            name,
        })
    }
}

/// The HTML file conventionally paired with an image: `scan.png` → `scan.html`.
pub fn html_path_for(image: &Path) -> PathBuf {
    image.with_extension("html")
}

fn read_file(path: &Path) -> Result<Vec<u8>, Vl2MdError> {
    std::fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => Vl2MdError::FileNotFound {
            path: path.to_path_buf(),
        },
        ErrorKind::PermissionDenied => Vl2MdError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => Vl2MdError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        },
    })
}
