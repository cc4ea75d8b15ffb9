//! Output types: per-page results, the assembled document and run statistics.
//!
//! Every type here is `Serialize` so the CLI's `--json` mode (and any service
//! wrapping the library) can emit a run verbatim. Region bytes are skipped in
//! JSON; only names and crop rectangles are reported.

use crate::error::{PageError, Vl2MdError};
use crate::pipeline::extract::RegionMap;
use serde::Serialize;

/// Result of running the pipeline over one page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedPage {
    /// Final Markdown (inlined when `embed_images` is set).
    pub markdown: String,
    /// The sanitised tree, serialised inside a ```` ```html ```` fence.
    pub fenced_html: String,
    /// Cropped regions, keyed by the filenames the Markdown references.
    pub regions: RegionMap,
}

/// Outcome for one page of a batch.
#[derive(Debug, Clone, Serialize)]
pub struct PageResult {
    /// 1-indexed position in the batch.
    pub page_num: usize,
    /// Display name of the input, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Markdown for this page; empty when the page failed.
    pub markdown: String,
    /// Sanitised fenced HTML; empty when the page failed.
    pub fenced_html: String,
    /// Regions cropped from this page.
    pub regions: RegionMap,
    /// Wall time spent on this page.
    pub duration_ms: u64,
    /// Why the page failed, if it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<PageError>,
}

impl PageResult {
    pub(crate) fn success(
        page_num: usize,
        name: Option<String>,
        parsed: ParsedPage,
        duration_ms: u64,
    ) -> Self {
        Self {
            page_num,
            name,
            markdown: parsed.markdown,
            fenced_html: parsed.fenced_html,
            regions: parsed.regions,
            duration_ms,
            error: None,
        }
    }

    pub(crate) fn failure(
        page_num: usize,
        name: Option<String>,
        error: PageError,
        duration_ms: u64,
    ) -> Self {
        Self {
            page_num,
            name,
            markdown: String::new(),
            fenced_html: String::new(),
            regions: RegionMap::new(),
            duration_ms,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate numbers for a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversionStats {
    pub total_pages: usize,
    pub processed_pages: usize,
    pub failed_pages: usize,
    /// Regions cropped across all successful pages.
    pub total_regions: usize,
    pub total_duration_ms: u64,
}

/// Result of a batch conversion.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutput {
    /// Successful pages joined with the configured separator.
    pub markdown: String,
    /// Every page, sorted by `page_num`, failures included.
    pub pages: Vec<PageResult>,
    pub stats: ConversionStats,
}

impl ConversionOutput {
    /// Treat any failed page as an error.
    ///
    /// The batch APIs succeed as long as one page converted; callers that
    /// need all-or-nothing semantics chain this.
    pub fn into_result(self) -> Result<Self, Vl2MdError> {
        if self.stats.failed_pages > 0 {
            return Err(Vl2MdError::PartialFailure {
                success: self.stats.processed_pages,
                failed: self.stats.failed_pages,
                total: self.stats.total_pages,
            });
        }
        Ok(self)
    }

    /// The per-page errors, in page order.
    pub fn errors(&self) -> impl Iterator<Item = &PageError> {
        self.pages.iter().filter_map(|p| p.error.as_ref())
    }
}
