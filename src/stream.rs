//! Streaming conversion API: emit pages as they complete.
//!
//! ## Why stream?
//!
//! A long batch (a scanned book, a queue of uploads) can take a while. A
//! stream lets callers write each page to disk or forward it to a client as
//! soon as it is ready instead of buffering the whole document.
//!
//! Unlike the eager [`crate::convert::convert`], which returns only after
//! every page finishes, [`convert_stream`] yields items as pages complete.
//! Pages may arrive out of order (sort by `page_num` if order matters).

use crate::config::ConversionConfig;
use crate::convert::run_page;
use crate::error::PageError;
use crate::output::PageResult;
use crate::pipeline::input::PageInput;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of page results.
pub type PageStream = Pin<Box<dyn Stream<Item = Result<PageResult, PageError>> + Send>>;

/// Convert pages, streaming each one as it is ready.
///
/// At most `config.concurrency` pages are in flight. A failed page is
/// yielded as `Err(PageError)`; the stream carries on with the rest.
pub fn convert_stream(pages: Vec<PageInput>, config: &ConversionConfig) -> PageStream {
    let total_pages = pages.len();
    info!("Starting streaming conversion of {} pages", total_pages);

    let concurrency = config.concurrency;
    let config = config.clone();

    let s = stream::iter(pages.into_iter().enumerate())
        .map(move |(idx, page)| run_page(idx + 1, total_pages, page, config.clone()))
        .buffer_unordered(concurrency)
        .map(|mut result| match result.error.take() {
            Some(err) => Err(err),
            None => Ok(result),
        });

    Box::pin(s)
}
