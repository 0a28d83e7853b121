//! Text extraction for crawled pages.
//!
//! Turns the crawler's visited set into `{content, metadata}` records and
//! hands them to a [`RecordSink`].

mod extractor;
mod sink;
mod text;

pub use extractor::{Extraction, TextExtractor};
pub use sink::{JsonlSink, RecordSink, write_records};
pub use text::{html_to_text, page_title};
