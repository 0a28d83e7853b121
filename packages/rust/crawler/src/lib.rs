//! Same-host site crawler.
//!
//! This crate provides:
//! - [`normalize`] — [`CanonicalUrl`], the only URL form the crawler stores
//! - [`fetch`] — the [`Fetcher`] seam and its `reqwest` implementation
//! - [`links`] — raw `href` extraction from markup
//! - [`frontier`] — pending queue and visited set for one crawl
//! - [`engine`] — the concurrent crawl loop

pub mod engine;
pub mod fetch;
pub mod frontier;
pub mod links;
pub mod normalize;

pub use engine::{CrawlResult, Crawler};
pub use fetch::{FetchError, FetchErrorKind, Fetcher, HttpFetcher, Page};
pub use frontier::{Admission, Frontier};
pub use links::extract_links;
pub use normalize::{CanonicalUrl, LinkError};
pub use tokio_util::sync::CancellationToken;
