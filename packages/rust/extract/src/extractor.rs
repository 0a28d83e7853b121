//! Fetch crawled pages again and turn them into [`PageRecord`]s.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use sitecrawl_crawler::{CancellationToken, CanonicalUrl, Fetcher, HttpFetcher};
use sitecrawl_shared::{ExtractConfig, PageMetadata, PageRecord, Result};

use crate::text::{html_to_text, page_title};

/// Records produced by [`TextExtractor::extract_all`].
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Pages that yielded text, in input order.
    pub records: Vec<PageRecord>,
    /// Pages that failed to fetch or had no text. They have no record.
    pub skipped: usize,
    /// Whether extraction stopped before every page was tried.
    pub cancelled: bool,
}

/// Produces plain-text records for a set of URLs.
///
/// A page that cannot be fetched yields an empty string, never an error.
pub struct TextExtractor<F = HttpFetcher> {
    fetcher: Arc<F>,
    concurrency: usize,
}

impl TextExtractor<HttpFetcher> {
    /// Create an extractor that fetches over HTTP.
    pub fn new(config: &ExtractConfig) -> Result<Self> {
        let fetcher = HttpFetcher::new(config.timeout, &config.user_agent)?;
        Ok(Self::with_fetcher(fetcher, config.concurrency))
    }
}

impl<F: Fetcher> TextExtractor<F> {
    pub fn with_fetcher(fetcher: F, concurrency: usize) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            concurrency: concurrency.max(1),
        }
    }

    /// Plain text of one page, or `""` if it could not be fetched.
    pub async fn extract(&self, url: &CanonicalUrl) -> String {
        self.extract_record(url).await.content
    }

    /// Fetch one page and package its text with metadata.
    pub async fn extract_record(&self, url: &CanonicalUrl) -> PageRecord {
        fetch_record(self.fetcher.as_ref(), url).await
    }

    /// Extract every URL, at most `concurrency` at a time. Pages without
    /// text are counted in [`Extraction::skipped`] instead of producing a
    /// record.
    pub async fn extract_all<I>(&self, urls: I) -> Extraction
    where
        I: IntoIterator<Item = CanonicalUrl>,
    {
        self.extract_all_with_cancellation(urls, CancellationToken::new())
            .await
    }

    /// Like [`TextExtractor::extract_all`], but stops once `cancel` fires.
    /// Outstanding fetches are aborted and the records finished so far are
    /// returned with `cancelled` set.
    #[instrument(skip_all)]
    pub async fn extract_all_with_cancellation<I>(
        &self,
        urls: I,
        cancel: CancellationToken,
    ) -> Extraction
    where
        I: IntoIterator<Item = CanonicalUrl>,
    {
        let urls: Vec<CanonicalUrl> = urls.into_iter().collect();
        let mut slots: Vec<Option<PageRecord>> = vec![None; urls.len()];
        let mut queue = urls.into_iter().enumerate();
        let mut in_flight = JoinSet::new();
        let mut skipped = 0usize;
        let mut cancelled = false;

        info!(pages = slots.len(), concurrency = self.concurrency, "extracting text");

        loop {
            while in_flight.len() < self.concurrency {
                let Some((idx, url)) = queue.next() else {
                    break;
                };
                let fetcher = Arc::clone(&self.fetcher);
                in_flight.spawn(async move { (idx, fetch_record(fetcher.as_ref(), &url).await) });
            }

            if in_flight.is_empty() {
                break;
            }

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    warn!(in_flight = in_flight.len(), "extraction cancelled");
                    cancelled = true;
                    break;
                }
                joined = in_flight.join_next() => match joined {
                    Some(Ok((_, record))) if record.is_empty() => {
                        debug!(url = %record.metadata.url, "no text, skipping page");
                        skipped += 1;
                    }
                    Some(Ok((idx, record))) => slots[idx] = Some(record),
                    Some(Err(e)) => {
                        warn!(error = %e, "extraction task failed");
                        skipped += 1;
                    }
                    None => break,
                },
            }
        }

        in_flight.abort_all();

        let records: Vec<PageRecord> = slots.into_iter().flatten().collect();
        info!(records = records.len(), skipped, cancelled, "extraction completed");

        Extraction {
            records,
            skipped,
            cancelled,
        }
    }
}

async fn fetch_record<F: Fetcher>(fetcher: &F, url: &CanonicalUrl) -> PageRecord {
    match fetcher.fetch(url).await {
        Ok(page) => {
            let content = html_to_text(&page.body);
            debug!(%url, chars = content.len(), "extracted text");
            PageRecord {
                content,
                metadata: PageMetadata {
                    url: url.as_url().clone(),
                    title: page_title(&page.body),
                    fetched_at: Utc::now(),
                },
            }
        }
        Err(e) => {
            warn!(%url, error = %e.kind, "text extraction failed");
            PageRecord {
                content: String::new(),
                metadata: PageMetadata {
                    url: url.as_url().clone(),
                    title: None,
                    fetched_at: Utc::now(),
                },
            }
        }
    }
}
