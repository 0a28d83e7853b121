//! Concurrent, same-host crawl engine.
//!
//! One coordinator owns the [`Frontier`]; up to `concurrency` workers fetch
//! pages and pull raw hrefs out of them. Workers never touch the frontier:
//! they hand their hrefs back and the coordinator resolves and admits them,
//! so check-and-insert on the frontier cannot race.
//!
//! No per-page failure stops a crawl. It ends when the frontier is empty and
//! no fetch is in flight, or when it is cancelled.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use sitecrawl_shared::{CrawlConfig, Result, SiteCrawlError};

use crate::fetch::{FetchError, Fetcher, HttpFetcher};
use crate::frontier::{Admission, Frontier};
use crate::links::extract_links;
use crate::normalize::CanonicalUrl;

// ---------------------------------------------------------------------------
// CrawlResult
// ---------------------------------------------------------------------------

/// Summary of a finished (or cancelled) crawl.
#[derive(Debug, Clone)]
pub struct CrawlResult {
    /// Canonical seed URL.
    pub seed: CanonicalUrl,
    /// Hostname every visited URL shares.
    pub host: String,
    /// Every URL fetched or attempted, sorted.
    pub visited: BTreeSet<CanonicalUrl>,
    /// Pages that could not be fetched. They are still in `visited`.
    pub failures: Vec<FetchError>,
    /// Links dropped because they could not be canonicalized.
    pub dropped_links: usize,
    /// Whether the crawl stopped early through cancellation or its deadline.
    pub cancelled: bool,
    /// Total duration of the crawl.
    pub duration: Duration,
}

impl CrawlResult {
    /// Visited URLs as strings, in sorted order.
    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.visited.iter().map(CanonicalUrl::as_str)
    }

    pub fn len(&self) -> usize {
        self.visited.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visited.is_empty()
    }
}

/// What a worker hands back to the coordinator.
struct PageOutcome {
    url: CanonicalUrl,
    links: std::result::Result<PageLinks, FetchError>,
}

/// Raw hrefs of a fetched page and the URL they are relative to.
struct PageLinks {
    base: CanonicalUrl,
    hrefs: Vec<String>,
}

/// Running tallies kept by the coordinator.
#[derive(Default)]
struct Tally {
    failures: Vec<FetchError>,
    dropped_links: usize,
}

// ---------------------------------------------------------------------------
// Crawler
// ---------------------------------------------------------------------------

/// Same-host crawler with bounded fetch concurrency.
pub struct Crawler<F = HttpFetcher> {
    config: CrawlConfig,
    fetcher: Arc<F>,
}

impl Crawler<HttpFetcher> {
    /// Create a crawler that fetches over HTTP with the given configuration.
    pub fn new(config: CrawlConfig) -> Result<Self> {
        let fetcher = HttpFetcher::new(config.timeout, &config.user_agent)?;
        Ok(Self::with_fetcher(config, fetcher))
    }
}

impl<F: Fetcher> Crawler<F> {
    /// Create a crawler around any [`Fetcher`].
    pub fn with_fetcher(config: CrawlConfig, fetcher: F) -> Self {
        Self {
            config,
            fetcher: Arc::new(fetcher),
        }
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    /// Crawl every page reachable from `seed` on the seed's host.
    pub async fn crawl(&self, seed: &str) -> Result<CrawlResult> {
        self.crawl_with_cancellation(seed, CancellationToken::new())
            .await
    }

    /// Like [`Crawler::crawl`], but stops early once `cancel` fires (or the
    /// configured deadline passes). Outstanding fetches are aborted and the
    /// partial result is returned with `cancelled` set.
    #[instrument(skip_all, fields(seed = %seed))]
    pub async fn crawl_with_cancellation(
        &self,
        seed: &str,
        cancel: CancellationToken,
    ) -> Result<CrawlResult> {
        let start_time = Instant::now();

        let seed = CanonicalUrl::parse(seed)
            .map_err(|e| SiteCrawlError::invalid_seed(seed, e.to_string()))?;

        let concurrency = self.config.concurrency.max(1);
        let mut frontier = Frontier::new(seed.clone(), self.config.order);
        let mut in_flight: JoinSet<PageOutcome> = JoinSet::new();
        let mut tally = Tally::default();
        let mut cancelled = false;

        let deadline = self.config.deadline;
        let deadline_elapsed = async move {
            match deadline {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline_elapsed);

        info!(
            host = frontier.host(),
            concurrency,
            order = %self.config.order,
            "starting crawl"
        );

        loop {
            while in_flight.len() < concurrency {
                let Some(url) = frontier.advance() else {
                    break;
                };
                info!(%url, "scraping");

                let fetcher = Arc::clone(&self.fetcher);
                in_flight.spawn(async move {
                    let links = fetcher.fetch(&url).await.map(|page| PageLinks {
                        hrefs: extract_links(&page.body),
                        base: page.url,
                    });
                    PageOutcome { url, links }
                });
            }

            if in_flight.is_empty() {
                break;
            }

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    warn!(in_flight = in_flight.len(), "crawl cancelled");
                    cancelled = true;
                    break;
                }
                _ = &mut deadline_elapsed => {
                    warn!(in_flight = in_flight.len(), "crawl deadline reached");
                    cancelled = true;
                    break;
                }
                joined = in_flight.join_next() => match joined {
                    Some(Ok(outcome)) => absorb(&mut frontier, outcome, &mut tally),
                    Some(Err(e)) => warn!(error = %e, "fetch task failed"),
                    None => break,
                },
            }
        }

        in_flight.abort_all();

        let host = frontier.host().to_string();
        let result = CrawlResult {
            seed,
            host,
            visited: frontier.into_visited(),
            failures: tally.failures,
            dropped_links: tally.dropped_links,
            cancelled,
            duration: start_time.elapsed(),
        };

        info!(
            visited = result.visited.len(),
            failures = result.failures.len(),
            dropped_links = result.dropped_links,
            cancelled = result.cancelled,
            duration_ms = result.duration.as_millis(),
            "crawl completed"
        );

        Ok(result)
    }
}

/// Fold one page's outcome into the frontier.
fn absorb(frontier: &mut Frontier, outcome: PageOutcome, tally: &mut Tally) {
    let PageOutcome { url, links } = outcome;

    let PageLinks { base, hrefs } = match links {
        Ok(links) => links,
        Err(e) => {
            warn!(url = %e.url, error = %e.kind, "fetch failed, page contributes no links");
            tally.failures.push(e);
            return;
        }
    };

    let mut admitted = 0usize;
    for href in &hrefs {
        match CanonicalUrl::resolve(&base, href) {
            Ok(link) => match frontier.admit(link) {
                Admission::Admitted => admitted += 1,
                Admission::Duplicate => {}
                Admission::OffHost => trace!(%href, "off-host link skipped"),
            },
            Err(e) => {
                trace!(error = %e, "dropping link");
                tally.dropped_links += 1;
            }
        }
    }

    debug!(
        %url,
        links = hrefs.len(),
        admitted,
        pending = frontier.pending_len(),
        visited = frontier.visited_len(),
        "page processed"
    );
}

#[cfg(test)]
mod crawler_tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use sitecrawl_shared::FrontierOrder;

    use super::*;
    use crate::fetch::{FetchErrorKind, Page};

    /// In-memory site: path → page body, or an error kind.
    #[derive(Default)]
    struct FakeSite {
        pages: HashMap<String, std::result::Result<String, FetchErrorKind>>,
        hits: Mutex<HashMap<String, usize>>,
        delay: Option<Duration>,
        hang_on: Option<String>,
    }

    impl FakeSite {
        fn page(mut self, url: &str, hrefs: &[&str]) -> Self {
            let body: String = hrefs
                .iter()
                .map(|h| format!(r#"<a href="{h}">link</a>"#))
                .collect();
            self.pages
                .insert(url.to_string(), Ok(format!("<html><body>{body}</body></html>")));
            self
        }

        fn body(mut self, url: &str, body: &str) -> Self {
            self.pages.insert(url.to_string(), Ok(body.to_string()));
            self
        }

        fn broken(mut self, url: &str, kind: FetchErrorKind) -> Self {
            self.pages.insert(url.to_string(), Err(kind));
            self
        }

        fn delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        fn hang_on(mut self, url: &str) -> Self {
            self.hang_on = Some(url.to_string());
            self
        }
    }

    impl Fetcher for Arc<FakeSite> {
        async fn fetch(&self, url: &CanonicalUrl) -> std::result::Result<Page, FetchError> {
            *self
                .hits
                .lock()
                .unwrap()
                .entry(url.to_string())
                .or_default() += 1;

            if self.hang_on.as_deref() == Some(url.as_str()) {
                std::future::pending::<()>().await;
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            match self.pages.get(url.as_str()) {
                Some(Ok(body)) => Ok(Page {
                    url: url.clone(),
                    body: body.clone(),
                }),
                Some(Err(kind)) => Err(FetchError::new(url.clone(), kind.clone())),
                None => Err(FetchError::new(url.clone(), FetchErrorKind::Status(404))),
            }
        }
    }

    fn config(concurrency: usize) -> CrawlConfig {
        CrawlConfig {
            concurrency,
            ..CrawlConfig::default()
        }
    }

    fn crawler(site: &Arc<FakeSite>, concurrency: usize) -> Crawler<Arc<FakeSite>> {
        Crawler::with_fetcher(config(concurrency), Arc::clone(site))
    }

    fn visited(result: &CrawlResult) -> Vec<&str> {
        result.urls().collect()
    }

    #[tokio::test]
    async fn fragment_and_cross_host_links_are_filtered() {
        let site = Arc::new(FakeSite::default().page(
            "https://example.com/",
            &["/about", "https://example.com/about#team", "https://other.com/x"],
        ).page("https://example.com/about", &[]));

        let result = crawler(&site, 1).crawl("https://example.com/").await.unwrap();

        assert_eq!(
            visited(&result),
            vec!["https://example.com/", "https://example.com/about"]
        );
        assert_eq!(result.host, "example.com");
        assert!(result.failures.is_empty());
        assert!(!result.cancelled);
        assert!(!site.hits.lock().unwrap().contains_key("https://other.com/x"));
    }

    #[tokio::test]
    async fn cycles_terminate() {
        let site = Arc::new(
            FakeSite::default()
                .page("https://example.com/a", &["/b"])
                .page("https://example.com/b", &["/a", "/a#top"]),
        );

        let result = crawler(&site, 1).crawl("https://example.com/a").await.unwrap();

        assert_eq!(
            visited(&result),
            vec!["https://example.com/a", "https://example.com/b"]
        );
        let hits = site.hits.lock().unwrap();
        assert_eq!(hits["https://example.com/a"], 1);
        assert_eq!(hits["https://example.com/b"], 1);
    }

    #[tokio::test]
    async fn fetch_failure_is_visited_once_and_crawl_continues() {
        let site = Arc::new(
            FakeSite::default()
                .page("https://example.com/", &["/down", "/up"])
                .broken("https://example.com/down", FetchErrorKind::Status(500))
                .page("https://example.com/up", &["/down", "/leaf"])
                .page("https://example.com/leaf", &[]),
        );

        let result = crawler(&site, 1).crawl("https://example.com/").await.unwrap();

        assert_eq!(
            visited(&result),
            vec![
                "https://example.com/",
                "https://example.com/down",
                "https://example.com/leaf",
                "https://example.com/up",
            ]
        );
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].url.as_str(), "https://example.com/down");
        assert_eq!(result.failures[0].kind, FetchErrorKind::Status(500));
        assert_eq!(site.hits.lock().unwrap()["https://example.com/down"], 1);
    }

    #[tokio::test]
    async fn seed_failure_still_yields_seed() {
        let site = Arc::new(
            FakeSite::default().broken("https://example.com/", FetchErrorKind::Timeout),
        );

        let result = crawler(&site, 2).crawl("https://example.com/").await.unwrap();

        assert_eq!(visited(&result), vec!["https://example.com/"]);
        assert_eq!(result.failures[0].kind, FetchErrorKind::Timeout);
    }

    #[tokio::test]
    async fn page_without_anchors_admits_nothing() {
        let site = Arc::new(
            FakeSite::default()
                .body("https://example.com/", "<html><p>just text</p><a>no href</a></html>"),
        );

        let result = crawler(&site, 1).crawl("https://example.com/").await.unwrap();

        assert_eq!(visited(&result), vec!["https://example.com/"]);
        assert!(result.failures.is_empty());
        assert_eq!(result.dropped_links, 0);
    }

    #[tokio::test]
    async fn unusable_links_are_dropped_not_fatal() {
        let site = Arc::new(
            FakeSite::default()
                .page(
                    "https://example.com/",
                    &["mailto:hi@example.com", "javascript:void(0)", "http://[::1", "/ok"],
                )
                .page("https://example.com/ok", &[]),
        );

        let result = crawler(&site, 1).crawl("https://example.com/").await.unwrap();

        assert_eq!(
            visited(&result),
            vec!["https://example.com/", "https://example.com/ok"]
        );
        assert_eq!(result.dropped_links, 3);
    }

    #[tokio::test]
    async fn query_strings_are_distinct_pages() {
        let site = Arc::new(
            FakeSite::default()
                .page("https://example.com/", &["/list?page=1", "/list?page=2", "/list?page=1#x"])
                .page("https://example.com/list?page=1", &[])
                .page("https://example.com/list?page=2", &[]),
        );

        let result = crawler(&site, 1).crawl("https://example.com/").await.unwrap();
        assert_eq!(result.len(), 3);
    }

    #[tokio::test]
    async fn concurrent_discovery_admits_each_link_once() {
        // Every page links to every other page; many workers discover the
        // same links at the same time.
        let paths: Vec<String> = (0..20).map(|i| format!("/p{i}")).collect();
        let hrefs: Vec<&str> = paths.iter().map(String::as_str).collect();

        let mut site = FakeSite::default()
            .page("https://example.com/", &hrefs)
            .delay(Duration::from_millis(5));
        for p in &paths {
            site = site.page(&format!("https://example.com{p}"), &hrefs);
        }
        let site = Arc::new(site);

        let result = crawler(&site, 8).crawl("https://example.com/").await.unwrap();

        assert_eq!(result.len(), 21);
        let hits = site.hits.lock().unwrap();
        assert_eq!(hits.len(), 21);
        assert!(hits.values().all(|&n| n == 1), "a page was fetched twice: {hits:?}");
    }

    #[tokio::test]
    async fn order_does_not_change_the_visited_set() {
        let site = Arc::new(
            FakeSite::default()
                .page("https://example.com/", &["/a", "/b"])
                .page("https://example.com/a", &["/a/1", "/a/2"])
                .page("https://example.com/b", &["/b/1"])
                .page("https://example.com/a/1", &["/b"])
                .page("https://example.com/a/2", &[])
                .page("https://example.com/b/1", &["/"]),
        );

        let fifo = Crawler::with_fetcher(config(1), Arc::clone(&site))
            .crawl("https://example.com/")
            .await
            .unwrap();
        let lifo_config = CrawlConfig {
            order: FrontierOrder::Lifo,
            ..config(3)
        };
        let lifo = Crawler::with_fetcher(lifo_config, Arc::clone(&site))
            .crawl("https://example.com/")
            .await
            .unwrap();

        assert_eq!(fifo.visited, lifo.visited);
        assert_eq!(fifo.len(), 6);
    }

    #[tokio::test]
    async fn cancellation_returns_partial_result() {
        let site = Arc::new(
            FakeSite::default()
                .page("https://example.com/", &["/stuck"])
                .hang_on("https://example.com/stuck"),
        );
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let result = crawler(&site, 2)
            .crawl_with_cancellation("https://example.com/", cancel)
            .await
            .unwrap();

        assert!(result.cancelled);
        assert_eq!(
            visited(&result),
            vec!["https://example.com/", "https://example.com/stuck"]
        );
    }

    #[tokio::test]
    async fn deadline_stops_the_crawl() {
        let site = Arc::new(FakeSite::default().hang_on("https://example.com/"));
        let config = CrawlConfig {
            deadline: Some(Duration::from_millis(50)),
            ..config(1)
        };

        let result = Crawler::with_fetcher(config, Arc::clone(&site))
            .crawl("https://example.com/")
            .await
            .unwrap();

        assert!(result.cancelled);
        assert_eq!(result.len(), 1);
    }

    #[tokio::test]
    async fn invalid_seed_is_rejected() {
        let site = Arc::new(FakeSite::default());
        for seed in ["example.com", "ftp://example.com/", ""] {
            let err = crawler(&site, 1).crawl(seed).await.unwrap_err();
            assert!(matches!(err, SiteCrawlError::InvalidSeed { .. }), "{seed}: {err}");
        }
        assert!(site.hits.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_crawl_with_mock_server() {
        let server = wiremock::MockServer::start().await;

        let page1 = r#"<html><body>
            <a href="/page2">Go to page 2</a>
            <a href="/page2#intro">Intro of page 2</a>
            <a href="https://external.example.org/">External</a>
        </body></html>"#;

        let page2 = r#"<html><body>
            <a href="page3">Go to page 3</a>
            <a href="/">Home</a>
        </body></html>"#;

        let page3 = r#"<html><body><p>Final page.</p><a href="/gone">Dead link</a></body></html>"#;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(page1))
            .expect(1)
            .mount(&server)
            .await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/page2"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(page2))
            .expect(1)
            .mount(&server)
            .await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/page3"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(page3))
            .expect(1)
            .mount(&server)
            .await;

        wiremock::Mock::given(wiremock::matchers::path("/gone"))
            .respond_with(wiremock::ResponseTemplate::new(410))
            .expect(1)
            .mount(&server)
            .await;

        let crawler = Crawler::new(config(2)).unwrap();
        let result = crawler.crawl(&server.uri()).await.unwrap();

        let base = server.uri();
        let expected: Vec<String> = ["/", "/gone", "/page2", "/page3"]
            .iter()
            .map(|p| format!("{base}{p}"))
            .collect();
        assert_eq!(visited(&result), expected);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].kind, FetchErrorKind::Status(410));
    }

    #[tokio::test]
    async fn links_resolve_against_the_redirect_target() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::path("/docs"))
            .respond_with(wiremock::ResponseTemplate::new(301).insert_header("location", "/docs/"))
            .mount(&server)
            .await;

        wiremock::Mock::given(wiremock::matchers::path("/docs/"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_string(r#"<a href="intro">Introduction</a>"#),
            )
            .mount(&server)
            .await;

        wiremock::Mock::given(wiremock::matchers::path("/docs/intro"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("<p>Intro</p>"))
            .expect(1)
            .mount(&server)
            .await;

        let crawler = Crawler::new(config(1)).unwrap();
        let result = crawler.crawl(&format!("{}/docs", server.uri())).await.unwrap();

        let base = server.uri();
        assert_eq!(
            visited(&result),
            vec![format!("{base}/docs"), format!("{base}/docs/intro")]
        );
        assert!(result.failures.is_empty());
    }
}
