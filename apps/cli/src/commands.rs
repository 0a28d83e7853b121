//! CLI command definitions, routing, and tracing setup.

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use sitecrawl_crawler::{CancellationToken, CrawlResult, Crawler};
use sitecrawl_extract::{JsonlSink, TextExtractor, write_records};
use sitecrawl_shared::{
    AppConfig, CrawlConfig, ExtractConfig, FrontierOrder, init_config, load_config,
};
use tokio::task::JoinHandle;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// sitecrawl — discover every page on a single host.
#[derive(Parser)]
#[command(
    name = "sitecrawl",
    version,
    about = "Crawl every reachable page on one host and extract its text.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Crawl a site and print every visited URL.
    Crawl {
        #[command(flatten)]
        crawl: CrawlArgs,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Crawl a site, extract each page's text, and write JSON Lines records.
    Extract {
        #[command(flatten)]
        crawl: CrawlArgs,

        /// Output file (defaults to `[extract] output` from the config).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Seed URL and per-run crawl overrides.
#[derive(Args, Debug, Default)]
pub(crate) struct CrawlArgs {
    /// Starting URL. Prompted for on stdin when omitted.
    pub url: Option<String>,

    /// Maximum concurrent fetches (1 = sequential).
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Frontier order: fifo (breadth-first) or lifo (depth-first).
    #[arg(long)]
    pub order: Option<FrontierOrder>,

    /// Per-request timeout in seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Stop the whole crawl after this many seconds.
    #[arg(long)]
    pub deadline_secs: Option<u64>,
}

impl CrawlArgs {
    /// Merge CLI flags over config-file values.
    fn apply(&self, mut config: AppConfig) -> AppConfig {
        if let Some(concurrency) = self.concurrency {
            config.crawl.concurrency = concurrency;
        }
        if let Some(order) = self.order {
            config.crawl.order = order;
        }
        if let Some(timeout) = self.timeout_secs {
            config.crawl.timeout_secs = timeout;
        }
        if self.deadline_secs.is_some() {
            config.crawl.deadline_secs = self.deadline_secs;
        }
        config
    }
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr so stdout stays
/// clean for results.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "sitecrawl=info",
        1 => "sitecrawl=debug",
        _ => "sitecrawl=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Crawl { crawl, json } => cmd_crawl(&crawl, json).await,
        Command::Extract { crawl, out } => cmd_extract(&crawl, out).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

async fn cmd_crawl(args: &CrawlArgs, json: bool) -> Result<()> {
    let config = args.apply(load_config()?);
    let seed = seed_url(args)?;

    let interrupt = InterruptWatch::install();
    let crawler = Crawler::new(CrawlConfig::from(&config))?;
    let result = crawler
        .crawl_with_cancellation(&seed, interrupt.token())
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result_json(&result))?);
    } else {
        print!("{}", crawl_report(&result));
    }

    Ok(())
}

async fn cmd_extract(args: &CrawlArgs, out: Option<PathBuf>) -> Result<()> {
    let config = args.apply(load_config()?);
    let seed = seed_url(args)?;

    let mut extract_config = ExtractConfig::from(&config);
    if let Some(out) = out {
        extract_config.output = out;
    }

    let interrupt = InterruptWatch::install();
    let summary = extract_site(&seed, &config, &extract_config, interrupt.token()).await?;

    println!();
    println!("  Pages crawled:   {}", summary.pages);
    match &summary.output {
        Some(path) => {
            println!("  Records written: {}", summary.written);
            println!("  Skipped (empty): {}", summary.skipped);
            println!("  Output:          {}", path.display());
        }
        None => println!("  Records written: none"),
    }
    println!("  Time:            {:.1}s", summary.elapsed.as_secs_f64());
    if summary.interrupted {
        println!();
        println!("Interrupted; the output above is partial.");
    }
    println!();

    Ok(())
}

/// Counts reported by `sitecrawl extract`.
#[derive(Debug)]
struct ExtractSummary {
    pages: usize,
    written: usize,
    skipped: usize,
    interrupted: bool,
    /// `None` when the run was interrupted before extraction began.
    output: Option<PathBuf>,
    elapsed: Duration,
}

/// Crawl `seed`, extract every visited page and write the pages that have
/// text to `extract_config.output`.
///
/// If `cancel` fires during the crawl nothing is extracted or written; if it
/// fires during extraction the records finished so far are written.
async fn extract_site(
    seed: &str,
    config: &AppConfig,
    extract_config: &ExtractConfig,
    cancel: CancellationToken,
) -> Result<ExtractSummary> {
    let started = Instant::now();

    let crawler = Crawler::new(CrawlConfig::from(config))?;
    let crawl = crawler.crawl_with_cancellation(seed, cancel.clone()).await?;

    if cancel.is_cancelled() {
        return Ok(ExtractSummary {
            pages: crawl.len(),
            written: 0,
            skipped: 0,
            interrupted: true,
            output: None,
            elapsed: started.elapsed(),
        });
    }
    info!(pages = crawl.len(), "crawl finished, extracting text");

    let extractor = TextExtractor::new(extract_config)?;
    let extraction = extractor
        .extract_all_with_cancellation(crawl.visited.iter().cloned(), cancel)
        .await;

    let mut sink = JsonlSink::create(&extract_config.output)?;
    let written = write_records(&mut sink, &extraction.records)?;

    Ok(ExtractSummary {
        pages: crawl.len(),
        written,
        skipped: extraction.skipped,
        interrupted: extraction.cancelled,
        output: Some(sink.path().to_path_buf()),
        elapsed: started.elapsed(),
    })
}

/// Cancels a token on Ctrl-C while alive.
///
/// Once the handler is installed SIGINT no longer terminates the process, so
/// one watch has to span every cancellable stage of a command.
struct InterruptWatch {
    cancel: CancellationToken,
    watcher: JoinHandle<()>,
}

impl InterruptWatch {
    fn install() -> Self {
        let cancel = CancellationToken::new();
        let on_interrupt = cancel.clone();
        let watcher = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, stopping");
                on_interrupt.cancel();
            }
        });
        Self { cancel, watcher }
    }

    fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Drop for InterruptWatch {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

/// Use the URL argument, or ask for one on stdin.
fn seed_url(args: &CrawlArgs) -> Result<String> {
    if let Some(url) = &args.url {
        return Ok(url.trim().to_string());
    }

    print!("Enter the starting website URL (e.g., https://example.com): ");
    std::io::stdout().flush()?;

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let url = line.trim();
    if url.is_empty() {
        return Err(eyre!("no starting URL given"));
    }
    Ok(url.to_string())
}

/// Plain-text crawl output: the total, then one URL per line in sorted order.
fn crawl_report(result: &CrawlResult) -> String {
    let mut out = String::new();
    out.push('\n');
    out.push_str(&format!("Total links found: {}\n", result.len()));
    for url in result.urls() {
        out.push_str(url);
        out.push('\n');
    }
    if !result.failures.is_empty() {
        out.push_str(&format!("\nFailed to fetch {} page(s):\n", result.failures.len()));
        for failure in &result.failures {
            out.push_str(&format!("  {}: {}\n", failure.url, failure.kind));
        }
    }
    if result.cancelled {
        out.push_str("\nCrawl stopped early; the list above is partial.\n");
    }
    out
}

fn result_json(result: &CrawlResult) -> serde_json::Value {
    let failures: Vec<serde_json::Value> = result
        .failures
        .iter()
        .map(|f| {
            serde_json::json!({
                "url": f.url.as_str(),
                "error": f.kind.to_string(),
            })
        })
        .collect();

    serde_json::json!({
        "seed": result.seed.as_str(),
        "host": result.host,
        "total": result.len(),
        "visited": result.urls().collect::<Vec<_>>(),
        "failures": failures,
        "dropped_links": result.dropped_links,
        "cancelled": result.cancelled,
        "duration_ms": result.duration.as_millis() as u64,
    })
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
