//! Application configuration for sitecrawl.
//!
//! User config lives at `~/.sitecrawl/sitecrawl.toml`.
//! CLI flags override config file values, which override defaults.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SiteCrawlError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "sitecrawl.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".sitecrawl";

// ---------------------------------------------------------------------------
// Config structs (matching sitecrawl.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Crawl engine settings.
    #[serde(default)]
    pub crawl: CrawlSection,

    /// Text extraction settings.
    #[serde(default)]
    pub extract: ExtractSection,
}

/// Order in which the frontier hands out pending URLs.
///
/// The final visited set is the same for every order; only the sequence of
/// fetches (and therefore the crawl log) differs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrontierOrder {
    /// First admitted, first fetched (breadth-first).
    #[default]
    Fifo,
    /// Last admitted, first fetched (depth-first).
    Lifo,
}

impl FromStr for FrontierOrder {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fifo" => Ok(Self::Fifo),
            "lifo" => Ok(Self::Lifo),
            other => Err(format!(
                "unknown frontier order '{other}': expected 'fifo' or 'lifo'"
            )),
        }
    }
}

impl fmt::Display for FrontierOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fifo => f.write_str("fifo"),
            Self::Lifo => f.write_str("lifo"),
        }
    }
}

/// `[crawl]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlSection {
    /// Maximum number of fetches in flight.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// User-Agent header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Frontier order.
    #[serde(default)]
    pub order: FrontierOrder,

    /// Whole-crawl deadline in seconds. Unset means no deadline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_secs: Option<u64>,
}

impl Default for CrawlSection {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            order: FrontierOrder::default(),
            deadline_secs: None,
        }
    }
}

/// `[extract]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractSection {
    /// Maximum number of concurrent text extractions.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Default JSON Lines output file for extracted records.
    #[serde(default = "default_output")]
    pub output: String,
}

impl Default for ExtractSection {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            output: default_output(),
        }
    }
}

fn default_concurrency() -> usize {
    4
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    concat!("sitecrawl/", env!("CARGO_PKG_VERSION")).into()
}
fn default_output() -> String {
    "records.jsonl".into()
}

// ---------------------------------------------------------------------------
// Runtime configs (merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime crawl configuration — merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Maximum concurrent fetches. `1` gives the strictly sequential crawl.
    pub concurrency: usize,
    /// Per-request timeout.
    pub timeout: Duration,
    /// User-Agent header value.
    pub user_agent: String,
    /// Frontier order.
    pub order: FrontierOrder,
    /// Optional whole-crawl deadline.
    pub deadline: Option<Duration>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for CrawlConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            concurrency: config.crawl.concurrency.max(1),
            timeout: Duration::from_secs(config.crawl.timeout_secs),
            user_agent: config.crawl.user_agent.clone(),
            order: config.crawl.order,
            deadline: config.crawl.deadline_secs.map(Duration::from_secs),
        }
    }
}

/// Runtime text-extraction configuration.
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// Maximum concurrent extractions.
    pub concurrency: usize,
    /// Per-request timeout.
    pub timeout: Duration,
    /// User-Agent header value.
    pub user_agent: String,
    /// Output file for JSON Lines records.
    pub output: PathBuf,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for ExtractConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            concurrency: config.extract.concurrency.max(1),
            timeout: Duration::from_secs(config.crawl.timeout_secs),
            user_agent: config.crawl.user_agent.clone(),
            output: PathBuf::from(&config.extract.output),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.sitecrawl/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SiteCrawlError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.sitecrawl/sitecrawl.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SiteCrawlError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        SiteCrawlError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| SiteCrawlError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| SiteCrawlError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SiteCrawlError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
