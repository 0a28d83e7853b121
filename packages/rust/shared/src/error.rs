//! Error types for sitecrawl.
//!
//! Library crates use [`SiteCrawlError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Per-page crawl failures (unreachable pages, malformed links) are *not*
//! represented here: they are recorded by the crawler and never propagate.
//! Broken markup is not an error either; the HTML5 parser recovers from it.

use std::path::PathBuf;

/// Top-level error type for all sitecrawl operations.
#[derive(Debug, thiserror::Error)]
pub enum SiteCrawlError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// The seed URL cannot start a crawl (unparseable or not http/https).
    #[error("invalid seed URL '{url}': {reason}")]
    InvalidSeed { url: String, reason: String },

    /// Network/HTTP setup error (client construction and the like).
    #[error("network error: {0}")]
    Network(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Record serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SiteCrawlError>;

impl SiteCrawlError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an invalid-seed error.
    pub fn invalid_seed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSeed {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
