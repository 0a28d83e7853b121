//! Shared types, error model, and configuration for sitecrawl.
//!
//! This crate is the foundation depended on by all other sitecrawl crates.
//! It provides:
//! - [`SiteCrawlError`] — the unified error type
//! - Record types handed to downstream consumers ([`PageRecord`], [`PageMetadata`])
//! - Configuration ([`AppConfig`], [`CrawlConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CrawlConfig, CrawlSection, ExtractConfig, ExtractSection, FrontierOrder,
    config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{Result, SiteCrawlError};
pub use types::{PageMetadata, PageRecord};
