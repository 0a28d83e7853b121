//! Record types handed from the crawl pipeline to downstream consumers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

// ---------------------------------------------------------------------------
// PageRecord
// ---------------------------------------------------------------------------

/// Metadata attached to every extracted page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageMetadata {
    /// Canonical URL the content was extracted from.
    pub url: Url,
    /// Contents of the `<title>` element, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// When the page was fetched for extraction.
    pub fetched_at: DateTime<Utc>,
}

/// A `{content, metadata}` record, the unit consumed by indexers.
///
/// `content` is empty when the page could not be fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    /// Plain text of the page.
    pub content: String,
    /// Where the text came from.
    pub metadata: PageMetadata,
}

impl PageRecord {
    /// Whether extraction produced any text.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}
