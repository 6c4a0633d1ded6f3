//! Connection settings for the HTTP directory client.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for [`HttpDirectoryClient`](crate::HttpDirectoryClient).
///
/// Fields with defaults can be omitted when loading from a file or
/// environment variables.
#[derive(Clone, Serialize, Deserialize)]
pub struct HttpDirectoryConfig {
    /// Base URL of the directory API, including the version segment
    /// (e.g., "https://directory.example.com/api/4.0").
    base_url: String,
    /// API client id used to log in.
    client_id: String,
    /// API client secret used to log in.
    client_secret: String,
    /// Per-request timeout in seconds.
    /// Default: 30
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,
    /// Members requested per page when listing users.
    /// Default: 100
    #[serde(default = "default_page_size")]
    page_size: u32,
    /// Upper bound on pages fetched for one listing before it is reported as truncated.
    /// Default: 1000
    #[serde(default = "default_max_pages")]
    max_pages: u32,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_page_size() -> u32 {
    100
}

fn default_max_pages() -> u32 {
    1000
}

impl HttpDirectoryConfig {
    /// Creates a configuration with defaults for optional fields.
    #[must_use]
    pub fn new(base_url: String, client_id: String, client_secret: String) -> Self {
        Self {
            base_url,
            client_id,
            client_secret,
            timeout_secs: default_timeout_secs(),
            page_size: default_page_size(),
            max_pages: default_max_pages(),
        }
    }

    /// Sets the listing page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Sets the maximum number of pages per listing.
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Returns the base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Returns the API client id.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Returns the API client secret.
    #[must_use]
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    /// Returns the request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Returns the listing page size.
    #[must_use]
    pub fn page_size(&self) -> u32 {
        self.page_size.max(1)
    }

    /// Returns the maximum number of pages per listing.
    #[must_use]
    pub fn max_pages(&self) -> u32 {
        self.max_pages.max(1)
    }
}

impl std::fmt::Debug for HttpDirectoryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpDirectoryConfig")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .field("page_size", &self.page_size)
            .field("max_pages", &self.max_pages)
            .finish()
    }
}
