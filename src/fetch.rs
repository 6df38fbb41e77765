//! Subscription feed fetching.

use std::time::Duration;

use reqwest::blocking::Client;
use thiserror::Error;

/// Default timeout for feed downloads in seconds.
const DEFAULT_TIMEOUT: u64 = 30;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("feed returned an empty body")]
    EmptyBody,
}

/// Pluggable feed downloader. The orchestrator only needs
/// `fetch(url) -> body or error`; tests substitute canned bodies.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// HTTP fetcher used in production.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT))
            .user_agent(concat!("subfresh/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(HttpFetcher { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).send()?.error_for_status()?;
        let body = response.text()?;
        if body.trim().is_empty() {
            return Err(FetchError::EmptyBody);
        }
        Ok(body)
    }
}
