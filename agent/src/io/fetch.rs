//! HTTP GET for `HTTP_REQUEST_GET` and `GOOGLE_SEARCH` steps.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use tracing::{debug, instrument};

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const MAX_RESPONSE_BYTES: usize = 5 * 1024 * 1024;

/// Raw response from a GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchedPage {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Abstraction over the network so the interpreter can be tested offline.
pub trait Fetcher {
    fn get(&self, url: &str) -> Result<FetchedPage>;
}

/// Blocking reqwest-backed fetcher.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .context("build http client")?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    #[instrument(skip(self))]
    fn get(&self, url: &str) -> Result<FetchedPage> {
        let response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("GET {url}"))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .with_context(|| format!("read body of {url}"))?;
        if body.len() > MAX_RESPONSE_BYTES {
            anyhow::bail!(
                "response too large: {} bytes (max {})",
                body.len(),
                MAX_RESPONSE_BYTES
            );
        }
        debug!(status, bytes = body.len(), "fetched page");
        Ok(FetchedPage {
            status,
            body: body.to_vec(),
        })
    }
}

/// Render an HTML body as wrapped plain text.
pub fn html_to_text(body: &[u8], width: usize) -> Result<String> {
    html2text::from_read(body, width).context("convert html to text")
}

/// Build the search URL for a `GOOGLE_SEARCH` query.
pub fn search_url(prefix: &str, query: &str) -> String {
    format!("{prefix}{}", urlencoding::encode(query))
}
