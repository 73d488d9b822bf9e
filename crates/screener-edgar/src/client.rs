//! HTTP client for the EDGAR archives.

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use screener_core::{ByteStream, Period, Result, ScreenerError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::debug;

/// SEC EDGAR archive root
pub const ARCHIVES_URL: &str = "http://www.sec.gov/Archives/";

/// Default rate limit: 10 requests per second (SEC requirement)
const DEFAULT_RATE_LIMIT: Duration = Duration::from_millis(100);

/// Rate limiter to ensure we don't exceed SEC's rate limits
#[derive(Debug)]
struct RateLimiter {
    last_request: Instant,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval: Duration) -> Self {
        Self {
            last_request: Instant::now() - min_interval,
            min_interval,
        }
    }

    async fn wait(&mut self) {
        let elapsed = self.last_request.elapsed();
        if elapsed < self.min_interval {
            sleep(self.min_interval - elapsed).await;
        }
        self.last_request = Instant::now();
    }
}

/// Client for full-index and XBRL package downloads.
///
/// Every request goes through a shared rate limiter (max 10 requests/second)
/// and carries the configured user agent, which the SEC requires to identify
/// the caller. Clones share the limiter.
#[derive(Debug, Clone)]
pub struct EdgarClient {
    client: reqwest::Client,
    rate_limiter: Arc<Mutex<RateLimiter>>,
    archive_root: String,
}

impl EdgarClient {
    /// Create a new EDGAR client with the specified user agent and network timeout.
    ///
    /// The SEC requires identifying user agent headers. Format should be:
    /// "AppName/Version (contact@email.com)"
    ///
    /// `timeout` bounds connecting and each individual read, not the whole
    /// transfer, so a large body streamed alongside other requests never times
    /// out while data keeps arriving.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()
            .map_err(|e| ScreenerError::Network(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self::with_client(client))
    }

    /// Create a new EDGAR client with a custom HTTP client.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(DEFAULT_RATE_LIMIT))),
            archive_root: ARCHIVES_URL.to_string(),
        }
    }

    /// Point the client at a different archive root (e.g., a mirror or a test server).
    #[must_use]
    pub fn with_archive_root(mut self, root: impl Into<String>) -> Self {
        let mut root = root.into();
        if !root.ends_with('/') {
            root.push('/');
        }
        self.archive_root = root;
        self
    }

    /// Override the minimum interval between requests.
    #[must_use]
    pub fn with_rate_limit(mut self, min_interval: Duration) -> Self {
        self.rate_limiter = Arc::new(Mutex::new(RateLimiter::new(min_interval)));
        self
    }

    /// Returns the archive root, always ending in `/`.
    #[must_use]
    pub fn archive_root(&self) -> &str {
        &self.archive_root
    }

    /// Returns the URL of the XBRL full index for a quarter.
    #[must_use]
    pub fn index_url(&self, period: Period) -> String {
        format!(
            "{}edgar/full-index/{}/QTR{}/xbrl.idx",
            self.archive_root,
            period.year(),
            period.quarter()
        )
    }

    /// Issue a rate-limited GET and require a `200 OK` response.
    ///
    /// # Errors
    /// Returns [`ScreenerError::Network`] on transport failure and
    /// [`ScreenerError::HttpStatus`] on any other status.
    pub async fn get(&self, url: &str) -> Result<Response> {
        self.rate_limiter.lock().await.wait().await;

        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ScreenerError::Network(e.to_string()))?;

        if response.status() != StatusCode::OK {
            return Err(ScreenerError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        Ok(response)
    }

    /// Issue a rate-limited GET and return its body as a [`ByteStream`].
    ///
    /// # Errors
    /// Same as [`EdgarClient::get`].
    pub async fn get_stream(&self, url: &str) -> Result<ResponseBody> {
        self.get(url).await.map(ResponseBody)
    }
}

/// Response body read chunk by chunk as it arrives.
#[derive(Debug)]
pub struct ResponseBody(Response);

#[async_trait]
impl ByteStream for ResponseBody {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        let chunk = self
            .0
            .chunk()
            .await
            .map_err(|e| ScreenerError::Network(e.to_string()))?;
        Ok(chunk.map(|bytes| bytes.to_vec()))
    }
}
