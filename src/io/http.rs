use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, RequestBuilder, Response, StatusCode, header};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use super::ReadAt;
use crate::error::{Result, ZipError};

/// Connection settings for [`HttpRangeReader`]
#[derive(Debug, Clone)]
pub struct HttpOptions {
    /// Per-request timeout
    pub timeout: Duration,
    /// Attempts made on timeouts and connection failures before giving up
    pub max_retry: u32,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retry: 10,
        }
    }
}

/// What the reader knows about the remote resource
#[derive(Debug, Clone, Default)]
struct RemoteState {
    size: u64,
    etag: Option<String>,
    last_modified: Option<String>,
}

impl RemoteState {
    /// Attach `If-Match` (preferred) or `If-Unmodified-Since` so a changed
    /// resource is answered with 412 instead of bytes from a new version.
    fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        if let Some(etag) = &self.etag {
            request.header(header::IF_MATCH, etag)
        } else if let Some(last_modified) = &self.last_modified {
            request.header(header::IF_UNMODIFIED_SINCE, last_modified)
        } else {
            request
        }
    }

    fn learn(&mut self, resp: &Response) {
        if self.etag.is_none() && self.last_modified.is_none() {
            self.etag = header_string(resp, header::ETAG);
            self.last_modified = header_string(resp, header::LAST_MODIFIED);
        }
    }
}

fn header_string(resp: &Response, name: header::HeaderName) -> Option<String> {
    resp.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// HTTP Range reader for remote ZIP files
pub struct HttpRangeReader {
    client: Client,
    url: String,
    state: RwLock<RemoteState>,
    transferred_bytes: AtomicU64,
    max_retry: u32,
}

impl HttpRangeReader {
    /// Create a new HTTP Range reader
    ///
    /// This will send a HEAD request to verify Range support and get file size
    pub async fn new(url: String) -> Result<Self> {
        Self::with_options(url, HttpOptions::default()).await
    }

    pub async fn with_options(url: String, options: HttpOptions) -> Result<Self> {
        let client = Client::builder().timeout(options.timeout).build()?;
        let state = probe(&client, &url).await?;
        debug!(url = %url, size = state.size, etag = ?state.etag, "opened remote archive");

        Ok(Self {
            client,
            url,
            state: RwLock::new(state),
            transferred_bytes: AtomicU64::new(0),
            max_retry: options.max_retry.max(1),
        })
    }

    /// Get total bytes transferred from network
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.load(Ordering::Relaxed)
    }
}

/// Send a HEAD request to learn size, Range support and validators.
async fn probe(client: &Client, url: &str) -> Result<RemoteState> {
    let resp = client.head(url).send().await?;

    if !resp.status().is_success() {
        return Err(ZipError::HttpStatus(resp.status().as_u16()));
    }

    // Check if server supports Range requests
    let accept_ranges = resp
        .headers()
        .get(header::ACCEPT_RANGES)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("none");

    if !accept_ranges.contains("bytes") {
        return Err(ZipError::Remote(
            "Remote server does not support Range requests".to_string(),
        ));
    }

    // Get file size from Content-Length
    let size = resp
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| ZipError::Remote("Remote server did not return Content-Length".to_string()))?;

    Ok(RemoteState {
        size,
        etag: header_string(&resp, header::ETAG),
        last_modified: header_string(&resp, header::LAST_MODIFIED),
    })
}

#[async_trait]
impl ReadAt for HttpRangeReader {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let state = self.state.read().clone();
        if buf.is_empty() || offset >= state.size {
            return Ok(0);
        }

        let end = (offset + buf.len() as u64 - 1).min(state.size - 1);
        let expected_size = (end - offset + 1) as usize;
        let range = format!("bytes={}-{}", offset, end);

        let mut retry_count = 0;
        let resp = loop {
            let request = self
                .client
                .get(&self.url)
                .header(header::RANGE, &range)
                .header(header::ACCEPT_ENCODING, "identity");

            match state.apply(request).send().await {
                Ok(resp) => break resp,
                Err(e) if e.is_timeout() || e.is_connect() => {
                    retry_count += 1;
                    if retry_count >= self.max_retry {
                        return Err(e.into());
                    }
                    warn!(
                        "Connection error, retry {}/{}: {}",
                        retry_count, self.max_retry, e
                    );
                    tokio::time::sleep(Duration::from_millis(500 * retry_count as u64)).await;
                }
                Err(e) => return Err(e.into()),
            }
        };

        match resp.status() {
            StatusCode::PARTIAL_CONTENT => {}
            StatusCode::PRECONDITION_FAILED => return Err(ZipError::PreconditionFailed),
            status => return Err(ZipError::HttpStatus(status.as_u16())),
        }
        self.state.write().learn(&resp);

        let bytes = resp.bytes().await?;
        if bytes.len() < expected_size {
            return Err(ZipError::SizeMismatch {
                expected: expected_size,
                actual: bytes.len(),
            });
        }
        // Servers may ignore the upper bound; keep only what was asked for
        buf[..expected_size].copy_from_slice(&bytes[..expected_size]);

        self.transferred_bytes
            .fetch_add(expected_size as u64, Ordering::Relaxed);
        Ok(expected_size)
    }

    fn size(&self) -> u64 {
        self.state.read().size
    }

    async fn refresh(&self) -> Result<()> {
        let state = probe(&self.client, &self.url).await?;
        debug!(url = %self.url, size = state.size, etag = ?state.etag, "refreshed remote archive");
        *self.state.write() = state;
        Ok(())
    }
}
