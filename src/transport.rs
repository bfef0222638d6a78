//! HTTP transport seam
//!
//! [`SessionQueryClient`](crate::SessionQueryClient) never talks to the
//! network itself; it hands fully built URLs to a [`UrlReader`]. Throttling,
//! retries and connection reuse are the reader's business.
//! [`ThrottledUrlReader`] is the production implementation on top of reqwest.

use std::future::Future;
use std::sync::Arc;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use tracing::{debug, info, instrument, warn};

use crate::config::ClientConfig;
use crate::error::{EutilsError, Result};
use crate::rate_limit::RateLimiter;
use crate::retry::{RetryConfig, with_retry};

/// Reads the body behind a URL
///
/// Performs a GET when `params` is `None` or `use_get` is true, appending
/// `params` to the query string if present. Otherwise performs a POST with
/// `params` as a form-encoded request body.
pub trait UrlReader: Send + Sync {
    fn read_url(
        &self,
        url: &str,
        params: Option<&str>,
        use_get: bool,
    ) -> impl Future<Output = Result<String>> + Send;
}

impl<R: UrlReader> UrlReader for Arc<R> {
    fn read_url(
        &self,
        url: &str,
        params: Option<&str>,
        use_get: bool,
    ) -> impl Future<Output = Result<String>> + Send {
        (**self).read_url(url, params, use_get)
    }
}

impl<R: UrlReader> UrlReader for &R {
    fn read_url(
        &self,
        url: &str,
        params: Option<&str>,
        use_get: bool,
    ) -> impl Future<Output = Result<String>> + Send {
        (**self).read_url(url, params, use_get)
    }
}

/// Rate limited, retrying reader backed by reqwest
///
/// Clones share the HTTP connection pool and the rate limit budget.
///
/// # Example
///
/// ```no_run
/// use eutils_session::{ClientConfig, ThrottledUrlReader, UrlReader};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let reader = ThrottledUrlReader::with_config(&ClientConfig::new())?;
///     let body = reader
///         .read_url("https://eutils.ncbi.nlm.nih.gov/entrez/eutils/einfo.fcgi", None, true)
///         .await?;
///     println!("{}", body.len());
///     Ok(())
/// }
/// ```
#[derive(Clone, Debug)]
pub struct ThrottledUrlReader {
    client: Client,
    rate_limiter: RateLimiter,
    retry_config: RetryConfig,
}

impl ThrottledUrlReader {
    /// Reader with default configuration (3 requests/second, 3 retries)
    pub fn new() -> Result<Self> {
        Self::with_config(&ClientConfig::new())
    }

    /// Reader whose timeout, user agent, rate and retry policy come from `config`
    pub fn with_config(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.effective_user_agent())
            .timeout(config.timeout)
            .build()?;

        Ok(Self::with_client(client, config))
    }

    /// Reader around a caller supplied reqwest client
    ///
    /// Only the rate limit and retry policy are taken from `config`.
    pub fn with_client(client: Client, config: &ClientConfig) -> Self {
        Self {
            client,
            rate_limiter: config.create_rate_limiter(),
            retry_config: config.retry_config.clone(),
        }
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// One attempt: wait for a token, send, and read the whole body
    ///
    /// A timeout while reading the body fails this attempt only.
    async fn send_once(&self, url: &str, body: Option<&str>) -> Result<String> {
        self.rate_limiter.acquire().await?;

        let request = match body {
            Some(body) => {
                debug!(url = %url, body = %body, "Sending POST request");
                self.client
                    .post(url)
                    .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(body.to_string())
            }
            None => {
                debug!(url = %url, "Sending GET request");
                self.client.get(url)
            }
        };

        let response = request.send().await?;

        // Whether this is retried is decided by EutilsError::is_retryable
        if !response.status().is_success() {
            warn!(status = %response.status(), "Request failed");
            return Err(status_error(&response));
        }

        Ok(response.text().await?)
    }
}

impl UrlReader for ThrottledUrlReader {
    #[instrument(skip(self, params))]
    async fn read_url(&self, url: &str, params: Option<&str>, use_get: bool) -> Result<String> {
        let (target, body) = match params {
            Some(params) if !use_get => (url.to_string(), Some(params)),
            Some(params) if !params.is_empty() => (append_query(url, params), None),
            _ => (url.to_string(), None),
        };

        let text = with_retry(
            || self.send_once(&target, body),
            &self.retry_config,
            "E-utilities request",
        )
        .await?;

        info!(bytes = text.len(), "Read response body");
        Ok(text)
    }
}

fn append_query(url: &str, params: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}{}", url, separator, params.trim_start_matches('&'))
}

fn status_error(response: &Response) -> EutilsError {
    let status = response.status();
    EutilsError::Api {
        status: status.as_u16(),
        message: status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string(),
    }
}
