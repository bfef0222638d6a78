use std::time::Duration;

use crate::rate_limit::RateLimiter;
use crate::retry::RetryConfig;

/// Default E-utilities endpoint root
pub const DEFAULT_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// Output version requested from esummary/efetch when the caller gives none
pub const DEFAULT_FORMAT_VERSION: &str = "2.0";

/// Configuration shared by the session client and its transport
///
/// Nothing here is read from the environment; callers decide where the key
/// and endpoint come from.
///
/// # Example
///
/// ```
/// use eutils_session::ClientConfig;
///
/// let config = ClientConfig::new()
///     .with_api_key("your_api_key_here")
///     .with_email("researcher@university.edu")
///     .with_default_format_version("1.0");
///
/// assert_eq!(config.effective_rate_limit(), 10.0);
/// ```
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// NCBI API key, sent as `api_key` on every request
    pub api_key: Option<String>,
    /// Endpoint root; `esearch.fcgi` and friends are appended to it
    pub base_url: Option<String>,
    /// Version used by retrieval calls that do not name one
    pub default_format_version: String,
    /// Contact address; User-Agent only, never sent as an `email` parameter
    pub email: Option<String>,
    /// Tool name; User-Agent only, never sent as a `tool` parameter
    pub tool: Option<String>,
    /// Requests per second; derived from the API key when unset
    pub rate_limit: Option<f64>,
    /// Per-request HTTP timeout
    pub timeout: Duration,
    /// Explicit user agent, overriding the derived one
    pub user_agent: Option<String>,
    /// Backoff policy for transient transport failures
    pub retry_config: RetryConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            default_format_version: DEFAULT_FORMAT_VERSION.to_string(),
            email: None,
            tool: None,
            rate_limit: None,
            timeout: Duration::from_secs(30),
            user_agent: None,
            retry_config: RetryConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_key<S: Into<String>>(mut self, api_key: S) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_default_format_version<S: Into<String>>(mut self, version: S) -> Self {
        self.default_format_version = version.into();
        self
    }

    pub fn with_email<S: Into<String>>(mut self, email: S) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_tool<S: Into<String>>(mut self, tool: S) -> Self {
        self.tool = Some(tool.into());
        self
    }

    pub fn with_rate_limit(mut self, rate: f64) -> Self {
        self.rate_limit = Some(rate);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    /// Endpoint root without a trailing slash
    pub fn effective_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
    }

    /// Explicit rate, else NCBI's budget for keyed or anonymous access
    pub fn effective_rate_limit(&self) -> f64 {
        match (self.rate_limit, &self.api_key) {
            (Some(rate), _) => rate,
            (None, Some(_)) => 10.0,
            (None, None) => 3.0,
        }
    }

    pub fn effective_tool(&self) -> &str {
        self.tool.as_deref().unwrap_or("eutils-session")
    }

    pub fn effective_user_agent(&self) -> String {
        if let Some(user_agent) = &self.user_agent {
            return user_agent.clone();
        }

        let mut user_agent = format!(
            "{}/{} ({})",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            self.effective_tool()
        );
        if let Some(email) = &self.email {
            user_agent.push_str(&format!("; mailto:{}", email));
        }
        user_agent
    }

    /// `api_key=<key>` when a key is configured
    pub(crate) fn api_key_param(&self) -> Option<String> {
        self.api_key
            .as_deref()
            .map(|key| format!("api_key={}", urlencoding::encode(key)))
    }

    pub fn create_rate_limiter(&self) -> RateLimiter {
        RateLimiter::new(self.effective_rate_limit())
    }
}
