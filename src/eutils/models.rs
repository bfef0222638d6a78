use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{EutilsError, Result};

/// Handle to a result set stored on the E-utilities history server
///
/// Produced by a search or a post and consumed by every retrieval that reads
/// the same result set. The server decides how long it stays valid (in
/// practice about an hour of inactivity).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionToken {
    /// `WebEnv` value
    pub webenv: String,
    /// `QueryKey` value
    pub query_key: String,
}

impl SessionToken {
    pub fn new(webenv: impl Into<String>, query_key: impl Into<String>) -> Self {
        Self {
            webenv: webenv.into(),
            query_key: query_key.into(),
        }
    }

    /// Token coded as URL parameters: `&webenv=<id>&query_key=<key>`
    ///
    /// # Example
    ///
    /// ```
    /// use eutils_session::SessionToken;
    ///
    /// let token = SessionToken::new("MCID_5f3b", "1");
    /// assert_eq!(token.to_url_params(), "&webenv=MCID_5f3b&query_key=1");
    /// ```
    pub fn to_url_params(&self) -> String {
        format!(
            "&webenv={}&query_key={}",
            urlencoding::encode(&self.webenv),
            urlencoding::encode(&self.query_key)
        )
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_url_params())
    }
}

/// Tokens and result count pulled out of an esearch or epost reply
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryReply {
    /// `Count`, present in esearch replies only
    pub count: Option<u64>,
    pub webenv: Option<String>,
    pub query_key: Option<String>,
    /// `ERROR` text reported by the server, if any
    pub error: Option<String>,
}

impl HistoryReply {
    pub fn count(&self) -> Result<u64> {
        self.count
            .ok_or_else(|| self.missing("Count"))
    }

    pub fn session_token(&self) -> Result<SessionToken> {
        let query_key = self.query_key.as_ref().ok_or_else(|| self.missing("QueryKey"))?;
        let webenv = self.webenv.as_ref().ok_or_else(|| self.missing("WebEnv"))?;
        Ok(SessionToken::new(webenv.clone(), query_key.clone()))
    }

    fn missing(&self, element: &str) -> EutilsError {
        match &self.error {
            Some(error) => EutilsError::Parse(format!(
                "reply has no <{}> element; server reported: {}",
                element, error
            )),
            None => EutilsError::Parse(format!("reply has no <{}> element", element)),
        }
    }
}

/// Kind of history-server retrieval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// esummary: document summaries
    Summary,
    /// efetch: full records
    Fetch,
}

impl Operation {
    /// CGI script serving this operation
    pub fn endpoint(&self) -> &'static str {
        match self {
            Operation::Summary => "esummary.fcgi",
            Operation::Fetch => "efetch.fcgi",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Summary => "summary",
            Operation::Fetch => "fetch",
        }
    }
}

impl FromStr for Operation {
    type Err = EutilsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "summary" => Ok(Operation::Summary),
            "fetch" => Ok(Operation::Fetch),
            other => Err(EutilsError::InvalidOperation(other.to_string())),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `retmode` of a retrieval
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetMode {
    Xml,
    #[default]
    Json,
    Text,
}

impl RetMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetMode::Xml => "xml",
            RetMode::Json => "json",
            RetMode::Text => "text",
        }
    }
}

impl FromStr for RetMode {
    type Err = EutilsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "xml" => Ok(RetMode::Xml),
            "json" => Ok(RetMode::Json),
            "text" => Ok(RetMode::Text),
            other => Err(EutilsError::InvalidArguments(format!(
                "unsupported retmode '{}', expected xml, json or text",
                other
            ))),
        }
    }
}

impl fmt::Display for RetMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to read back from the history server, and in which format
///
/// # Example
///
/// ```
/// use eutils_session::{Operation, RetMode, ResultRequest};
///
/// let request = ResultRequest::fetch().with_format(RetMode::Xml).with_version("1.0");
/// assert_eq!(request.operation, Operation::Fetch);
/// assert_eq!(request.version.as_deref(), Some("1.0"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRequest {
    pub operation: Operation,
    pub format: RetMode,
    /// Output version; the client's configured default when `None`
    pub version: Option<String>,
}

impl ResultRequest {
    pub fn new(operation: Operation, format: RetMode) -> Self {
        Self {
            operation,
            format,
            version: None,
        }
    }

    /// esummary as JSON
    pub fn summary() -> Self {
        Self::new(Operation::Summary, RetMode::Json)
    }

    /// efetch as XML
    pub fn fetch() -> Self {
        Self::new(Operation::Fetch, RetMode::Xml)
    }

    /// Build a request from operation and format names
    ///
    /// Fails with `InvalidOperation` for anything but `summary`/`fetch` and
    /// with `InvalidArguments` for an unknown format.
    pub fn parse(operation: &str, format: &str, version: Option<&str>) -> Result<Self> {
        Ok(Self {
            operation: operation.parse()?,
            format: format.parse()?,
            version: version.map(str::to_string),
        })
    }

    pub fn with_format(mut self, format: RetMode) -> Self {
        self.format = format;
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

/// Database and query for a search, or identifiers for a post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySpec {
    /// E-utilities database name, e.g. `pubmed` or `pmc`
    pub database: String,
    pub query: String,
    pub identifiers: Option<Vec<String>>,
}

impl QuerySpec {
    pub fn search(database: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            query: query.into(),
            identifiers: None,
        }
    }

    pub fn post<I, T>(database: impl Into<String>, identifiers: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: fmt::Display,
    {
        Self {
            database: database.into(),
            query: String::new(),
            identifiers: Some(identifiers.into_iter().map(|id| id.to_string()).collect()),
        }
    }
}

/// Result of a search followed by a retrieval
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutcome {
    /// Total number of matching records
    pub count: u64,
    /// Raw esummary/efetch body
    pub output: String,
    pub token: SessionToken,
}

/// Result of a post followed by a retrieval
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostOutcome {
    /// Raw esummary/efetch body
    pub output: String,
    pub token: SessionToken,
}
