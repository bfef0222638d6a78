use std::fmt::Display;

use tracing::{debug, info, instrument, warn};

use crate::config::ClientConfig;
use crate::error::{EutilsError, Result};
use crate::eutils::models::{
    PostOutcome, QuerySpec, ResultRequest, RetMode, SearchOutcome, SessionToken,
};
use crate::eutils::parser::parse_history_reply;
use crate::transport::UrlReader;

/// Record cap appended to JSON retrievals; E-utilities refuses unbounded JSON
pub const JSON_RETMAX: u32 = 500;

/// Client for E-utilities history-server sessions
///
/// Builds esearch, epost, esummary and efetch requests, hands them to the
/// injected [`UrlReader`] and parses the `WebEnv`/`QueryKey` pair out of the
/// replies. The client keeps no state between calls; the session lives on
/// the server and is identified by the returned [`SessionToken`].
///
/// # Example
///
/// ```no_run
/// use eutils_session::{ClientConfig, ResultRequest, SessionQueryClient, ThrottledUrlReader};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = ClientConfig::new().with_api_key("your_api_key_here");
///     let reader = ThrottledUrlReader::with_config(&config)?;
///     let client = SessionQueryClient::new(config, reader);
///
///     let outcome = client
///         .search_and_retrieve("pubmed", "foxo[TITLE]", &ResultRequest::summary())
///         .await?;
///     println!("{} matches", outcome.count);
///     Ok(())
/// }
/// ```
#[derive(Clone, Debug)]
pub struct SessionQueryClient<R> {
    config: ClientConfig,
    reader: R,
}

impl<R: UrlReader> SessionQueryClient<R> {
    pub fn new(config: ClientConfig, reader: R) -> Self {
        Self { config, reader }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    /// `<base>/esearch.fcgi?&api_key=<key>&usehistory=y&db=<db>&term=<query>&retmode=xml`
    ///
    /// The query is inserted as given, except that spaces become `+`.
    pub fn search_url(&self, database: &str, query: &str) -> String {
        format!(
            "{}&usehistory=y&db={}&term={}&retmode=xml",
            self.endpoint_with_key("esearch.fcgi"),
            database,
            query.replace(' ', "+")
        )
    }

    pub fn post_url(&self) -> String {
        format!("{}/epost.fcgi", self.config.effective_base_url())
    }

    /// `api_key=<key>&db=<db>&id=<id>,<id>,...`
    ///
    /// Identifiers are stringified and trimmed; order is preserved.
    pub fn post_body<T: Display>(&self, database: &str, identifiers: &[T]) -> Result<String> {
        if identifiers.is_empty() {
            return Err(EutilsError::InvalidArguments(
                "identifier list cannot be empty for epost".to_string(),
            ));
        }

        let ids = identifiers
            .iter()
            .map(|id| id.to_string().trim().to_string())
            .collect::<Vec<_>>()
            .join(",");

        let mut params = Vec::with_capacity(3);
        params.extend(self.config.api_key_param());
        params.push(format!("db={}", database));
        params.push(format!("id={}", ids));
        Ok(params.join("&"))
    }

    /// esummary/efetch URL reading the result set behind `token`
    ///
    /// JSON requests carry `retmax=500`; other formats never do.
    pub fn retrieve_url(
        &self,
        database: &str,
        token: &SessionToken,
        request: &ResultRequest,
    ) -> String {
        let version = request
            .version
            .as_deref()
            .unwrap_or(&self.config.default_format_version);

        let mut url = format!(
            "{}{}&db={}&retmode={}&version={}",
            self.endpoint_with_key(request.operation.endpoint()),
            token.to_url_params(),
            database,
            request.format,
            version
        );
        if request.format == RetMode::Json {
            url.push_str(&format!("&retmax={}", JSON_RETMAX));
        }
        url
    }

    /// Run a search with history enabled
    ///
    /// Returns the total number of matches and the token for the stored
    /// result set.
    ///
    /// # Errors
    ///
    /// * `EutilsError::Parse` - the reply lacks `Count`, `QueryKey` or `WebEnv`
    /// * `EutilsError::Transport` / `EutilsError::Api` - propagated from the reader
    #[instrument(skip(self), fields(database = %database, query = %query))]
    pub async fn search(&self, database: &str, query: &str) -> Result<(u64, SessionToken)> {
        let url = self.search_url(database, query);
        debug!(url = %url, "ESearch URL");

        let output = self.reader.read_url(&url, None, true).await?;
        debug!(output_len = output.len(), "ESearch reply received");

        let reply = parse_history_reply(&output)?;
        let count = reply.count()?;
        let token = reply.session_token()?;

        info!(count = count, query_key = %token.query_key, "Search stored on history server");
        Ok((count, token))
    }

    /// Upload identifiers to the history server
    ///
    /// The identifiers travel in a POST body, so long lists do not run into
    /// URL length limits.
    ///
    /// # Errors
    ///
    /// * `EutilsError::InvalidArguments` - `identifiers` is empty; nothing is sent
    /// * `EutilsError::Parse` - the reply lacks `QueryKey` or `WebEnv`
    #[instrument(skip(self, identifiers), fields(database = %database, ids_count = identifiers.len()))]
    pub async fn post_identifiers<T: Display + Sync>(
        &self,
        database: &str,
        identifiers: &[T],
    ) -> Result<SessionToken> {
        let params = match self.post_body(database, identifiers) {
            Ok(params) => params,
            Err(err) => {
                warn!("Refusing to post an empty identifier list");
                return Err(err);
            }
        };

        let url = self.post_url();
        debug!(url = %url, params = %params, "EPost request");

        let output = self.reader.read_url(&url, Some(&params), false).await?;
        debug!(output_len = output.len(), "EPost reply received");

        let token = parse_history_reply(&output)?.session_token()?;

        info!(query_key = %token.query_key, "Identifiers posted to history server");
        Ok(token)
    }

    /// Read summaries or full records for a stored result set
    ///
    /// Returns the body exactly as the server sent it.
    #[instrument(skip(self, token), fields(database = %database, operation = %request.operation, format = %request.format))]
    pub async fn retrieve(
        &self,
        database: &str,
        token: &SessionToken,
        request: &ResultRequest,
    ) -> Result<String> {
        let url = self.retrieve_url(database, token, request);
        debug!(url = %url, "Summary/fetch URL");

        let output = self.reader.read_url(&url, None, true).await?;

        info!(output_len = output.len(), "Retrieved results from history server");
        Ok(output)
    }

    /// [`retrieve`](Self::retrieve) with the operation and format given by name
    ///
    /// # Errors
    ///
    /// * `EutilsError::InvalidOperation` - `operation` is not `summary` or `fetch`
    /// * `EutilsError::InvalidArguments` - `format` is not `xml`, `json` or `text`
    ///
    /// Neither sends a request.
    pub async fn retrieve_by_name(
        &self,
        database: &str,
        token: &SessionToken,
        operation: &str,
        format: &str,
        version: Option<&str>,
    ) -> Result<String> {
        let request = ResultRequest::parse(operation, format, version)?;
        self.retrieve(database, token, &request).await
    }

    /// Search, then read the results
    pub async fn search_and_retrieve(
        &self,
        database: &str,
        query: &str,
        request: &ResultRequest,
    ) -> Result<SearchOutcome> {
        let (count, token) = self.search(database, query).await?;
        let output = self.retrieve(database, &token, request).await?;
        Ok(SearchOutcome {
            count,
            output,
            token,
        })
    }

    /// Post identifiers, then read their records
    pub async fn post_and_retrieve<T: Display + Sync>(
        &self,
        database: &str,
        identifiers: &[T],
        request: &ResultRequest,
    ) -> Result<PostOutcome> {
        let token = self.post_identifiers(database, identifiers).await?;
        let output = self.retrieve(database, &token, request).await?;
        Ok(PostOutcome { output, token })
    }

    /// Open a session from a [`QuerySpec`]
    ///
    /// Posts the identifiers when the spec carries any, otherwise runs the
    /// query as a search. The count is only known for searches.
    pub async fn open_session(&self, spec: &QuerySpec) -> Result<(Option<u64>, SessionToken)> {
        match &spec.identifiers {
            Some(identifiers) => {
                let token = self.post_identifiers(&spec.database, identifiers.as_slice()).await?;
                Ok((None, token))
            }
            None => {
                let (count, token) = self.search(&spec.database, &spec.query).await?;
                Ok((Some(count), token))
            }
        }
    }

    fn endpoint_with_key(&self, endpoint: &str) -> String {
        let mut url = format!("{}/{}?", self.config.effective_base_url(), endpoint);
        if let Some(param) = self.config.api_key_param() {
            url.push('&');
            url.push_str(&param);
        }
        url
    }
}
