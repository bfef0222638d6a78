//! # eutils-session
//!
//! Helpers for the NCBI E-utilities history server: run a search or post a
//! list of identifiers, keep the `WebEnv`/`QueryKey` pair the server hands
//! back, and read the stored result set as esummary or efetch output.
//!
//! ## Features
//!
//! - **History sessions**: search, post, retrieve and the two composite calls
//! - **Pluggable transport**: the client only needs a [`UrlReader`]
//! - **Throttled reader**: [`ThrottledUrlReader`] respects NCBI rate limits
//!   and retries transient failures with exponential backoff
//! - **Typed errors**: one [`EutilsError`] for transport, parse and caller errors
//!
//! ## Quick Start
//!
//! ```no_run
//! use eutils_session::{ClientConfig, ResultRequest, RetMode, SessionQueryClient, ThrottledUrlReader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::new().with_email("researcher@university.edu");
//!     let reader = ThrottledUrlReader::with_config(&config)?;
//!     let client = SessionQueryClient::new(config, reader);
//!
//!     // Search and read summaries as JSON
//!     let query = "Aging+Cell[TA]+AND+foxo[TITLE]";
//!     let found = client
//!         .search_and_retrieve("pubmed", query, &ResultRequest::summary())
//!         .await?;
//!     println!("{} matches, session {}", found.count, found.token);
//!
//!     // Post known PMIDs and fetch the full records
//!     let posted = client
//!         .post_and_retrieve(
//!             "pubmed",
//!             &[28440906, 28256074],
//!             &ResultRequest::fetch().with_format(RetMode::Xml),
//!         )
//!         .await?;
//!     let preview: String = posted.output.chars().take(200).collect();
//!     println!("{}", preview);
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod eutils;
pub mod rate_limit;
pub mod retry;
pub mod transport;

// Re-export main types for convenience
pub use config::ClientConfig;
pub use error::{EutilsError, Result};
pub use eutils::{
    HistoryReply, Operation, PostOutcome, QuerySpec, ResultRequest, RetMode, SearchOutcome,
    SessionQueryClient, SessionToken, parse_history_reply,
};
pub use rate_limit::RateLimiter;
pub use retry::{RetryConfig, RetryableError};
pub use transport::{ThrottledUrlReader, UrlReader};
