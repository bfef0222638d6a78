//! E-utilities history-server sessions
//!
//! Search or post to put a result set on the history server, keep the
//! returned [`SessionToken`], then read the set back as summaries or full
//! records.

pub mod client;
pub mod models;
pub mod parser;

pub use client::{JSON_RETMAX, SessionQueryClient};
pub use models::{
    HistoryReply, Operation, PostOutcome, QuerySpec, ResultRequest, RetMode, SearchOutcome,
    SessionToken,
};
pub use parser::parse_history_reply;
