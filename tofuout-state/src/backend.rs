//! State fetcher trait

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{StateError, StateResult};

/// Trait for state storage backends
///
/// A fetcher reads the raw JSON document (plain state or encrypted envelope)
/// and releases whatever handle it opened before returning, on success and on
/// every error path.
#[async_trait]
pub trait StateFetcher: Send + Sync {
    /// Fetch the raw state document
    async fn fetch_state(&self) -> StateResult<Value>;

    /// Where the state is read from, for logs and error messages
    ///
    /// Never includes credentials.
    fn describe(&self) -> String;
}

/// Parse fetched state text as JSON
pub(crate) fn parse_state_text(text: &str, source: &str) -> StateResult<Value> {
    serde_json::from_str(text)
        .map_err(|e| StateError::format(format!("invalid JSON in {}: {}", source, e)))
}

/// Parse fetched state bytes, which must be UTF-8 JSON
pub(crate) fn parse_state_bytes(bytes: &[u8], source: &str) -> StateResult<Value> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| StateError::format(format!("{} is not valid UTF-8: {}", source, e)))?;
    parse_state_text(text, source)
}
