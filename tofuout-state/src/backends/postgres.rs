//! PostgreSQL backend
//!
//! Reads the current state row written by OpenTofu's `pg` backend: the `data`
//! column of `<schema>.states` where `name = 'default'`.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::Connection;
use sqlx::postgres::PgConnection;

use crate::backend::{StateFetcher, parse_state_text};
use crate::error::{StateError, StateResult};

/// Workspace whose row holds the current state
const DEFAULT_WORKSPACE: &str = "default";

/// PostgreSQL-based state fetcher
pub struct PostgresFetcher {
    connection_string: String,
    schema: String,
}

impl PostgresFetcher {
    /// The schema must already be a validated identifier
    pub fn new(connection_string: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            schema: schema.into(),
        }
    }

    /// The fixed query reading the current state
    pub fn query(&self) -> String {
        format!(
            "SELECT data FROM {}.states WHERE name = '{}'",
            self.schema, DEFAULT_WORKSPACE
        )
    }

    async fn fetch_with(&self, slot: &mut ConnectionSlot) -> StateResult<Value> {
        let conn = slot.open(&self.connection_string).await?;

        let query = self.query();
        let row: Option<Option<String>> = sqlx::query_scalar(&query)
            .fetch_optional(conn)
            .await
            .map_err(|e| StateError::backend(format!("state query failed: {}", e)))?;

        log::debug!("queried {}", self.describe());
        state_from_row(row)
    }
}

/// Map the `data` column of the `default` row, if any, to the raw state
fn state_from_row(row: Option<Option<String>>) -> StateResult<Value> {
    let data = row
        .ok_or_else(|| StateError::not_found("state not found in database"))?
        .ok_or_else(|| StateError::format("state data in database is null"))?;

    parse_state_text(&data, "database state")
}

#[async_trait]
impl StateFetcher for PostgresFetcher {
    async fn fetch_state(&self) -> StateResult<Value> {
        let mut slot = ConnectionSlot::empty();
        let result = self.fetch_with(&mut slot).await;
        slot.release().await;
        result
    }

    fn describe(&self) -> String {
        format!("postgres:{}.states", self.schema)
    }
}

/// Owned, optional database connection
///
/// Starts empty. `release` closes the connection if one was opened and does
/// nothing otherwise. A slot dropped without `release` (for example when a
/// timeout cancels the fetch) still closes its socket through the connection's
/// own `Drop`.
pub(crate) struct ConnectionSlot {
    conn: Option<PgConnection>,
}

impl ConnectionSlot {
    pub(crate) fn empty() -> Self {
        Self { conn: None }
    }

    #[cfg(test)]
    pub(crate) fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Connect and keep the connection in the slot
    async fn open(&mut self, connection_string: &str) -> StateResult<&mut PgConnection> {
        let conn = PgConnection::connect(connection_string)
            .await
            .map_err(|e| StateError::backend(format!("failed to connect to database: {}", e)))?;
        Ok(self.conn.insert(conn))
    }

    /// Close the connection if one is held
    pub(crate) async fn release(&mut self) {
        if let Some(conn) = self.conn.take()
            && let Err(e) = conn.close().await
        {
            log::warn!("failed to close database connection cleanly: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_query_uses_schema() {
        let fetcher = PostgresFetcher::new("postgres://localhost/db", "terraform_remote_state");
        assert_eq!(
            fetcher.query(),
            "SELECT data FROM terraform_remote_state.states WHERE name = 'default'"
        );
    }

    #[test]
    fn test_describe_hides_connection_string() {
        let fetcher = PostgresFetcher::new("postgres://admin:hunter2@db/tofu", "tofu");
        let described = fetcher.describe();
        assert_eq!(described, "postgres:tofu.states");
        assert!(!described.contains("hunter2"));
    }

    #[test]
    fn test_state_from_row() {
        let state = state_from_row(Some(Some(
            r#"{"outputs":{"db_host":{"value":"10.0.0.5"}}}"#.to_string(),
        )))
        .unwrap();
        assert_eq!(state["outputs"]["db_host"]["value"], "10.0.0.5");
    }

    #[test]
    fn test_state_from_row_without_row() {
        let err = state_from_row(None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.message(), "state not found in database");
    }

    #[test]
    fn test_state_from_row_with_null_data() {
        let err = state_from_row(Some(None)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert_eq!(err.message(), "state data in database is null");
    }

    #[test]
    fn test_state_from_row_with_invalid_json() {
        let err = state_from_row(Some(Some("{bad".to_string()))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[tokio::test]
    async fn test_release_of_empty_slot_is_noop() {
        let mut slot = ConnectionSlot::empty();
        assert!(!slot.is_open());
        slot.release().await;
        slot.release().await;
        assert!(!slot.is_open());
    }

    #[tokio::test]
    async fn test_invalid_connection_string_is_backend_error() {
        let fetcher = PostgresFetcher::new("not a connection string", "tofu");
        let err = fetcher.fetch_state().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Backend);
    }

    #[tokio::test]
    async fn test_failed_connect_leaves_slot_empty() {
        let mut slot = ConnectionSlot::empty();
        // Port 1 on loopback refuses connections.
        let err = match slot.open("postgres://tofu@127.0.0.1:1/tofu").await {
            Ok(_) => panic!("Expected connection failure"),
            Err(e) => e,
        };
        assert_eq!(err.kind(), ErrorKind::Backend);
        assert!(!slot.is_open());
        slot.release().await;
    }
}
