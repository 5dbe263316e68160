//! Output lookup pipeline
//!
//! Validate options, fetch the raw state, decrypt it when a passphrase is
//! configured, and extract one output. The first failing stage ends the lookup
//! with its error unchanged; nothing is retried.

use serde_json::Value;
use std::time::Duration;

use crate::backend::StateFetcher;
use crate::backends::create_fetcher;
use crate::config::{LookupOptions, LookupPlan};
use crate::envelope::decrypt_state;
use crate::error::{StateError, StateResult};
use crate::state::StateDocument;

/// Read a single output value
pub async fn lookup_output(options: &LookupOptions, output_name: &str) -> StateResult<Value> {
    let plan = options.resolve()?;
    OutputLookup::new(plan).run(output_name).await
}

/// A validated lookup, ready to run
#[derive(Debug, Clone)]
pub struct OutputLookup {
    plan: LookupPlan,
}

impl OutputLookup {
    pub fn new(plan: LookupPlan) -> Self {
        Self { plan }
    }

    /// Fetch the state and extract `output_name`
    ///
    /// The timeout covers building the backend client as well as the fetch.
    pub async fn run(&self, output_name: &str) -> StateResult<Value> {
        let backend = &self.plan.backend;
        log::debug!("using {} backend", backend.backend_type());

        let raw = bounded(
            self.plan.timeout,
            || format!("{} backend", backend.backend_type()),
            async { create_fetcher(backend).await.fetch_state().await },
        )
        .await?;

        self.extract(raw, output_name)
    }

    /// Run the lookup against an existing fetcher
    pub async fn run_with(
        &self,
        fetcher: &dyn StateFetcher,
        output_name: &str,
    ) -> StateResult<Value> {
        let raw = bounded(self.plan.timeout, || fetcher.describe(), fetcher.fetch_state()).await?;
        self.extract(raw, output_name)
    }

    fn extract(&self, raw: Value, output_name: &str) -> StateResult<Value> {
        let state = match &self.plan.encryption {
            Some(encryption) => decrypt_state(raw, encryption)?,
            None => raw,
        };

        StateDocument::from_value(state).into_output(output_name)
    }
}

/// Await `fetch`, giving up after `limit` when one is set
async fn bounded<F>(
    limit: Option<Duration>,
    source: impl FnOnce() -> String,
    fetch: F,
) -> StateResult<Value>
where
    F: Future<Output = StateResult<Value>>,
{
    let Some(limit) = limit else {
        return fetch.await;
    };

    // Dropping the cancelled future releases whatever handle it held.
    tokio::time::timeout(limit, fetch).await.map_err(|_| {
        StateError::backend(format!(
            "timed out after {}s fetching state from {}",
            limit.as_secs_f64(),
            source()
        ))
    })?
}
