//! Local file backend
//!
//! Reads the state from a JSON file on disk, such as `terraform.tfstate`.

use async_trait::async_trait;
use serde_json::Value;
use std::io::ErrorKind as IoErrorKind;
use std::path::PathBuf;

use crate::backend::{StateFetcher, parse_state_text};
use crate::error::{StateError, StateResult};

/// Reads state from a local file
pub struct FileFetcher {
    path: PathBuf,
}

impl FileFetcher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl StateFetcher for FileFetcher {
    async fn fetch_state(&self) -> StateResult<Value> {
        // The file is opened and closed inside read_to_string.
        let content = std::fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            IoErrorKind::NotFound => StateError::not_found("state file not found"),
            IoErrorKind::InvalidData => StateError::format(format!(
                "state file {} is not valid UTF-8",
                self.path.display()
            )),
            _ => StateError::backend(format!(
                "failed to read state file {}: {}",
                self.path.display(),
                e
            )),
        })?;

        log::debug!("read {} bytes from {}", content.len(), self.describe());
        parse_state_text(&content, "state file")
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}
