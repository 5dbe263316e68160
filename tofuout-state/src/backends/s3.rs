//! S3 backend
//!
//! Reads the state object written by OpenTofu's `s3` backend.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use serde_json::Value;

use crate::backend::{StateFetcher, parse_state_bytes};
use crate::error::{StateError, StateResult};

/// S3-based state fetcher
pub struct S3Fetcher {
    /// S3 client
    client: Client,
    /// Bucket name
    bucket: String,
    /// Object key for the state file
    key: String,
}

impl S3Fetcher {
    /// Build a client for the region and optional named profile
    pub async fn connect(
        bucket: impl Into<String>,
        key: impl Into<String>,
        region: &str,
        profile: Option<&str>,
    ) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(region.to_string()));

        if let Some(profile) = profile {
            loader = loader.profile_name(profile);
        }

        let aws_config = loader.load().await;
        Self::with_client(Client::new(&aws_config), bucket, key)
    }

    /// Use an already configured client
    pub fn with_client(client: Client, bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

#[async_trait]
impl StateFetcher for S3Fetcher {
    async fn fetch_state(&self) -> StateResult<Value> {
        // Missing keys and denied access are client failures here, not NotFound.
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .send()
            .await
            .map_err(|e| {
                StateError::backend(format!(
                    "failed to get {}: {}",
                    self.describe(),
                    aws_sdk_s3::error::DisplayErrorContext(&e)
                ))
            })?;

        let body = output.body.collect().await.map_err(|e| {
            StateError::backend(format!(
                "failed to read body of {}: {}",
                self.describe(),
                e
            ))
        })?;
        let bytes = body.into_bytes();

        log::debug!("read {} bytes from {}", bytes.len(), self.describe());
        parse_state_bytes(&bytes, "S3 object")
    }

    fn describe(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }
}
