//! Backend implementations for reading state

mod local;
mod postgres;
mod s3;

pub use local::FileFetcher;
pub use postgres::PostgresFetcher;
pub use s3::S3Fetcher;

use crate::backend::StateFetcher;
use crate::config::BackendConfig;

/// Create a fetcher from a validated backend configuration
pub async fn create_fetcher(config: &BackendConfig) -> Box<dyn StateFetcher> {
    match config {
        BackendConfig::File { path } => Box::new(FileFetcher::new(path.clone())),
        BackendConfig::ObjectStore {
            bucket,
            key,
            region,
            profile,
        } => {
            let fetcher =
                S3Fetcher::connect(bucket.clone(), key.clone(), region, profile.as_deref()).await;
            Box::new(fetcher)
        }
        BackendConfig::Database {
            connection_string,
            schema,
        } => Box::new(PostgresFetcher::new(connection_string.clone(), schema.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_file_fetcher() {
        let config = BackendConfig::File {
            path: "terraform.tfstate".into(),
        };
        let fetcher = create_fetcher(&config).await;
        assert_eq!(fetcher.describe(), "file:terraform.tfstate");
    }

    #[tokio::test]
    async fn test_create_postgres_fetcher() {
        let config = BackendConfig::Database {
            connection_string: "postgres://localhost/tofu".to_string(),
            schema: "terraform_remote_state".to_string(),
        };
        let fetcher = create_fetcher(&config).await;
        assert_eq!(fetcher.describe(), "postgres:terraform_remote_state.states");
    }
}
