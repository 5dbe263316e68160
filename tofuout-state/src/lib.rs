//! tofuout state lookup
//!
//! This crate reads a single output value from an OpenTofu/Terraform state.
//! The state can live in a local file, an S3 object or the `states` table of a
//! PostgreSQL `pg` backend, and may be encrypted with a pbkdf2 key provider and
//! AES-GCM.
//!
//! # Overview
//!
//! - **LookupOptions**: caller options, validated into a **LookupPlan** with exactly one **BackendConfig**
//! - **StateFetcher**: a trait for reading the raw state (file, S3, PostgreSQL)
//! - **envelope**: key derivation and authenticated decryption of encrypted states
//! - **StateDocument**: output extraction from a plain state
//! - **OutputLookup**: the pipeline tying the stages together
//!
//! # Example
//!
//! ```ignore
//! use tofuout_state::{LookupOptions, lookup_output};
//!
//! let options = LookupOptions::s3("my-state-bucket", "infra/prod.tfstate")
//!     .with_encryption("correct-horse", "default");
//!
//! let db_host = lookup_output(&options, "db_host").await?;
//! ```

pub mod backend;
pub mod backends;
pub mod config;
pub mod envelope;
pub mod error;
pub mod lookup;
pub mod state;

#[cfg(test)]
mod test_support;

// Re-export main types for convenience
pub use backend::StateFetcher;
pub use backends::create_fetcher;
pub use config::{BackendConfig, EncryptionConfig, LookupOptions, LookupPlan, Passphrase};
pub use error::{ErrorKind, StateError, StateResult};
pub use lookup::{OutputLookup, lookup_output};
pub use state::StateDocument;
