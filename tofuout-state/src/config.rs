//! Lookup configuration and backend selection
//!
//! [`LookupOptions`] is the loose set of options a caller may pass (every
//! field optional, mirroring the command-line flags). [`LookupOptions::resolve`]
//! validates it once and produces a [`LookupPlan`] holding exactly one
//! [`BackendConfig`] and the optional [`EncryptionConfig`].

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use zeroize::Zeroizing;

use crate::error::{StateError, StateResult};

/// Default AWS region when none is given
pub const DEFAULT_AWS_REGION: &str = "us-east-1";

/// Default PostgreSQL schema holding the `states` table
pub const DEFAULT_PG_SCHEMA: &str = "terraform_remote_state";

/// Longest identifier PostgreSQL accepts without truncation
const MAX_IDENTIFIER_LEN: usize = 63;

/// Caller-supplied options, before validation
#[derive(Debug, Clone, Default)]
pub struct LookupOptions {
    /// Local file containing the JSON state
    pub state_file_path: Option<PathBuf>,
    /// S3 bucket holding the state object
    pub s3_bucket: Option<String>,
    /// Object key of the state inside the bucket
    pub bucket_path: Option<String>,
    /// AWS region (default: us-east-1)
    pub aws_region: Option<String>,
    /// Named AWS profile
    pub aws_profile: Option<String>,
    /// PostgreSQL connection string
    pub pg_conn_string: Option<String>,
    /// Schema containing the `states` table (default: terraform_remote_state)
    pub pg_schema: Option<String>,
    /// Passphrase for state decryption
    pub enc_passphrase: Option<Passphrase>,
    /// Name of the pbkdf2 key provider used to encrypt the state
    pub enc_key_provider_name: Option<String>,
    /// Upper bound for building the backend client and fetching the state
    pub timeout: Option<Duration>,
}

/// The single storage backend a lookup reads from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    File {
        path: PathBuf,
    },
    ObjectStore {
        bucket: String,
        key: String,
        region: String,
        profile: Option<String>,
    },
    Database {
        connection_string: String,
        schema: String,
    },
}

impl BackendConfig {
    /// Short backend name used in log lines
    pub fn backend_type(&self) -> &'static str {
        match self {
            Self::File { .. } => "file",
            Self::ObjectStore { .. } => "s3",
            Self::Database { .. } => "postgres",
        }
    }
}

/// Passphrase and key-provider name for envelope decryption
#[derive(Debug, Clone)]
pub struct EncryptionConfig {
    pub passphrase: Passphrase,
    pub key_provider_name: String,
}

/// A decryption passphrase
///
/// The contents are wiped on drop and never shown by `Debug`.
#[derive(Clone)]
pub struct Passphrase(Zeroizing<String>);

impl Passphrase {
    pub fn new(passphrase: impl Into<String>) -> Self {
        Self(Zeroizing::new(passphrase.into()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passphrase(<redacted>)")
    }
}

impl From<&str> for Passphrase {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Passphrase {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Validated lookup configuration
#[derive(Debug, Clone)]
pub struct LookupPlan {
    pub backend: BackendConfig,
    pub encryption: Option<EncryptionConfig>,
    pub timeout: Option<Duration>,
}

impl LookupOptions {
    /// Read from a local state file
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            state_file_path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Read from an S3 object
    pub fn s3(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            s3_bucket: Some(bucket.into()),
            bucket_path: Some(key.into()),
            ..Self::default()
        }
    }

    /// Read from a PostgreSQL `pg` backend
    pub fn postgres(conn_string: impl Into<String>) -> Self {
        Self {
            pg_conn_string: Some(conn_string.into()),
            ..Self::default()
        }
    }

    /// Decrypt the state with the given passphrase and key provider
    pub fn with_encryption(
        mut self,
        passphrase: impl Into<Passphrase>,
        key_provider_name: impl Into<String>,
    ) -> Self {
        self.enc_passphrase = Some(passphrase.into());
        self.enc_key_provider_name = Some(key_provider_name.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Validate the options and pick the backend
    ///
    /// Precedence when several backends are given: file, then S3 (bucket and
    /// key both required), then PostgreSQL. No I/O happens here.
    pub fn resolve(&self) -> StateResult<LookupPlan> {
        let backend = self.select_backend()?;
        let encryption = self.encryption()?;

        Ok(LookupPlan {
            backend,
            encryption,
            timeout: self.timeout,
        })
    }

    fn select_backend(&self) -> StateResult<BackendConfig> {
        if let Some(path) = self
            .state_file_path
            .as_ref()
            .filter(|p| !p.as_os_str().is_empty())
        {
            return Ok(BackendConfig::File { path: path.clone() });
        }

        if let (Some(bucket), Some(key)) =
            (non_empty(&self.s3_bucket), non_empty(&self.bucket_path))
        {
            return Ok(BackendConfig::ObjectStore {
                bucket: bucket.to_string(),
                key: key.to_string(),
                region: non_empty(&self.aws_region)
                    .unwrap_or(DEFAULT_AWS_REGION)
                    .to_string(),
                profile: non_empty(&self.aws_profile).map(str::to_string),
            });
        }

        if let Some(conn) = non_empty(&self.pg_conn_string) {
            let schema = non_empty(&self.pg_schema).unwrap_or(DEFAULT_PG_SCHEMA);
            validate_schema_name(schema)?;
            return Ok(BackendConfig::Database {
                connection_string: conn.to_string(),
                schema: schema.to_string(),
            });
        }

        Err(StateError::config("no backend specified"))
    }

    fn encryption(&self) -> StateResult<Option<EncryptionConfig>> {
        let Some(passphrase) = self.enc_passphrase.as_ref().filter(|p| !p.is_empty()) else {
            return Ok(None);
        };

        let key_provider_name = non_empty(&self.enc_key_provider_name)
            .ok_or_else(|| StateError::config("passphrase requires key provider name"))?;

        Ok(Some(EncryptionConfig {
            passphrase: passphrase.clone(),
            key_provider_name: key_provider_name.to_string(),
        }))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// The schema is spliced into SQL text, so only plain identifiers are allowed
fn validate_schema_name(schema: &str) -> StateResult<()> {
    let mut chars = schema.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid_start && valid_rest && schema.len() <= MAX_IDENTIFIER_LEN {
        Ok(())
    } else {
        Err(StateError::config("invalid database schema name"))
    }
}
