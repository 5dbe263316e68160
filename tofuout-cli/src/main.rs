use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use serde_json::Value;

use tofuout_state::{ErrorKind, LookupOptions, Passphrase, StateError, lookup_output};

#[derive(Parser)]
#[command(name = "tofuout")]
#[command(about = "Read an output value from OpenTofu state", long_about = None)]
struct Cli {
    /// Name of the output to read
    output_name: String,

    /// Local state file
    #[arg(long)]
    state_file_path: Option<PathBuf>,

    /// S3 bucket holding the state
    #[arg(long)]
    s3_bucket: Option<String>,

    /// Object key of the state in the bucket
    #[arg(long)]
    bucket_path: Option<String>,

    /// AWS region of the bucket [default: us-east-1]
    #[arg(long)]
    aws_region: Option<String>,

    /// Named AWS profile
    #[arg(long)]
    aws_profile: Option<String>,

    /// PostgreSQL connection string
    #[arg(long)]
    pg_conn_string: Option<String>,

    /// Schema containing the states table [default: terraform_remote_state]
    #[arg(long)]
    pg_schema: Option<String>,

    /// Passphrase for encrypted state
    #[arg(long, env = "TOFUOUT_ENC_PASSPHRASE", hide_env_values = true)]
    enc_passphrase: Option<String>,

    /// Name of the pbkdf2 key provider used to encrypt the state
    #[arg(long)]
    enc_key_provider_name: Option<String>,

    /// Give up fetching the state after this many seconds
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// Print string values without JSON quotes
    #[arg(long)]
    raw: bool,

    /// Pretty-print objects and lists
    #[arg(long)]
    pretty: bool,

    /// Enable debug logging
    #[arg(long, short)]
    verbose: bool,
}

impl Cli {
    fn lookup_options(&self) -> LookupOptions {
        LookupOptions {
            state_file_path: self.state_file_path.clone(),
            s3_bucket: self.s3_bucket.clone(),
            bucket_path: self.bucket_path.clone(),
            aws_region: self.aws_region.clone(),
            aws_profile: self.aws_profile.clone(),
            pg_conn_string: self.pg_conn_string.clone(),
            pg_schema: self.pg_schema.clone(),
            enc_passphrase: self.enc_passphrase.clone().map(Passphrase::new),
            enc_key_provider_name: self.enc_key_provider_name.clone(),
            timeout: self.timeout.map(Duration::from_secs),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    log::debug!("looking up output '{}'", cli.output_name);

    match lookup_output(&cli.lookup_options(), &cli.output_name).await {
        Ok(value) => {
            println!("{}", render_value(&value, cli.raw, cli.pretty));
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::from(exit_code(&e))
        }
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn render_value(value: &Value, raw: bool, pretty: bool) -> String {
    match value {
        Value::String(s) if raw => s.clone(),
        _ if pretty => serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()),
        _ => value.to_string(),
    }
}

fn exit_code(error: &StateError) -> u8 {
    match error.kind() {
        ErrorKind::Config => 2,
        ErrorKind::NotFound => 3,
        ErrorKind::Format => 4,
        ErrorKind::Decryption => 5,
        ErrorKind::Backend => 6,
    }
}
