//! Command-line arguments and validated configuration.

use std::path::PathBuf;

use clap::Parser;
use url::Url;

use crate::error::{UploadError, UploadResult};

/// Environment variable holding the default storage account name.
pub const ACCOUNT_ENV_VAR: &str = "AZURE_STORAGE_ACCOUNT";

/// Environment variable holding the default storage account key.
pub const KEY_ENV_VAR: &str = "AZURE_STORAGE_KEY";

/// Blob service API version sent with every request.
pub const DEFAULT_API_VERSION: &str = "2021-10-04";

/// Default number of concurrent write workers.
pub const DEFAULT_THREADS: usize = 8;

/// Upper bound on concurrent write workers.
pub const MAX_THREADS: usize = 64;

/// Blob types the service knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobType {
    Page,
    Block,
}

impl BlobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlobType::Page => "page",
            BlobType::Block => "block",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "page" => Some(BlobType::Page),
            "block" => Some(BlobType::Block),
            _ => None,
        }
    }
}

/// Command-line arguments for the uploader.
#[derive(Parser, Debug, Clone)]
#[command(name = "azup-rs")]
#[command(about = "Concurrent Azure page blob uploader")]
#[command(version)]
pub struct Args {
    /// Files to upload as blobs.
    #[arg(value_name = "file", required = true)]
    pub files: Vec<PathBuf>,

    /// Storage account name (defaults to AZURE_STORAGE_ACCOUNT).
    #[arg(long)]
    pub account: Option<String>,

    /// Storage account access key (defaults to AZURE_STORAGE_KEY).
    #[arg(long)]
    pub key: Option<String>,

    /// Storage container to upload to.
    #[arg(long)]
    pub container: Option<String>,

    /// The type of blob to create (page or block).
    #[arg(long, default_value = "page")]
    pub blob_type: String,

    /// The number of concurrent requests [1..64].
    #[arg(long, default_value_t = DEFAULT_THREADS)]
    pub threads: usize,

    /// Blob service endpoint override, e.g. an emulator's path-style URL.
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Enable debug logging.
    #[arg(long, short = 'd')]
    pub debug: bool,

    /// Enable silent mode (minimal logging).
    #[arg(long, short = 's')]
    pub silent: bool,
}

/// Validated uploader configuration derived from command-line arguments.
#[derive(Debug, Clone)]
pub struct Config {
    pub files: Vec<PathBuf>,
    pub account: String,
    pub key: String,
    pub container: String,
    pub blob_type: BlobType,
    pub threads: usize,
    pub endpoint: Option<Url>,
    pub debug: bool,
    pub silent: bool,
}

impl Config {
    /// Validates the parsed arguments, filling account credentials from the
    /// environment where flags were omitted.
    pub fn from_args(args: Args) -> UploadResult<Self> {
        let account = args
            .account
            .or_else(|| std::env::var(ACCOUNT_ENV_VAR).ok())
            .filter(|s| !s.is_empty());
        let key = args
            .key
            .or_else(|| std::env::var(KEY_ENV_VAR).ok())
            .filter(|s| !s.is_empty());

        let (account, key) = match (account, key) {
            (Some(account), Some(key)) => (account, key),
            _ => {
                return Err(UploadError::Config(
                    "missing --account and/or --key information".to_string(),
                ))
            }
        };

        let container = args
            .container
            .filter(|s| !s.is_empty())
            .ok_or_else(|| UploadError::Config("missing container name".to_string()))?;

        let blob_type = BlobType::from_str(&args.blob_type).ok_or_else(|| {
            UploadError::Config(format!("{} is not a valid blob type", args.blob_type))
        })?;

        if args.threads < 1 || args.threads > MAX_THREADS {
            return Err(UploadError::Config(format!(
                "{} is not a valid thread count",
                args.threads
            )));
        }

        let endpoint = match args.endpoint {
            Some(raw) => Some(raw.parse::<Url>().map_err(|e| {
                UploadError::Config(format!("{} is not a valid endpoint: {}", raw, e))
            })?),
            None => None,
        };

        Ok(Self {
            files: args.files,
            account,
            key,
            container,
            blob_type,
            threads: args.threads,
            endpoint,
            debug: args.debug,
            silent: args.silent,
        })
    }
}
