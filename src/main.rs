//! Azup-rs: concurrent Azure page blob uploader.
//!
//! Scans page-aligned files, skips all-zero regions, and uploads data runs
//! through a bounded pool of concurrent write workers.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use azup_rs::{
    Args, BlobType, Config, PageStore, RestPageStore, StoreError, UploadStatus, Uploader,
    WorkerPool,
};

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command-line arguments
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug {
        Level::DEBUG
    } else if args.silent {
        Level::ERROR
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    let config = match Config::from_args(args) {
        Ok(config) => config,
        Err(err) => {
            error!("{}", err);
            return ExitCode::from(1);
        }
    };

    if config.blob_type == BlobType::Block {
        error!("block blobs cannot be uploaded by us yet");
        return ExitCode::from(1);
    }

    let store: Arc<dyn PageStore> = match build_store(&config) {
        Ok(store) => Arc::new(store),
        Err(err) => {
            error!("{}", err);
            return ExitCode::from(2);
        }
    };

    // Create the container up front; an existing one is fine.
    match store.create_container(&config.container).await {
        Ok(()) | Err(StoreError::AlreadyExists) => {}
        Err(err) => {
            error!("unable to create container {}: {}", config.container, err);
            return ExitCode::from(2);
        }
    }

    let pool = WorkerPool::start(store.clone(), config.threads);
    let uploader = Uploader::new(store, &pool, config.container.clone());

    let mut total_uploaded = 0u64;
    let mut failures = 0usize;
    let started = Instant::now();

    for path in &config.files {
        match uploader.upload_file(path).await {
            Ok(report) => {
                total_uploaded += report.bytes_uploaded;
                match report.status {
                    UploadStatus::Done => info!(
                        "{}: {} of {} bytes uploaded in {:.2?}",
                        path.display(),
                        report.bytes_uploaded,
                        report.filesize,
                        report.elapsed
                    ),
                    UploadStatus::Failed => {
                        failures += 1;
                        error!(
                            "{}: upload aborted after {} of {} bytes; the blob is partial",
                            path.display(),
                            report.bytes_uploaded,
                            report.filesize
                        );
                    }
                }
            }
            Err(err) => {
                failures += 1;
                error!("{}", err);
            }
        }
    }

    info!(
        "uploaded {} bytes across {} file(s) in {:.2?}",
        total_uploaded,
        config.files.len(),
        started.elapsed()
    );

    pool.shutdown().await;

    if failures > 0 {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}

fn build_store(config: &Config) -> Result<RestPageStore, StoreError> {
    match &config.endpoint {
        Some(endpoint) => Ok(RestPageStore::with_endpoint(
            endpoint.clone(),
            &config.account,
            &config.key,
        )),
        None => RestPageStore::new(&config.account, &config.key),
    }
}
