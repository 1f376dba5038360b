//! Azup-rs: concurrent Azure page blob uploader.
//!
//! This crate uploads page-aligned local files to Azure page blobs. It
//! skips all-zero regions entirely and spreads data writes over a bounded
//! pool of concurrent workers with retry.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use azup_rs::{MemoryPageStore, PageStore, Uploader, WorkerPool};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store: Arc<dyn PageStore> = Arc::new(MemoryPageStore::new());
//!     store.create_container("disks").await.unwrap();
//!
//!     let pool = WorkerPool::start(store.clone(), 8);
//!     let uploader = Uploader::new(store, &pool, "disks");
//!     let report = uploader.upload_file("disk.img".as_ref()).await.unwrap();
//!     println!("uploaded {} of {} bytes", report.bytes_uploaded, report.filesize);
//!
//!     pool.shutdown().await;
//! }
//! ```

pub mod auth;
pub mod chunker;
pub mod config;
pub mod error;
pub mod pool;
pub mod queue;
pub mod session;
pub mod source;
pub mod store;
pub mod uploader;

// Re-exports for convenience
pub use auth::SharedKeyCredential;
pub use chunker::{PageKind, RunChunker, WriteTask};
pub use config::{Args, BlobType, Config, DEFAULT_API_VERSION};
pub use error::{StoreError, UploadError, UploadResult};
pub use pool::{WorkerPool, MAX_WRITE_ATTEMPTS};
pub use queue::QueuedWrite;
pub use session::{TaskOutcome, UploadSession};
pub use source::PageFile;
pub use store::{
    MemoryPageStore, PageStore, PageWriteKind, RestPageStore, MAX_PAGE_RANGE_SIZE, PAGE_SIZE,
};
pub use uploader::{UploadReport, UploadStatus, Uploader};
