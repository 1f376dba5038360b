//! Error types for the upload pipeline and the remote store collaborator.

use std::path::PathBuf;

use thiserror::Error;

/// Errors reported by a [`PageStore`](crate::store::PageStore)
/// implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The container already exists. Ignorable on create-if-absent.
    #[error("container already exists")]
    AlreadyExists,

    /// The request was rejected as unauthenticated or unauthorized.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The store could not be reached or answered outside the protocol.
    #[error("network error: {0}")]
    Network(String),

    /// A write failed in a way that is worth retrying.
    #[error("transient write failure: {0}")]
    Transient(String),

    /// A page range was rejected (misaligned, out of bounds, or too large).
    #[error("invalid page range: {0}")]
    InvalidRange(String),

    /// The addressed container or blob does not exist.
    #[error("{0} does not exist")]
    NotFound(String),
}

/// Errors surfaced by the upload pipeline.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Bad command-line input. Fatal before any upload starts.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Container creation failed; the storage account is unusable.
    #[error("unable to reach the storage account: {0}")]
    Connection(#[source] StoreError),

    /// The file size is not a multiple of the page size.
    #[error("{}: size {} is not a multiple of the page size", .path.display(), .size)]
    SizeAlignment { path: PathBuf, size: u64 },

    /// The file could not be opened or read.
    #[error("{}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file ended before a full page could be read.
    #[error("{}: short read at offset {}", .path.display(), .offset)]
    ShortRead { path: PathBuf, offset: u64 },

    /// The file name cannot serve as a blob name.
    #[error("{}: cannot derive a blob name", .path.display())]
    BlobName { path: PathBuf },

    /// Remote blob initialization failed; this file is skipped.
    #[error("failed to initialize blob: {0}")]
    Init(#[source] StoreError),

    /// The worker pool was shut down while an upload was in progress.
    #[error("worker pool is not running")]
    PoolStopped,
}

/// Result type alias for upload operations.
pub type UploadResult<T> = Result<T, UploadError>;
