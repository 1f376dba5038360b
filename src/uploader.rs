//! Per-file upload orchestration.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::chunker::{PageKind, RunChunker, WriteTask};
use crate::error::{UploadError, UploadResult};
use crate::pool::WorkerPool;
use crate::queue::QueuedWrite;
use crate::session::{TaskOutcome, UploadSession};
use crate::source::PageFile;
use crate::store::{PageStore, PAGE_SIZE};

/// Terminal state of one file's upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    /// Every data range was durably written.
    Done,
    /// A permanent write failure aborted the upload; the destination blob is
    /// partially written and must be re-verified or re-uploaded in full.
    Failed,
}

/// Result of one file's upload, reported in both terminal states.
#[derive(Debug, Clone)]
pub struct UploadReport {
    pub filesize: u64,
    pub bytes_uploaded: u64,
    pub status: UploadStatus,
    pub elapsed: Duration,
    /// Outcome of every dispatched write task, one entry per task.
    pub outcomes: Vec<TaskOutcome>,
}

/// Uploads files one at a time over a shared [`WorkerPool`].
pub struct Uploader<'p> {
    store: Arc<dyn PageStore>,
    pool: &'p WorkerPool,
    container: String,
}

impl<'p> Uploader<'p> {
    pub fn new(store: Arc<dyn PageStore>, pool: &'p WorkerPool, container: impl Into<String>) -> Self {
        Self {
            store,
            pool,
            container: container.into(),
        }
    }

    /// Uploads one file as a page blob named after the file.
    ///
    /// Pre-flight failures (unreadable file, misaligned size, blob init)
    /// return an error before any task is queued. Once chunking starts, the
    /// outcome is an [`UploadReport`]: data runs are dispatched to the pool,
    /// zero runs are skipped entirely, and the report states whether the
    /// session drained clean or aborted.
    pub async fn upload_file(&self, path: &Path) -> UploadResult<UploadReport> {
        let started = Instant::now();

        let mut source = PageFile::open(path).await?;
        source.check_alignment()?;
        let filesize = source.size();
        let blob = blob_name(path)?;

        info!("uploading {} ({} bytes)", path.display(), filesize);

        self.store
            .init_page_blob(&self.container, &blob, filesize)
            .await
            .map_err(UploadError::Init)?;

        let session = UploadSession::new(filesize);
        let mut chunker = RunChunker::new(self.container.clone(), blob);

        let mut offset = 0;
        while offset < filesize {
            // Fail fast: a permanent failure makes the rest of the scan moot.
            if session.is_aborted() {
                break;
            }
            let page = source.read_page(offset).await?;
            if let Some(task) = chunker.push(&page) {
                self.dispatch(task, &session).await?;
            }
            offset += PAGE_SIZE;
        }
        if !session.is_aborted() {
            if let Some(task) = chunker.finish() {
                self.dispatch(task, &session).await?;
            }
        }

        debug!("{}: waiting for outstanding writes", path.display());
        session.drain().await;

        let status = if session.is_aborted() {
            UploadStatus::Failed
        } else {
            UploadStatus::Done
        };

        Ok(UploadReport {
            filesize,
            bytes_uploaded: session.bytes_uploaded(),
            status,
            elapsed: started.elapsed(),
            outcomes: session.outcomes(),
        })
    }

    /// Sends a data task to the pool. Zero runs are never transmitted: a
    /// freshly initialized page blob already reads back as zeros, and
    /// skipping sparse regions is the point of the optimization.
    async fn dispatch(&self, task: WriteTask, session: &Arc<UploadSession>) -> UploadResult<()> {
        if task.kind == PageKind::Zero {
            debug!(
                "{}: skipping {} zero bytes at offset {}",
                task.blob, task.length, task.offset
            );
            return Ok(());
        }
        self.pool
            .submit(QueuedWrite {
                task,
                session: session.clone(),
            })
            .await
    }
}

/// Derives the blob name from the file's final path component.
fn blob_name(path: &Path) -> UploadResult<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_owned)
        .ok_or_else(|| UploadError::BlobName {
            path: path.to_path_buf(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_name_is_the_file_name() {
        assert_eq!(blob_name(Path::new("./images/disk.img")).unwrap(), "disk.img");
        assert_eq!(blob_name(Path::new("disk.img")).unwrap(), "disk.img");
        assert!(blob_name(Path::new("..")).is_err());
    }
}
