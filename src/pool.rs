//! Fixed pool of concurrent page write workers.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::chunker::PageKind;
use crate::error::UploadResult;
use crate::queue::{task_queue, Pull, QueuedWrite, TaskConsumer, TaskProducer};
use crate::session::TaskOutcome;
use crate::store::{PageStore, PageWriteKind};

/// Maximum write attempts per task before the task's session is aborted.
pub const MAX_WRITE_ATTEMPTS: u32 = 5;

/// How long an idle worker waits on the queue before looping around.
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Delay before the first retry; doubles on each subsequent attempt.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

/// A fixed set of workers draining the task queue, started once and reused
/// across every file of the process.
pub struct WorkerPool {
    producer: TaskProducer,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Starts `workers` workers over a queue of capacity 2 × `workers`.
    pub fn start(store: Arc<dyn PageStore>, workers: usize) -> Self {
        let (producer, consumer) = task_queue(workers * 2);

        let handles = (0..workers)
            .map(|id| {
                let consumer = consumer.clone();
                let store = store.clone();
                tokio::spawn(async move { worker_loop(id, consumer, store).await })
            })
            .collect();

        Self { producer, handles }
    }

    pub fn workers(&self) -> usize {
        self.handles.len()
    }

    /// Hands a task to the pool, blocking while the queue is full.
    pub async fn submit(&self, write: QueuedWrite) -> UploadResult<()> {
        // Count the task before a worker can possibly resolve it.
        write.session.task_enqueued();
        self.producer.put(write).await
    }

    /// Closes the queue and waits for the workers to finish what remains.
    pub async fn shutdown(self) {
        drop(self.producer);
        futures::future::join_all(self.handles).await;
    }
}

async fn worker_loop(id: usize, queue: TaskConsumer, store: Arc<dyn PageStore>) {
    loop {
        match queue.get(POLL_INTERVAL).await {
            Pull::Task(write) => handle_write(id, write, store.as_ref()).await,
            Pull::Empty => continue,
            Pull::Closed => break,
        }
    }
    debug!("worker {}: exiting", id);
}

/// Performs one task's remote write with bounded retry, then records its
/// outcome exactly once.
async fn handle_write(id: usize, write: QueuedWrite, store: &dyn PageStore) {
    let QueuedWrite { task, session } = write;

    if session.is_aborted() {
        debug!(
            "worker {}: dropping bytes={}-{} for aborted upload",
            id,
            task.offset,
            task.end()
        );
        session.record(TaskOutcome {
            offset: task.offset,
            length: task.length,
            succeeded: false,
            attempts: 0,
        });
        return;
    }

    info!("worker {}: bytes={}-{}", id, task.offset, task.end());
    debug_assert_eq!(task.kind, PageKind::Data);

    let mut attempts = 0;
    let mut success = false;
    while !success && attempts < MAX_WRITE_ATTEMPTS {
        attempts += 1;
        match store
            .write_pages(
                &task.container,
                &task.blob,
                task.offset,
                task.length,
                task.payload.clone(),
                PageWriteKind::Update,
            )
            .await
        {
            Ok(()) => success = true,
            Err(err) => {
                debug!(
                    "worker {}: attempt {} failed for bytes={}-{}: {}",
                    id,
                    attempts,
                    task.offset,
                    task.end(),
                    err
                );
                if attempts < MAX_WRITE_ATTEMPTS {
                    tokio::time::sleep(RETRY_BASE_DELAY * 2u32.pow(attempts - 1)).await;
                }
            }
        }
    }

    if success {
        if attempts > 1 {
            warn!(
                "worker {}: bytes={}-{} took {} attempts",
                id,
                task.offset,
                task.end(),
                attempts
            );
        }
    } else {
        error!("worker {}: FAILED bytes={}-{}", id, task.offset, task.end());
    }

    session.record(TaskOutcome {
        offset: task.offset,
        length: task.length,
        succeeded: success,
        attempts,
    });
}
