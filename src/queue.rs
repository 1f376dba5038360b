//! Bounded FIFO between the chunking producer and the write workers.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};

use crate::chunker::WriteTask;
use crate::error::{UploadError, UploadResult};
use crate::session::UploadSession;

/// A write task queued for a worker, tagged with the session it belongs to.
pub struct QueuedWrite {
    pub task: WriteTask,
    pub session: Arc<UploadSession>,
}

/// Result of one bounded-wait pull.
pub enum Pull {
    /// A task was dequeued.
    Task(QueuedWrite),
    /// The wait elapsed with nothing queued.
    Empty,
    /// The producer side is gone and the queue is exhausted.
    Closed,
}

/// Creates the bounded task queue. The capacity caps buffered payload
/// memory: the producer parks in `put` while the queue is full.
pub fn task_queue(capacity: usize) -> (TaskProducer, TaskConsumer) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        TaskProducer { tx },
        TaskConsumer {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

/// Producer half. Dropping it closes the queue.
pub struct TaskProducer {
    tx: mpsc::Sender<QueuedWrite>,
}

impl TaskProducer {
    /// Enqueues a task, waiting for capacity. This is the backpressure
    /// point: a lagging pool stalls the file scan here.
    pub async fn put(&self, write: QueuedWrite) -> UploadResult<()> {
        self.tx.send(write).await.map_err(|_| UploadError::PoolStopped)
    }
}

/// Consumer half, shared by all workers.
#[derive(Clone)]
pub struct TaskConsumer {
    rx: Arc<Mutex<mpsc::Receiver<QueuedWrite>>>,
}

impl TaskConsumer {
    /// Dequeues the next task, waiting at most `wait`. The bounded wait lets
    /// an idle worker come back around instead of parking forever.
    pub async fn get(&self, wait: Duration) -> Pull {
        let mut rx = self.rx.lock().await;
        match tokio::time::timeout(wait, rx.recv()).await {
            Ok(Some(write)) => Pull::Task(write),
            Ok(None) => Pull::Closed,
            Err(_) => Pull::Empty,
        }
    }
}
