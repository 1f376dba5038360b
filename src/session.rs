//! Per-file upload session state and completion barrier.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Final result of one write task. Produced exactly once per enqueued task.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub offset: u64,
    pub length: u64,
    pub succeeded: bool,
    /// Write attempts performed; zero when the task was discarded after the
    /// session aborted.
    pub attempts: u32,
}

/// Shared state of one file's upload.
///
/// Tracks outstanding tasks, the session-scoped abort flag, and the
/// byte/outcome tallies. The session is the completion barrier: the producer
/// parks in [`drain`](UploadSession::drain) until every task it enqueued has
/// resolved or the session aborts.
pub struct UploadSession {
    filesize: u64,
    outstanding: AtomicU64,
    aborted: AtomicBool,
    bytes_uploaded: AtomicU64,
    outcomes: Mutex<Vec<TaskOutcome>>,
    drained: Notify,
}

impl UploadSession {
    pub fn new(filesize: u64) -> Arc<Self> {
        Arc::new(Self {
            filesize,
            outstanding: AtomicU64::new(0),
            aborted: AtomicBool::new(false),
            bytes_uploaded: AtomicU64::new(0),
            outcomes: Mutex::new(Vec::new()),
            drained: Notify::new(),
        })
    }

    pub fn filesize(&self) -> u64 {
        self.filesize
    }

    /// True once any task of this session permanently failed. Workers drop
    /// the session's remaining tasks without writing them.
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    /// Bytes confirmed written so far.
    pub fn bytes_uploaded(&self) -> u64 {
        self.bytes_uploaded.load(Ordering::SeqCst)
    }

    pub fn outstanding(&self) -> u64 {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Snapshot of the outcomes recorded so far.
    pub fn outcomes(&self) -> Vec<TaskOutcome> {
        self.outcomes.lock().clone()
    }

    /// Registers one enqueued task. Must happen before the task becomes
    /// visible to a worker.
    pub(crate) fn task_enqueued(&self) {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
    }

    /// Records a task's outcome and releases the barrier when the session is
    /// drained or newly aborted.
    pub(crate) fn record(&self, outcome: TaskOutcome) {
        let succeeded = outcome.succeeded;
        let length = outcome.length;

        // The outcome must be visible before anything that can release the
        // barrier: the waiter snapshots the outcome list as soon as it wakes.
        self.outcomes.lock().push(outcome);
        if succeeded {
            self.bytes_uploaded.fetch_add(length, Ordering::SeqCst);
        } else {
            self.aborted.store(true, Ordering::SeqCst);
        }

        let remaining = self.outstanding.fetch_sub(1, Ordering::SeqCst) - 1;
        if remaining == 0 || self.is_aborted() {
            self.drained.notify_waiters();
        }
    }

    /// Waits until every enqueued task has resolved, or until the session
    /// aborts, whichever happens first.
    pub async fn drain(&self) {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            // Register before checking so a concurrent record() cannot slip
            // between the check and the await.
            notified.as_mut().enable();
            if self.outstanding.load(Ordering::SeqCst) == 0 || self.is_aborted() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn outcome(offset: u64, succeeded: bool, attempts: u32) -> TaskOutcome {
        TaskOutcome {
            offset,
            length: 512,
            succeeded,
            attempts,
        }
    }

    #[tokio::test]
    async fn drain_returns_immediately_with_no_tasks() {
        let session = UploadSession::new(0);
        tokio::time::timeout(Duration::from_secs(1), session.drain())
            .await
            .expect("drain should not block");
    }

    #[tokio::test]
    async fn drain_waits_for_last_outcome() {
        let session = UploadSession::new(1024);
        session.task_enqueued();
        session.task_enqueued();

        let waiter = {
            let session = session.clone();
            tokio::spawn(async move { session.drain().await })
        };

        session.record(outcome(0, true, 1));
        assert!(!waiter.is_finished());
        session.record(outcome(512, true, 2));

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("drain should complete")
            .unwrap();
        assert_eq!(session.bytes_uploaded(), 1024);
        assert!(!session.is_aborted());
    }

    #[tokio::test]
    async fn failure_aborts_and_releases_the_barrier() {
        let session = UploadSession::new(2048);
        session.task_enqueued();
        session.task_enqueued();

        session.record(outcome(0, false, 5));

        tokio::time::timeout(Duration::from_secs(1), session.drain())
            .await
            .expect("abort must release the barrier");
        assert!(session.is_aborted());
        assert_eq!(session.outstanding(), 1);
    }
}
