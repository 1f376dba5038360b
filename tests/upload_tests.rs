//! End-to-end upload pipeline tests against the in-memory store.

mod common;

use std::sync::Arc;

use common::{page_file, FailingPageStore, Pages};

use azup_rs::{
    MemoryPageStore, PageStore, UploadError, UploadStatus, Uploader, WorkerPool,
    MAX_WRITE_ATTEMPTS, PAGE_SIZE,
};

const CONTAINER: &str = "disks";

async fn memory_store() -> Arc<MemoryPageStore> {
    let store = Arc::new(MemoryPageStore::new());
    store.create_container(CONTAINER).await.unwrap();
    store
}

#[tokio::test]
async fn mixed_file_round_trips() {
    let store = memory_store().await;
    let file = page_file(&[Pages::Data(3), Pages::Zero(2), Pages::Data(1)]);
    let expected = std::fs::read(file.path()).unwrap();

    let pool = WorkerPool::start(store.clone(), 4);
    let uploader = Uploader::new(store.clone(), &pool, CONTAINER);
    let report = uploader.upload_file(file.path()).await.unwrap();
    pool.shutdown().await;

    assert_eq!(report.status, UploadStatus::Done);
    assert_eq!(report.filesize, 6 * PAGE_SIZE);
    // Only the data runs count as uploaded bytes.
    assert_eq!(report.bytes_uploaded, 4 * PAGE_SIZE);
    // One write per data run: [0, 3) and [5, 6).
    assert_eq!(store.write_count(), 2);

    let blob_name = file.path().file_name().unwrap().to_str().unwrap().to_owned();
    let blob = store.blob_bytes(CONTAINER, &blob_name).unwrap();
    assert_eq!(blob, expected);
}

#[tokio::test]
async fn sparse_file_transmits_nothing() {
    let store = memory_store().await;
    let file = page_file(&[Pages::Zero(8)]);

    let pool = WorkerPool::start(store.clone(), 2);
    let uploader = Uploader::new(store.clone(), &pool, CONTAINER);
    let report = uploader.upload_file(file.path()).await.unwrap();
    pool.shutdown().await;

    assert_eq!(report.status, UploadStatus::Done);
    assert_eq!(report.bytes_uploaded, 0);
    assert!(report.outcomes.is_empty());
    assert_eq!(store.write_count(), 0);

    let blob_name = file.path().file_name().unwrap().to_str().unwrap().to_owned();
    let blob = store.blob_bytes(CONTAINER, &blob_name).unwrap();
    assert!(blob.iter().all(|&b| b == 0));
}

#[tokio::test]
async fn misaligned_file_fails_before_any_remote_call() {
    let store = memory_store().await;
    let mut file = page_file(&[Pages::Data(1)]);
    use std::io::Write;
    file.write_all(&[0xFF]).unwrap();
    file.flush().unwrap();

    let pool = WorkerPool::start(store.clone(), 2);
    let uploader = Uploader::new(store.clone(), &pool, CONTAINER);
    let err = uploader.upload_file(file.path()).await.unwrap_err();
    pool.shutdown().await;

    assert!(matches!(err, UploadError::SizeAlignment { .. }));
    assert_eq!(store.init_count(), 0);
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn permanent_failure_aborts_the_file_but_not_the_pool() {
    // The second data run, at offset 2 * PAGE_SIZE, always fails.
    let store = Arc::new(FailingPageStore::new(2 * PAGE_SIZE));
    store.create_container(CONTAINER).await.unwrap();
    let file = page_file(&[Pages::Data(1), Pages::Zero(1), Pages::Data(1)]);

    let pool = WorkerPool::start(store.clone(), 2);
    let uploader = Uploader::new(store.clone(), &pool, CONTAINER);
    let report = uploader.upload_file(file.path()).await.unwrap();

    assert_eq!(report.status, UploadStatus::Failed);
    // The first run may or may not have landed before the abort; the failing
    // range must have exhausted its retries.
    let failed = report
        .outcomes
        .iter()
        .find(|o| o.offset == 2 * PAGE_SIZE)
        .expect("failed range must have an outcome");
    assert!(!failed.succeeded);
    assert_eq!(failed.attempts, MAX_WRITE_ATTEMPTS);

    // Session-scoped abort: the same pool serves the next file cleanly.
    let next = page_file(&[Pages::Data(2)]);
    let report = uploader.upload_file(next.path()).await.unwrap();
    pool.shutdown().await;

    assert_eq!(report.status, UploadStatus::Done);
    assert_eq!(report.bytes_uploaded, 2 * PAGE_SIZE);
}

#[tokio::test]
async fn many_tasks_drain_through_a_small_pool() {
    let store = memory_store().await;
    // Alternating single pages produce one task per data page, well past the
    // queue capacity of a one-worker pool.
    let mut runs = Vec::new();
    for _ in 0..16 {
        runs.push(Pages::Data(1));
        runs.push(Pages::Zero(1));
    }
    let file = page_file(&runs);
    let expected = std::fs::read(file.path()).unwrap();

    let pool = WorkerPool::start(store.clone(), 1);
    let uploader = Uploader::new(store.clone(), &pool, CONTAINER);
    let report = uploader.upload_file(file.path()).await.unwrap();
    pool.shutdown().await;

    assert_eq!(report.status, UploadStatus::Done);
    assert_eq!(report.bytes_uploaded, 16 * PAGE_SIZE);
    assert_eq!(report.outcomes.len(), 16);
    assert_eq!(store.write_count(), 16);

    let blob_name = file.path().file_name().unwrap().to_str().unwrap().to_owned();
    assert_eq!(store.blob_bytes(CONTAINER, &blob_name).unwrap(), expected);
}
