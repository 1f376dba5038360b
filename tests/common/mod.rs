//! Common test utilities.

use std::io::Write;

use async_trait::async_trait;
use bytes::Bytes;
use rand::Rng;
use tempfile::NamedTempFile;

use azup_rs::{MemoryPageStore, PageStore, PageWriteKind, StoreError, PAGE_SIZE};

/// A run of pages to lay out in a test file.
#[derive(Debug, Clone, Copy)]
pub enum Pages {
    /// `n` pages of zeros.
    Zero(usize),
    /// `n` pages of random non-zero data.
    Data(usize),
}

/// Writes a temp file laid out from the given page runs.
pub fn page_file(runs: &[Pages]) -> NamedTempFile {
    let mut rng = rand::thread_rng();
    let mut file = NamedTempFile::new().unwrap();

    for run in runs {
        match run {
            Pages::Zero(n) => {
                let zeros = vec![0u8; *n * PAGE_SIZE as usize];
                file.write_all(&zeros).unwrap();
            }
            Pages::Data(n) => {
                for _ in 0..*n {
                    let mut page = vec![0u8; PAGE_SIZE as usize];
                    rng.fill(&mut page[..]);
                    // Guarantee the page never classifies as zero.
                    page[0] = rng.gen_range(1..=255);
                    file.write_all(&page).unwrap();
                }
            }
        }
    }

    file.flush().unwrap();
    file
}

/// Store wrapper that permanently rejects writes touching one byte offset
/// and delegates everything else to an in-memory store.
pub struct FailingPageStore {
    pub inner: MemoryPageStore,
    fail_offset: u64,
}

impl FailingPageStore {
    pub fn new(fail_offset: u64) -> Self {
        Self {
            inner: MemoryPageStore::new(),
            fail_offset,
        }
    }
}

#[async_trait]
impl PageStore for FailingPageStore {
    async fn create_container(&self, container: &str) -> Result<(), StoreError> {
        self.inner.create_container(container).await
    }

    async fn init_page_blob(
        &self,
        container: &str,
        blob: &str,
        size: u64,
    ) -> Result<(), StoreError> {
        self.inner.init_page_blob(container, blob, size).await
    }

    async fn write_pages(
        &self,
        container: &str,
        blob: &str,
        offset: u64,
        length: u64,
        payload: Option<Bytes>,
        kind: PageWriteKind,
    ) -> Result<(), StoreError> {
        if offset == self.fail_offset {
            return Err(StoreError::Transient("injected write failure".to_string()));
        }
        self.inner
            .write_pages(container, blob, offset, length, payload, kind)
            .await
    }
}
