//! In-memory page store for tests and local development.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use crate::error::StoreError;
use crate::store::{PageStore, PageWriteKind, MAX_PAGE_RANGE_SIZE, PAGE_SIZE};

/// In-memory implementation of [`PageStore`].
///
/// Enforces the same page-range rules as the real service (512-byte
/// alignment, range within the declared blob size, 4 MiB write cap) so the
/// pipeline can be exercised without a network.
pub struct MemoryPageStore {
    containers: DashMap<String, ()>,
    blobs: DashMap<String, Vec<u8>>,
    init_count: AtomicU64,
    write_count: AtomicU64,
}

fn blob_key(container: &str, blob: &str) -> String {
    format!("{}/{}", container, blob)
}

impl MemoryPageStore {
    pub fn new() -> Self {
        Self {
            containers: DashMap::new(),
            blobs: DashMap::new(),
            init_count: AtomicU64::new(0),
            write_count: AtomicU64::new(0),
        }
    }

    /// Returns a copy of the blob's bytes, if the blob exists.
    pub fn blob_bytes(&self, container: &str, blob: &str) -> Option<Vec<u8>> {
        self.blobs.get(&blob_key(container, blob)).map(|b| b.value().clone())
    }

    /// Number of `init_page_blob` calls accepted so far.
    pub fn init_count(&self) -> u64 {
        self.init_count.load(Ordering::Relaxed)
    }

    /// Number of `write_pages` calls received so far, including rejected ones.
    pub fn write_count(&self) -> u64 {
        self.write_count.load(Ordering::Relaxed)
    }

    pub fn container_exists(&self, container: &str) -> bool {
        self.containers.contains_key(container)
    }
}

impl Default for MemoryPageStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageStore for MemoryPageStore {
    async fn create_container(&self, container: &str) -> Result<(), StoreError> {
        if self.containers.insert(container.to_string(), ()).is_some() {
            return Err(StoreError::AlreadyExists);
        }
        Ok(())
    }

    async fn init_page_blob(
        &self,
        container: &str,
        blob: &str,
        size: u64,
    ) -> Result<(), StoreError> {
        if !self.containers.contains_key(container) {
            return Err(StoreError::NotFound(format!("container {}", container)));
        }
        if size % PAGE_SIZE != 0 {
            return Err(StoreError::InvalidRange(format!(
                "blob size {} is not a multiple of {}",
                size, PAGE_SIZE
            )));
        }
        self.init_count.fetch_add(1, Ordering::Relaxed);
        // A fresh page blob reads back as zeros.
        self.blobs.insert(blob_key(container, blob), vec![0u8; size as usize]);
        Ok(())
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
        self.write_count.fetch_add(1, Ordering::Relaxed);

        let mut data = self
            .blobs
            .get_mut(&blob_key(container, blob))
            .ok_or_else(|| StoreError::NotFound(format!("blob {}/{}", container, blob)))?;

        if length == 0 || offset % PAGE_SIZE != 0 || length % PAGE_SIZE != 0 {
            return Err(StoreError::InvalidRange(format!(
                "range {}+{} is not aligned to {} bytes",
                offset, length, PAGE_SIZE
            )));
        }
        if length > MAX_PAGE_RANGE_SIZE {
            return Err(StoreError::InvalidRange(format!(
                "range length {} exceeds the {} byte write cap",
                length, MAX_PAGE_RANGE_SIZE
            )));
        }
        let end = offset + length;
        if end > data.len() as u64 {
            return Err(StoreError::InvalidRange(format!(
                "range {}+{} exceeds blob size {}",
                offset,
                length,
                data.len()
            )));
        }

        let range = offset as usize..end as usize;
        match kind {
            PageWriteKind::Update => {
                let payload = payload.ok_or_else(|| {
                    StoreError::InvalidRange("update write requires a payload".to_string())
                })?;
                if payload.len() as u64 != length {
                    return Err(StoreError::InvalidRange(format!(
                        "payload length {} does not match range length {}",
                        payload.len(),
                        length
                    )));
                }
                data[range].copy_from_slice(&payload);
            }
            PageWriteKind::Clear => {
                data[range].fill(0);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_container_is_idempotent_up_to_already_exists() {
        let store = MemoryPageStore::new();
        store.create_container("disks").await.unwrap();
        assert!(matches!(
            store.create_container("disks").await,
            Err(StoreError::AlreadyExists)
        ));
    }

    #[tokio::test]
    async fn update_then_clear_round_trip() {
        let store = MemoryPageStore::new();
        store.create_container("disks").await.unwrap();
        store.init_page_blob("disks", "a.img", PAGE_SIZE * 4).await.unwrap();

        let payload = Bytes::from(vec![0xA5u8; PAGE_SIZE as usize]);
        store
            .write_pages("disks", "a.img", PAGE_SIZE, PAGE_SIZE, Some(payload), PageWriteKind::Update)
            .await
            .unwrap();
        let bytes = store.blob_bytes("disks", "a.img").unwrap();
        assert!(bytes[..PAGE_SIZE as usize].iter().all(|&b| b == 0));
        assert!(bytes[PAGE_SIZE as usize..2 * PAGE_SIZE as usize]
            .iter()
            .all(|&b| b == 0xA5));

        store
            .write_pages("disks", "a.img", PAGE_SIZE, PAGE_SIZE, None, PageWriteKind::Clear)
            .await
            .unwrap();
        let bytes = store.blob_bytes("disks", "a.img").unwrap();
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[tokio::test]
    async fn rejects_misaligned_and_oversized_ranges() {
        let store = MemoryPageStore::new();
        store.create_container("disks").await.unwrap();
        store
            .init_page_blob("disks", "a.img", MAX_PAGE_RANGE_SIZE * 2)
            .await
            .unwrap();

        let err = store
            .write_pages("disks", "a.img", 1, PAGE_SIZE, None, PageWriteKind::Clear)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidRange(_)));

        let err = store
            .write_pages(
                "disks",
                "a.img",
                0,
                MAX_PAGE_RANGE_SIZE + PAGE_SIZE,
                None,
                PageWriteKind::Clear,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidRange(_)));
    }
}
