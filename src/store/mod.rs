//! Remote page blob store interface.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StoreError;

mod memory;
mod rest;

pub use memory::MemoryPageStore;
pub use rest::RestPageStore;

/// Size of a single page. All blob offsets and lengths are multiples of it.
pub const PAGE_SIZE: u64 = 512;

/// Maximum number of bytes a single page write may carry.
pub const MAX_PAGE_RANGE_SIZE: u64 = 4 * 1024 * 1024; // 4 MiB per write operation

/// How a page range write affects the destination range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageWriteKind {
    /// Overwrite the range with the request payload.
    Update,
    /// Reset the range to zeros; no payload.
    Clear,
}

impl PageWriteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageWriteKind::Update => "update",
            PageWriteKind::Clear => "clear",
        }
    }
}

/// Trait for the remote page blob store.
///
/// Implementations must be safe to share across workers; every method may be
/// called concurrently for disjoint byte ranges of the same blob.
#[async_trait]
pub trait PageStore: Send + Sync {
    /// Creates a container. Returns [`StoreError::AlreadyExists`] if the
    /// container is already present, which callers may ignore.
    async fn create_container(&self, container: &str) -> Result<(), StoreError>;

    /// Creates an empty page blob of the declared size. Pages read back as
    /// zeros until written.
    async fn init_page_blob(
        &self,
        container: &str,
        blob: &str,
        size: u64,
    ) -> Result<(), StoreError>;

    /// Writes one page-aligned byte range. `payload` must be present for
    /// [`PageWriteKind::Update`] and absent for [`PageWriteKind::Clear`].
    /// Re-sending the same range with the same payload is safe.
    async fn write_pages(
        &self,
        container: &str,
        blob: &str,
        offset: u64,
        length: u64,
        payload: Option<Bytes>,
        kind: PageWriteKind,
    ) -> Result<(), StoreError>;
}
