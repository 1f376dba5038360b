//! Page-aligned file reading.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::error::{UploadError, UploadResult};
use crate::store::PAGE_SIZE;

/// A local file read one page at a time.
pub struct PageFile {
    file: File,
    size: u64,
    path: PathBuf,
}

impl PageFile {
    /// Opens the file and records its size.
    pub async fn open(path: impl AsRef<Path>) -> UploadResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).await.map_err(|source| UploadError::Io {
            path: path.clone(),
            source,
        })?;
        let size = file
            .metadata()
            .await
            .map_err(|source| UploadError::Io {
                path: path.clone(),
                source,
            })?
            .len();
        Ok(Self { file, size, path })
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Page blobs require the declared size to be page-aligned; a misaligned
    /// file fails here before any task is emitted.
    pub fn check_alignment(&self) -> UploadResult<()> {
        if self.size % PAGE_SIZE != 0 {
            return Err(UploadError::SizeAlignment {
                path: self.path.clone(),
                size: self.size,
            });
        }
        Ok(())
    }

    /// Reads exactly one page starting at `offset`.
    pub async fn read_page(&mut self, offset: u64) -> UploadResult<Bytes> {
        self.file
            .seek(SeekFrom::Start(offset))
            .await
            .map_err(|source| UploadError::Io {
                path: self.path.clone(),
                source,
            })?;

        let mut buf = vec![0u8; PAGE_SIZE as usize];
        match self.file.read_exact(&mut buf).await {
            Ok(_) => Ok(Bytes::from(buf)),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Err(UploadError::ShortRead {
                    path: self.path.clone(),
                    offset,
                })
            }
            Err(source) => Err(UploadError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}
