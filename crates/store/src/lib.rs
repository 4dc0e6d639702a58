//! Local file store: a directory-backed name -> bytes mapping.
//!
//! Only this crate touches the storage directory; every other component
//! goes through the [`FileStore`] trait. Disk I/O is dispatched to the
//! blocking thread pool so request tasks never stall the async executor
//! on filesystem latency.

mod dir;
mod memory;

pub use dir::DirStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use fileswarm_types::FileName;

/// Storage errors
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("file not found")]
    NotFound,
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Abstract store backend.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn exists(&self, name: &FileName) -> StoreResult<bool>;

    /// Size in bytes of a stored file; `NotFound` if absent.
    async fn size(&self, name: &FileName) -> StoreResult<u64>;

    /// Full content of a stored file; `NotFound` if absent.
    async fn read(&self, name: &FileName) -> StoreResult<Vec<u8>>;

    /// Create or overwrite. Atomic with respect to readers: a concurrent
    /// read observes either the previous content or the full new content,
    /// never a partial write.
    async fn write(&self, name: &FileName, bytes: Vec<u8>) -> StoreResult<()>;
}
