//! Directory-backed store implementation.

use std::io::{self, Write as _};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use fileswarm_types::FileName;
use tempfile::NamedTempFile;
use tokio::task;
use tracing::debug;

use crate::{FileStore, StoreError, StoreResult};

/// Files live directly under the root directory, keyed by name.
#[derive(Clone)]
pub struct DirStore {
    root: Arc<PathBuf>,
}

impl DirStore {
    /// Open the storage directory, creating it if necessary.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        debug!(root = %root.display(), "opened file store");
        Ok(Self {
            root: Arc::new(root),
        })
    }

    fn path_for(&self, name: &FileName) -> PathBuf {
        self.root.join(name.as_str())
    }
}

fn map_not_found(err: io::Error) -> StoreError {
    if err.kind() == io::ErrorKind::NotFound {
        StoreError::NotFound
    } else {
        StoreError::Io(err)
    }
}

async fn run_blocking<T, F>(op: F) -> StoreResult<T>
where
    F: FnOnce() -> StoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    task::spawn_blocking(op)
        .await
        .map_err(|err| StoreError::Io(io::Error::new(io::ErrorKind::Other, err)))?
}

#[async_trait]
impl FileStore for DirStore {
    async fn exists(&self, name: &FileName) -> StoreResult<bool> {
        let path = self.path_for(name);
        run_blocking(move || match std::fs::metadata(&path) {
            Ok(meta) => Ok(meta.is_file()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(StoreError::Io(err)),
        })
        .await
    }

    async fn size(&self, name: &FileName) -> StoreResult<u64> {
        let path = self.path_for(name);
        run_blocking(move || {
            let meta = std::fs::metadata(&path).map_err(map_not_found)?;
            if !meta.is_file() {
                return Err(StoreError::NotFound);
            }
            Ok(meta.len())
        })
        .await
    }

    async fn read(&self, name: &FileName) -> StoreResult<Vec<u8>> {
        let path = self.path_for(name);
        run_blocking(move || std::fs::read(&path).map_err(map_not_found)).await
    }

    async fn write(&self, name: &FileName, bytes: Vec<u8>) -> StoreResult<()> {
        let root = Arc::clone(&self.root);
        let path = self.path_for(name);
        run_blocking(move || {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            // Write-then-rename: readers of `path` never observe a
            // partially written file.
            let mut tmp = NamedTempFile::new_in(root.as_ref())?;
            tmp.write_all(&bytes)?;
            tmp.persist(&path)
                .map_err(|err| StoreError::Io(err.error))?;
            Ok(())
        })
        .await
    }
}
