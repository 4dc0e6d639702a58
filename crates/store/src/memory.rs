//! In-memory store (for testing and small deployments).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use fileswarm_types::FileName;
use parking_lot::RwLock;

use crate::{FileStore, StoreError, StoreResult};

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file directly, bypassing the async interface. Test helper.
    pub fn insert(&self, name: &FileName, bytes: impl Into<Vec<u8>>) {
        self.inner
            .write()
            .insert(name.as_str().to_string(), bytes.into());
    }
}

#[async_trait]
impl FileStore for MemoryStore {
    async fn exists(&self, name: &FileName) -> StoreResult<bool> {
        Ok(self.inner.read().contains_key(name.as_str()))
    }

    async fn size(&self, name: &FileName) -> StoreResult<u64> {
        self.inner
            .read()
            .get(name.as_str())
            .map(|bytes| bytes.len() as u64)
            .ok_or(StoreError::NotFound)
    }

    async fn read(&self, name: &FileName) -> StoreResult<Vec<u8>> {
        self.inner
            .read()
            .get(name.as_str())
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn write(&self, name: &FileName, bytes: Vec<u8>) -> StoreResult<()> {
        self.inner.write().insert(name.as_str().to_string(), bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn roundtrip_and_not_found() {
        let store = MemoryStore::new();
        let name = FileName::new("x").unwrap();

        assert!(!store.exists(&name).await.unwrap());
        assert!(matches!(store.read(&name).await, Err(StoreError::NotFound)));

        store.write(&name, b"bytes".to_vec()).await.unwrap();
        assert_eq!(store.read(&name).await.unwrap(), b"bytes");
        assert_eq!(store.size(&name).await.unwrap(), 5);
    }
}
