//! Object store seam.

use std::path::Path;

use async_trait::async_trait;

use crate::error::StorageResult;

/// Object storage used by the pipeline.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> StorageResult<()>;

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>>;

    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Download into a local file, creating parent directories.
    async fn get_to_file(&self, key: &str, path: &Path) -> StorageResult<()> {
        let bytes = self.get(key).await?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }
}
